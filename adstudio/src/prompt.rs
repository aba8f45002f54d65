//! Prompt synthesis: a multimodal model looks at the cutout and writes the scene prompt.

use adstudio_types::content::{Content, Part, Role};
use adstudio_types::models::GenerateContentConfig;
use futures_util::future::BoxFuture;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::strip::ProductCutout;
use crate::themes::Theme;

/// 默认提示词模型。
pub const DEFAULT_PROMPT_MODEL: &str = "gemini-1.5-flash-002";

/// 固定的提示词工程指令。
pub const PROMPT_ENGINEER_INSTRUCTIONS: &str = "You are an expert AI Prompt Engineer for product photography. \
Your goal is to write a structured prompt for a text-to-image model (Imagen 3).\n\
I will give you an image of a product and a 'Theme'.\n\
You must output ONLY the prompt text.\n\
\n\
Follow this structure:\n\
\"[Subject Description], [Environment/Background], [Lighting], [Camera Angle], [Style/Render Engine]\"\n\
\n\
Rules:\n\
1. Keep the subject description minimal (e.g., \"The perfume bottle\").\n\
2. Focus heavily on the environment and lighting to match the requested Theme.\n\
3. Use keywords like \"8k\", \"photorealistic\", \"octane render\", \"softbox lighting\".\n\
4. Do not include introductory text like \"Here is the prompt\".";

/// 提示词合成能力接口。
pub trait PromptSynthesizer: Send + Sync {
    /// 基于产品图与主题生成图像提示词。
    fn synthesize<'a>(
        &'a self,
        cutout: &'a ProductCutout,
        theme: &'a Theme,
    ) -> BoxFuture<'a, Result<String>>;
}

/// 基于 Gemini `generateContent` 的提示词合成器。
#[derive(Clone)]
pub struct GeminiPromptSynthesizer {
    client: Client,
    model: String,
    config: GenerateContentConfig,
}

impl GeminiPromptSynthesizer {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            model: DEFAULT_PROMPT_MODEL.to_string(),
            config: GenerateContentConfig::default(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// 覆盖请求配置（生成参数、安全设置等）。
    #[must_use]
    pub fn with_config(mut self, config: GenerateContentConfig) -> Self {
        self.config = config;
        self
    }

    async fn request_prompt(&self, cutout: &ProductCutout, theme: &Theme) -> Result<String> {
        let contents = vec![build_request_content(cutout, theme)];
        let response = self
            .client
            .models()
            .generate_content_with_config(&self.model, contents, self.config.clone())
            .await?;

        let text = response.text().unwrap_or_default();
        let prompt = text.trim();
        if prompt.is_empty() {
            let message = match response.block_reason() {
                Some(reason) => format!("prompt blocked for theme '{}': {reason:?}", theme.name),
                None => format!("model returned no text for theme '{}'", theme.name),
            };
            return Err(Error::EmptyPrompt { message });
        }
        Ok(prompt.to_string())
    }
}

impl PromptSynthesizer for GeminiPromptSynthesizer {
    fn synthesize<'a>(
        &'a self,
        cutout: &'a ProductCutout,
        theme: &'a Theme,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.request_prompt(cutout, theme))
    }
}

/// 单条用户消息：产品图、指令、主题描述。
fn build_request_content(cutout: &ProductCutout, theme: &Theme) -> Content {
    Content::from_parts(
        vec![
            Part::inline_data(cutout.png_bytes().to_vec(), "image/png"),
            Part::text(PROMPT_ENGINEER_INSTRUCTIONS),
            Part::text(theme.request_text()),
        ],
        Role::User,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use adstudio_types::content::PartKind;
    use image::{Rgba, RgbaImage};

    #[test]
    fn request_content_has_image_then_instructions_then_theme() {
        let cutout = ProductCutout::new(RgbaImage::from_pixel(3, 5, Rgba([9, 9, 9, 255]))).unwrap();
        let theme = Theme::new("Midnight Luxury", "Black marble", "Exclusivity");
        let content = build_request_content(&cutout, &theme);

        assert_eq!(content.role, Some(Role::User));
        assert_eq!(content.parts.len(), 3);
        match &content.parts[0].kind {
            PartKind::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "image/png");
                assert_eq!(inline_data.data, cutout.png_bytes());
            }
            PartKind::Text { .. } => panic!("first part should be the product image"),
        }
        assert_eq!(content.parts[1].text_value(), Some(PROMPT_ENGINEER_INSTRUCTIONS));
        assert_eq!(
            content.parts[2].text_value(),
            Some("Theme: Midnight Luxury\nMood: Black marble")
        );
    }

    #[test]
    fn instructions_pin_the_prompt_template() {
        assert!(PROMPT_ENGINEER_INSTRUCTIONS.contains(
            "[Subject Description], [Environment/Background], [Lighting], [Camera Angle], [Style/Render Engine]"
        ));
        assert!(PROMPT_ENGINEER_INSTRUCTIONS.contains("output ONLY the prompt text"));
    }
}
