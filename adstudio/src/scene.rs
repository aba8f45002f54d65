//! Scene generation through Imagen.

use adstudio_types::enums::{PersonGeneration, SafetyFilterLevel};
use adstudio_types::models::{GenerateImagesConfig, GenerateImagesResponse};
use futures_util::future::BoxFuture;
use image::DynamicImage;

use crate::client::Client;
use crate::error::{Error, Result};

/// 默认背景生成模型。
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-001";
/// 默认宽高比。
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// 背景生成能力接口。
pub trait SceneGenerator: Send + Sync {
    /// 根据提示词生成一张背景图。
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<DynamicImage>>;
}

/// Imagen `predict` 背景生成器。
#[derive(Clone)]
pub struct ImagenSceneGenerator {
    client: Client,
    model: String,
    aspect_ratio: String,
}

impl ImagenSceneGenerator {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            model: DEFAULT_IMAGE_MODEL.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = aspect_ratio.into();
        self
    }

    fn request_config(&self) -> GenerateImagesConfig {
        GenerateImagesConfig {
            number_of_images: Some(1),
            aspect_ratio: Some(self.aspect_ratio.clone()),
            safety_filter_level: Some(SafetyFilterLevel::BlockMediumAndAbove),
            person_generation: Some(PersonGeneration::AllowAdult),
            include_rai_reason: Some(true),
            ..Default::default()
        }
    }

    async fn render(&self, prompt: &str) -> Result<DynamicImage> {
        let response = self
            .client
            .models()
            .generate_images(&self.model, prompt, self.request_config())
            .await?;
        decode_first_image(&response)
    }
}

impl SceneGenerator for ImagenSceneGenerator {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<DynamicImage>> {
        Box::pin(self.render(prompt))
    }
}

fn decode_first_image(response: &GenerateImagesResponse) -> Result<DynamicImage> {
    if let Some(bytes) = response.first_image_bytes() {
        return Ok(image::load_from_memory(bytes)?);
    }
    match response.filtered_reason() {
        Some(reason) => Err(Error::SceneFiltered {
            reason: reason.to_string(),
        }),
        None => Err(Error::NoImageGenerated),
    }
}
