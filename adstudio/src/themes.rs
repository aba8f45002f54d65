//! Creative themes that drive prompt synthesis.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 创意主题。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// 主题名称。
    #[serde(rename = "theme")]
    pub name: String,
    /// 氛围 / 风格描述。
    pub mood: String,
    /// 营销角度，同时用于输出文件命名。
    pub marketing_angle: String,
}

impl Theme {
    pub fn new(
        name: impl Into<String>,
        mood: impl Into<String>,
        marketing_angle: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mood: mood.into(),
            marketing_angle: marketing_angle.into(),
        }
    }

    /// 发送给提示词模型的主题描述。
    #[must_use]
    pub fn request_text(&self) -> String {
        format!("Theme: {}\nMood: {}", self.name, self.mood)
    }

    /// 输出文件名：`output_<index>_<marketing_angle>.png`，营销角度去除首尾空白。
    #[must_use]
    pub fn output_filename(&self, index: usize) -> String {
        format!("output_{index}_{}.png", self.file_angle())
    }

    fn file_angle(&self) -> &str {
        self.marketing_angle.trim()
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: format!("theme #{index} has an empty name"),
            });
        }
        let angle = self.file_angle();
        if angle.is_empty() {
            return Err(Error::InvalidConfig {
                message: format!("theme '{}' has an empty marketing_angle", self.name),
            });
        }
        if angle.contains(['/', '\\']) || angle.contains("..") {
            return Err(Error::InvalidConfig {
                message: format!(
                    "theme '{}' marketing_angle '{angle}' cannot be used in a filename",
                    self.name
                ),
            });
        }
        Ok(())
    }
}

/// 有序、非空的主题目录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeCatalog {
    themes: Vec<Theme>,
}

impl ThemeCatalog {
    /// 校验并创建主题目录。
    ///
    /// # Errors
    /// 目录为空、主题名为空，或营销角度无法作为文件名时返回错误。
    pub fn new(themes: Vec<Theme>) -> Result<Self> {
        if themes.is_empty() {
            return Err(Error::InvalidConfig {
                message: "theme catalog must contain at least one theme".into(),
            });
        }
        for (index, theme) in themes.iter().enumerate() {
            theme.validate(index)?;
        }
        Ok(Self { themes })
    }

    /// 从 JSON 数组解析。
    ///
    /// # Errors
    /// JSON 无法解析或目录校验失败时返回错误。
    pub fn from_json(json: &str) -> Result<Self> {
        let themes: Vec<Theme> = serde_json::from_str(json)?;
        Self::new(themes)
    }

    /// 从 JSON 文件加载。
    ///
    /// # Errors
    /// 文件读取、解析或校验失败时返回错误。
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| Error::InvalidConfig {
            message: format!("Failed to read theme file {}: {err}", path.display()),
        })?;
        Self::from_json(&content)
    }

    /// 按处理顺序遍历 `(index, theme)`。
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Theme)> {
        self.themes.iter().enumerate()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Theme> {
        self.themes.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.themes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }
}

impl Default for ThemeCatalog {
    fn default() -> Self {
        Self {
            themes: vec![
                Theme::new(
                    "Neo-Tokyo Cyberpunk",
                    "Futuristic, Neon, High Contrast, Wet Surface reflections",
                    "Innovation",
                ),
                Theme::new(
                    "Organic Minimalism",
                    "Soft sunlight, beige stone textures, Japandi style, shadows",
                    "Simplicity",
                ),
                Theme::new(
                    "Midnight Luxury",
                    "Black marble, gold rim lighting, floating, expensive, bokeh",
                    "Exclusivity",
                ),
            ],
        }
    }
}
