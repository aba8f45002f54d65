//! Run configuration, resolved from the environment and then CLI flags.

use std::path::PathBuf;

use crate::client::{Client, Credentials};
use crate::error::{Error, Result};
use crate::prompt::DEFAULT_PROMPT_MODEL;
use crate::scene::{DEFAULT_ASPECT_RATIO, DEFAULT_IMAGE_MODEL};

/// 默认 Vertex AI 区域。
pub const DEFAULT_LOCATION: &str = "us-central1";

/// 一次运行所需的全部配置。
#[derive(Clone)]
pub struct StudioConfig {
    /// Vertex AI 项目；设置后走 Vertex 后端。
    pub project: Option<String>,
    pub location: String,
    /// Gemini API Key（未设置项目时使用）。
    pub api_key: Option<String>,
    /// 预先获取的 access token，优先于 ADC。
    pub access_token: Option<String>,
    pub prompt_model: String,
    pub image_model: String,
    pub aspect_ratio: String,
    pub base_url: Option<String>,
    /// 请求超时（秒）。
    pub timeout: Option<u64>,
    pub output_dir: PathBuf,
    pub themes_file: Option<PathBuf>,
}

impl std::fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioConfig")
            .field("project", &self.project)
            .field("location", &self.location)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("prompt_model", &self.prompt_model)
            .field("image_model", &self.image_model)
            .field("aspect_ratio", &self.aspect_ratio)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("output_dir", &self.output_dir)
            .field("themes_file", &self.themes_file)
            .finish()
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            project: None,
            location: DEFAULT_LOCATION.to_string(),
            api_key: None,
            access_token: None,
            prompt_model: DEFAULT_PROMPT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            base_url: None,
            timeout: None,
            output_dir: PathBuf::from("output"),
            themes_file: None,
        }
    }
}

impl StudioConfig {
    /// 从环境变量读取配置，缺省项使用默认值。
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();
        Self {
            project: get("GOOGLE_CLOUD_PROJECT"),
            location: get("GOOGLE_CLOUD_LOCATION").unwrap_or(defaults.location),
            api_key: get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            access_token: get("GOOGLE_CLOUD_ACCESS_TOKEN"),
            prompt_model: get("ADSTUDIO_PROMPT_MODEL").unwrap_or(defaults.prompt_model),
            image_model: get("ADSTUDIO_IMAGE_MODEL").unwrap_or(defaults.image_model),
            aspect_ratio: get("ADSTUDIO_ASPECT_RATIO").unwrap_or(defaults.aspect_ratio),
            base_url: get("ADSTUDIO_BASE_URL"),
            timeout: get("ADSTUDIO_TIMEOUT_SECS").and_then(|value| value.trim().parse().ok()),
            output_dir: defaults.output_dir,
            themes_file: None,
        }
    }

    /// 构建云端客户端：设置了项目走 Vertex AI，否则使用 Gemini API Key。
    ///
    /// # Errors
    /// 既没有项目也没有 API Key，或客户端构建失败时返回错误。
    pub fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder();
        if let Some(project) = &self.project {
            let credentials = self
                .access_token
                .clone()
                .map_or(Credentials::ApplicationDefault, Credentials::AccessToken);
            builder = builder
                .vertex_project(project)
                .vertex_location(&self.location)
                .credentials(credentials);
        } else if let Some(api_key) = &self.api_key {
            builder = builder.api_key(api_key);
        } else {
            return Err(Error::InvalidConfig {
                message: "set GOOGLE_CLOUD_PROJECT for Vertex AI or GEMINI_API_KEY for the Gemini API"
                    .into(),
            });
        }
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}
