//! Models API surface: `generateContent`, Imagen `predict` and segmentation `predict`.

use std::sync::Arc;

use adstudio_types::content::Content;
use adstudio_types::http::HttpOptions;
use adstudio_types::models::{
    GenerateContentConfig, GenerateContentRequest, GenerateImagesConfig, GenerateImagesResponse,
    GeneratedImage, GeneratedImageMask, Image, SegmentImageConfig, SegmentImageResponse,
    SegmentImageSource,
};
use adstudio_types::response::GenerateContentResponse;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Number, Value};

use crate::client::{Backend, ClientInner};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct Models {
    pub(crate) inner: Arc<ClientInner>,
}

impl Models {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// 生成内容（自定义配置）。
    ///
    /// # Errors
    /// 当请求失败、服务端返回非 2xx 或响应无法解析时返回错误。
    pub async fn generate_content_with_config(
        &self,
        model: impl Into<String>,
        contents: Vec<Content>,
        mut config: GenerateContentConfig,
    ) -> Result<GenerateContentResponse> {
        let model = model.into();
        let http_options = config.http_options.take();
        let request = GenerateContentRequest {
            contents,
            system_instruction: config.system_instruction,
            generation_config: config.generation_config,
            safety_settings: config.safety_settings,
            labels: config.labels,
        };
        if request.labels.is_some() && self.inner.config.backend == Backend::GeminiApi {
            return Err(Error::InvalidConfig {
                message: "labels is not supported in Gemini API".into(),
            });
        }

        let mut body = serde_json::to_value(&request)?;
        if let Some(options) = http_options.as_ref() {
            merge_extra_body(&mut body, options)?;
        }
        let url = build_model_method_url(&self.inner, &model, "generateContent")?;

        let mut request = self.inner.http.post(url).json(&body);
        request = apply_http_options(request, http_options.as_ref())?;

        let response = self.inner.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let value = response.json::<Value>().await?;
        serde_json::from_value(value).map_err(|err| Error::Parse {
            message: format!("GenerateContentResponse parse failed: {err}"),
        })
    }

    /// 生成图像（Imagen）。
    ///
    /// # Errors
    /// 当配置与后端不兼容、请求失败或响应无法解析时返回错误。
    pub async fn generate_images(
        &self,
        model: impl Into<String>,
        prompt: impl Into<String>,
        mut config: GenerateImagesConfig,
    ) -> Result<GenerateImagesResponse> {
        let http_options = config.http_options.take();
        let model = model.into();
        let prompt = prompt.into();
        let mut body = build_generate_images_body(&prompt, &config)?;
        if let Some(options) = http_options.as_ref() {
            merge_extra_body(&mut body, options)?;
        }
        let url = build_model_method_url(&self.inner, &model, "predict")?;

        let mut request = self.inner.http.post(url).json(&body);
        request = apply_http_options(request, http_options.as_ref())?;

        let response = self.inner.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let value = response.json::<Value>().await?;
        Ok(parse_generate_images_response(&value))
    }

    /// Segment 图像（仅 Vertex AI）。
    ///
    /// # Errors
    /// 当后端不是 Vertex AI、请求失败或响应无法解析时返回错误。
    pub async fn segment_image(
        &self,
        model: impl Into<String>,
        source: SegmentImageSource,
        mut config: SegmentImageConfig,
    ) -> Result<SegmentImageResponse> {
        if self.inner.config.backend != Backend::VertexAi {
            return Err(Error::InvalidConfig {
                message: "Segment image is only supported in Vertex AI backend".into(),
            });
        }

        let http_options = config.http_options.take();
        let model = model.into();
        let mut body = build_segment_image_body(&source, &config);
        if let Some(options) = http_options.as_ref() {
            merge_extra_body(&mut body, options)?;
        }
        let url = build_model_method_url(&self.inner, &model, "predict")?;

        let mut request = self.inner.http.post(url).json(&body);
        request = apply_http_options(request, http_options.as_ref())?;

        let response = self.inner.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let value = response.json::<Value>().await?;
        Ok(parse_segment_image_response(&value))
    }
}

fn transform_model_name(backend: Backend, model: &str) -> String {
    match backend {
        Backend::GeminiApi => {
            if model.starts_with("models/") {
                model.to_string()
            } else {
                format!("models/{model}")
            }
        }
        Backend::VertexAi => {
            if model.starts_with("projects/") || model.starts_with("publishers/") {
                model.to_string()
            } else {
                format!("publishers/google/models/{model}")
            }
        }
    }
}

fn build_model_method_url(inner: &ClientInner, model: &str, method: &str) -> Result<String> {
    let model = transform_model_name(inner.config.backend, model);
    let base = &inner.api_client.base_url;
    let version = &inner.api_client.api_version;
    let url = match inner.config.backend {
        Backend::GeminiApi => format!("{base}{version}/{model}:{method}"),
        Backend::VertexAi => {
            let vertex =
                inner
                    .config
                    .vertex_config
                    .as_ref()
                    .ok_or_else(|| Error::InvalidConfig {
                        message: "Vertex config missing".into(),
                    })?;
            if model.starts_with("projects/") {
                format!("{base}{version}/{model}:{method}")
            } else {
                format!(
                    "{base}{version}/projects/{}/locations/{}/{}:{method}",
                    vertex.project, vertex.location, model
                )
            }
        }
    };
    Ok(url)
}

fn build_generate_images_body(prompt: &str, config: &GenerateImagesConfig) -> Result<Value> {
    let mut instance = Map::new();
    instance.insert("prompt".to_string(), Value::String(prompt.to_string()));

    let mut root = Map::new();
    root.insert(
        "instances".to_string(),
        Value::Array(vec![Value::Object(instance)]),
    );

    let mut parameters = Map::new();
    if let Some(value) = config.number_of_images {
        parameters.insert(
            "sampleCount".to_string(),
            Value::Number(Number::from(value)),
        );
    }
    if let Some(value) = &config.aspect_ratio {
        parameters.insert("aspectRatio".to_string(), Value::String(value.clone()));
    }
    if let Some(value) = config.safety_filter_level {
        parameters.insert("safetySetting".to_string(), serde_json::to_value(value)?);
    }
    if let Some(value) = config.person_generation {
        parameters.insert("personGeneration".to_string(), serde_json::to_value(value)?);
    }
    if let Some(value) = config.include_rai_reason {
        parameters.insert("includeRaiReason".to_string(), Value::Bool(value));
    }

    if !parameters.is_empty() {
        root.insert("parameters".to_string(), Value::Object(parameters));
    }

    Ok(Value::Object(root))
}

fn build_segment_image_body(source: &SegmentImageSource, config: &SegmentImageConfig) -> Value {
    let mut instance = Map::new();
    if let Some(prompt) = &source.prompt {
        instance.insert("prompt".to_string(), Value::String(prompt.clone()));
    }
    if let Some(image) = &source.image {
        instance.insert("image".to_string(), image_to_vertex(image));
    }

    let mut root = Map::new();
    root.insert(
        "instances".to_string(),
        Value::Array(vec![Value::Object(instance)]),
    );

    let mut parameters = Map::new();
    if let Some(value) = config.mode {
        if let Ok(mode) = serde_json::to_value(value) {
            parameters.insert("mode".to_string(), mode);
        }
    }
    if let Some(value) = config.max_predictions {
        parameters.insert(
            "maxPredictions".to_string(),
            Value::Number(Number::from(value)),
        );
    }
    if !parameters.is_empty() {
        root.insert("parameters".to_string(), Value::Object(parameters));
    }

    Value::Object(root)
}

fn parse_generate_images_response(value: &Value) -> GenerateImagesResponse {
    let generated_images = predictions(value)
        .iter()
        .map(parse_generated_image)
        .collect();
    GenerateImagesResponse { generated_images }
}

fn parse_generated_image(value: &Value) -> GeneratedImage {
    let image = serde_json::from_value::<Image>(value.clone())
        .ok()
        .filter(|image| image.image_bytes.is_some() || image.gcs_uri.is_some());
    let rai_filtered_reason = value
        .get("raiFilteredReason")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    GeneratedImage {
        image,
        rai_filtered_reason,
    }
}

fn parse_segment_image_response(value: &Value) -> SegmentImageResponse {
    let generated_masks = predictions(value)
        .iter()
        .map(|item| GeneratedImageMask {
            mask: serde_json::from_value::<Image>(item.clone())
                .ok()
                .filter(|image| image.image_bytes.is_some()),
            labels: item
                .get("labels")
                .and_then(|labels| serde_json::from_value(labels.clone()).ok()),
        })
        .collect();
    SegmentImageResponse { generated_masks }
}

fn predictions(value: &Value) -> Vec<Value> {
    value
        .get("predictions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn image_to_vertex(image: &Image) -> Value {
    let mut map = Map::new();
    if let Some(gcs_uri) = &image.gcs_uri {
        map.insert("gcsUri".to_string(), Value::String(gcs_uri.clone()));
    }
    if let Some(bytes) = &image.image_bytes {
        map.insert(
            "bytesBase64Encoded".to_string(),
            Value::String(STANDARD.encode(bytes)),
        );
    }
    if let Some(mime) = &image.mime_type {
        map.insert("mimeType".to_string(), Value::String(mime.clone()));
    }
    Value::Object(map)
}

fn apply_http_options(
    mut request: reqwest::RequestBuilder,
    http_options: Option<&HttpOptions>,
) -> Result<reqwest::RequestBuilder> {
    if let Some(options) = http_options {
        if let Some(timeout) = options.timeout {
            request = request.timeout(std::time::Duration::from_millis(timeout));
        }
        if let Some(headers) = &options.headers {
            for (key, value) in headers {
                let name =
                    reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                        Error::InvalidConfig {
                            message: format!("Invalid header name: {key}"),
                        }
                    })?;
                let value = reqwest::header::HeaderValue::from_str(value).map_err(|_| {
                    Error::InvalidConfig {
                        message: format!("Invalid header value for {key}"),
                    }
                })?;
                request = request.header(name, value);
            }
        }
    }
    Ok(request)
}

fn merge_extra_body(body: &mut Value, http_options: &HttpOptions) -> Result<()> {
    if let Some(extra) = &http_options.extra_body {
        match (body, extra) {
            (Value::Object(body_map), Value::Object(extra_map)) => {
                for (key, value) in extra_map {
                    body_map.insert(key.clone(), value.clone());
                }
            }
            (_, _) => {
                return Err(Error::InvalidConfig {
                    message: "HttpOptions.extra_body must be an object".into(),
                });
            }
        }
    }
    Ok(())
}
