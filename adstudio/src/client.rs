//! Client configuration and transport layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use google_cloud_auth::credentials::{
    Builder as AuthBuilder, CacheableResource, Credentials as GoogleCredentials,
};
use http::Extensions;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client as HttpClient, Proxy};
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

/// Gemini / Vertex AI 客户端。
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub http: HttpClient,
    pub config: ClientConfig,
    pub api_client: ApiClient,
    pub(crate) auth_provider: Option<AuthProvider>,
}

/// 客户端配置。
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 后端选择。
    pub backend: Backend,
    /// Vertex AI 配置。
    pub vertex_config: Option<VertexConfig>,
    /// HTTP 配置。
    pub http_options: HttpOptions,
    /// 认证信息。
    pub credentials: Credentials,
    /// OAuth scopes（ADC 使用）。
    pub auth_scopes: Vec<String>,
}

/// 后端选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    GeminiApi,
    VertexAi,
}

/// 认证方式。
#[derive(Clone)]
pub enum Credentials {
    /// API Key（Gemini API）。
    ApiKey(String),
    /// 预先获取的 OAuth access token，例如 `gcloud auth print-access-token`。
    AccessToken(String),
    /// Application Default Credentials (ADC)。
    ApplicationDefault,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Self::ApplicationDefault => f.write_str("ApplicationDefault"),
        }
    }
}

/// Vertex AI 配置。
#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project: String,
    pub location: String,
}

/// HTTP 配置。
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub headers: HashMap<String, String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
}

impl Client {
    /// 创建新客户端（Gemini API）。
    ///
    /// # Errors
    /// 当配置无效或构建客户端失败时返回错误。
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder()
            .api_key(api_key)
            .backend(Backend::GeminiApi)
            .build()
    }

    /// 创建 Vertex AI 客户端（ADC 认证）。
    ///
    /// # Errors
    /// 当配置无效或构建客户端失败时返回错误。
    pub fn new_vertex(project: impl Into<String>, location: impl Into<String>) -> Result<Self> {
        Self::builder()
            .backend(Backend::VertexAi)
            .vertex_project(project)
            .vertex_location(location)
            .build()
    }

    /// 创建 Builder。
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// 当前后端。
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.inner.config.backend
    }

    /// 访问 Models API。
    #[must_use]
    pub fn models(&self) -> crate::models::Models {
        crate::models::Models::new(self.inner.clone())
    }

    /// 立即解析一次鉴权头，使不可用的凭据在首个请求之前暴露。
    ///
    /// # Errors
    /// 当 ADC 初始化或令牌获取失败时返回 [`Error::Auth`]。
    pub async fn ensure_auth(&self) -> Result<()> {
        self.inner.auth_headers().await?;
        Ok(())
    }
}

/// 客户端 Builder。
#[derive(Default)]
pub struct ClientBuilder {
    api_key: Option<String>,
    credentials: Option<Credentials>,
    backend: Option<Backend>,
    vertex_project: Option<String>,
    vertex_location: Option<String>,
    http_options: HttpOptions,
    auth_scopes: Option<Vec<String>>,
}

impl ClientBuilder {
    /// 设置 API Key（Gemini API）。
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// 设置认证方式。
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// 设置后端（Gemini API 或 Vertex AI）。
    #[must_use]
    pub const fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// 设置 Vertex AI 项目 ID。
    #[must_use]
    pub fn vertex_project(mut self, project: impl Into<String>) -> Self {
        self.vertex_project = Some(project.into());
        self
    }

    /// 设置 Vertex AI 区域。
    #[must_use]
    pub fn vertex_location(mut self, location: impl Into<String>) -> Self {
        self.vertex_location = Some(location.into());
        self
    }

    /// 设置请求超时（秒）。
    #[must_use]
    pub const fn timeout(mut self, secs: u64) -> Self {
        self.http_options.timeout = Some(secs);
        self
    }

    /// 设置代理。
    #[must_use]
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.http_options.proxy = Some(url.into());
        self
    }

    /// 增加默认 HTTP 头。
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_options.headers.insert(key.into(), value.into());
        self
    }

    /// 设置自定义基础 URL。
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http_options.base_url = Some(base_url.into());
        self
    }

    /// 设置 API 版本。
    #[must_use]
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.http_options.api_version = Some(api_version.into());
        self
    }

    /// 设置 OAuth scopes。
    #[must_use]
    pub fn auth_scopes(mut self, scopes: Vec<String>) -> Self {
        self.auth_scopes = Some(scopes);
        self
    }

    /// 构建客户端。
    ///
    /// # Errors
    /// 当配置不完整、参数无效或构建 HTTP 客户端失败时返回错误。
    pub fn build(self) -> Result<Client> {
        let Self {
            api_key,
            credentials,
            backend,
            vertex_project,
            vertex_location,
            http_options,
            auth_scopes,
        } = self;

        let backend = backend.unwrap_or_else(|| {
            if vertex_project.is_some() || vertex_location.is_some() {
                Backend::VertexAi
            } else {
                Backend::GeminiApi
            }
        });
        let vertex_config = Self::build_vertex_config(backend, vertex_project, vertex_location)?;
        let credentials = Self::resolve_credentials(backend, api_key, credentials)?;
        let headers = Self::build_headers(&http_options, &credentials)?;
        let http = Self::build_http_client(&http_options, headers)?;

        let auth_scopes = auth_scopes.unwrap_or_else(|| default_auth_scopes(backend));
        let auth_provider = build_auth_provider(&credentials)?;
        let config = ClientConfig {
            backend,
            vertex_config,
            http_options,
            credentials,
            auth_scopes,
        };
        let api_client = ApiClient::new(&config);

        Ok(Client {
            inner: Arc::new(ClientInner {
                http,
                config,
                api_client,
                auth_provider,
            }),
        })
    }

    fn build_vertex_config(
        backend: Backend,
        vertex_project: Option<String>,
        vertex_location: Option<String>,
    ) -> Result<Option<VertexConfig>> {
        if backend != Backend::VertexAi {
            return Ok(None);
        }
        let missing = || Error::InvalidConfig {
            message: "Project and location required for Vertex AI".into(),
        };
        let project = vertex_project
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(missing)?;
        let location = vertex_location
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(missing)?;
        Ok(Some(VertexConfig { project, location }))
    }

    fn resolve_credentials(
        backend: Backend,
        api_key: Option<String>,
        credentials: Option<Credentials>,
    ) -> Result<Credentials> {
        if api_key.is_some()
            && credentials
                .as_ref()
                .is_some_and(|credentials| !matches!(credentials, Credentials::ApiKey(_)))
        {
            return Err(Error::InvalidConfig {
                message: "API key cannot be combined with token or ADC credentials".into(),
            });
        }

        let credentials = match (credentials, api_key) {
            (Some(credentials), _) => credentials,
            (None, Some(api_key)) => Credentials::ApiKey(api_key),
            (None, None) if backend == Backend::VertexAi => Credentials::ApplicationDefault,
            (None, None) => {
                return Err(Error::InvalidConfig {
                    message: "API key or access token required for Gemini API".into(),
                });
            }
        };

        match (&credentials, backend) {
            (Credentials::ApiKey(_), Backend::VertexAi) => Err(Error::InvalidConfig {
                message: "Vertex AI does not support API key authentication".into(),
            }),
            (Credentials::ApplicationDefault, Backend::GeminiApi) => Err(Error::InvalidConfig {
                message: "Application Default Credentials require the Vertex AI backend".into(),
            }),
            _ => Ok(credentials),
        }
    }

    fn build_headers(http_options: &HttpOptions, credentials: &Credentials) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &http_options.headers {
            let name =
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| Error::InvalidConfig {
                    message: format!("Invalid header name: {key}"),
                })?;
            let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidConfig {
                message: format!("Invalid header value for {key}"),
            })?;
            headers.insert(name, value);
        }

        if let Credentials::ApiKey(api_key) = credentials {
            let header_name = HeaderName::from_static("x-goog-api-key");
            if !api_key.is_empty() && !headers.contains_key(&header_name) {
                let mut header_value =
                    HeaderValue::from_str(api_key).map_err(|_| Error::InvalidConfig {
                        message: "Invalid API key value".into(),
                    })?;
                header_value.set_sensitive(true);
                headers.insert(header_name, header_value);
            }
        }

        Ok(headers)
    }

    fn build_http_client(http_options: &HttpOptions, headers: HeaderMap) -> Result<HttpClient> {
        let mut http_builder = HttpClient::builder();
        if let Some(timeout) = http_options.timeout {
            http_builder = http_builder.timeout(Duration::from_secs(timeout));
        }

        if let Some(proxy_url) = &http_options.proxy {
            let proxy = Proxy::all(proxy_url).map_err(|e| Error::InvalidConfig {
                message: format!("Invalid proxy: {e}"),
            })?;
            http_builder = http_builder.proxy(proxy);
        }

        if !headers.is_empty() {
            http_builder = http_builder.default_headers(headers);
        }

        Ok(http_builder.build()?)
    }
}

fn build_auth_provider(credentials: &Credentials) -> Result<Option<AuthProvider>> {
    match credentials {
        Credentials::ApiKey(_) => Ok(None),
        Credentials::AccessToken(token) => {
            let mut value =
                HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|_| {
                    Error::InvalidConfig {
                        message: "Invalid access token value".into(),
                    }
                })?;
            value.set_sensitive(true);
            Ok(Some(AuthProvider::Static(value)))
        }
        Credentials::ApplicationDefault => Ok(Some(AuthProvider::ApplicationDefault(Arc::new(
            OnceCell::new(),
        )))),
    }
}

#[derive(Clone)]
pub(crate) enum AuthProvider {
    Static(HeaderValue),
    ApplicationDefault(Arc<OnceCell<Arc<GoogleCredentials>>>),
}

impl AuthProvider {
    async fn headers(&self, scopes: &[&str]) -> Result<HeaderMap> {
        match self {
            Self::Static(value) => {
                let mut headers = HeaderMap::new();
                headers.insert(AUTHORIZATION, value.clone());
                Ok(headers)
            }
            Self::ApplicationDefault(cell) => {
                let credentials = cell
                    .get_or_try_init(|| async {
                        AuthBuilder::default()
                            .with_scopes(scopes.iter().copied())
                            .build()
                            .map(Arc::new)
                            .map_err(|err| Error::Auth {
                                message: format!(
                                    "ADC init failed: {err}. Run `gcloud auth application-default login`."
                                ),
                            })
                    })
                    .await?;
                let headers = credentials
                    .headers(Extensions::new())
                    .await
                    .map_err(|err| Error::Auth {
                        message: format!("ADC header fetch failed: {err}"),
                    })?;
                match headers {
                    CacheableResource::New { data, .. } => Ok(data),
                    CacheableResource::NotModified => Err(Error::Auth {
                        message: "ADC header fetch returned NotModified without cached headers"
                            .into(),
                    }),
                }
            }
        }
    }
}

impl ClientInner {
    /// 发送请求并自动注入鉴权头。
    ///
    /// # Errors
    /// 当请求构建、鉴权头获取或网络请求失败时返回错误。
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut request = request.build()?;
        if let Some(headers) = self.auth_headers().await? {
            for (name, value) in &headers {
                if request.headers().contains_key(name) {
                    continue;
                }
                let mut value = value.clone();
                if name == AUTHORIZATION {
                    value.set_sensitive(true);
                }
                request.headers_mut().insert(name.clone(), value);
            }
        }
        tracing::debug!(method = %request.method(), url = %request.url(), "sending request");
        Ok(self.http.execute(request).await?)
    }

    async fn auth_headers(&self) -> Result<Option<HeaderMap>> {
        let Some(provider) = &self.auth_provider else {
            return Ok(None);
        };

        let scopes: Vec<&str> = self.config.auth_scopes.iter().map(String::as_str).collect();
        let headers = provider.headers(&scopes).await?;
        Ok(Some(headers))
    }
}

fn default_auth_scopes(backend: Backend) -> Vec<String> {
    match backend {
        Backend::VertexAi => vec!["https://www.googleapis.com/auth/cloud-platform".into()],
        Backend::GeminiApi => vec!["https://www.googleapis.com/auth/generative-language".into()],
    }
}

pub(crate) struct ApiClient {
    pub base_url: String,
    pub api_version: String,
}

impl ApiClient {
    /// 推导基础 URL 与 API 版本。
    pub fn new(config: &ClientConfig) -> Self {
        let base_url = config.http_options.base_url.as_deref().map_or_else(
            || match config.backend {
                Backend::VertexAi => {
                    let location = config
                        .vertex_config
                        .as_ref()
                        .map_or("", |cfg| cfg.location.as_str());
                    if location.is_empty() || location == "global" {
                        "https://aiplatform.googleapis.com/".to_string()
                    } else {
                        format!("https://{location}-aiplatform.googleapis.com/")
                    }
                }
                Backend::GeminiApi => "https://generativelanguage.googleapis.com/".to_string(),
            },
            normalize_base_url,
        );

        let api_version =
            config
                .http_options
                .api_version
                .clone()
                .unwrap_or_else(|| match config.backend {
                    Backend::VertexAi => "v1beta1".to_string(),
                    Backend::GeminiApi => "v1beta".to_string(),
                });

        Self {
            base_url,
            api_version,
        }
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let mut value = base_url.trim().to_string();
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}
