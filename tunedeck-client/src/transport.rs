//! HTTP transport for the catalog backend.
//!
//! Every call attaches the session's bearer token, unwraps the response
//! envelope and classifies failures into [`ApiError`]. Nothing escapes the
//! `Result` boundary.

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tunedeck_core::error::NETWORK_ERROR_MESSAGE;
use tunedeck_core::{ApiError, ApiResult, ErrorKind};

use crate::config::ConsoleConfig;
use crate::envelope::{decode, http_failure, interpret_response};
use crate::events::ClientEvent;
use crate::session::Session;

/// Query parameter added to every GET so intermediaries never serve a cached body.
pub const CACHE_BUST_PARAM: &str = "_t";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub download_dir: PathBuf,
}

impl TransportOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            download_dir: PathBuf::from("downloads"),
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout: config.request_timeout(),
            download_dir: config.download_dir.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }
}

/// Parameters, body and extra headers for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Option<Value>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A file to send as multipart form data.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: None,
            bytes,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    download_dir: PathBuf,
    session: Session,
}

impl Transport {
    pub fn new(options: TransportOptions, session: Session) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(options.timeout).build()?;
        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            download_dir: options.download_dir,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T, P>(&self, path: &str, params: Option<&P>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let mut options = RequestOptions::new();
        if let Some(params) = params {
            options = options.with_params(to_json(params)?);
        }
        self.request(Method::GET, path, options).await
    }

    pub async fn post<T, B>(&self, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, with_body(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, with_body(body)?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PATCH, path, with_body(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(Method::DELETE, path, RequestOptions::new()).await
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        self.request_value(method, path, options)
            .await
            .and_then(decode)
    }

    /// Send a request and return the unwrapped payload as JSON.
    pub async fn request_value(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<Value> {
        let outcome = async {
            let mut builder =
                self.prepare(&method, path, options.params.as_ref(), &options.headers)?;
            if let Some(body) = &options.body {
                builder = builder.json(body);
            }
            let (status, body) = self.execute(&method, path, builder).await?;
            interpret_response(status, &body)
        }
        .await;
        outcome.map_err(|err| self.classify(&method, path, err))
    }

    /// Post `file` as multipart form data under `field_name`.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file: UploadFile,
        field_name: &str,
    ) -> ApiResult<T> {
        let method = Method::POST;
        let UploadFile {
            file_name,
            mime,
            bytes,
        } = file;
        let outcome = async {
            let mut part = Part::bytes(bytes).file_name(file_name);
            if let Some(mime) = &mime {
                part = part
                    .mime_str(mime)
                    .map_err(|err| ApiError::network(format!("invalid mime type: {}", err)))?;
            }
            let form = Form::new().part(field_name.to_string(), part);
            let builder = self.prepare(&method, path, None, &[])?.multipart(form);
            let (status, body) = self.execute(&method, path, builder).await?;
            interpret_response(status, &body)
        }
        .await;
        outcome
            .map_err(|err| self.classify(&method, path, err))
            .and_then(decode)
    }

    /// Fetch a binary body and save it as `<download_dir>/<file_name>`.
    pub async fn download(&self, path: &str, file_name: &str) -> ApiResult<()> {
        let method = Method::GET;
        let outcome = async {
            let target = self.download_target(file_name)?;
            let builder = self.prepare(&method, path, None, &[])?;
            let (status, body) = self.execute(&method, path, builder).await?;
            if !(200..300).contains(&status) {
                return Err(http_failure(status, &body));
            }
            tokio::fs::create_dir_all(&self.download_dir)
                .await
                .map_err(|err| ApiError::from_fault(&err))?;
            tokio::fs::write(&target, &body)
                .await
                .map_err(|err| ApiError::from_fault(&err))?;
            tracing::info!(path = %target.display(), bytes = body.len(), "Download saved");
            Ok(())
        }
        .await;
        outcome.map_err(|err| self.classify(&method, path, err))
    }

    fn download_target(&self, file_name: &str) -> ApiResult<PathBuf> {
        Path::new(file_name)
            .file_name()
            .map(|name| self.download_dir.join(name))
            .ok_or_else(|| ApiError::network(format!("invalid download file name: {}", file_name)))
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn prepare(
        &self,
        method: &Method,
        path: &str,
        params: Option<&Value>,
        extra_headers: &[(String, String)],
    ) -> ApiResult<RequestBuilder> {
        let mut query = params.map(query_pairs).unwrap_or_default();
        if *method == Method::GET {
            query.push((
                CACHE_BUST_PARAM.to_string(),
                Utc::now().timestamp_millis().to_string(),
            ));
        }

        tracing::debug!(method = %method, path, params = ?params, "API request");

        let mut builder = self
            .client
            .request(method.clone(), self.url(path))
            .headers(self.headers(extra_headers)?);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        Ok(builder)
    }

    fn headers(&self, extra: &[(String, String)]) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in extra {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| ApiError::network(format!("invalid header {}: {}", name, err)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|err| ApiError::network(format!("invalid header {}: {}", name, err)))?;
            headers.insert(header_name, header_value);
        }
        if let Some(token) = self.session.token() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|err| ApiError::network(format!("invalid auth token: {}", err)))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn execute(
        &self,
        method: &Method,
        path: &str,
        builder: RequestBuilder,
    ) -> ApiResult<(u16, Vec<u8>)> {
        let started = Instant::now();
        let response = builder.send().await.map_err(network_failure)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(network_failure)?;
        tracing::debug!(
            method = %method,
            path,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "API response"
        );
        Ok((status, body.to_vec()))
    }

    /// Apply the side effects of a failure class and hand the error back.
    fn classify(&self, method: &Method, path: &str, err: ApiError) -> ApiError {
        match err.kind() {
            ErrorKind::AuthFailure => {
                self.session.clear_token();
                self.session.emit(ClientEvent::LoginRequired);
                tracing::warn!(method = %method, path, message = %err.message, "Unauthorized, signing out");
            }
            ErrorKind::PermissionFailure => {
                tracing::warn!(method = %method, path, message = %err.message, "Permission denied");
            }
            ErrorKind::NotFound => {
                tracing::warn!(method = %method, path, message = %err.message, "Resource not found");
            }
            ErrorKind::ServerFailure => {
                tracing::error!(method = %method, path, code = err.code, message = %err.message, "Server error");
            }
            ErrorKind::NetworkFailure => {
                tracing::warn!(method = %method, path, message = %err.message, "Network failure");
            }
            ErrorKind::BusinessFailure => {
                tracing::warn!(method = %method, path, code = err.code, message = %err.message, "Business error");
            }
        }
        err
    }
}

fn network_failure(err: reqwest::Error) -> ApiError {
    tracing::debug!(error = %err, timeout = err.is_timeout(), "No response received");
    ApiError::network(NETWORK_ERROR_MESSAGE)
}

fn to_json<V: Serialize + ?Sized>(value: &V) -> ApiResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| ApiError::network(format!("unserializable request: {}", err)))
}

fn with_body<B: Serialize + ?Sized>(body: Option<&B>) -> ApiResult<RequestOptions> {
    let options = RequestOptions::new();
    match body {
        Some(body) => Ok(options.with_body(to_json(body)?)),
        None => Ok(options),
    }
}

/// Flatten a params object into query pairs. Null members are dropped and
/// arrays repeat their key.
pub fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = params else {
        if !params.is_null() {
            tracing::warn!(params = %params, "Ignoring non-object query params");
        }
        return Vec::new();
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    pairs.push((key.clone(), scalar(item)));
                }
            }
            other => pairs.push((key.clone(), scalar(other))),
        }
    }
    pairs
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_skip_nulls() {
        let pairs = query_pairs(&json!({
            "page": 2,
            "pageSize": 20,
            "sort": null,
            "query": "miku",
        }));
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
        assert!(pairs.contains(&("pageSize".to_string(), "20".to_string())));
        assert!(pairs.contains(&("query".to_string(), "miku".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "sort"));
    }

    #[test]
    fn test_query_pairs_repeat_arrays() {
        let pairs = query_pairs(&json!({"genre": ["rock", "jazz"]}));
        assert_eq!(
            pairs,
            vec![
                ("genre".to_string(), "rock".to_string()),
                ("genre".to_string(), "jazz".to_string()),
            ]
        );
    }

    #[test]
    fn test_non_object_params_ignored() {
        assert!(query_pairs(&json!([1, 2])).is_empty());
        assert!(query_pairs(&Value::Null).is_empty());
    }

    #[test]
    fn test_url_joins_base() {
        let transport = Transport::new(
            TransportOptions::new("http://localhost:8080/api/"),
            Session::in_memory(),
        )
        .unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080/api");
        assert_eq!(transport.url("/artists"), "http://localhost:8080/api/artists");
        assert_eq!(transport.url("artists"), "http://localhost:8080/api/artists");
        assert_eq!(transport.url("https://cdn.example/x"), "https://cdn.example/x");
    }

    #[test]
    fn test_download_target_strips_directories() {
        let transport = Transport::new(
            TransportOptions::new("http://localhost").with_download_dir("/tmp/dl"),
            Session::in_memory(),
        )
        .unwrap();
        assert_eq!(
            transport.download_target("../../etc/passwd").unwrap(),
            PathBuf::from("/tmp/dl/passwd")
        );
        assert!(transport.download_target("..").is_err());
    }
}
