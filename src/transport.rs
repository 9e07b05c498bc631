use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::path::PathBuf;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// One remote call. Built by platform adapters, executed by a [`Transport`].
#[derive(Debug, Default)]
pub struct TransportRequest {
    pub method: Option<Method>,
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Form-encoded body (Tapd and Zentao write endpoints).
    pub form: Vec<(String, String)>,
    /// JSON body (Jira write endpoints).
    pub body: Option<Value>,
    /// Multipart file upload, sent as the `file` part.
    pub upload: Option<PathBuf>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::with_method(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::with_method(Method::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::with_method(Method::Delete, url)
    }

    fn with_method(method: Method, url: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn upload(mut self, path: impl Into<PathBuf>) -> Self {
        self.upload = Some(path.into());
        self
    }
}

/// Narrow HTTP capability consumed by every platform adapter. Already
/// authenticated; retries and timeouts are its responsibility, not the
/// engine's. Calls either succeed with a JSON body or fail with a typed
/// error; a remote 404 surfaces as [`Error::NotFound`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, req: TransportRequest) -> Result<Value>;
}

/// Authorization header applied to every outgoing request.
#[derive(Debug, Clone)]
enum AuthHeader {
    Basic(String),
    Bearer(String),
}

impl AuthHeader {
    fn from_config(auth: &AuthConfig) -> Self {
        match auth {
            AuthConfig::Basic { account, password } | AuthConfig::Session { account, password } => {
                let creds = format!("{account}:{password}");
                let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
                AuthHeader::Basic(format!("Basic {encoded}"))
            }
            AuthConfig::Token { token } => AuthHeader::Bearer(format!("Bearer {token}")),
        }
    }

    fn value(&self) -> &str {
        match self {
            AuthHeader::Basic(v) | AuthHeader::Bearer(v) => v,
        }
    }
}

/// Production transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    auth: AuthHeader,
}

impl HttpTransport {
    pub fn new(auth: &AuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth: AuthHeader::from_config(auth),
        }
    }

    pub fn basic(account: &str, password: &str) -> Self {
        Self::new(&AuthConfig::Basic {
            account: account.to_string(),
            password: password.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, req: TransportRequest) -> Result<Value> {
        let method = req.method.unwrap_or(Method::Get);
        let mut builder = match method {
            Method::Get => self.client.get(&req.url),
            Method::Post => self.client.post(&req.url),
            Method::Put => self.client.put(&req.url),
            Method::Delete => self.client.delete(&req.url),
        };
        builder = builder
            .header("Authorization", self.auth.value())
            .header("Accept", "application/json");
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        } else if let Some(path) = &req.upload {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| Error::Transport(format!("failed to read {}: {e}", path.display())))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
            builder = builder
                .multipart(reqwest::multipart::Form::new().part("file", part))
                // Jira refuses attachment posts without the XSRF opt-out.
                .header("X-Atlassian-Token", "no-check");
        } else if !req.form.is_empty() {
            builder = builder.form(&req.form);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(Error::NotFound(req.url));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("{} returned {status}: {body}", req.url)));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::Transport(format!("{} returned malformed JSON: {e}", req.url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_matches_rfc_encoding() {
        let auth = AuthHeader::from_config(&AuthConfig::Basic {
            account: "bot".into(),
            password: "secret".into(),
        });
        assert_eq!(auth.value(), "Basic Ym90OnNlY3JldA==");
    }

    #[test]
    fn request_builder_accumulates_query_and_form() {
        let req = TransportRequest::post("https://t/api")
            .query("page", "1")
            .form("title", "crash on save");
        assert_eq!(req.method, Some(Method::Post));
        assert_eq!(req.query, vec![("page".to_string(), "1".to_string())]);
        assert_eq!(req.form.len(), 1);
    }
}
