use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use super::{HttpRequest, HttpResponse, HttpSession};
use crate::error::{Error, Result};

/// Connection settings for [`ReqwestSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Verify the server certificate. Backup servers commonly run with
    /// self-signed certificates, so this is off unless configured.
    pub verify_tls: bool,
    /// Applied to every request; expiry surfaces as [`Error::Timeout`].
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            verify_tls: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`HttpSession`] backed by a `reqwest::Client` with a cookie store.
pub struct ReqwestSession {
    base_url: String,
    client: reqwest::Client,
    headers: HeaderMap,
}

impl ReqwestSession {
    pub fn new(base_url: &str, options: &SessionOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!options.verify_tls)
            .cookie_store(true)
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            headers: HeaderMap::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(err: reqwest::Error, path: &str) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                path: path.to_string(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

#[async_trait]
impl HttpSession for ReqwestSession {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, path = %request.path, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(self.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(creds) = &request.basic_auth {
            builder = builder.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify(e, &request.path))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::classify(e, &request.path))?;

        debug!(path = %request.path, status, bytes = bytes.len(), "Received response");

        Ok(HttpResponse {
            status,
            headers,
            body: HttpResponse::decode_body(&bytes),
        })
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidInput(format!("header value for {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}
