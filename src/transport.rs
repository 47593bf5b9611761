use crate::{EngineError, Result};
use std::io::Read;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; BlogImageDownloader)";
const MAX_PAGE_HTML_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    /// `Content-Type` as sent, `None` when the server sent none.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Fetches raw bytes for a URL.
///
/// A non-success status is a normal response (`ok == false`); `Err` is reserved for
/// failures where no response arrived at all.
pub trait Transport {
    fn fetch_binary(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch_binary(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchResponse> {
        (**self).fetch_binary(url, headers)
    }
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let mut config = ureq::Agent::config_builder();
        config = config
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .user_agent(user_agent);
        let agent: ureq::Agent = config.build().into();
        Self { agent }
    }

    /// Downloads the HTML of `url` for discovery.
    pub fn fetch_document(&self, url: &Url) -> Result<String> {
        let mut response = self
            .agent
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml")
            .call()
            .map_err(|err| EngineError::Transport {
                url: redact_url_for_log(url.as_str()),
                message: err.to_string(),
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(EngineError::PageStatus {
                url: redact_url_for_log(url.as_str()),
                status,
            });
        }

        let content_type = header_string(&response, "content-type");
        if !is_html_content_type(&content_type) {
            return Err(EngineError::NotHtml {
                url: redact_url_for_log(url.as_str()),
                content_type,
            });
        }

        let mut html_buf = Vec::new();
        response
            .body_mut()
            .as_reader()
            .take(MAX_PAGE_HTML_BYTES)
            .read_to_end(&mut html_buf)?;
        Ok(String::from_utf8_lossy(&html_buf).into_owned())
    }
}

impl Transport for UreqTransport {
    fn fetch_binary(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchResponse> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let mut response = request.call().map_err(|err| EngineError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status();
        let content_type = Some(header_string(&response, "content-type")).filter(|v| !v.is_empty());
        let ok = status.is_success();

        let mut bytes = Vec::new();
        if ok {
            response
                .body_mut()
                .as_reader()
                .read_to_end(&mut bytes)
                .map_err(|err| EngineError::Transport {
                    url: url.to_string(),
                    message: format!("failed reading body: {err}"),
                })?;
        }
        debug!(url, status = status.as_u16(), bytes = bytes.len(), "fetch_binary_done");

        Ok(FetchResponse {
            ok,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            content_type,
            bytes,
        })
    }
}

fn header_string(response: &ureq::http::Response<ureq::Body>, key: &str) -> String {
    response
        .headers()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn is_html_content_type(content_type: &str) -> bool {
    if content_type.is_empty() {
        return true;
    }
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

pub fn redact_url_for_log(value: &str) -> String {
    match Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}
