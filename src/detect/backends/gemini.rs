//! HTTPS transport for the hosted Gemini `generateContent` endpoint.
//!
//! One blocking POST per call. Status codes are mapped to
//! [`TransportFailure`] kinds; the response envelope is unwrapped to the
//! model's text here so the client only sees detection JSON.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::detect::backend::InferenceTransport;
use crate::detect::request::GenerateContentRequest;
use crate::detect::response::GenerateContentResponse;
use crate::error::{DetectError, TransportFailure};

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_MESSAGE_CHARS: usize = 300;

pub struct GeminiTransport {
    agent: ureq::Agent,
    endpoint: Url,
    api_key: Option<Zeroizing<String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl GeminiTransport {
    pub fn new(endpoint: &str, api_key: Option<Zeroizing<String>>, timeout: Duration) -> Result<Self> {
        let mut endpoint = Url::parse(endpoint).context("parse inference endpoint")?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported endpoint scheme '{}'; expected http(s)",
                endpoint.scheme()
            ));
        }
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        Ok(Self {
            agent,
            endpoint,
            api_key,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// `{endpoint}/v1beta/models/{model}:generateContent`
    pub fn url_for(&self, model: &str) -> Result<Url, DetectError> {
        self.endpoint
            .join(&format!("v1beta/models/{}:generateContent", model))
            .map_err(|e| {
                DetectError::transport(
                    TransportFailure::Network,
                    format!("invalid request url for model '{}': {}", model, e),
                )
            })
    }
}

impl InferenceTransport for GeminiTransport {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<Option<String>, DetectError> {
        let Some(api_key) = self.api_key.as_ref() else {
            return Err(DetectError::transport(
                TransportFailure::Unauthenticated,
                "no API key configured (set GEMINI_API_KEY or API_KEY)",
            ));
        };
        let url = self.url_for(model)?;
        let body = serde_json::to_string(request).map_err(|e| {
            DetectError::transport(TransportFailure::Network, format!("encode request: {}", e))
        })?;
        log::debug!("POST {} ({} byte body)", url, body.len());

        let response = self
            .agent
            .post(url.as_str())
            .set(API_KEY_HEADER, api_key.as_str())
            .set("Content-Type", "application/json")
            .send_string(&body);

        match response {
            Ok(response) => {
                let body = response.into_string().map_err(|e| {
                    DetectError::transport(
                        TransportFailure::Network,
                        format!("read response body: {}", e),
                    )
                })?;
                let envelope = GenerateContentResponse::from_body(&body)?;
                let text = envelope.text();
                if text.is_none() {
                    match envelope.block_reason() {
                        Some(reason) => log::warn!("inference service blocked prompt: {}", reason),
                        None => log::warn!("inference service returned no candidate text"),
                    }
                }
                Ok(text)
            }
            Err(ureq::Error::Status(code, response)) => {
                let detail = response
                    .into_string()
                    .ok()
                    .map(|body| error_detail(&body))
                    .unwrap_or_default();
                Err(DetectError::transport(
                    failure_for_status(code),
                    format!("service answered {}{}", code, detail),
                ))
            }
            Err(ureq::Error::Transport(transport)) => Err(DetectError::transport(
                TransportFailure::Network,
                transport.to_string(),
            )),
        }
    }
}

pub(crate) fn failure_for_status(code: u16) -> TransportFailure {
    match code {
        401 | 403 => TransportFailure::Unauthenticated,
        429 => TransportFailure::RateLimited,
        other => TransportFailure::HttpStatus(other),
    }
}

fn error_detail(body: &str) -> String {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.status, envelope.error.message) {
            (Some(status), Some(message)) => format!("{}: {}", status, message),
            (None, Some(message)) => message,
            (Some(status), None) => status,
            (None, None) => return String::new(),
        },
        Err(_) => body.trim().to_string(),
    };
    if message.is_empty() {
        return String::new();
    }
    let truncated: String = message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
    format!(": {}", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(endpoint: &str) -> GeminiTransport {
        GeminiTransport::new(
            endpoint,
            Some(Zeroizing::new("k".to_string())),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn builds_model_url_under_endpoint_path() {
        let url = transport("https://generativelanguage.googleapis.com")
            .url_for("gemini-3-flash-preview")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-flash-preview:generateContent"
        );

        let url = transport("http://127.0.0.1:9000/proxy").url_for("m").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/proxy/v1beta/models/m:generateContent"
        );
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(GeminiTransport::new("ftp://host", None, Duration::from_secs(1)).is_err());
        assert!(GeminiTransport::new("not a url", None, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let t = GeminiTransport::new(
            "https://example.invalid",
            Some(Zeroizing::new("  ".to_string())),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(!t.has_api_key());
    }

    #[test]
    fn maps_status_codes() {
        assert_eq!(failure_for_status(401), TransportFailure::Unauthenticated);
        assert_eq!(failure_for_status(403), TransportFailure::Unauthenticated);
        assert_eq!(failure_for_status(429), TransportFailure::RateLimited);
        assert_eq!(failure_for_status(500), TransportFailure::HttpStatus(500));
    }

    #[test]
    fn error_detail_prefers_service_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_detail(body), ": INVALID_ARGUMENT: API key not valid.");
        assert_eq!(error_detail(""), "");
        assert_eq!(error_detail(&"x".repeat(1000)).len(), 2 + MAX_ERROR_MESSAGE_CHARS);
    }
}
