use anyhow::Result;

use crate::config::WorkbenchConfig;
use crate::detect::backend::InferenceTransport;
use crate::detect::backends::GeminiTransport;
use crate::detect::bounds::BoundsPolicy;
use crate::detect::payload::ImagePayload;
use crate::detect::request::GenerateContentRequest;
use crate::detect::response::parse_detections;
use crate::detect::result::DetectionSet;
use crate::error::DetectError;

/// Turns an image into a validated [`DetectionSet`] by asking a remote model.
///
/// Stateless: every `detect` call is independent, issues one request through
/// the transport, and never retries.
pub struct DetectionClient<T = Box<dyn InferenceTransport>> {
    transport: T,
    model: String,
    bounds_policy: BoundsPolicy,
}

impl DetectionClient {
    /// Client over the HTTPS transport, configured from `cfg`.
    pub fn from_config(cfg: &WorkbenchConfig) -> Result<Self> {
        let transport = GeminiTransport::new(&cfg.endpoint, cfg.api_key.clone(), cfg.timeout)?;
        if !transport.has_api_key() {
            log::warn!("no API key configured; detection calls will fail until one is set");
        }
        Ok(DetectionClient::new(Box::new(transport) as Box<dyn InferenceTransport>, &cfg.model)
            .with_bounds_policy(cfg.bounds_policy))
    }
}

impl<T: InferenceTransport> DetectionClient<T> {
    pub fn new(transport: T, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
            bounds_policy: BoundsPolicy::default(),
        }
    }

    pub fn with_bounds_policy(mut self, policy: BoundsPolicy) -> Self {
        self.bounds_policy = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn bounds_policy(&self) -> BoundsPolicy {
        self.bounds_policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run detection on one image.
    pub fn detect(&self, image: &ImagePayload) -> Result<DetectionSet, DetectError> {
        let request = GenerateContentRequest::for_detection(image);
        log::info!(
            "requesting detections from {} via {} ({}, {} encoded bytes)",
            self.model,
            self.transport.name(),
            image.mime_type(),
            image.encoded_len()
        );

        let outcome = self
            .transport
            .generate(&self.model, &request)
            .and_then(|text| text.ok_or(DetectError::EmptyResponse))
            .and_then(|text| parse_detections(&text, self.bounds_policy));

        match &outcome {
            Ok(set) => log::info!("received {} detections", set.len()),
            Err(err) => log::error!("detection failed: {}", err),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{StubReply, StubTransport};
    use crate::error::{DetectErrorKind, TransportFailure};

    fn image() -> ImagePayload {
        ImagePayload::from_data_uri("data:image/png;base64,aGVsbG8=").unwrap()
    }

    #[test]
    fn one_request_per_call() {
        let client = DetectionClient::new(StubTransport::text("[]"), "m");
        client.detect(&image()).unwrap();
        client.detect(&image()).unwrap();
        assert_eq!(client.transport().call_count(), 2);
    }

    #[test]
    fn no_content_is_empty_response() {
        let client = DetectionClient::new(StubTransport::new(StubReply::NoContent), "m");
        let err = client.detect(&image()).unwrap_err();
        assert_eq!(err.kind(), DetectErrorKind::EmptyResponse);
    }

    #[test]
    fn transport_failure_propagates() {
        let client = DetectionClient::new(
            StubTransport::new(StubReply::Fail(TransportFailure::RateLimited)),
            "m",
        );
        match client.detect(&image()).unwrap_err() {
            DetectError::Transport { kind, .. } => assert_eq!(kind, TransportFailure::RateLimited),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn applies_configured_bounds_policy() {
        let text = r#"[{"label":"cup","confidence":1.7,"box_2d":[0,0,10,10]}]"#;
        let clamped = DetectionClient::new(StubTransport::text(text), "m")
            .detect(&image())
            .unwrap();
        assert_eq!(clamped.as_slice()[0].confidence, 1.0);

        let rejected = DetectionClient::new(StubTransport::text(text), "m")
            .with_bounds_policy(BoundsPolicy::Reject)
            .detect(&image())
            .unwrap_err();
        assert_eq!(rejected.kind(), DetectErrorKind::MalformedResponse);
    }
}
