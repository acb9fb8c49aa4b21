use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use crate::detect::backend::InferenceTransport;
use crate::detect::request::GenerateContentRequest;
use crate::error::{DetectError, TransportFailure};

/// What the stub answers to every request.
#[derive(Clone, Debug)]
pub enum StubReply {
    Text(String),
    NoContent,
    Fail(TransportFailure),
}

/// A request the stub received, minus the image data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub model: String,
    pub mime_type: Option<String>,
    pub image_len: usize,
    pub body: serde_json::Value,
}

/// How many recent requests the stub keeps.
pub const MAX_RECORDED: usize = 16;

#[derive(Default)]
struct CallLog {
    calls: usize,
    recent: VecDeque<RecordedRequest>,
}

/// Offline transport for tests and demos. Never touches the network.
///
/// Counts every call but only keeps the last [`MAX_RECORDED`] requests.
pub struct StubTransport {
    reply: StubReply,
    log: Mutex<CallLog>,
}

impl StubTransport {
    pub fn new(reply: StubReply) -> Self {
        Self {
            reply,
            log: Mutex::new(CallLog::default()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(StubReply::Text(text.into()))
    }

    /// Answer with the contents of a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read stub response {}: {}", path.display(), e))?;
        Ok(Self::text(text))
    }

    /// Most recent requests, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log().recent.iter().cloned().collect()
    }

    pub fn call_count(&self) -> usize {
        self.log().calls
    }

    fn log(&self) -> MutexGuard<'_, CallLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl InferenceTransport for StubTransport {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<Option<String>, DetectError> {
        let image = request.image();
        let recorded = RecordedRequest {
            model: model.to_string(),
            mime_type: image.map(|inline| inline.mime_type.clone()),
            image_len: image.map(|inline| inline.data.len()).unwrap_or(0),
            body: serde_json::to_value(request).unwrap_or(serde_json::Value::Null),
        };
        {
            let mut log = self.log();
            log.calls += 1;
            if log.recent.len() == MAX_RECORDED {
                log.recent.pop_front();
            }
            log.recent.push_back(recorded);
        }

        match &self.reply {
            StubReply::Text(text) => Ok(Some(text.clone())),
            StubReply::NoContent => Ok(None),
            StubReply::Fail(kind) => Err(DetectError::transport(*kind, "stub transport failure")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ImagePayload;

    #[test]
    fn keeps_only_recent_requests() {
        let stub = StubTransport::text("[]");
        let payload = ImagePayload::from_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        let request = GenerateContentRequest::for_detection(&payload);
        for i in 0..MAX_RECORDED + 5 {
            stub.generate(&format!("model-{}", i), &request).unwrap();
        }

        assert_eq!(stub.call_count(), MAX_RECORDED + 5);
        let requests = stub.requests();
        assert_eq!(requests.len(), MAX_RECORDED);
        assert_eq!(requests[0].model, "model-5");
        assert_eq!(
            requests[MAX_RECORDED - 1].model,
            format!("model-{}", MAX_RECORDED + 4)
        );
    }
}
