use crate::detect::request::GenerateContentRequest;
use crate::error::DetectError;

/// Transport to a structured-generation inference service.
///
/// This is the only seam through which the crate reaches the network, so
/// tests and offline runs swap it for [`StubTransport`].
///
/// Implementations must:
/// - Issue at most one outbound request per `generate` call
/// - Never retry or cache
/// - Never log the credential or the image data
///
/// [`StubTransport`]: crate::detect::StubTransport
pub trait InferenceTransport: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Send one request for `model` and return the model's text output.
    ///
    /// `Ok(None)` means the service answered but produced no text.
    fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<Option<String>, DetectError>;
}

impl<T: InferenceTransport + ?Sized> InferenceTransport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<Option<String>, DetectError> {
        (**self).generate(model, request)
    }
}
