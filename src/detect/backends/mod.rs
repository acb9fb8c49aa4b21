pub mod gemini;
pub mod stub;

pub use gemini::GeminiTransport;
pub use stub::{RecordedRequest, StubReply, StubTransport};
