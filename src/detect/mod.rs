mod backend;
mod backends;
mod bounds;
mod client;
mod payload;
pub mod request;
pub mod response;
mod result;

pub use backend::InferenceTransport;
pub use backends::{GeminiTransport, RecordedRequest, StubReply, StubTransport};
pub use bounds::BoundsPolicy;
pub use client::DetectionClient;
pub use payload::ImagePayload;
pub use result::{BoundingBox, Detection, DetectionSet, NORMALIZED_MAX};
