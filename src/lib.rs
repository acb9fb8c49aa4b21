//! Detection workbench
//!
//! Sends an image to a hosted multimodal model, receives labeled bounding
//! boxes on a normalized 0..=1000 grid, and overlays them on the image.
//!
//! # Module Structure
//!
//! - `detect`: request formatting, transports, response validation, the
//!   `Detection` data contract
//! - `overlay`: normalized-box to pixel-frame transform, raster and SVG targets
//! - `workbench`: image / detection lifecycle with stale-result protection
//! - `config`: file + environment configuration
//! - `error`: typed detection failures

pub mod config;
pub mod detect;
pub mod error;
pub mod overlay;
pub mod workbench;

pub use config::WorkbenchConfig;
pub use detect::{
    BoundingBox, BoundsPolicy, Detection, DetectionClient, DetectionSet, ImagePayload,
    InferenceTransport,
};
pub use error::{DetectError, DetectErrorKind, TransportFailure, GENERIC_FAILURE_MESSAGE};
pub use overlay::{render_frames, Color, DisplayGeometry, Frame, PALETTE};
pub use workbench::{Completion, DetectionTicket, Workbench, WorkbenchState};
