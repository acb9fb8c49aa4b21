//! Workbench state: the current image, its display geometry, and the last
//! detection outcome.
//!
//! Transitions on [`WorkbenchState`] are pure: each takes the old state by
//! value and returns the new one. [`Workbench`] adds the generation counter
//! that drops responses to requests that were superseded while in flight.

use anyhow::{anyhow, Result};

use crate::detect::{Detection, DetectionSet, ImagePayload};
use crate::error::{DetectError, DetectErrorKind};
use crate::overlay::{render_frames, DisplayGeometry, Frame};

/// Identifies one detection request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectionTicket {
    generation: u64,
}

impl DetectionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What happened to a completed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A newer image or request superseded this one; the result was dropped.
    Stale,
}

/// Failure as kept in the workbench after the error itself is consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureInfo {
    pub kind: DetectErrorKind,
    pub message: String,
    pub user_message: &'static str,
}

impl From<&DetectError> for FailureInfo {
    fn from(err: &DetectError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            user_message: err.user_message(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub enum WorkbenchState {
    #[default]
    Idle,
    ImageLoaded {
        image: ImagePayload,
    },
    Detecting {
        image: ImagePayload,
        generation: u64,
        /// Last successful set for this image, kept across a re-run.
        retained: Option<DetectionSet>,
    },
    Detected {
        image: ImagePayload,
        detections: DetectionSet,
    },
    Failed {
        image: ImagePayload,
        failure: FailureInfo,
        retained: Option<DetectionSet>,
    },
}

impl WorkbenchState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkbenchState::Idle => "idle",
            WorkbenchState::ImageLoaded { .. } => "image_loaded",
            WorkbenchState::Detecting { .. } => "detecting",
            WorkbenchState::Detected { .. } => "detected",
            WorkbenchState::Failed { .. } => "failed",
        }
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            WorkbenchState::Idle => None,
            WorkbenchState::ImageLoaded { image }
            | WorkbenchState::Detecting { image, .. }
            | WorkbenchState::Detected { image, .. }
            | WorkbenchState::Failed { image, .. } => Some(image),
        }
    }

    pub fn is_detecting(&self) -> bool {
        matches!(self, WorkbenchState::Detecting { .. })
    }

    /// Detections on display: the current set, or the one retained after a
    /// failed re-run. Nothing while a request is pending.
    pub fn detections(&self) -> Option<&DetectionSet> {
        match self {
            WorkbenchState::Detected { detections, .. } => Some(detections),
            WorkbenchState::Failed { retained, .. } => retained.as_ref(),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureInfo> {
        match self {
            WorkbenchState::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// New image from any state; earlier detections are dropped.
    pub fn load_image(self, image: ImagePayload) -> Self {
        WorkbenchState::ImageLoaded { image }
    }

    /// Start a request tagged `generation`. A pending request is superseded.
    pub fn begin_detection(self, generation: u64) -> Result<Self, Self> {
        match self {
            WorkbenchState::Idle => Err(WorkbenchState::Idle),
            WorkbenchState::ImageLoaded { image } => Ok(WorkbenchState::Detecting {
                image,
                generation,
                retained: None,
            }),
            WorkbenchState::Detecting {
                image, retained, ..
            } => Ok(WorkbenchState::Detecting {
                image,
                generation,
                retained,
            }),
            WorkbenchState::Detected { image, detections } => Ok(WorkbenchState::Detecting {
                image,
                generation,
                retained: Some(detections),
            }),
            WorkbenchState::Failed {
                image, retained, ..
            } => Ok(WorkbenchState::Detecting {
                image,
                generation,
                retained,
            }),
        }
    }

    /// Apply a result for `generation`. Returns the state unchanged and
    /// `Stale` unless that generation is the one pending.
    pub fn complete(
        self,
        generation: u64,
        outcome: Result<DetectionSet, DetectError>,
    ) -> (Self, Completion) {
        match self {
            WorkbenchState::Detecting {
                image,
                generation: pending,
                retained,
            } if pending == generation => {
                let next = match outcome {
                    Ok(detections) => WorkbenchState::Detected { image, detections },
                    Err(err) => WorkbenchState::Failed {
                        image,
                        failure: FailureInfo::from(&err),
                        retained,
                    },
                };
                (next, Completion::Applied)
            }
            other => (other, Completion::Stale),
        }
    }

    pub fn reset(self) -> Self {
        WorkbenchState::Idle
    }
}

/// Owns the workbench state, the display geometry, and request generations.
#[derive(Debug, Default)]
pub struct Workbench {
    state: WorkbenchState,
    geometry: DisplayGeometry,
    generation: u64,
}

impl Workbench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkbenchState {
        &self.state
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    /// Called by the presentation layer whenever the image is laid out again.
    pub fn set_geometry(&mut self, geometry: DisplayGeometry) {
        self.geometry = geometry;
    }

    pub fn load_image(&mut self, image: ImagePayload) {
        // any pending request now belongs to the previous image
        self.generation += 1;
        log::debug!("image loaded ({:?}); generation {}", image, self.generation);
        self.state = std::mem::take(&mut self.state).load_image(image);
    }

    pub fn begin_detection(&mut self) -> Result<DetectionTicket> {
        let generation = self.generation + 1;
        match std::mem::take(&mut self.state).begin_detection(generation) {
            Ok(next) => {
                self.generation = generation;
                self.state = next;
                Ok(DetectionTicket { generation })
            }
            Err(unchanged) => {
                self.state = unchanged;
                Err(anyhow!("no image loaded"))
            }
        }
    }

    pub fn complete(
        &mut self,
        ticket: DetectionTicket,
        outcome: Result<DetectionSet, DetectError>,
    ) -> Completion {
        let (next, completion) =
            std::mem::take(&mut self.state).complete(ticket.generation, outcome);
        self.state = next;
        if completion == Completion::Stale {
            log::info!(
                "discarding result for superseded request (generation {})",
                ticket.generation
            );
        }
        completion
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = std::mem::take(&mut self.state).reset();
    }

    /// Overlay frames for the detections on display.
    pub fn frames(&self) -> Vec<Frame> {
        match self.state.detections() {
            Some(detections) => render_frames(detections.as_slice(), self.geometry),
            None => Vec::new(),
        }
    }

    /// Detections on display in listing order.
    pub fn listing(&self) -> Vec<&Detection> {
        self.state
            .detections()
            .map(DetectionSet::sorted_by_confidence)
            .unwrap_or_default()
    }

    /// Indented JSON of the detections on display, if any.
    pub fn export_json(&self) -> Result<Option<String>> {
        self.state
            .detections()
            .map(DetectionSet::to_export_json)
            .transpose()
    }
}
