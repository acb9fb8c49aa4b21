use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::Deserialize;

use crate::detect::result::{BoundingBox, Detection, NORMALIZED_MAX};
use crate::error::DetectError;

const UNLABELED: &str = "unlabeled";

/// How the client treats values the response schema cannot constrain.
///
/// The remote schema fixes the response shape but not its ranges, so a
/// response can carry confidences above 1 or coordinates past 1000.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    /// Pass values through; coordinates are only rounded to integers.
    Trust,
    /// Clamp confidence to 0..=1 and coordinates to 0..=1000.
    #[default]
    Clamp,
    /// Fail the whole call on the first out-of-range value.
    Reject,
}

impl BoundsPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundsPolicy::Trust => "trust",
            BoundsPolicy::Clamp => "clamp",
            BoundsPolicy::Reject => "reject",
        }
    }
}

impl fmt::Display for BoundsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundsPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "trust" => Ok(BoundsPolicy::Trust),
            "clamp" => Ok(BoundsPolicy::Clamp),
            "reject" => Ok(BoundsPolicy::Reject),
            other => Err(anyhow!(
                "unknown bounds policy '{}'; expected trust, clamp or reject",
                other
            )),
        }
    }
}

/// A detection as the model emitted it, before range checks.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDetection {
    pub label: String,
    pub confidence: f64,
    pub box_2d: Vec<f64>,
}

impl RawDetection {
    pub(crate) fn into_detection(
        self,
        index: usize,
        policy: BoundsPolicy,
    ) -> Result<Detection, DetectError> {
        let coords: [f64; 4] = self.box_2d.as_slice().try_into().map_err(|_| {
            DetectError::malformed(format!(
                "detection {}: box_2d has {} values, expected 4",
                index,
                self.box_2d.len()
            ))
        })?;

        match policy {
            BoundsPolicy::Trust => {
                let [ymin, xmin, ymax, xmax] = coords.map(|v| v.round() as i32);
                Ok(Detection::new(
                    self.label,
                    self.confidence,
                    BoundingBox::new(ymin, xmin, ymax, xmax),
                ))
            }
            BoundsPolicy::Clamp => {
                let [ymin, xmin, ymax, xmax] = coords.map(clamp_coordinate);
                let confidence = if self.confidence.is_nan() {
                    0.0
                } else {
                    self.confidence.clamp(0.0, 1.0)
                };
                let label = self.label.trim();
                let label = if label.is_empty() { UNLABELED } else { label };
                Ok(Detection::new(
                    label,
                    confidence,
                    BoundingBox::new(ymin, xmin, ymax, xmax),
                ))
            }
            BoundsPolicy::Reject => {
                if self.label.trim().is_empty() {
                    return Err(DetectError::malformed(format!(
                        "detection {}: empty label",
                        index
                    )));
                }
                if !(0.0..=1.0).contains(&self.confidence) {
                    return Err(DetectError::malformed(format!(
                        "detection {}: confidence {} outside 0..=1",
                        index, self.confidence
                    )));
                }
                let max = f64::from(NORMALIZED_MAX);
                if let Some(bad) = coords.iter().find(|v| !(0.0..=max).contains(*v)) {
                    return Err(DetectError::malformed(format!(
                        "detection {}: coordinate {} outside 0..={}",
                        index, bad, NORMALIZED_MAX
                    )));
                }
                let [ymin, xmin, ymax, xmax] = coords.map(|v| v.round() as i32);
                Ok(Detection::new(
                    self.label,
                    self.confidence,
                    BoundingBox::new(ymin, xmin, ymax, xmax),
                ))
            }
        }
    }
}

fn clamp_coordinate(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, f64::from(NORMALIZED_MAX)) as i32
}
