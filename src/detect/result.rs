use std::cmp::Ordering;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Upper bound of the normalized coordinate grid.
pub const NORMALIZED_MAX: i32 = 1000;

/// Bounding box on the 0..=1000 grid, independent of the image's pixel size.
///
/// Serialized as `[ymin, xmin, ymax, xmax]`. A box with `min > max` on either
/// axis is representable; consumers treat its extent as zero or negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub ymin: i32,
    pub xmin: i32,
    pub ymax: i32,
    pub xmax: i32,
}

impl BoundingBox {
    pub fn new(ymin: i32, xmin: i32, ymax: i32, xmax: i32) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
        }
    }

    /// Normalized width; negative for an inverted box.
    pub fn width(&self) -> i32 {
        self.xmax - self.xmin
    }

    /// Normalized height; negative for an inverted box.
    pub fn height(&self) -> i32 {
        self.ymax - self.ymin
    }

    pub fn is_well_formed(&self) -> bool {
        self.ymin <= self.ymax && self.xmin <= self.xmax
    }

    pub fn in_bounds(&self) -> bool {
        [self.ymin, self.xmin, self.ymax, self.xmax]
            .iter()
            .all(|v| (0..=NORMALIZED_MAX).contains(v))
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(raw: [i32; 4]) -> Self {
        let [ymin, xmin, ymax, xmax] = raw;
        Self::new(ymin, xmin, ymax, xmax)
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.ymin, bbox.xmin, bbox.ymax, bbox.xmax]
    }
}

/// One recognized object instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Free-text category name chosen by the model.
    pub label: String,
    /// Confidence in 0.0..=1.0.
    pub confidence: f64,
    #[serde(rename = "box_2d")]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Confidence as a whole percentage, rounded half toward positive infinity.
    pub fn confidence_percent(&self) -> i64 {
        (self.confidence * 100.0 + 0.5).floor() as i64
    }
}

/// Ordered detections from one inference call.
///
/// Serialized as a bare JSON array, which is also the export format.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    pub fn into_vec(self) -> Vec<Detection> {
        self.detections
    }

    /// Listing order: descending confidence, ties keep their original order.
    ///
    /// NaN confidences sort after every number. The set itself is not reordered.
    pub fn sorted_by_confidence(&self) -> Vec<&Detection> {
        let mut sorted: Vec<&Detection> = self.detections.iter().collect();
        sorted.sort_by(|a, b| compare_confidence_desc(a.confidence, b.confidence));
        sorted
    }

    /// Indented JSON export of the set, field for field.
    pub fn to_export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| anyhow!("export serialization failed: {}", e))
    }

    pub fn from_export_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| anyhow!("invalid detection export: {}", e))
    }
}

impl From<Vec<Detection>> for DetectionSet {
    fn from(detections: Vec<Detection>) -> Self {
        Self::new(detections)
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

fn compare_confidence_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f64) -> Detection {
        Detection::new(label, confidence, BoundingBox::new(0, 0, 10, 10))
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let set = DetectionSet::new(vec![det("a", 0.5), det("b", 0.5), det("c", 0.9)]);
        let labels: Vec<&str> = set
            .sorted_by_confidence()
            .iter()
            .map(|d| d.label.as_str())
            .collect();
        assert_eq!(labels, vec!["c", "a", "b"]);
        // original order untouched
        assert_eq!(set.as_slice()[0].label, "a");
    }

    #[test]
    fn nan_confidence_sorts_last() {
        let set = DetectionSet::new(vec![det("nan", f64::NAN), det("low", 0.1), det("high", 0.7)]);
        let labels: Vec<&str> = set
            .sorted_by_confidence()
            .iter()
            .map(|d| d.label.as_str())
            .collect();
        assert_eq!(labels, vec!["high", "low", "nan"]);
    }

    #[test]
    fn box_serializes_as_ordered_array() {
        let d = Detection::new("cup", 0.875, BoundingBox::new(1, 2, 3, 4));
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["box_2d"], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(json["label"], "cup");
    }

    #[test]
    fn export_round_trips() {
        let set = DetectionSet::new(vec![
            Detection::new("dog", 0.91, BoundingBox::new(100, 200, 600, 700)),
            Detection::new("dog", 0.42, BoundingBox::new(900, 900, 100, 100)),
        ]);
        let json = set.to_export_json().unwrap();
        assert!(json.contains('\n'));
        let parsed = DetectionSet::from_export_json(&json).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn inverted_box_reports_negative_extent() {
        let bbox = BoundingBox::new(800, 600, 200, 100);
        assert!(!bbox.is_well_formed());
        assert_eq!(bbox.width(), -500);
        assert_eq!(bbox.height(), -600);
    }

    #[test]
    fn confidence_percent_rounds_half_up() {
        assert_eq!(det("x", 0.875).confidence_percent(), 88);
        assert_eq!(det("x", 0.874).confidence_percent(), 87);
        assert_eq!(det("x", 1.0).confidence_percent(), 100);
        // ties on negative values go up, not away from zero
        assert_eq!(det("x", -0.125).confidence_percent(), -12);
        assert_eq!(det("x", -0.005).confidence_percent(), 0);
    }
}
