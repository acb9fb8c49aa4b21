use serde::Deserialize;

use crate::detect::bounds::{BoundsPolicy, RawDetection};
use crate::detect::result::DetectionSet;
use crate::error::DetectError;

/// Envelope returned by `generateContent`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    pub fn from_body(body: &str) -> Result<Self, DetectError> {
        serde_json::from_str(body)
            .map_err(|e| DetectError::malformed(format!("response envelope: {}", e)))
    }

    /// Text parts of the first candidate, concatenated. `None` when the
    /// service produced no text at all.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
    }
}

/// Parse the model's JSON text into a detection set.
///
/// All or nothing: one bad element fails the whole set.
pub fn parse_detections(text: &str, policy: BoundsPolicy) -> Result<DetectionSet, DetectError> {
    if text.trim().is_empty() {
        return Err(DetectError::EmptyResponse);
    }
    let raw: Vec<RawDetection> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| DetectError::malformed(e.to_string()))?;
    let detections = raw
        .into_iter()
        .enumerate()
        .map(|(index, item)| item.into_detection(index, policy))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DetectionSet::new(detections))
}

// Models occasionally wrap JSON output in a ```json fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;
    use crate::error::DetectErrorKind;

    #[test]
    fn concatenates_text_parts_of_first_candidate() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "[{\"label\":"}, {"text": "\"a\"}]"}]}, "finishReason": "STOP"},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }"#;
        let response = GenerateContentResponse::from_body(body).unwrap();
        assert_eq!(response.text().as_deref(), Some(r#"[{"label":"a"}]"#));
    }

    #[test]
    fn missing_candidates_means_no_text() {
        let response =
            GenerateContentResponse::from_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
                .unwrap();
        assert_eq!(response.text(), None);
        assert_eq!(response.block_reason(), Some("SAFETY"));

        let response =
            GenerateContentResponse::from_body(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#)
                .unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn envelope_that_is_not_json_is_malformed() {
        let err = GenerateContentResponse::from_body("<html>").unwrap_err();
        assert_eq!(err.kind(), DetectErrorKind::MalformedResponse);
    }

    #[test]
    fn parses_detection_array() {
        let text = r#"[
            {"label": "dog", "confidence": 0.93, "box_2d": [120, 40, 880, 610]},
            {"label": "ball", "confidence": 0.61, "box_2d": [700, 650, 820, 760]}
        ]"#;
        let set = parse_detections(text, BoundsPolicy::Clamp).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice()[0].bbox, BoundingBox::new(120, 40, 880, 610));
        assert_eq!(set.as_slice()[1].label, "ball");
    }

    #[test]
    fn empty_array_is_a_valid_empty_set() {
        let set = parse_detections("[]", BoundsPolicy::Reject).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn non_json_text_is_malformed() {
        let err = parse_detections("I see a dog.", BoundsPolicy::Clamp).unwrap_err();
        assert_eq!(err.kind(), DetectErrorKind::MalformedResponse);
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = parse_detections(r#"[{"label":"dog","box_2d":[0,0,1,1]}]"#, BoundsPolicy::Trust)
            .unwrap_err();
        assert_eq!(err.kind(), DetectErrorKind::MalformedResponse);
    }

    #[test]
    fn blank_text_is_empty_response() {
        let err = parse_detections(" \n", BoundsPolicy::Clamp).unwrap_err();
        assert_eq!(err.kind(), DetectErrorKind::EmptyResponse);
    }

    #[test]
    fn tolerates_code_fence() {
        let text = "```json\n[{\"label\":\"cup\",\"confidence\":0.5,\"box_2d\":[1,2,3,4]}]\n```";
        let set = parse_detections(text, BoundsPolicy::Clamp).unwrap();
        assert_eq!(set.as_slice()[0].label, "cup");
    }
}
