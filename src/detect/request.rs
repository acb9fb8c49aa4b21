//! Structured-generation request sent to the inference service.
//!
//! The response schema is the only thing constraining the shape of what
//! comes back; ranges are checked afterwards by [`BoundsPolicy`].
//!
//! [`BoundsPolicy`]: crate::detect::BoundsPolicy

use serde::Serialize;
use serde_json::{json, Value};

use crate::detect::payload::ImagePayload;

pub const DETECTION_PROMPT: &str = "Detect all significant objects in this image. \
For each object, provide a label, a confidence score between 0 and 1, and its bounding box. \
The bounding box should be provided in [ymin, xmin, ymax, xmax] format, where coordinates \
are normalized integers from 0 to 1000. Respond strictly with the specified JSON structure.";

pub const RESPONSE_MIME_TYPE: &str = "application/json";

/// Array of `{label, confidence, box_2d}` objects, all three required.
pub fn detection_response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "label": {
                    "type": "STRING",
                    "description": "The name of the detected object."
                },
                "confidence": {
                    "type": "NUMBER",
                    "description": "Confidence score (0.0 to 1.0)."
                },
                "box_2d": {
                    "type": "ARRAY",
                    "items": { "type": "INTEGER" },
                    "description": "[ymin, xmin, ymax, xmax] coordinates normalized to 0-1000."
                }
            },
            "required": ["label", "confidence", "box_2d"]
        }
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

impl GenerateContentRequest {
    /// Instruction text followed by the inline image, with the detection schema.
    pub fn for_detection(image: &ImagePayload) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: DETECTION_PROMPT.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type().to_string(),
                            data: image.data().to_string(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: RESPONSE_MIME_TYPE.to_string(),
                response_schema: detection_response_schema(),
            },
        }
    }

    pub fn image(&self) -> Option<&InlineData> {
        self.contents
            .iter()
            .flat_map(|content| content.parts.iter())
            .find_map(|part| match part {
                Part::InlineData { inline_data } => Some(inline_data),
                Part::Text { .. } => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_in_wire_shape() {
        let image = ImagePayload::from_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        let body = serde_json::to_value(GenerateContentRequest::for_detection(&image)).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], DETECTION_PROMPT);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "aGVsbG8=");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            body["generationConfig"]["responseSchema"]["items"]["required"],
            json!(["label", "confidence", "box_2d"])
        );
    }

    #[test]
    fn prompt_names_box_order_and_grid() {
        assert!(DETECTION_PROMPT.contains("[ymin, xmin, ymax, xmax]"));
        assert!(DETECTION_PROMPT.contains("0 to 1000"));
    }
}
