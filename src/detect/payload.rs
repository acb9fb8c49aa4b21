use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::DetectError;

const DEFAULT_MIME: &str = "image/jpeg";

/// Image as it is sent to the inference service: MIME type plus base64 data.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime_type: String,
    data: String,
}

impl ImagePayload {
    /// Encode raw image bytes. The MIME type is sniffed from the content,
    /// then from `path`'s extension, then defaults to JPEG.
    pub fn from_bytes(bytes: &[u8], path: Option<&Path>) -> Result<Self, DetectError> {
        if bytes.is_empty() {
            return Err(DetectError::invalid_payload("image is empty"));
        }
        let mime_type = image::guess_format(bytes)
            .ok()
            .or_else(|| path.and_then(|p| image::ImageFormat::from_path(p).ok()))
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|| DEFAULT_MIME.to_string());
        Ok(Self {
            mime_type,
            data: STANDARD.encode(bytes),
        })
    }

    /// Accept a `data:<mime>;base64,<data>` URI or bare base64.
    ///
    /// The prefix is stripped before transmission. A string with no comma is
    /// taken as bare base64 JPEG data.
    pub fn from_data_uri(uri: &str) -> Result<Self, DetectError> {
        let uri = uri.trim();
        let (mime_type, data) = match uri.split_once(',') {
            Some((header, data)) => (parse_data_uri_header(header)?, data),
            None => (DEFAULT_MIME.to_string(), uri),
        };
        if data.is_empty() {
            return Err(DetectError::invalid_payload("data uri carries no image data"));
        }
        STANDARD
            .decode(data)
            .map_err(|e| DetectError::invalid_payload(format!("image data is not base64: {}", e)))?;
        Ok(Self {
            mime_type,
            data: data.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 image data without any data-URI prefix.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Length of the encoded data, for logging.
    pub fn encoded_len(&self) -> usize {
        self.data.len()
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

// Image data stays out of logs.
impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("encoded_len", &self.data.len())
            .finish()
    }
}

fn parse_data_uri_header(header: &str) -> Result<String, DetectError> {
    let rest = header
        .strip_prefix("data:")
        .ok_or_else(|| DetectError::invalid_payload("data uri must start with 'data:'"))?;
    let mut parts = rest.split(';');
    let mime = parts.next().unwrap_or("").trim();
    if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(DetectError::invalid_payload("data uri is not base64 encoded"));
    }
    if mime.is_empty() {
        Ok(DEFAULT_MIME.to_string())
    } else {
        Ok(mime.to_lowercase())
    }
}
