//! Overlay of normalized detection boxes on a displayed image.
//!
//! [`render_frames`] is the pure transform from the 0..=1000 grid to pixel
//! frames. The render targets ([`raster`], [`svg`]) clamp and draw those
//! frames; the transform itself passes negative extents through untouched.

use std::fmt;

use crate::detect::{Detection, NORMALIZED_MAX};

mod font;
pub mod raster;
pub mod svg;

/// Frame colors, assigned by detection index modulo the palette length.
///
/// Assignment follows position in the set, not the label, so re-running
/// detection on the same image can give a stable object a different color
/// when the model returns objects in another order.
pub const PALETTE: [Color; 6] = [
    Color::rgb(0x38, 0xbd, 0xf8),
    Color::rgb(0x4a, 0xde, 0x80),
    Color::rgb(0xfb, 0x92, 0x3c),
    Color::rgb(0xf4, 0x72, 0xb6),
    Color::rgb(0xa7, 0x8b, 0xfa),
    Color::rgb(0xfa, 0xcc, 0x15),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb`
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba(self, alpha: u8) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, alpha])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// Rendered pixel size of the displayed image.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayGeometry {
    pub width: f64,
    pub height: f64,
}

impl DisplayGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(f64::from(width), f64::from(height))
    }

    /// Display size for an image of `natural` size. A single requested
    /// dimension keeps the aspect ratio; none keeps the natural size.
    pub fn for_image(natural: (u32, u32), width: Option<u32>, height: Option<u32>) -> Self {
        let (natural_w, natural_h) = natural;
        let scaled = |value: u32, num: u32, den: u32| -> u32 {
            if den == 0 {
                0
            } else {
                (f64::from(value) * f64::from(num) / f64::from(den)).round() as u32
            }
        };
        let (w, h) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, scaled(w, natural_h, natural_w)),
            (None, Some(h)) => (scaled(h, natural_w, natural_h), h),
            (None, None) => (natural_w, natural_h),
        };
        Self::from_pixels(w, h)
    }

    /// False before layout (zero size) or for nonsense sizes.
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// One positioned, labeled frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Position of the detection in its set.
    pub index: usize,
    pub top: f64,
    pub left: f64,
    /// Negative for an inverted box.
    pub width: f64,
    /// Negative for an inverted box.
    pub height: f64,
    pub color: Color,
    pub label: String,
    pub confidence_percent: i64,
}

/// Integer pixel rectangle inside a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// `label (NN%)`
    pub fn badge_text(&self) -> String {
        format!("{} ({}%)", self.label, self.confidence_percent)
    }

    /// Extents clamped to zero, then clipped to the container.
    ///
    /// `None` when the frame lies entirely outside a drawable container.
    pub fn visible_rect(&self, geometry: DisplayGeometry) -> Option<PixelRect> {
        if !geometry.is_drawable() {
            return None;
        }
        let right = self.left + self.width.max(0.0);
        let bottom = self.top + self.height.max(0.0);
        if self.left > geometry.width || self.top > geometry.height || right < 0.0 || bottom < 0.0
        {
            return None;
        }
        let x0 = self.left.clamp(0.0, geometry.width);
        let y0 = self.top.clamp(0.0, geometry.height);
        let x1 = right.clamp(0.0, geometry.width);
        let y1 = bottom.clamp(0.0, geometry.height);
        Some(PixelRect {
            x: x0.round() as u32,
            y: y0.round() as u32,
            width: (x1 - x0).max(0.0).round() as u32,
            height: (y1 - y0).max(0.0).round() as u32,
        })
    }
}

/// Map each detection onto `geometry` with the default [`PALETTE`].
pub fn render_frames(detections: &[Detection], geometry: DisplayGeometry) -> Vec<Frame> {
    render_frames_with_palette(detections, geometry, &PALETTE)
}

/// Map each detection onto `geometry`, coloring by index into `palette`.
///
/// A container that has not been laid out yet yields no frames. An empty
/// palette falls back to [`PALETTE`].
pub fn render_frames_with_palette(
    detections: &[Detection],
    geometry: DisplayGeometry,
    palette: &[Color],
) -> Vec<Frame> {
    if !geometry.is_drawable() {
        return Vec::new();
    }
    let palette = if palette.is_empty() { &PALETTE[..] } else { palette };
    let grid = f64::from(NORMALIZED_MAX);

    detections
        .iter()
        .enumerate()
        .map(|(index, detection)| {
            let bbox = &detection.bbox;
            Frame {
                index,
                top: (f64::from(bbox.ymin) / grid) * geometry.height,
                left: (f64::from(bbox.xmin) / grid) * geometry.width,
                width: (f64::from(bbox.width()) / grid) * geometry.width,
                height: (f64::from(bbox.height()) / grid) * geometry.height,
                color: palette[index % palette.len()],
                label: detection.label.clone(),
                confidence_percent: detection.confidence_percent(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(bbox: [i32; 4]) -> Detection {
        Detection::new("thing", 0.5, BoundingBox::from(bbox))
    }

    #[test]
    fn palette_matches_badge_colors() {
        let hex: Vec<String> = PALETTE.iter().map(Color::hex).collect();
        assert_eq!(
            hex,
            vec!["#38bdf8", "#4ade80", "#fb923c", "#f472b6", "#a78bfa", "#facc15"]
        );
    }

    #[test]
    fn colors_cycle_by_index() {
        let detections: Vec<Detection> = (0..8).map(|_| det([0, 0, 10, 10])).collect();
        let frames = render_frames(&detections, DisplayGeometry::new(100.0, 100.0));
        assert_eq!(frames[0].color, PALETTE[0]);
        assert_eq!(frames[5].color, PALETTE[5]);
        assert_eq!(frames[6].color, PALETTE[0]);
        assert_eq!(frames[7].color, PALETTE[1]);
    }

    #[test]
    fn custom_palette_and_empty_fallback() {
        let detections = vec![det([0, 0, 1, 1]), det([0, 0, 1, 1])];
        let red = Color::rgb(255, 0, 0);
        let frames =
            render_frames_with_palette(&detections, DisplayGeometry::new(10.0, 10.0), &[red]);
        assert!(frames.iter().all(|f| f.color == red));

        let frames = render_frames_with_palette(&detections, DisplayGeometry::new(10.0, 10.0), &[]);
        assert_eq!(frames[1].color, PALETTE[1]);
    }

    #[test]
    fn inverted_box_passes_negative_extent_through() {
        let frames = render_frames(&[det([600, 800, 200, 300])], DisplayGeometry::new(100.0, 100.0));
        assert_eq!(frames[0].width, -50.0);
        assert_eq!(frames[0].height, -40.0);

        let rect = frames[0].visible_rect(DisplayGeometry::new(100.0, 100.0)).unwrap();
        assert_eq!(rect, PixelRect { x: 80, y: 60, width: 0, height: 0 });
    }

    #[test]
    fn visible_rect_clips_to_container() {
        let frame = Frame {
            index: 0,
            top: -10.0,
            left: 90.0,
            width: 30.0,
            height: 20.0,
            color: PALETTE[0],
            label: "x".to_string(),
            confidence_percent: 1,
        };
        let rect = frame.visible_rect(DisplayGeometry::new(100.0, 100.0)).unwrap();
        assert_eq!(rect, PixelRect { x: 90, y: 0, width: 10, height: 10 });
        assert_eq!(frame.visible_rect(DisplayGeometry::default()), None);
    }

    #[test]
    fn badge_shows_rounded_percent() {
        let detections = vec![Detection::new("Dog", 0.876, BoundingBox::new(0, 0, 1, 1))];
        let frames = render_frames(&detections, DisplayGeometry::new(10.0, 10.0));
        assert_eq!(frames[0].badge_text(), "Dog (88%)");
    }

    #[test]
    fn display_size_keeps_aspect_ratio() {
        assert_eq!(
            DisplayGeometry::for_image((800, 600), Some(400), None),
            DisplayGeometry::new(400.0, 300.0)
        );
        assert_eq!(
            DisplayGeometry::for_image((800, 600), None, Some(150)),
            DisplayGeometry::new(200.0, 150.0)
        );
        assert_eq!(
            DisplayGeometry::for_image((800, 600), None, None),
            DisplayGeometry::new(800.0, 600.0)
        );
        assert!(!DisplayGeometry::for_image((0, 0), Some(10), None).is_drawable());
    }

    #[test]
    fn nonsense_geometry_is_not_drawable() {
        assert!(!DisplayGeometry::new(f64::NAN, 10.0).is_drawable());
        assert!(!DisplayGeometry::new(-5.0, 10.0).is_drawable());
        assert!(!DisplayGeometry::new(10.0, f64::INFINITY).is_drawable());
        assert!(DisplayGeometry::from_pixels(1, 1).is_drawable());
    }
}
