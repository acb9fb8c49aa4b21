//! Draw overlay frames into an RGBA image.

use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::font::{glyph, text_width, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use super::{render_frames, DisplayGeometry, Frame, PixelRect};
use crate::detect::Detection;

pub const BORDER_THICKNESS: u32 = 2;
const BADGE_PADDING: u32 = 2;
const BADGE_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LARGE_TEXT_MIN_WIDTH: u32 = 800;

/// Scale `source` to the display geometry and draw every detection on it.
///
/// A geometry that is not drawable yields the unscaled source without frames.
pub fn annotate(
    source: &DynamicImage,
    detections: &[Detection],
    geometry: DisplayGeometry,
) -> RgbaImage {
    if !geometry.is_drawable() {
        log::warn!(
            "display geometry {}x{} not drawable; writing image without overlay",
            geometry.width,
            geometry.height
        );
        return source.to_rgba8();
    }
    let width = geometry.width.round().max(1.0) as u32;
    let height = geometry.height.round().max(1.0) as u32;
    let mut canvas = if source.dimensions() == (width, height) {
        source.to_rgba8()
    } else {
        source
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgba8()
    };
    let frames = render_frames(detections, geometry);
    let drawn = draw_frames(&mut canvas, &frames, geometry);
    log::debug!("drew {} of {} frames at {}x{}", drawn, frames.len(), width, height);
    canvas
}

/// Write an annotated canvas, picking the encoder from the path's extension.
///
/// JPEG has no alpha channel, so the canvas is flattened to RGB for it.
pub fn save_annotated(canvas: RgbaImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("unsupported image extension: {}", path.display()))?;
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
        _ => DynamicImage::ImageRgba8(canvas),
    };
    image
        .save_with_format(path, format)
        .with_context(|| format!("write {}", path.display()))
}

/// Draw frames computed against `geometry`. Returns how many were visible.
pub fn draw_frames(img: &mut RgbaImage, frames: &[Frame], geometry: DisplayGeometry) -> usize {
    let scale = if img.width() >= LARGE_TEXT_MIN_WIDTH { 2 } else { 1 };
    let mut drawn = 0;
    for frame in frames {
        let Some(rect) = frame.visible_rect(geometry) else {
            continue;
        };
        let color = frame.color.to_rgba(255);
        draw_border(img, rect, color, BORDER_THICKNESS);
        draw_badge(img, frame, rect, color, scale);
        drawn += 1;
    }
    drawn
}

// Border grows inward from the frame edge.
fn draw_border(img: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>, thickness: u32) {
    for t in 0..thickness {
        let width = rect.width.saturating_sub(2 * t);
        let height = rect.height.saturating_sub(2 * t);
        if t > 0 && (width == 0 || height == 0) {
            break;
        }
        let outline = Rect::at((rect.x + t) as i32, (rect.y + t) as i32)
            .of_size(width.max(1), height.max(1));
        draw_hollow_rect_mut(img, outline, color);
    }
}

// Badge sits above the frame, or just inside it when the frame touches the top.
fn draw_badge(img: &mut RgbaImage, frame: &Frame, rect: PixelRect, color: Rgba<u8>, scale: u32) {
    let text = frame.badge_text().to_uppercase();
    let badge_width = text_width(&text, scale) + 2 * BADGE_PADDING;
    let badge_height = GLYPH_HEIGHT * scale + 2 * BADGE_PADDING;
    let badge_y = if rect.y >= badge_height {
        rect.y - badge_height
    } else {
        rect.y
    };
    draw_filled_rect_mut(
        img,
        Rect::at(rect.x as i32, badge_y as i32).of_size(badge_width, badge_height),
        color,
    );
    draw_text(
        img,
        &text,
        rect.x + BADGE_PADDING,
        badge_y + BADGE_PADDING,
        scale,
        BADGE_TEXT,
    );
}

fn draw_text(img: &mut RgbaImage, text: &str, x: u32, y: u32, scale: u32, color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as u32 * GLYPH_ADVANCE * scale;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = origin_x + col * scale + dx;
                        let py = y + row as u32 * scale + dy;
                        if px < width && py < height {
                            img.put_pixel(px, py, color);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::PALETTE;

    const BLANK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn frame(top: f64, left: f64, width: f64, height: f64) -> Frame {
        Frame {
            index: 0,
            top,
            left,
            width,
            height,
            color: PALETTE[2],
            label: "cat".to_string(),
            confidence_percent: 90,
        }
    }

    #[test]
    fn border_is_two_pixels_inward() {
        let mut img = RgbaImage::from_pixel(100, 100, BLANK);
        let geometry = DisplayGeometry::from_pixels(100, 100);
        let drawn = draw_frames(&mut img, &[frame(40.0, 20.0, 50.0, 30.0)], geometry);
        assert_eq!(drawn, 1);

        let color = PALETTE[2].to_rgba(255);
        assert_eq!(img.get_pixel(20, 60), &color);
        assert_eq!(img.get_pixel(21, 60), &color);
        assert_eq!(img.get_pixel(22, 60), &BLANK);
        assert_eq!(img.get_pixel(69, 69), &color);
        assert_eq!(img.get_pixel(45, 55), &BLANK);
    }

    #[test]
    fn badge_sits_above_frame() {
        let mut img = RgbaImage::from_pixel(100, 100, BLANK);
        draw_frames(
            &mut img,
            &[frame(40.0, 20.0, 50.0, 30.0)],
            DisplayGeometry::from_pixels(100, 100),
        );
        // badge spans y in [29, 40) at scale 1; its left padding column is solid color
        assert_eq!(img.get_pixel(20, 30), &PALETTE[2].to_rgba(255));
        assert_eq!(img.get_pixel(20, 28), &BLANK);
    }

    #[test]
    fn frames_outside_container_are_skipped() {
        let mut img = RgbaImage::from_pixel(10, 10, BLANK);
        let drawn = draw_frames(
            &mut img,
            &[frame(20.0, 20.0, 5.0, 5.0)],
            DisplayGeometry::from_pixels(10, 10),
        );
        assert_eq!(drawn, 0);
        assert!(img.pixels().all(|p| *p == BLANK));
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated.notanimage");
        let err = save_annotated(RgbaImage::from_pixel(4, 4, BLANK), &path).unwrap_err();
        assert!(err.to_string().contains("unsupported image extension"));
        assert!(!path.exists());
    }

    #[test]
    fn annotate_leaves_image_alone_without_geometry() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, BLANK));
        let detections = vec![Detection::new(
            "x",
            0.5,
            crate::detect::BoundingBox::new(0, 0, 1000, 1000),
        )];
        let out = annotate(&source, &detections, DisplayGeometry::default());
        assert_eq!(out.dimensions(), (8, 6));
        assert!(out.pixels().all(|p| *p == BLANK));
    }

    #[test]
    fn annotate_resizes_to_display_geometry() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 200, BLANK));
        let out = annotate(&source, &[], DisplayGeometry::from_pixels(200, 100));
        assert_eq!(out.dimensions(), (200, 100));
    }
}
