//! SVG overlay document, sized to the display geometry, meant to be laid
//! over the displayed image.

use std::fmt::Write;

use super::{DisplayGeometry, Frame};

const BADGE_HEIGHT: f64 = 16.0;
const BADGE_FONT_SIZE: f64 = 10.0;
const BADGE_CHAR_WIDTH: f64 = 7.0;
const STROKE_WIDTH: f64 = 2.0;

/// Render frames as a standalone SVG document.
///
/// Negative extents are drawn as zero-size rectangles. A geometry that is
/// not drawable produces an empty document.
pub fn render_svg(frames: &[Frame], geometry: DisplayGeometry) -> String {
    let (width, height) = if geometry.is_drawable() {
        (geometry.width, geometry.height)
    } else {
        (0.0, 0.0)
    };
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    if geometry.is_drawable() {
        for frame in frames {
            write_frame(&mut out, frame);
        }
    }
    out.push_str("</svg>\n");
    out
}

fn write_frame(out: &mut String, frame: &Frame) {
    let color = frame.color.hex();
    let shown = frame.badge_text().to_uppercase();
    let badge_width = shown.chars().count() as f64 * BADGE_CHAR_WIDTH + 8.0;
    let badge_text = escape_xml(&shown);
    let badge_y = frame.top - BADGE_HEIGHT - 8.0;
    let _ = writeln!(
        out,
        r#"  <g class="detection" data-index="{index}" data-label="{label}">"#,
        index = frame.index,
        label = escape_xml(&frame.label)
    );
    let _ = writeln!(
        out,
        r#"    <rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{c}" stroke-width="{s}" style="filter: drop-shadow(0 0 10px {c}44)"/>"#,
        x = frame.left,
        y = frame.top,
        w = frame.width.max(0.0),
        h = frame.height.max(0.0),
        c = color,
        s = STROKE_WIDTH
    );
    let _ = writeln!(
        out,
        r#"    <rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{c}"/>"#,
        x = frame.left,
        y = badge_y,
        w = badge_width,
        h = BADGE_HEIGHT,
        c = color
    );
    let _ = writeln!(
        out,
        r##"    <text x="{x}" y="{y}" font-family="sans-serif" font-size="{size}" font-weight="bold" fill="#ffffff">{text}</text>"##,
        x = frame.left + 4.0,
        y = badge_y + BADGE_HEIGHT - 4.0,
        size = BADGE_FONT_SIZE,
        text = badge_text
    );
    out.push_str("  </g>\n");
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::PALETTE;

    fn frame(label: &str) -> Frame {
        Frame {
            index: 3,
            top: 100.0,
            left: 50.0,
            width: 40.0,
            height: -10.0,
            color: PALETTE[1],
            label: label.to_string(),
            confidence_percent: 72,
        }
    }

    #[test]
    fn emits_one_group_per_frame() {
        let svg = render_svg(
            &[frame("dog"), frame("cat")],
            DisplayGeometry::new(640.0, 480.0),
        );
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"width="640" height="480""#));
        assert_eq!(svg.matches("<g class=\"detection\"").count(), 2);
        assert!(svg.contains("stroke=\"#4ade80\""));
        assert!(svg.contains("DOG (72%)"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn negative_extent_becomes_zero() {
        let svg = render_svg(&[frame("dog")], DisplayGeometry::new(640.0, 480.0));
        assert!(svg.contains(r#"width="40" height="0""#));
    }

    #[test]
    fn escapes_labels() {
        let svg = render_svg(&[frame("<b>&\"")], DisplayGeometry::new(10.0, 10.0));
        assert!(svg.contains("&lt;B&gt;&amp;&quot; (72%)"));
        assert!(svg.contains(r#"data-label="&lt;b&gt;&amp;&quot;""#));
        assert!(!svg.contains("<b>"));
    }

    #[test]
    fn badge_width_follows_displayed_text() {
        // "straße" uppercases to the longer "STRASSE"
        let svg = render_svg(&[frame("straße")], DisplayGeometry::new(640.0, 480.0));
        assert!(svg.contains("STRASSE (72%)"));
        assert!(svg.contains(r#"width="99""#));
        assert!(!svg.contains(r#"width="92""#));
    }

    #[test]
    fn undrawable_geometry_is_empty_document() {
        let svg = render_svg(&[frame("dog")], DisplayGeometry::default());
        assert!(svg.contains(r#"width="0" height="0""#));
        assert!(!svg.contains("<g"));
    }
}
