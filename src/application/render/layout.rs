//! Builds the page-independent layout of a report from its parameter tree.
//!
//! Every parameter node becomes one or more blocks. Node level failures (images that
//! do not decode) become diagnostic blocks so the document always completes.

use printpdf::image_crate::{self, DynamicImage, ImageFormat as DecoderFormat, RgbImage};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::domain::{
    request::ReportRequest,
    value::{ImageData, ImageFormat, ParamValue, classify, format_timestamp},
};

use super::types::{Block, EmbeddedImage, RenderNodeError, ReportLayout};

pub const NO_PARAMETERS_TEXT: &str = "No parameters provided";
pub const PARAMETERS_HEADING: &str = "Report Parameters";
const IMAGE_ERROR_PREFIX: &str = "Error rendering image";

/// Lay out a report. Pure apart from the supplied generation timestamp.
pub fn build_layout(request: &ReportRequest, generated_at: OffsetDateTime) -> ReportLayout {
    let mut blocks = Vec::new();
    layout_root(request.parameters(), &mut blocks);

    ReportLayout {
        title: format!("Report {}", request.report_id()),
        header: format!("Report: {}", request.report_id()),
        heading: PARAMETERS_HEADING.to_string(),
        blocks,
        footer: format!("Generated on: {}", format_timestamp(generated_at)),
    }
}

fn layout_root(raw: &Value, blocks: &mut Vec<Block>) {
    match classify(raw) {
        ParamValue::Null => push_text(blocks, 0, NO_PARAMETERS_TEXT.to_string()),
        ParamValue::Scalar(scalar) => push_text(blocks, 0, scalar.to_text()),
        ParamValue::Image(image) => match embed_image(image) {
            Ok(image) => blocks.push(Block::Image { indent: 0, image }),
            Err(err) => blocks.push(Block::Diagnostic {
                indent: 0,
                text: format!("{IMAGE_ERROR_PREFIX}: {err}"),
            }),
        },
        ParamValue::Map(map) => layout_map(map, 0, blocks),
        ParamValue::List(items) => layout_list(items, 0, blocks),
    }
}

fn layout_map(map: &Map<String, Value>, indent: u16, blocks: &mut Vec<Block>) {
    for (key, value) in map {
        layout_entry(key, value, indent, blocks);
    }
}

fn layout_list(items: &[Value], indent: u16, blocks: &mut Vec<Block>) {
    for (index, value) in items.iter().enumerate() {
        let label = format!("Item {}", index + 1);
        layout_entry(&label, value, indent, blocks);
    }
}

fn layout_entry(label: &str, raw: &Value, indent: u16, blocks: &mut Vec<Block>) {
    let child = indent.saturating_add(1);
    let value = classify(raw);
    if value.is_composite() {
        push_text(blocks, indent, format!("{label}:"));
    }

    match value {
        ParamValue::Null => push_text(blocks, indent, format!("{label}: null")),
        ParamValue::Scalar(scalar) => push_text(blocks, indent, format!("{label}: {scalar}")),
        ParamValue::Image(image) => match embed_image(image) {
            Ok(image) => {
                push_text(blocks, indent, format!("{label}:"));
                blocks.push(Block::Image {
                    indent: child,
                    image,
                });
            }
            Err(err) => blocks.push(Block::Diagnostic {
                indent,
                text: format!("{label}: {IMAGE_ERROR_PREFIX}: {err}"),
            }),
        },
        ParamValue::Map(map) => layout_map(map, child, blocks),
        ParamValue::List(items) => layout_list(items, child, blocks),
    }
}

fn push_text(blocks: &mut Vec<Block>, indent: u16, text: String) {
    blocks.push(Block::Text { indent, text });
}

/// Decode image bytes into RGB pixels suitable for embedding.
pub fn embed_image(image: ImageData) -> Result<EmbeddedImage, RenderNodeError> {
    let decoder_format = match image.format {
        ImageFormat::Png => DecoderFormat::Png,
        ImageFormat::Jpeg => DecoderFormat::Jpeg,
    };

    let decoded = image_crate::load_from_memory_with_format(&image.bytes, decoder_format)
        .map_err(|err| RenderNodeError::ImageDecode {
            format: image.format.as_str(),
            reason: err.to_string(),
        })?;

    let pixels = flatten_onto_white(decoded);
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(RenderNodeError::EmptyImage);
    }

    Ok(EmbeddedImage {
        format: image.format,
        pixels,
    })
}

/// Drop the alpha channel by compositing over a white page.
fn flatten_onto_white(decoded: DynamicImage) -> RgbImage {
    if !decoded.color().has_alpha() {
        return decoded.to_rgb8();
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let [r, g, b, alpha] = src.0;
        dst.0 = [
            blend_over_white(r, alpha),
            blend_over_white(g, alpha),
            blend_over_white(b, alpha),
        ];
    }
    rgb
}

fn blend_over_white(channel: u8, alpha: u8) -> u8 {
    let alpha = u16::from(alpha);
    let blended = (u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
    blended as u8
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use printpdf::image_crate::{ImageOutputFormat, Rgba, RgbaImage};

    use super::*;
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde_json::json;
    use time::macros::datetime;

    // 2x2 red RGB PNG.
    const PNG_2X2: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAIAAAACCAIAAAD91JpzAAAAEElEQVR4nGP4z8AARAwQCgAf7gP9i18U1AAAAABJRU5ErkJggg==";

    fn request(parameters: Value) -> ReportRequest {
        ReportRequest::new("123", "https://test.com/webhook", parameters).expect("request")
    }

    fn texts(layout: &ReportLayout) -> Vec<(u16, &str)> {
        layout
            .blocks
            .iter()
            .filter_map(|block| block.text().map(|text| (block.indent(), text)))
            .collect()
    }

    /// 2x2 RGBA PNG: transparent black in the top-left corner, opaque red elsewhere.
    fn transparent_corner_png() -> String {
        let mut pixels = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        pixels.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(pixels)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .expect("encode png");
        STANDARD.encode(bytes)
    }

    fn broken_png() -> String {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(b"definitely not chunk data");
        STANDARD.encode(bytes)
    }

    #[test]
    fn header_heading_and_footer_are_set() {
        let layout = build_layout(
            &request(json!({"key1": "value1"})),
            datetime!(2025-06-16 12:30:05 UTC),
        );

        assert_eq!(layout.header, "Report: 123");
        assert_eq!(layout.heading, PARAMETERS_HEADING);
        assert_eq!(layout.footer, "Generated on: 2025-06-16 12:30:05");
        assert_eq!(texts(&layout), vec![(0, "key1: value1")]);
    }

    #[test]
    fn null_parameters_render_placeholder() {
        let layout = build_layout(&request(Value::Null), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(texts(&layout), vec![(0, NO_PARAMETERS_TEXT)]);
    }

    #[test]
    fn top_level_scalar_renders_alone() {
        let layout = build_layout(&request(json!(42)), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(texts(&layout), vec![(0, "42")]);
    }

    #[test]
    fn nested_structures_indent_children() {
        let parameters = json!({
            "customer": {"name": "Ada", "tier": null},
            "lines": [10, {"sku": "A-1"}],
            "active": true
        });
        let layout = build_layout(&request(parameters), OffsetDateTime::UNIX_EPOCH);

        assert_eq!(
            texts(&layout),
            vec![
                (0, "customer:"),
                (1, "name: Ada"),
                (1, "tier: null"),
                (0, "lines:"),
                (1, "Item 1: 10"),
                (1, "Item 2:"),
                (2, "sku: A-1"),
                (0, "active: true"),
            ]
        );
    }

    #[test]
    fn top_level_list_uses_item_labels() {
        let layout = build_layout(&request(json!(["a", "b"])), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(texts(&layout), vec![(0, "Item 1: a"), (0, "Item 2: b")]);
    }

    #[test]
    fn valid_image_is_embedded_below_its_label() {
        let layout = build_layout(
            &request(json!({"logo": PNG_2X2})),
            OffsetDateTime::UNIX_EPOCH,
        );

        assert_eq!(layout.blocks.len(), 2);
        assert_eq!(layout.blocks[0].text(), Some("logo:"));
        match &layout.blocks[1] {
            Block::Image { indent, image } => {
                assert_eq!(*indent, 1);
                assert_eq!(image.format, ImageFormat::Png);
                assert_eq!((image.width_px(), image.height_px()), (2, 2));
            }
            other => panic!("expected image block, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_image_becomes_diagnostic() {
        let layout = build_layout(
            &request(json!({"logo": broken_png(), "after": "still here"})),
            OffsetDateTime::UNIX_EPOCH,
        );

        match &layout.blocks[0] {
            Block::Diagnostic { indent, text } => {
                assert_eq!(*indent, 0);
                assert!(text.starts_with("logo: Error rendering image: "));
            }
            other => panic!("expected diagnostic, got {other:?}"),
        }
        assert_eq!(layout.blocks[1].text(), Some("after: still here"));
    }

    #[test]
    fn layout_is_deterministic_apart_from_footer() {
        let parameters: Value =
            serde_json::from_str(r#"{"a": [1, 2.50, {"b": "2024-01-01T00:00:00Z"}]}"#)
                .expect("json");
        let first = build_layout(&request(parameters.clone()), datetime!(2024-01-01 00:00 UTC));
        let second = build_layout(&request(parameters), datetime!(2025-01-01 00:00 UTC));

        assert_ne!(first.footer, second.footer);
        assert_eq!(first.blocks, second.blocks);
        assert_eq!(first.header, second.header);
        assert!(
            texts(&first)
                .iter()
                .any(|(_, text)| *text == "b: 2024-01-01 00:00:00")
        );
        assert!(texts(&first).iter().any(|(_, text)| *text == "Item 2: 2.50"));
    }

    #[test]
    fn top_level_image_is_embedded_without_label() {
        let layout = build_layout(&request(json!(PNG_2X2)), OffsetDateTime::UNIX_EPOCH);

        assert_eq!(layout.blocks.len(), 1);
        match &layout.blocks[0] {
            Block::Image { indent, image } => {
                assert_eq!(*indent, 0);
                assert_eq!((image.width_px(), image.height_px()), (2, 2));
            }
            other => panic!("expected image block, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_top_level_image_becomes_unlabelled_diagnostic() {
        let layout = build_layout(&request(json!(broken_png())), OffsetDateTime::UNIX_EPOCH);

        assert_eq!(layout.blocks.len(), 1);
        match &layout.blocks[0] {
            Block::Diagnostic { indent, text } => {
                assert_eq!(*indent, 0);
                assert!(text.starts_with("Error rendering image: "), "{text}");
            }
            other => panic!("expected diagnostic, got {other:?}"),
        }
    }

    #[test]
    fn transparent_pixels_are_flattened_onto_white() {
        let layout = build_layout(
            &request(json!({"logo": transparent_corner_png()})),
            OffsetDateTime::UNIX_EPOCH,
        );

        let Block::Image { image, .. } = &layout.blocks[1] else {
            panic!("expected image block, got {:?}", layout.blocks[1]);
        };
        assert_eq!(image.pixels.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(image.pixels.get_pixel(1, 1).0, [255, 0, 0]);
    }

    #[test]
    fn half_transparent_channels_blend_towards_white() {
        assert_eq!(blend_over_white(0, 255), 0);
        assert_eq!(blend_over_white(0, 0), 255);
        assert_eq!(blend_over_white(0, 128), 127);
        assert_eq!(blend_over_white(200, 128), 227);
    }
}
