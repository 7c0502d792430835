//! Paginates a [`ReportLayout`] onto PDF pages.

use printpdf::{
    Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb, image_crate::DynamicImage,
};

use super::{
    fonts::{FontFace, ReportFonts},
    types::{Block, EmbeddedImage, RenderError, RenderPipelineConfig, ReportLayout},
};

const LAYER_NAME: &str = "content";
const PT_TO_MM: f32 = 25.4 / 72.0;
const LINE_SPACING: f32 = 1.4;
const INDENT_STEP_EM: f32 = 2.0;
// DejaVu Sans averages about 0.6 em per glyph.
const AVG_GLYPH_WIDTH_EM: f32 = 0.6;
const HEADER_SCALE: f32 = 1.6;
const HEADING_SCALE: f32 = 1.25;
const FOOTER_SCALE: f32 = 0.8;
const BLOCK_GAP_MM: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
enum Tone {
    Body,
    Muted,
    Alert,
}

impl Tone {
    fn color(self) -> Color {
        let (r, g, b) = match self {
            Tone::Body => (0.0, 0.0, 0.0),
            Tone::Muted => (0.4, 0.4, 0.4),
            Tone::Alert => (0.75, 0.1, 0.1),
        };
        Color::Rgb(Rgb::new(r, g, b, None))
    }
}

/// A face registered with one document.
struct PlacedFont<'a> {
    font: IndirectFontRef,
    face: &'a FontFace,
}

impl<'a> PlacedFont<'a> {
    fn register(doc: &PdfDocumentReference, face: &'a FontFace) -> Result<Self, RenderError> {
        let font = doc
            .add_external_font(face.bytes())
            .map_err(|err| RenderError::Font {
                reason: err.to_string(),
            })?;
        Ok(Self { font, face })
    }
}

struct Fonts<'a> {
    regular: PlacedFont<'a>,
    bold: PlacedFont<'a>,
}

pub struct PdfWriter {
    config: RenderPipelineConfig,
    fonts: ReportFonts,
}

impl PdfWriter {
    pub fn new(config: RenderPipelineConfig, fonts: ReportFonts) -> Self {
        Self { config, fonts }
    }

    pub fn write(&self, layout: &ReportLayout) -> Result<Vec<u8>, RenderError> {
        let (doc, _pages) = self.paint(layout)?;
        doc.save_to_bytes().map_err(|err| RenderError::Encode {
            reason: err.to_string(),
        })
    }

    /// Draws every block and returns the document with its page count.
    fn paint(&self, layout: &ReportLayout) -> Result<(PdfDocumentReference, usize), RenderError> {
        let (width, height) = self.config.page_size.dimensions_mm();
        let (doc, page, layer) =
            PdfDocument::new(layout.title.as_str(), Mm(width), Mm(height), LAYER_NAME);

        let fonts = Fonts {
            regular: PlacedFont::register(&doc, self.fonts.regular())?,
            bold: PlacedFont::register(&doc, self.fonts.bold())?,
        };

        let first = doc.get_page(page).get_layer(layer);
        let pages = {
            let mut cursor = PageCursor::start(&doc, self.config, &fonts, layout, first);
            cursor.heading(&layout.heading);
            for block in &layout.blocks {
                match block {
                    Block::Text { indent, text } => cursor.paragraph(text, *indent, Tone::Body),
                    Block::Diagnostic { indent, text } => {
                        cursor.paragraph(text, *indent, Tone::Alert)
                    }
                    Block::Image { indent, image } => cursor.image(image, *indent),
                }
            }
            cursor.page_count
        };

        Ok((doc, pages))
    }
}

struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    config: RenderPipelineConfig,
    fonts: &'a Fonts<'a>,
    layout: &'a ReportLayout,
    layer: PdfLayerReference,
    /// Baseline position of the last drawn element, in millimetres from the bottom edge.
    y: f32,
    page_count: usize,
}

impl<'a> PageCursor<'a> {
    fn start(
        doc: &'a PdfDocumentReference,
        config: RenderPipelineConfig,
        fonts: &'a Fonts<'a>,
        layout: &'a ReportLayout,
        layer: PdfLayerReference,
    ) -> Self {
        let mut cursor = Self {
            doc,
            config,
            fonts,
            layout,
            layer,
            y: 0.0,
            page_count: 1,
        };
        cursor.decorate();
        cursor
    }

    fn page_width(&self) -> f32 {
        self.config.page_size.dimensions_mm().0
    }

    fn page_height(&self) -> f32 {
        self.config.page_size.dimensions_mm().1
    }

    fn line_height(&self, scale: f32) -> f32 {
        self.config.font_size_pt * scale * PT_TO_MM * LINE_SPACING
    }

    fn body_top(&self) -> f32 {
        self.page_height() - self.config.margin_mm - self.line_height(HEADER_SCALE) - BLOCK_GAP_MM
    }

    fn body_bottom(&self) -> f32 {
        self.config.margin_mm + self.line_height(FOOTER_SCALE) + BLOCK_GAP_MM
    }

    fn usable_width(&self) -> f32 {
        self.page_width() - 2.0 * self.config.margin_mm
    }

    /// Left offset for an indent level, capped at half the usable width.
    fn indent_offset(&self, indent: u16) -> f32 {
        let step = self.config.font_size_pt * PT_TO_MM * INDENT_STEP_EM;
        (f32::from(indent) * step).min(self.usable_width() / 2.0)
    }

    fn draw_text(&self, text: &str, size: f32, x: f32, y: f32, font: &PlacedFont<'_>, tone: Tone) {
        self.layer.set_fill_color(tone.color());
        self.layer
            .use_text(font.face.encodable(text), size, Mm(x), Mm(y), &font.font);
    }

    fn decorate(&mut self) {
        let margin = self.config.margin_mm;
        let header_size = self.config.font_size_pt * HEADER_SCALE;
        let header_y = self.page_height() - margin - header_size * PT_TO_MM;

        self.draw_text(
            &self.layout.header,
            header_size,
            margin,
            header_y,
            &self.fonts.bold,
            Tone::Body,
        );
        self.draw_text(
            &self.layout.footer,
            self.config.font_size_pt * FOOTER_SCALE,
            margin,
            margin,
            &self.fonts.regular,
            Tone::Muted,
        );

        self.y = self.body_top();
    }

    fn next_page(&mut self) {
        let (page, layer) = self.doc.add_page(
            Mm(self.page_width()),
            Mm(self.page_height()),
            LAYER_NAME,
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.page_count += 1;
        self.decorate();
    }

    /// Starts a new page unless `height` still fits. A fresh page always accepts content.
    fn reserve(&mut self, height: f32) {
        let at_top = (self.y - self.body_top()).abs() < f32::EPSILON;
        if !at_top && self.y - height < self.body_bottom() {
            self.next_page();
        }
    }

    fn heading(&mut self, text: &str) {
        let size = self.config.font_size_pt * HEADING_SCALE;
        let line = self.line_height(HEADING_SCALE);
        self.reserve(line);
        self.y -= line;
        self.draw_text(
            text,
            size,
            self.config.margin_mm,
            self.y,
            &self.fonts.bold,
            Tone::Body,
        );
        self.y -= BLOCK_GAP_MM;
    }

    fn paragraph(&mut self, text: &str, indent: u16, tone: Tone) {
        let offset = self.indent_offset(indent);
        let glyph = self.config.font_size_pt * PT_TO_MM * AVG_GLYPH_WIDTH_EM;
        let max_chars = ((self.usable_width() - offset) / glyph).floor().max(1.0) as usize;
        let line = self.line_height(1.0);
        let x = self.config.margin_mm + offset;

        for segment in wrap_text(text, max_chars) {
            self.reserve(line);
            self.y -= line;
            self.draw_text(
                &segment,
                self.config.font_size_pt,
                x,
                self.y,
                &self.fonts.regular,
                tone,
            );
        }
    }

    fn image(&mut self, image: &EmbeddedImage, indent: u16) {
        let dpi = self.config.image_dpi;
        let offset = self.indent_offset(indent);
        let x = self.config.margin_mm + offset;
        let available_width = self.usable_width() - offset;
        let available_height = self.body_top() - self.body_bottom() - BLOCK_GAP_MM;

        let natural_width = image.width_px() as f32 * 25.4 / dpi;
        let natural_height = image.height_px() as f32 * 25.4 / dpi;

        let mut scale = available_width / natural_width;
        if natural_height * scale > available_height {
            scale = available_height / natural_height;
        }
        let drawn_height = natural_height * scale;

        self.reserve(drawn_height + BLOCK_GAP_MM);
        self.y -= drawn_height + BLOCK_GAP_MM;

        Image::from_dynamic_image(&DynamicImage::ImageRgb8(image.pixels.clone())).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(self.y)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }
}

/// Greedy word wrap on an approximate character budget. Overlong words are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 {
            word.len()
        } else {
            current_len + 1 + word.len()
        };
        if needed > max_chars && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::{fonts::REPLACEMENT_CHAR, types::PageSize};

    fn fonts() -> ReportFonts {
        ReportFonts::bundled().expect("bundled fonts")
    }

    /// Hex string the writer emits for `text` set in `face`.
    fn glyph_hex(face: &FontFace, text: &str) -> String {
        let glyphs: String = text
            .chars()
            .map(|ch| format!("{:04X}", face.glyph_id(ch).expect("glyph")))
            .collect();
        format!("<{glyphs}>")
    }

    fn layout(blocks: Vec<Block>) -> ReportLayout {
        ReportLayout {
            title: "Report 123".into(),
            header: "Report: 123".into(),
            heading: "Report Parameters".into(),
            blocks,
            footer: "Generated on: 2025-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn wrap_keeps_short_text_on_one_line() {
        assert_eq!(wrap_text("key1: value1", 40), vec!["key1: value1"]);
    }

    #[test]
    fn wrap_breaks_on_whitespace() {
        assert_eq!(
            wrap_text("alpha beta gamma delta", 11),
            vec!["alpha beta", "gamma delta"]
        );
    }

    #[test]
    fn wrap_splits_overlong_words() {
        assert_eq!(wrap_text("abcdefghij xy", 4), vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn wrap_of_empty_text_yields_one_empty_line() {
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn writes_pdf_document() {
        let writer = PdfWriter::new(RenderPipelineConfig::default(), fonts());
        let bytes = writer
            .write(&layout(vec![Block::Text {
                indent: 0,
                text: "key1: value1".into(),
            }]))
            .expect("pdf");

        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_reports_span_several_pages() {
        let blocks = (0..200)
            .map(|index| Block::Text {
                indent: (index % 4) as u16,
                text: format!("Item {index}: value"),
            })
            .collect();
        let writer = PdfWriter::new(
            RenderPipelineConfig {
                page_size: PageSize::Letter,
                ..RenderPipelineConfig::default()
            },
            fonts(),
        );

        let (_, pages) = writer.paint(&layout(blocks)).expect("paint");
        assert!(pages > 1, "expected several pages, got {pages}");
    }

    #[test]
    fn single_block_fits_on_first_page() {
        let writer = PdfWriter::new(RenderPipelineConfig::default(), fonts());
        let (_, pages) = writer
            .paint(&layout(vec![Block::Diagnostic {
                indent: 2,
                text: "logo: Error rendering image: bad data".into(),
            }]))
            .expect("paint");
        assert_eq!(pages, 1);
    }

    #[test]
    fn non_latin_text_reaches_the_content_stream() {
        let fonts = fonts();
        let writer = PdfWriter::new(RenderPipelineConfig::default(), fonts.clone());
        let bytes = writer
            .write(&layout(vec![
                Block::Text {
                    indent: 0,
                    text: "город: Москва".into(),
                },
                Block::Text {
                    indent: 0,
                    text: "名前: 山田".into(),
                },
            ]))
            .expect("pdf");
        let pdf = String::from_utf8_lossy(&bytes);

        assert!(pdf.contains(&glyph_hex(fonts.regular(), "город: Москва")));

        let replaced: String = "名前: 山田"
            .chars()
            .map(|ch| if ch.is_ascii() { ch } else { REPLACEMENT_CHAR })
            .collect();
        assert!(pdf.contains(&glyph_hex(fonts.regular(), &replaced)));
    }
}
