use time::OffsetDateTime;
use tracing::debug;

use crate::domain::request::ReportRequest;

use super::{
    fonts::ReportFonts,
    layout::build_layout,
    pdf::PdfWriter,
    types::{RenderError, RenderPipelineConfig, ReportRenderer},
};

/// Default renderer: lays out the parameter tree and writes it as a PDF.
pub struct PdfRenderService {
    writer: PdfWriter,
}

impl PdfRenderService {
    pub fn new(config: RenderPipelineConfig, fonts: ReportFonts) -> Self {
        Self {
            writer: PdfWriter::new(config, fonts),
        }
    }
}

impl ReportRenderer for PdfRenderService {
    fn render(&self, request: &ReportRequest) -> Result<Vec<u8>, RenderError> {
        let layout = build_layout(request, OffsetDateTime::now_utc());
        let bytes = self.writer.write(&layout)?;

        debug!(
            target = "reportgen::render",
            report_id = request.report_id(),
            blocks = layout.blocks.len(),
            bytes = bytes.len(),
            "report rendered"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(parameters: serde_json::Value) -> ReportRequest {
        ReportRequest::new("123", "https://test.com/webhook", parameters).expect("request")
    }

    #[test]
    fn renders_non_empty_pdf() {
        let service = PdfRenderService::new(
            RenderPipelineConfig::default(),
            ReportFonts::bundled().expect("fonts"),
        );
        let bytes = service
            .render(&request(json!({"key1": "value1"})))
            .expect("rendered");

        assert!(!bytes.is_empty());
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn null_parameters_still_render() {
        let service = PdfRenderService::new(
            RenderPipelineConfig::default(),
            ReportFonts::bundled().expect("fonts"),
        );
        let bytes = service.render(&request(json!(null))).expect("rendered");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn cyrillic_parameters_are_drawn_with_embedded_font() {
        let fonts = ReportFonts::bundled().expect("fonts");
        let service = PdfRenderService::new(RenderPipelineConfig::default(), fonts.clone());
        let bytes = service
            .render(&request(json!({"город": "Москва"})))
            .expect("rendered");

        let glyphs: String = "город: Москва"
            .chars()
            .map(|ch| format!("{:04X}", fonts.regular().glyph_id(ch).expect("glyph")))
            .collect();
        assert!(String::from_utf8_lossy(&bytes).contains(&format!("<{glyphs}>")));
    }
}
