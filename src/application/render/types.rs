use std::str::FromStr;

use printpdf::image_crate::RgbImage;
use thiserror::Error;

use crate::domain::{request::ReportRequest, value::ImageFormat};

/// Turns a validated request into a finished PDF document.
///
/// Implementations are synchronous and CPU bound; async callers are expected to run
/// them on the blocking pool.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, request: &ReportRequest) -> Result<Vec<u8>, RenderError>;
}

/// Failure to produce the document as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("failed to load font: {reason}")]
    Font { reason: String },
    #[error("failed to encode document: {reason}")]
    Encode { reason: String },
}

/// Failure confined to a single parameter node. Rendered inline, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderNodeError {
    #[error("could not decode {format} data: {reason}")]
    ImageDecode {
        format: &'static str,
        reason: String,
    },
    #[error("image has no pixels")]
    EmptyImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in millimetres, portrait.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            other => Err(format!("unknown page size `{other}` (expected a4 or letter)")),
        }
    }
}

/// Static render configuration resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPipelineConfig {
    pub page_size: PageSize,
    pub margin_mm: f32,
    pub font_size_pt: f32,
    pub image_dpi: f32,
}

impl Default for RenderPipelineConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margin_mm: 20.0,
            font_size_pt: 11.0,
            image_dpi: 96.0,
        }
    }
}

/// Page-independent description of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub title: String,
    pub header: String,
    pub heading: String,
    pub blocks: Vec<Block>,
    pub footer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text { indent: u16, text: String },
    Image { indent: u16, image: EmbeddedImage },
    Diagnostic { indent: u16, text: String },
}

impl Block {
    pub fn indent(&self) -> u16 {
        match self {
            Block::Text { indent, .. }
            | Block::Image { indent, .. }
            | Block::Diagnostic { indent, .. } => *indent,
        }
    }

    /// Text carried by the block, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Block::Text { text, .. } | Block::Diagnostic { text, .. } => Some(text),
            Block::Image { .. } => None,
        }
    }
}

/// Decoded image ready to be placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub format: ImageFormat,
    pub pixels: RgbImage,
}

impl EmbeddedImage {
    pub fn width_px(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height_px(&self) -> u32 {
        self.pixels.height()
    }
}
