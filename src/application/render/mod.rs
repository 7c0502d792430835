//! Report rendering pipeline.
//!
//! Rendering runs in two pure stages: the parameter tree is first laid out into
//! page-independent blocks, then the blocks are paginated into a PDF. Only the
//! encoder can fail; per-node problems are carried as diagnostic blocks.

mod fonts;
mod layout;
mod pdf;
mod service;
mod types;

pub use fonts::{FontFace, REPLACEMENT_CHAR, ReportFonts};
pub use layout::{NO_PARAMETERS_TEXT, PARAMETERS_HEADING, build_layout, embed_image};
pub use pdf::{PdfWriter, wrap_text};
pub use service::PdfRenderService;
pub use types::{
    Block, EmbeddedImage, PageSize, RenderError, RenderNodeError, RenderPipelineConfig,
    ReportLayout, ReportRenderer,
};
