//! Unicode fonts embedded into every report.
//!
//! DejaVu Sans ships with the binary and covers Latin, Greek and Cyrillic. Deployments
//! that need other scripts point `render.font_regular_path` / `render.font_bold_path`
//! at a font that covers them. Characters the chosen face has no glyph for are drawn
//! as U+FFFD so missing data stays visible in the document.

use std::{borrow::Cow, fmt, fs, path::Path, sync::Arc};

use owned_ttf_parser::{AsFaceRef, OwnedFace};

use super::types::RenderError;

const BUNDLED_REGULAR: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_BOLD: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans-Bold.ttf");

pub const REPLACEMENT_CHAR: char = '\u{FFFD}';
const LAST_RESORT_CHAR: char = '?';

/// A parsed TrueType face together with its raw bytes.
#[derive(Clone)]
pub struct FontFace {
    face: Arc<OwnedFace>,
    replacement: char,
}

impl FontFace {
    pub fn parse(bytes: Vec<u8>) -> Result<Self, RenderError> {
        let face = OwnedFace::from_vec(bytes, 0).map_err(|err| RenderError::Font {
            reason: err.to_string(),
        })?;
        let replacement = if face.as_face_ref().glyph_index(REPLACEMENT_CHAR).is_some() {
            REPLACEMENT_CHAR
        } else {
            LAST_RESORT_CHAR
        };

        Ok(Self {
            face: Arc::new(face),
            replacement,
        })
    }

    fn read(path: &Path) -> Result<Self, RenderError> {
        let bytes = fs::read(path).map_err(|err| RenderError::Font {
            reason: format!("{}: {err}", path.display()),
        })?;
        Self::parse(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        self.face.as_slice()
    }

    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        self.face.as_face_ref().glyph_index(ch).map(|id| id.0)
    }

    /// Swap characters without a glyph for the replacement character.
    pub fn encodable<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if text.chars().all(|ch| self.glyph_id(ch).is_some()) {
            return Cow::Borrowed(text);
        }

        Cow::Owned(
            text.chars()
                .map(|ch| match self.glyph_id(ch) {
                    Some(_) => ch,
                    None => self.replacement,
                })
                .collect(),
        )
    }
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("bytes", &self.bytes().len())
            .field("replacement", &self.replacement)
            .finish()
    }
}

/// Regular and bold faces used by the PDF writer.
#[derive(Debug, Clone)]
pub struct ReportFonts {
    regular: FontFace,
    bold: FontFace,
}

impl ReportFonts {
    pub fn bundled() -> Result<Self, RenderError> {
        Ok(Self {
            regular: FontFace::parse(BUNDLED_REGULAR.to_vec())?,
            bold: FontFace::parse(BUNDLED_BOLD.to_vec())?,
        })
    }

    /// Load configured font files, using the bundled face for any path left unset.
    pub fn load(regular: Option<&Path>, bold: Option<&Path>) -> Result<Self, RenderError> {
        let regular = match regular {
            Some(path) => FontFace::read(path)?,
            None => FontFace::parse(BUNDLED_REGULAR.to_vec())?,
        };
        let bold = match bold {
            Some(path) => FontFace::read(path)?,
            None => FontFace::parse(BUNDLED_BOLD.to_vec())?,
        };
        Ok(Self { regular, bold })
    }

    pub fn regular(&self) -> &FontFace {
        &self.regular
    }

    pub fn bold(&self) -> &FontFace {
        &self.bold
    }
}
