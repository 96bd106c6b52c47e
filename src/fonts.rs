//! Font availability for text objects.

use std::sync::Arc;

use resvg::usvg::fontdb::{Database, Family, Query};
use rustybuzz::ttf_parser::Face;
use tracing::{debug, warn};

use crate::config::FontConfig;
use crate::fetch::AssetFetcher;
use crate::scene::TextContent;

/// Advance assumed per character, in ems, when no face can be measured.
const ESTIMATED_ADVANCE: f64 = 0.55;

/// Outcome of waiting for a font family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontStatus {
    /// The family was already known.
    Available,
    /// The family was fetched and registered.
    Loaded,
    /// The family could not be loaded in time; text renders with the fallback.
    Fallback,
}

/// The set of font faces text is rendered with.
#[derive(Clone)]
pub struct FontBook {
    db: Arc<Database>,
    config: FontConfig,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.db.len())
            .field("config", &self.config)
            .finish()
    }
}

impl FontBook {
    pub fn new(config: FontConfig) -> Self {
        let mut db = Database::new();
        if config.system_fonts {
            db.load_system_fonts();
        }
        debug!(faces = db.len(), "Font database ready");
        Self {
            db: Arc::new(db),
            config,
        }
    }

    /// A shared handle to the current face database.
    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    pub fn fallback_family(&self) -> &str {
        &self.config.fallback_family
    }

    /// Line breaking against the current faces.
    pub fn layout(&self) -> TextLayout<'_> {
        TextLayout::new(&self.db, &self.config.fallback_family)
    }

    pub fn has_family(&self, family: &str) -> bool {
        self.db.faces().any(|face| {
            face.families
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(family))
        })
    }

    /// Waits (bounded by the configured timeout) for `family` to be usable.
    ///
    /// Never fails: when the font cannot be fetched or parsed in time the
    /// caller proceeds and text falls back to the fallback family.
    pub async fn ensure(&mut self, family: &str, fetcher: &dyn AssetFetcher) -> FontStatus {
        if family.eq_ignore_ascii_case(&self.config.fallback_family) || self.has_family(family) {
            return FontStatus::Available;
        }

        let source = self.config.source_for(family);
        let fetched = tokio::time::timeout(self.config.load_timeout(), fetcher.fetch(&source)).await;
        let asset = match fetched {
            Ok(Ok(asset)) => asset,
            Ok(Err(err)) => {
                warn!(family, "Font unavailable, using fallback: {}", err);
                return FontStatus::Fallback;
            }
            Err(_) => {
                warn!(family, timeout_ms = self.config.load_timeout_ms, "Font load timed out, using fallback");
                return FontStatus::Fallback;
            }
        };

        let before = self.db.len();
        Arc::make_mut(&mut self.db).load_font_data(asset.bytes.to_vec());
        if self.db.len() > before {
            debug!(family, "Font loaded");
            FontStatus::Loaded
        } else {
            warn!(family, "Font data could not be parsed, using fallback");
            FontStatus::Fallback
        }
    }
}

/// Breaks text boxes into the lines they render as.
///
/// Lines break at the box width between any two characters, and at every
/// newline. Advances come from the first matching face in the font stack;
/// without one each character is assumed to be `ESTIMATED_ADVANCE` ems wide.
#[derive(Clone, Copy)]
pub struct TextLayout<'a> {
    db: &'a Database,
    fallback_family: &'a str,
}

impl<'a> TextLayout<'a> {
    pub fn new(db: &'a Database, fallback_family: &'a str) -> Self {
        Self { db, fallback_family }
    }

    pub fn fallback_family(&self) -> &'a str {
        self.fallback_family
    }

    /// The lines of `text` laid out in a box `width` wide.
    pub fn wrap(&self, text: &TextContent, width: f64) -> Vec<String> {
        let size = text.font_size;
        let families = [
            Family::Name(text.font_family.as_str()),
            Family::Name(self.fallback_family),
            Family::SansSerif,
        ];
        let query = Query {
            families: &families,
            ..Query::default()
        };

        let measured = self.db.query(&query).and_then(|id| {
            self.db
                .with_face_data(id, |data, index| {
                    let face = Face::parse(data, index).ok()?;
                    let units = f64::from(face.units_per_em());
                    if units <= 0.0 {
                        return None;
                    }
                    Some(wrap_lines(&text.text, width, |c| {
                        face.glyph_index(c)
                            .and_then(|glyph| face.glyph_hor_advance(glyph))
                            .map_or(size * ESTIMATED_ADVANCE, |advance| f64::from(advance) * size / units)
                    }))
                })
                .flatten()
        });
        measured.unwrap_or_else(|| wrap_lines(&text.text, width, |_| size * ESTIMATED_ADVANCE))
    }
}

/// Splits `text` into lines no wider than `width`, given each character's advance.
///
/// A character that alone overflows still gets a line of its own. Empty text
/// is one empty line.
pub(crate) fn wrap_lines(text: &str, width: f64, advance: impl Fn(char) -> f64) -> Vec<String> {
    let mut lines = Vec::new();
    for hard_line in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0.0;
        for c in hard_line.trim_end_matches('\r').chars() {
            let w = advance(c);
            if !line.is_empty() && line_width + w > width {
                lines.push(std::mem::take(&mut line));
                line_width = 0.0;
            }
            line.push(c);
            line_width += w;
        }
        lines.push(line);
    }
    lines
}
