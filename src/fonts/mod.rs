//! Font handling and encoding.
//!
//! Fonts are instantiated from font dictionaries by the [`FontRegistry`]
//! and expose the capability set the content-stream interpreter needs:
//! byte decoding into CIDs, widths and displacements, Unicode lookup, and
//! the writing mode.

pub mod cmap;
pub mod encodings;
pub mod glyphlist;
pub mod truetype;

mod cid;
mod simple;

pub use cid::CidFont;
pub use simple::SimpleFont;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};

/// The capability set of an instantiated font.
pub trait Font {
    /// Base font name.
    fn name(&self) -> &str;

    /// Decode a content-stream byte string into CIDs.
    fn decode(&self, bytes: &[u8]) -> Vec<u32>;

    /// Glyph width in 1/1000 em.
    fn char_width(&self, cid: u32) -> f64;

    /// Vertical displacement in 1/1000 em (0 for horizontal fonts).
    fn char_disp(&self, cid: u32) -> f64;

    /// Unicode text for a CID.
    fn to_unicode(&self, cid: u32) -> Result<String>;

    /// Writing mode.
    fn is_vertical(&self) -> bool {
        false
    }

    /// Whether codes span more than one byte.
    fn is_multibyte(&self) -> bool {
        false
    }

    /// Total width of a byte string in 1/1000 em.
    fn string_width(&self, bytes: &[u8]) -> f64 {
        self.decode(bytes).iter().map(|&cid| self.char_width(cid)).sum()
    }
}

/// Width and descriptor data for the built-in fonts we know exactly.
///
/// The fixed-pitch Courier family sets every glyph at 600/1000 em; other
/// standard names fall back to the `FontDescriptor` + `Widths` path.
pub(crate) fn builtin_metrics(base_font: &str) -> Option<(f64, f64)> {
    match base_font {
        "Courier" | "Courier-Bold" | "Courier-Oblique" | "Courier-BoldOblique" => {
            // (constant width, default width)
            Some((600.0, 600.0))
        },
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FontKey {
    Object(u32),
    Name(String),
}

/// Per-document font registry.
///
/// Fonts are keyed by the font dictionary's object id (falling back to the
/// resource name for direct dictionaries) so identical fonts build once.
#[derive(Default)]
pub struct FontRegistry {
    fonts: RefCell<HashMap<FontKey, Rc<dyn Font>>>,
}

impl FontRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or instantiate the font for a resource entry.
    pub fn get_font(
        &self,
        doc: &Document,
        font_id: &str,
        spec: &Object,
    ) -> Result<Rc<dyn Font>> {
        let key = match spec.as_reference() {
            Some(r) => FontKey::Object(r.id),
            None => FontKey::Name(font_id.to_string()),
        };
        if let Some(font) = self.fonts.borrow().get(&key) {
            return Ok(font.clone());
        }

        let spec = doc.dict_value(spec)?;
        let font = self.build_font(doc, font_id, &spec)?;
        self.fonts.borrow_mut().insert(key, font.clone());
        Ok(font)
    }

    /// Dispatch on `Subtype` and build the font.
    fn build_font(&self, doc: &Document, font_id: &str, spec: &Dict) -> Result<Rc<dyn Font>> {
        if doc.options().strict {
            match spec.get("Type").and_then(|o| o.as_name()) {
                Some("Font") | None => {},
                other => {
                    return Err(Error::Font(format!("font {} has /Type {:?}", font_id, other)));
                },
            }
        }
        let subtype = match spec.get("Subtype") {
            Some(s) => doc.name_value(s)?,
            None => return Err(Error::Font(format!("font {}: Subtype is not specified", font_id))),
        };

        log::debug!("building font {} ({})", font_id, subtype);
        match subtype.as_str() {
            "Type1" | "MMType1" => Ok(Rc::new(SimpleFont::type1(doc, spec)?)),
            "TrueType" => Ok(Rc::new(SimpleFont::truetype(doc, spec)?)),
            "Type3" => Ok(Rc::new(SimpleFont::type3(doc, font_id, spec)?)),
            "CIDFontType0" | "CIDFontType2" => Ok(Rc::new(CidFont::new(doc, spec)?)),
            "Type0" => {
                // A composite font wraps exactly one descendant CIDFont;
                // the outer Encoding and ToUnicode take precedence.
                let descendants =
                    doc.list_value(spec.get("DescendantFonts").unwrap_or(&Object::Null))?;
                if descendants.len() != 1 {
                    return Err(Error::Font(format!(
                        "font {}: Type0 with {} descendants",
                        font_id,
                        descendants.len()
                    )));
                }
                let mut subspec = doc.dict_value(&descendants[0])?;
                for key in ["Encoding", "ToUnicode"] {
                    if let Some(v) = spec.get(key) {
                        subspec.insert(key.to_string(), doc.resolve(v)?);
                    }
                }
                self.build_font(doc, font_id, &subspec)
            },
            other => Err(Error::Font(format!("font {}: invalid Subtype {}", font_id, other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::testing::minimal_doc;

    #[test]
    fn test_builtin_metrics_courier() {
        assert_eq!(builtin_metrics("Courier"), Some((600.0, 600.0)));
        assert_eq!(builtin_metrics("Courier-BoldOblique"), Some((600.0, 600.0)));
        assert_eq!(builtin_metrics("Helvetica"), None);
    }

    #[test]
    fn test_registry_caches_by_object_id() {
        let doc = minimal_doc(
            &[(
                3,
                "<< /Type /Font /Subtype /Type1 /BaseFont /Courier /Encoding /WinAnsiEncoding >>",
            )],
            Options::default(),
        );
        let registry = FontRegistry::new();
        let spec = Object::Reference(crate::object::ObjectRef::new(3, 0));
        let a = registry.get_font(&doc, "F1", &spec).unwrap();
        let b = registry.get_font(&doc, "F2", &spec).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_missing_subtype_fails() {
        let doc = minimal_doc(&[], Options::default());
        let registry = FontRegistry::new();
        let spec = Object::Dictionary(Dict::new());
        assert!(matches!(
            registry.get_font(&doc, "F1", &spec),
            Err(Error::Font(_))
        ));
    }

    #[test]
    fn test_type0_requires_single_descendant() {
        let doc = minimal_doc(
            &[(3, "<< /Type /Font /Subtype /Type0 /BaseFont /X /DescendantFonts [] >>")],
            Options::default(),
        );
        let registry = FontRegistry::new();
        let spec = Object::Reference(crate::object::ObjectRef::new(3, 0));
        assert!(matches!(
            registry.get_font(&doc, "F1", &spec),
            Err(Error::Font(_))
        ));
    }
}
