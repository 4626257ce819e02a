//! CID fonts (descendants of Type0 composite fonts).
//!
//! A CID font decodes content bytes through a CMap (named by the outer
//! Type0 `Encoding`), carries widths in the compressed `W`/`W2` form, and
//! resolves Unicode through the first of: a `ToUnicode` stream, a CMap
//! synthesized from an embedded TrueType program under Adobe-Identity
//! coding, or the predefined `<Registry>-<Ordering>-UCS2` map.

use std::collections::HashMap;
use std::sync::Arc;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::fonts::Font;
use crate::fonts::cmap::{CMap, CMapDb, parse_tounicode};
use crate::fonts::truetype::TrueTypeFont;
use crate::object::{Dict, Object};

/// A CIDFontType0 or CIDFontType2 font.
pub struct CidFont {
    base_font: String,
    cid_coding: String,
    cmap: Arc<CMap>,
    to_unicode: Option<Arc<CMap>>,
    widths: HashMap<u32, f64>,
    default_width: f64,
    disps: HashMap<u32, f64>,
    default_disp: f64,
    vertical: bool,
}

impl CidFont {
    /// Build a CID font from its (merged) dictionary.
    pub fn new(doc: &Document, spec: &Dict) -> Result<Self> {
        let base_font = match spec.get("BaseFont") {
            Some(name) => doc.name_value(name)?,
            None => return Err(Error::Font("BaseFont is missing".to_string())),
        };

        let sysinfo = doc.dict_value(spec.get("CIDSystemInfo").unwrap_or(&Object::Null))?;
        let registry = sysinfo
            .get("Registry")
            .map(|o| doc.str_value(o))
            .transpose()?;
        let ordering = sysinfo
            .get("Ordering")
            .map(|o| doc.str_value(o))
            .transpose()?;
        let cid_coding = match (registry, ordering) {
            (Some(r), Some(o)) => format!(
                "{}-{}",
                String::from_utf8_lossy(&r),
                String::from_utf8_lossy(&o)
            ),
            _ => return Err(Error::Font("CIDSystemInfo not properly defined".to_string())),
        };

        let search_path = &doc.options().cmap_search_path;
        let cmap = match spec.get("Encoding") {
            Some(enc) => CMapDb::get_cmap(&doc.name_value(enc)?, search_path)
                .map_err(|e| Error::Font(format!("{}: {}", base_font, e)))?,
            None => {
                if doc.options().strict {
                    return Err(Error::Font(format!("{}: Encoding is missing", base_font)));
                }
                log::warn!("{}: no Encoding, assuming Identity-H", base_font);
                CMapDb::get_cmap("Identity-H", search_path)?
            },
        };

        let descriptor = match spec.get("FontDescriptor") {
            Some(d) => doc.dict_value(d)?,
            None => Dict::new(),
        };
        let font_file = match descriptor.get("FontFile2") {
            Some(obj) => {
                let stream = doc.stream_value(obj)?;
                Some(doc.stream_data(&stream)?)
            },
            None => None,
        };

        let to_unicode = if let Some(obj) = spec.get("ToUnicode") {
            let stream = doc.stream_value(obj)?;
            let data = doc.stream_data(&stream)?;
            Some(Arc::new(parse_tounicode(&data)?))
        } else if cid_coding == "Adobe-Identity" {
            // No ToUnicode and an identity coding: mine the embedded
            // TrueType cmap table, if any.
            match &font_file {
                Some(data) => match TrueTypeFont::parse(base_font.as_str(), data)
                    .and_then(|ttf| ttf.create_unicode_cmap())
                {
                    Ok(cmap) => Some(CMapDb::register(cmap)),
                    Err(e) => {
                        log::debug!("{}: no usable cmap table: {}", base_font, e);
                        None
                    },
                },
                None => None,
            }
        } else {
            match CMapDb::get_cmap(&format!("{}-UCS2", cid_coding), search_path) {
                Ok(cmap) => Some(cmap),
                Err(e) => {
                    log::warn!("{}: no UCS2 map for {}: {}", base_font, cid_coding, e);
                    None
                },
            }
        };

        let vertical = cmap.is_vertical();
        let (widths, default_width, disps, default_disp);
        if vertical {
            let pairs = parse_w2(doc, spec.get("W2"))?;
            widths = pairs.iter().map(|(&cid, &(_, w))| (cid, w)).collect();
            disps = pairs.iter().map(|(&cid, &(d, _))| (cid, d)).collect();
            let dw2 = match spec.get("DW2") {
                Some(v) => {
                    let list = doc.list_value(v)?;
                    let d = list.first().map(|o| doc.num_value(o)).transpose()?;
                    let w = list.get(1).map(|o| doc.num_value(o)).transpose()?;
                    (d.unwrap_or(880.0), w.unwrap_or(-1000.0))
                },
                None => (880.0, -1000.0),
            };
            default_disp = dw2.0;
            default_width = dw2.1;
        } else {
            widths = parse_w(doc, spec.get("W"))?;
            disps = HashMap::new();
            default_disp = 0.0;
            default_width = match spec.get("DW") {
                Some(v) => doc.num_value(v)?,
                None => 1000.0,
            };
        }

        Ok(Self {
            base_font,
            cid_coding,
            cmap,
            to_unicode,
            widths,
            default_width,
            disps,
            default_disp,
            vertical,
        })
    }

    /// The CID coding name (`Registry-Ordering`).
    pub fn cid_coding(&self) -> &str {
        &self.cid_coding
    }
}

impl Font for CidFont {
    fn name(&self) -> &str {
        &self.base_font
    }

    fn decode(&self, bytes: &[u8]) -> Vec<u32> {
        self.cmap.decode(bytes)
    }

    fn char_width(&self, cid: u32) -> f64 {
        self.widths.get(&cid).copied().unwrap_or(self.default_width)
    }

    fn char_disp(&self, cid: u32) -> f64 {
        self.disps.get(&cid).copied().unwrap_or(self.default_disp)
    }

    fn to_unicode(&self, cid: u32) -> Result<String> {
        self.to_unicode
            .as_ref()
            .and_then(|cmap| cmap.to_unicode(cid))
            .ok_or_else(|| Error::UnicodeNotDefined {
                encoding: Some(self.cid_coding.clone()),
                cid,
            })
    }

    fn is_vertical(&self) -> bool {
        self.vertical
    }

    fn is_multibyte(&self) -> bool {
        self.cmap.is_multibyte()
    }
}

/// Parse the compressed `W` width array.
///
/// Two entry forms, freely mixed: `c [w1 w2 ...]` assigns a run starting
/// at CID `c`; `c1 c2 w` assigns a constant across `[c1, c2]`.
fn parse_w(doc: &Document, obj: Option<&Object>) -> Result<HashMap<u32, f64>> {
    let mut widths = HashMap::new();
    let seq = match obj {
        Some(o) => doc.list_value(o)?,
        None => return Ok(widths),
    };

    let mut first: Option<i64> = None;
    let mut second: Option<i64> = None;
    for item in seq {
        let item = doc.resolve(&item)?;
        match (&first, &second, &item) {
            (None, _, _) => first = item.as_integer(),
            (Some(_), None, Object::Integer(n)) => second = Some(*n),
            (Some(c), None, Object::Array(run)) => {
                for (i, w) in run.iter().enumerate() {
                    widths.insert(*c as u32 + i as u32, doc.num_value(w)?);
                }
                first = None;
            },
            (Some(c1), Some(c2), _) => {
                let w = doc.num_value(&item)?;
                for cid in *c1..=*c2 {
                    widths.insert(cid as u32, w);
                }
                first = None;
                second = None;
            },
            _ => {
                log::warn!("malformed W entry: {}", item.type_name());
                first = None;
                second = None;
            },
        }
    }
    Ok(widths)
}

/// Parse `W2`: like `W` but every value is a `[disp width]` pair.
fn parse_w2(doc: &Document, obj: Option<&Object>) -> Result<HashMap<u32, (f64, f64)>> {
    let mut pairs = HashMap::new();
    let seq = match obj {
        Some(o) => doc.list_value(o)?,
        None => return Ok(pairs),
    };

    let read_pair = |doc: &Document, v: &Object| -> Result<Option<(f64, f64)>> {
        let list = doc.list_value(v)?;
        if list.len() != 2 {
            log::warn!("W2 value with {} elements", list.len());
            return Ok(None);
        }
        Ok(Some((doc.num_value(&list[0])?, doc.num_value(&list[1])?)))
    };

    let mut first: Option<i64> = None;
    let mut second: Option<i64> = None;
    for item in seq {
        let item = doc.resolve(&item)?;
        match (&first, &second, &item) {
            (None, _, _) => first = item.as_integer(),
            (Some(_), None, Object::Integer(n)) => second = Some(*n),
            (Some(c), None, Object::Array(run)) => {
                for (i, v) in run.iter().enumerate() {
                    if let Some(pair) = read_pair(doc, v)? {
                        pairs.insert(*c as u32 + i as u32, pair);
                    }
                }
                first = None;
            },
            (Some(c1), Some(c2), _) => {
                if let Some(pair) = read_pair(doc, &item)? {
                    for cid in *c1..=*c2 {
                        pairs.insert(cid as u32, pair);
                    }
                }
                first = None;
                second = None;
            },
            _ => {
                first = None;
                second = None;
            },
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::testing::minimal_doc;

    fn spec_of(doc: &Document, id: u32) -> Dict {
        doc.dict_value(&doc.get_object(id).unwrap()).unwrap()
    }

    fn identity_cid_font(extra: &str) -> (Document, Dict) {
        let body = format!(
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /TestCJK \
             /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
             /Encoding /Identity-H {} >>",
            extra
        );
        let doc = minimal_doc(&[(3, &body)], Options::default());
        let spec = spec_of(&doc, 3);
        (doc, spec)
    }

    #[test]
    fn test_identity_decode_two_bytes_per_cid() {
        let (doc, spec) = identity_cid_font("");
        let font = CidFont::new(&doc, &spec).unwrap();
        assert_eq!(font.decode(&[0x00, 0x41, 0x00, 0x42]), vec![0x41, 0x42]);
        assert!(font.is_multibyte());
        assert!(!font.is_vertical());
        assert_eq!(font.cid_coding(), "Adobe-Identity");
    }

    #[test]
    fn test_default_width_is_1000() {
        let (doc, spec) = identity_cid_font("");
        let font = CidFont::new(&doc, &spec).unwrap();
        assert_eq!(font.char_width(7), 1000.0);
        assert_eq!(font.char_disp(7), 0.0);
    }

    #[test]
    fn test_w_run_form() {
        let (doc, spec) = identity_cid_font("/W [65 [500 600 700]]");
        let font = CidFont::new(&doc, &spec).unwrap();
        assert_eq!(font.char_width(65), 500.0);
        assert_eq!(font.char_width(66), 600.0);
        assert_eq!(font.char_width(67), 700.0);
        assert_eq!(font.char_width(68), 1000.0);
    }

    #[test]
    fn test_w_span_form() {
        let (doc, spec) = identity_cid_font("/DW 750 /W [10 20 425]");
        let font = CidFont::new(&doc, &spec).unwrap();
        assert_eq!(font.char_width(10), 425.0);
        assert_eq!(font.char_width(20), 425.0);
        assert_eq!(font.char_width(21), 750.0);
    }

    #[test]
    fn test_w_mixed_forms() {
        let (doc, spec) = identity_cid_font("/W [1 [100] 5 8 200 12 [300 400]]");
        let font = CidFont::new(&doc, &spec).unwrap();
        assert_eq!(font.char_width(1), 100.0);
        assert_eq!(font.char_width(6), 200.0);
        assert_eq!(font.char_width(8), 200.0);
        assert_eq!(font.char_width(13), 400.0);
    }

    #[test]
    fn test_missing_cidsysteminfo_fails() {
        let doc = minimal_doc(
            &[(
                3,
                "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /X /Encoding /Identity-H >>",
            )],
            Options::default(),
        );
        let spec = spec_of(&doc, 3);
        assert!(matches!(CidFont::new(&doc, &spec), Err(Error::Font(_))));
    }

    #[test]
    fn test_to_unicode_stream() {
        // ToUnicode maps CIDs 0x41/0x42 to A/B
        let cmap_body = "beginbfchar\n<0041> <0041>\n<0042> <0042>\nendbfchar";
        let doc = minimal_doc(
            &[
                (
                    3,
                    "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /TestCJK \
                     /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
                     /Encoding /Identity-H /ToUnicode 4 0 R >>",
                ),
                (
                    4,
                    &format!("<< /Length {} >>\nstream\n{}\nendstream", cmap_body.len(), cmap_body),
                ),
            ],
            Options::default(),
        );
        let spec = spec_of(&doc, 3);
        let font = CidFont::new(&doc, &spec).unwrap();
        assert_eq!(font.to_unicode(0x41).unwrap(), "A");
        assert_eq!(font.to_unicode(0x42).unwrap(), "B");
        assert!(matches!(
            font.to_unicode(0x43),
            Err(Error::UnicodeNotDefined { cid: 0x43, .. })
        ));
    }

    #[test]
    fn test_unicode_not_defined_carries_coding() {
        let (doc, spec) = identity_cid_font("");
        let font = CidFont::new(&doc, &spec).unwrap();
        match font.to_unicode(0x41) {
            Err(Error::UnicodeNotDefined { encoding, cid }) => {
                assert_eq!(encoding.as_deref(), Some("Adobe-Identity"));
                assert_eq!(cid, 0x41);
            },
            other => panic!("expected UnicodeNotDefined, got {:?}", other.map(|_| ())),
        }
    }
}
