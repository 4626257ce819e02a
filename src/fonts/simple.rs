//! Simple fonts: Type1, MMType1, TrueType and Type3.
//!
//! Simple fonts decode one CID per byte. Their Unicode mapping comes from
//! a `ToUnicode` CMap when present, otherwise from the base encoding table
//! (optionally patched by a `Differences` array).

use crate::document::Document;
use crate::error::{Error, Result};
use crate::fonts::cmap::{CMap, parse_tounicode};
use crate::fonts::encodings::{EncodingTable, build_encoding};
use crate::fonts::{Font, builtin_metrics};
use crate::object::{Dict, Object};
use std::collections::HashMap;

/// A simple (single-byte) font.
pub struct SimpleFont {
    base_font: String,
    widths: HashMap<u32, f64>,
    default_width: f64,
    encoding: EncodingTable,
    to_unicode: Option<CMap>,
}

impl SimpleFont {
    /// Build a Type1 or MMType1 font.
    ///
    /// Widths come from the built-in metrics for known base fonts,
    /// otherwise from `FirstChar`/`Widths`.
    pub fn type1(doc: &Document, spec: &Dict) -> Result<Self> {
        let base_font = match spec.get("BaseFont") {
            Some(name) => doc.name_value(name)?,
            None => return Err(Error::Font("BaseFont is missing".to_string())),
        };

        let (widths, default_width) = match builtin_metrics(&base_font) {
            Some((constant, default)) => {
                let mut widths = HashMap::new();
                for code in 0..256u32 {
                    widths.insert(code, constant);
                }
                (widths, default)
            },
            None => Self::widths_from_spec(doc, spec)?,
        };

        Ok(Self {
            base_font,
            widths,
            default_width,
            encoding: Self::encoding_from_spec(doc, spec)?,
            to_unicode: Self::tounicode_from_spec(doc, spec)?,
        })
    }

    /// Build a TrueType font; the dictionary layout matches Type1.
    pub fn truetype(doc: &Document, spec: &Dict) -> Result<Self> {
        Self::type1(doc, spec)
    }

    /// Build a Type3 font. Widths are mandatory; the base font name falls
    /// back to the resource id.
    pub fn type3(doc: &Document, font_id: &str, spec: &Dict) -> Result<Self> {
        let base_font = match spec.get("BaseFont") {
            Some(name) => doc.name_value(name)?,
            None => font_id.to_string(),
        };
        let (widths, default_width) = Self::widths_from_spec(doc, spec)?;
        Ok(Self {
            base_font,
            widths,
            default_width,
            encoding: Self::encoding_from_spec(doc, spec)?,
            to_unicode: Self::tounicode_from_spec(doc, spec)?,
        })
    }

    fn widths_from_spec(doc: &Document, spec: &Dict) -> Result<(HashMap<u32, f64>, f64)> {
        let first_char = match spec.get("FirstChar") {
            Some(v) => doc.int_value(v)?,
            None => 0,
        };
        let width_list = match spec.get("Widths") {
            Some(v) => doc.list_value(v)?,
            None => return Err(Error::Font("Widths is missing".to_string())),
        };
        let mut widths = HashMap::with_capacity(width_list.len());
        for (i, w) in width_list.iter().enumerate() {
            widths.insert(first_char as u32 + i as u32, doc.num_value(w)?);
        }
        let default_width = match spec.get("FontDescriptor") {
            Some(d) => doc
                .dict_value(d)?
                .get("MissingWidth")
                .map(|v| doc.num_value(v))
                .transpose()?
                .unwrap_or(0.0),
            None => 0.0,
        };
        Ok((widths, default_width))
    }

    /// Resolve the encoding: a named base encoding, or a dictionary with
    /// `BaseEncoding` and `Differences`.
    fn encoding_from_spec(doc: &Document, spec: &Dict) -> Result<EncodingTable> {
        match spec.get("Encoding").map(|e| doc.resolve(e)).transpose()? {
            Some(Object::Name(name)) => Ok(build_encoding(&name, None)),
            Some(Object::Dictionary(enc)) => {
                let base = match enc.get("BaseEncoding") {
                    Some(b) => doc.name_value(b)?,
                    None => "StandardEncoding".to_string(),
                };
                let differences = match enc.get("Differences") {
                    Some(d) => {
                        let list = doc.list_value(d)?;
                        let mut resolved = Vec::with_capacity(list.len());
                        for item in list {
                            resolved.push(doc.resolve(&item)?);
                        }
                        Some(resolved)
                    },
                    None => None,
                };
                Ok(build_encoding(&base, differences.as_deref()))
            },
            Some(other) => {
                if doc.options().strict {
                    return Err(Error::Font(format!(
                        "Encoding must be a name or dictionary, found {}",
                        other.type_name()
                    )));
                }
                Ok(build_encoding("StandardEncoding", None))
            },
            None => Ok(build_encoding("StandardEncoding", None)),
        }
    }

    fn tounicode_from_spec(doc: &Document, spec: &Dict) -> Result<Option<CMap>> {
        match spec.get("ToUnicode") {
            Some(obj) => {
                let stream = doc.stream_value(obj)?;
                let data = doc.stream_data(&stream)?;
                Ok(Some(parse_tounicode(&data)?))
            },
            None => Ok(None),
        }
    }
}

impl Font for SimpleFont {
    fn name(&self) -> &str {
        &self.base_font
    }

    fn decode(&self, bytes: &[u8]) -> Vec<u32> {
        bytes.iter().map(|&b| b as u32).collect()
    }

    fn char_width(&self, cid: u32) -> f64 {
        self.widths.get(&cid).copied().unwrap_or(self.default_width)
    }

    fn char_disp(&self, _cid: u32) -> f64 {
        0.0
    }

    fn to_unicode(&self, cid: u32) -> Result<String> {
        if let Some(cmap) = &self.to_unicode {
            return cmap.to_unicode(cid).ok_or(Error::UnicodeNotDefined {
                encoding: None,
                cid,
            });
        }
        self.encoding
            .get(cid as usize)
            .copied()
            .flatten()
            .map(|c| c.to_string())
            .ok_or(Error::UnicodeNotDefined {
                encoding: None,
                cid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::testing::minimal_doc;

    fn type1_spec(doc: &Document, id: u32) -> Dict {
        doc.dict_value(&doc.get_object(id).unwrap()).unwrap()
    }

    #[test]
    fn test_type1_with_widths() {
        let doc = minimal_doc(
            &[(
                3,
                "<< /Type /Font /Subtype /Type1 /BaseFont /TestSans \
                 /FirstChar 65 /LastChar 67 /Widths [500 600 700] \
                 /Encoding /WinAnsiEncoding >>",
            )],
            Options::default(),
        );
        let font = SimpleFont::type1(&doc, &type1_spec(&doc, 3)).unwrap();
        assert_eq!(font.name(), "TestSans");
        assert_eq!(font.char_width(65), 500.0);
        assert_eq!(font.char_width(67), 700.0);
        // Outside the table: default width
        assert_eq!(font.char_width(64), 0.0);
        assert_eq!(font.string_width(b"AB"), 1100.0);
    }

    #[test]
    fn test_courier_builtin_metrics() {
        let doc = minimal_doc(
            &[(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>")],
            Options::default(),
        );
        let font = SimpleFont::type1(&doc, &type1_spec(&doc, 3)).unwrap();
        assert_eq!(font.char_width(b'A' as u32), 600.0);
        assert_eq!(font.string_width(b"abc"), 1800.0);
    }

    #[test]
    fn test_missing_widths_fails() {
        let doc = minimal_doc(
            &[(3, "<< /Type /Font /Subtype /Type1 /BaseFont /NoSuchFont >>")],
            Options::default(),
        );
        assert!(matches!(
            SimpleFont::type1(&doc, &type1_spec(&doc, 3)),
            Err(Error::Font(_))
        ));
    }

    #[test]
    fn test_decode_one_cid_per_byte() {
        let doc = minimal_doc(
            &[(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>")],
            Options::default(),
        );
        let font = SimpleFont::type1(&doc, &type1_spec(&doc, 3)).unwrap();
        assert_eq!(font.decode(b"Hi"), vec![0x48, 0x69]);
        assert!(!font.is_vertical());
        assert!(!font.is_multibyte());
    }

    #[test]
    fn test_to_unicode_via_encoding() {
        let doc = minimal_doc(
            &[(
                3,
                "<< /Type /Font /Subtype /Type1 /BaseFont /Courier \
                 /Encoding /WinAnsiEncoding >>",
            )],
            Options::default(),
        );
        let font = SimpleFont::type1(&doc, &type1_spec(&doc, 3)).unwrap();
        assert_eq!(font.to_unicode(b'A' as u32).unwrap(), "A");
        assert_eq!(font.to_unicode(0x92).unwrap(), "\u{2019}");
        // 0x81 is undefined in WinAnsi
        assert!(matches!(
            font.to_unicode(0x81),
            Err(Error::UnicodeNotDefined { encoding: None, cid: 0x81 })
        ));
    }

    #[test]
    fn test_differences_override() {
        let doc = minimal_doc(
            &[(
                3,
                "<< /Type /Font /Subtype /Type1 /BaseFont /Courier \
                 /Encoding << /BaseEncoding /WinAnsiEncoding \
                 /Differences [65 /bullet] >> >>",
            )],
            Options::default(),
        );
        let font = SimpleFont::type1(&doc, &type1_spec(&doc, 3)).unwrap();
        assert_eq!(font.to_unicode(65).unwrap(), "\u{2022}");
        assert_eq!(font.to_unicode(66).unwrap(), "B");
    }

    #[test]
    fn test_tounicode_overrides_encoding() {
        // ToUnicode stream maps 0x41 to 'Z'
        let doc = minimal_doc(
            &[
                (
                    3,
                    "<< /Type /Font /Subtype /Type1 /BaseFont /Courier \
                     /Encoding /WinAnsiEncoding /ToUnicode 4 0 R >>",
                ),
                (
                    4,
                    "<< /Length 35 >>\nstream\nbeginbfchar\n<0041> <005A>\nendbfchar\nendstream",
                ),
            ],
            Options::default(),
        );
        let font = SimpleFont::type1(&doc, &type1_spec(&doc, 3)).unwrap();
        assert_eq!(font.to_unicode(0x41).unwrap(), "Z");
    }

    #[test]
    fn test_type3_uses_font_id_as_name() {
        let doc = minimal_doc(
            &[(
                3,
                "<< /Type /Font /Subtype /Type3 /FontBBox [0 0 10 10] \
                 /FirstChar 48 /Widths [100 200] >>",
            )],
            Options::default(),
        );
        let spec = type1_spec(&doc, 3);
        let font = SimpleFont::type3(&doc, "F9", &spec).unwrap();
        assert_eq!(font.name(), "F9");
        assert_eq!(font.char_width(48), 100.0);
        assert_eq!(font.char_width(49), 200.0);
    }
}
