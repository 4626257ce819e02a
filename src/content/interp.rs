//! The content-stream virtual machine.
//!
//! Execution is a loop over `operand* operator` groups: operands are
//! pushed onto the argument stack, and each operator keyword dispatches
//! through a static arity table to its handler. Unknown operators fail in
//! strict mode; an operator whose declared arity exceeds the stack is
//! skipped after consuming what was there.

use std::collections::HashMap;
use std::rc::Rc;

use crate::content::graphics::{Matrix, TextState};
use crate::content::TextElement;
use crate::device::Device;
use crate::document::{Document, Page};
use crate::error::{Error, Result};
use crate::fonts::{Font, FontRegistry};
use crate::object::{Dict, Object, Stream};
use crate::parser::{ObjectParser, Parsed};

/// Fixed operand counts for the operator set.
///
/// `SC`/`SCN`/`sc`/`scn` are absent: their arity is the component count of
/// the selected color space and is resolved by the handler.
fn operator_arity(op: &str) -> Option<usize> {
    Some(match op {
        // Graphics state
        "q" | "Q" | "h" | "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" | "W"
        | "W*" | "BT" | "ET" | "BX" | "EX" | "EMC" | "T*" => 0,
        "w" | "J" | "j" | "M" | "ri" | "i" | "gs" | "sh" | "G" | "g" | "CS" | "cs" | "MP"
        | "BMC" | "Tc" | "Tw" | "Tz" | "TL" | "Tr" | "Ts" | "Tj" | "TJ" | "'" | "Do" => 1,
        "d" | "m" | "l" | "DP" | "BDC" | "Td" | "TD" | "Tf" => 2,
        "RG" | "rg" | "\"" => 3,
        "v" | "y" | "re" | "K" | "k" => 4,
        "c" | "cm" | "Tm" => 6,
        _ => return None,
    })
}

/// Content-stream interpreter bound to one device.
pub struct Interpreter<'a, D: Device> {
    doc: &'a Document,
    fonts: &'a FontRegistry,
    device: &'a mut D,
    ctm: Matrix,
    text: TextState,
    gstack: Vec<(Matrix, TextState)>,
    argstack: Vec<Object>,
    fontmap: HashMap<String, Rc<dyn Font>>,
    xobjmap: HashMap<String, Object>,
    csmap: HashMap<String, Vec<Object>>,
    stroke_cs: Option<Vec<Object>>,
    fill_cs: Option<Vec<Object>>,
}

impl<'a, D: Device> Interpreter<'a, D> {
    /// Create an interpreter over a document's resources and a device.
    pub fn new(doc: &'a Document, fonts: &'a FontRegistry, device: &'a mut D) -> Self {
        Self {
            doc,
            fonts,
            device,
            ctm: Matrix::identity(),
            text: TextState::new(),
            gstack: Vec::new(),
            argstack: Vec::new(),
            fontmap: HashMap::new(),
            xobjmap: HashMap::new(),
            csmap: HashMap::new(),
            stroke_cs: None,
            fill_cs: None,
        }
    }

    /// Execute a page's content streams, bracketed by page events.
    pub fn process_page(&mut self, page: &Page) -> Result<()> {
        log::debug!("processing page {}", page.index);
        self.device.begin_page(page);
        let name = format!("page-{}", page.index);
        self.render_contents(&name, &page.resources, &page.contents, Matrix::identity())?;
        self.device.end_page(page);
        Ok(())
    }

    /// Execute a list of content streams against fresh state.
    pub fn render_contents(
        &mut self,
        name: &str,
        resources: &Dict,
        contents: &[Object],
        ctm: Matrix,
    ) -> Result<()> {
        self.init(ctm);
        self.load_resources(resources)?;
        self.device.begin_block(name);
        for content in contents {
            let stream = self.doc.stream_value(content)?;
            let data = self.doc.stream_data(&stream)?;
            self.execute(&data)?;
        }
        self.device.end_block();
        Ok(())
    }

    fn init(&mut self, ctm: Matrix) {
        self.fontmap.clear();
        self.xobjmap.clear();
        self.csmap.clear();
        self.gstack.clear();
        self.argstack.clear();
        self.ctm = ctm;
        self.device.set_ctm(&self.ctm);
        self.text = TextState::new();
        self.stroke_cs = None;
        self.fill_cs = None;
    }

    /// Populate the font, color-space and XObject maps from `Resources`.
    fn load_resources(&mut self, resources: &Dict) -> Result<()> {
        for (kind, value) in resources {
            match kind.as_str() {
                "Font" => {
                    for (font_id, spec) in self.doc.dict_value(value)? {
                        match self.fonts.get_font(self.doc, &font_id, &spec) {
                            Ok(font) => {
                                self.fontmap.insert(font_id, font);
                            },
                            Err(e) if !self.doc.options().strict => {
                                // Missing fonts only matter if Tf binds them
                                log::warn!("cannot build font {}: {}", font_id, e);
                            },
                            Err(e) => return Err(e),
                        }
                    }
                },
                "ColorSpace" => {
                    for (cs_id, spec) in self.doc.dict_value(value)? {
                        let cs = match self.doc.resolve(&spec)? {
                            Object::Array(items) => items,
                            single => vec![single],
                        };
                        self.csmap.insert(cs_id, cs);
                    }
                },
                "XObject" => {
                    for (xobj_id, spec) in self.doc.dict_value(value)? {
                        self.xobjmap.insert(xobj_id, spec);
                    }
                },
                _ => {},
            }
        }
        Ok(())
    }

    /// Run one decoded content stream.
    pub fn execute(&mut self, data: &[u8]) -> Result<()> {
        let strict = self.doc.options().strict;
        let mut parser = ObjectParser::new(data, 0, strict);
        loop {
            match parser.next_object() {
                Ok(Parsed::Object(obj)) => self.argstack.push(obj),
                Ok(Parsed::Keyword { pos, name }) => {
                    if name == "BI" {
                        self.inline_image(&mut parser)?;
                    } else {
                        self.execute_operator(&name, pos)?;
                    }
                },
                Err(e) => {
                    let rest = &data[parser.pos().min(data.len())..];
                    if rest.iter().all(|&b| crate::lexer::is_pdf_whitespace(b)) {
                        break;
                    }
                    if strict {
                        return Err(e);
                    }
                    log::warn!("skipping malformed content at byte {}: {}", parser.pos(), e);
                    parser.seek(parser.pos() + 1);
                },
            }
        }
        Ok(())
    }

    fn execute_operator(&mut self, op: &str, pos: usize) -> Result<()> {
        // Color setters pop as many operands as the bound space has components
        match op {
            "SC" | "SCN" => return self.pop_color_components(op, false),
            "sc" | "scn" => return self.pop_color_components(op, true),
            _ => {},
        }

        let arity = match operator_arity(op) {
            Some(n) => n,
            None => {
                if self.doc.options().strict {
                    return Err(Error::Interpreter(format!(
                        "unknown operator '{}' at byte {}",
                        op, pos
                    )));
                }
                log::warn!("ignoring unknown operator '{}' at byte {}", op, pos);
                return Ok(());
            },
        };
        let available = self.argstack.len();
        let args = self.argstack.split_off(available.saturating_sub(arity));
        if args.len() < arity {
            log::warn!(
                "operator '{}' at byte {} wants {} operands, found {}",
                op,
                pos,
                arity,
                args.len()
            );
            return Ok(());
        }
        self.dispatch(op, args)
    }

    fn dispatch(&mut self, op: &str, args: Vec<Object>) -> Result<()> {
        match op {
            // ---- graphics state ------------------------------------------
            "q" => self.gstack.push((self.ctm, self.text.clone())),
            "Q" => {
                if let Some((ctm, text)) = self.gstack.pop() {
                    self.ctm = ctm;
                    self.text = text;
                    self.device.set_ctm(&self.ctm);
                }
            },
            "cm" => {
                let m = self.matrix_args(&args)?;
                self.ctm = m.mult(&self.ctm);
                self.device.set_ctm(&self.ctm);
            },

            // Path construction/painting, line attributes, clipping and
            // shading consume operands without text-extraction effect.
            "w" | "J" | "j" | "M" | "d" | "ri" | "i" | "gs" | "m" | "l" | "c" | "v" | "y" | "h"
            | "re" | "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" | "W" | "W*"
            | "sh" => {},

            // Marked content and compatibility sections
            "MP" | "DP" | "BMC" | "BDC" | "EMC" | "BX" | "EX" => {},

            // ---- color ---------------------------------------------------
            "CS" => self.stroke_cs = self.lookup_colorspace(&args[0])?,
            "cs" => self.fill_cs = self.lookup_colorspace(&args[0])?,
            "G" => self.stroke_cs = Some(vec![Object::Name("DeviceGray".to_string())]),
            "g" => self.fill_cs = Some(vec![Object::Name("DeviceGray".to_string())]),
            "RG" => self.stroke_cs = Some(vec![Object::Name("DeviceRGB".to_string())]),
            "rg" => self.fill_cs = Some(vec![Object::Name("DeviceRGB".to_string())]),
            "K" => self.stroke_cs = Some(vec![Object::Name("DeviceCMYK".to_string())]),
            "k" => self.fill_cs = Some(vec![Object::Name("DeviceCMYK".to_string())]),

            // ---- text object ---------------------------------------------
            "BT" => self.text.reset_matrix(),
            "ET" => {},

            // ---- text state ----------------------------------------------
            "Tc" => self.text.char_space = self.doc.num_value(&args[0])?,
            "Tw" => self.text.word_space = self.doc.num_value(&args[0])?,
            "Tz" => self.text.scaling = self.doc.num_value(&args[0])?,
            "TL" => self.text.leading = self.doc.num_value(&args[0])?,
            "Tf" => {
                let font_id = self.doc.name_value(&args[0])?;
                self.text.font = Some(
                    self.fontmap
                        .get(&font_id)
                        .cloned()
                        .ok_or_else(|| {
                            Error::Interpreter(format!("undefined font id: {}", font_id))
                        })?,
                );
                self.text.font_size = self.doc.num_value(&args[1])?;
            },
            "Tr" => self.text.render = self.doc.int_value(&args[0])?,
            "Ts" => self.text.rise = self.doc.num_value(&args[0])?,

            // ---- text positioning ----------------------------------------
            "Td" => {
                let (tx, ty) = (self.doc.num_value(&args[0])?, self.doc.num_value(&args[1])?);
                self.text.matrix = self.text.matrix.shifted(tx, ty);
                self.text.line_matrix = (0.0, 0.0);
            },
            "TD" => {
                let (tx, ty) = (self.doc.num_value(&args[0])?, self.doc.num_value(&args[1])?);
                self.text.matrix = self.text.matrix.shifted(tx, ty);
                self.text.leading = -ty;
                self.text.line_matrix = (0.0, 0.0);
            },
            "Tm" => {
                self.text.matrix = self.matrix_args(&args)?;
                self.text.line_matrix = (0.0, 0.0);
            },
            "T*" => self.next_line(),

            // ---- text showing --------------------------------------------
            "Tj" => {
                let seq = vec![TextElement::Str(self.doc.str_value(&args[0])?)];
                self.show_text(seq)?;
            },
            "TJ" => {
                let seq = self.text_sequence(&args[0])?;
                self.show_text(seq)?;
            },
            "'" => {
                self.next_line();
                let seq = vec![TextElement::Str(self.doc.str_value(&args[0])?)];
                self.show_text(seq)?;
            },
            "\"" => {
                self.text.word_space = self.doc.num_value(&args[0])?;
                self.text.char_space = self.doc.num_value(&args[1])?;
                let seq = vec![TextElement::Str(self.doc.str_value(&args[2])?)];
                self.show_text(seq)?;
            },

            // ---- XObjects ------------------------------------------------
            "Do" => {
                let name = self.doc.name_value(&args[0])?;
                self.invoke_xobject(&name)?;
            },

            _ => unreachable!("operator '{}' has an arity but no handler", op),
        }
        Ok(())
    }

    fn matrix_args(&self, args: &[Object]) -> Result<Matrix> {
        Ok(Matrix::new(
            self.doc.num_value(&args[0])?,
            self.doc.num_value(&args[1])?,
            self.doc.num_value(&args[2])?,
            self.doc.num_value(&args[3])?,
            self.doc.num_value(&args[4])?,
            self.doc.num_value(&args[5])?,
        ))
    }

    fn next_line(&mut self) {
        self.text.matrix = self.text.matrix.shifted(0.0, self.text.leading);
        self.text.line_matrix = (0.0, 0.0);
    }

    fn text_sequence(&self, arg: &Object) -> Result<Vec<TextElement>> {
        let items = self.doc.list_value(arg)?;
        let mut seq = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Object::String(s) => seq.push(TextElement::Str(s)),
                Object::Integer(n) => seq.push(TextElement::Adjust(n as f64)),
                Object::Real(r) => seq.push(TextElement::Adjust(r)),
                other => log::warn!("ignoring {} in TJ array", other.type_name()),
            }
        }
        Ok(seq)
    }

    /// Common path of `Tj`, `TJ`, `'` and `"`: compute the advance, emit
    /// the string, and move the line matrix along the writing direction.
    fn show_text(&mut self, seq: Vec<TextElement>) -> Result<()> {
        let font = match &self.text.font {
            Some(font) => font.clone(),
            None => {
                if self.doc.options().strict {
                    return Err(Error::Interpreter("text shown with no font".to_string()));
                }
                log::warn!("text shown with no font, skipping");
                return Ok(());
            },
        };

        let mut bytes = Vec::new();
        let mut adjustment = 0.0;
        for element in &seq {
            match element {
                TextElement::Str(s) => bytes.extend_from_slice(s),
                TextElement::Adjust(n) => adjustment += n,
            }
        }
        let cids = font.decode(&bytes);
        let width: f64 = cids.iter().map(|&cid| font.char_width(cid)).sum();
        // Word spacing applies to the single-byte space code only; the
        // codes of a multi-byte font never trigger it
        let spaces = if font.is_multibyte() {
            0.0
        } else {
            cids.iter().filter(|&&cid| cid == 32).count() as f64
        };

        let ts = &self.text;
        let advance = ((width - adjustment) / 1000.0 * ts.font_size
            + bytes.len() as f64 * ts.char_space
            + spaces * ts.word_space)
            * ts.scaling
            / 100.0;

        let (lx, ly) = ts.line_matrix;
        let matrix = ts.matrix.shifted(lx, ly);
        self.device.render_string(&self.text, &matrix, advance, &seq);

        let (mut lx, mut ly) = self.text.line_matrix;
        if font.is_vertical() {
            ly += advance;
        } else {
            lx += advance;
        }
        self.text.line_matrix = (lx, ly);
        Ok(())
    }

    fn lookup_colorspace(&self, arg: &Object) -> Result<Option<Vec<Object>>> {
        let name = self.doc.name_value(arg)?;
        if let Some(cs) = self.csmap.get(&name) {
            return Ok(Some(cs.clone()));
        }
        match name.as_str() {
            "DeviceGray" | "DeviceRGB" | "DeviceCMYK" | "Pattern" => {
                Ok(Some(vec![Object::Name(name)]))
            },
            _ => {
                log::warn!("undefined color space {}", name);
                Ok(None)
            },
        }
    }

    /// Pop the component count of the selected color space.
    fn pop_color_components(&mut self, op: &str, fill: bool) -> Result<()> {
        let cs = if fill { &self.fill_cs } else { &self.stroke_cs };
        let count = match cs {
            Some(cs) => self.colorspace_components(cs)?,
            None => {
                if self.doc.options().strict {
                    return Err(Error::Interpreter(format!(
                        "{} with no color space selected",
                        op
                    )));
                }
                log::warn!("{} with no color space selected", op);
                0
            },
        };
        let available = self.argstack.len();
        self.argstack.truncate(available.saturating_sub(count));
        Ok(())
    }

    /// Number of color components of a color-space value.
    fn colorspace_components(&self, cs: &[Object]) -> Result<usize> {
        let family = match cs.first() {
            Some(obj) => self.doc.name_value(obj)?,
            None => return Ok(0),
        };
        Ok(match family.as_str() {
            "DeviceGray" | "CalGray" | "Separation" | "Indexed" | "Pattern" => 1,
            "DeviceRGB" | "CalRGB" | "Lab" => 3,
            "DeviceCMYK" => 4,
            "ICCBased" => {
                let stream = self.doc.stream_value(cs.get(1).unwrap_or(&Object::Null))?;
                let n = stream
                    .dict
                    .get("N")
                    .map(|o| self.doc.int_value(o))
                    .transpose()?
                    .unwrap_or(1);
                n.max(0) as usize
            },
            "DeviceN" => self
                .doc
                .list_value(cs.get(1).unwrap_or(&Object::Null))?
                .len(),
            other => {
                log::warn!("unknown color space family {}", other);
                1
            },
        })
    }

    /// `Do`: execute a form in a nested interpreter or report an image.
    fn invoke_xobject(&mut self, name: &str) -> Result<()> {
        let spec = self
            .xobjmap
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Interpreter(format!("undefined xobject id: {}", name)))?;
        let stream = self.doc.stream_value(&spec)?;

        match stream.dict.get("Subtype").and_then(|o| o.as_name()) {
            Some("Form") => {
                log::debug!("executing form xobject {}", name);
                let bbox = match stream.dict.get("BBox") {
                    Some(obj) => {
                        let list = self.doc.list_value(obj)?;
                        let mut rect = [0.0; 4];
                        for (i, v) in list.iter().take(4).enumerate() {
                            rect[i] = self.doc.num_value(v)?;
                        }
                        rect
                    },
                    None => [0.0; 4],
                };
                let matrix = match stream.dict.get("Matrix") {
                    Some(obj) => {
                        let list = self.doc.list_value(obj)?;
                        if list.len() == 6 {
                            self.matrix_args(&list)?
                        } else {
                            Matrix::identity()
                        }
                    },
                    None => Matrix::identity(),
                };
                let resources = match stream.dict.get("Resources") {
                    Some(obj) => self.doc.dict_value(obj)?,
                    None => {
                        log::warn!("form {} has no Resources", name);
                        Dict::new()
                    },
                };

                self.device.begin_figure(name, bbox);
                {
                    let mut inner =
                        Interpreter::new(self.doc, self.fonts, &mut *self.device);
                    inner.render_contents(
                        name,
                        &resources,
                        std::slice::from_ref(&Object::Stream(stream.clone())),
                        matrix,
                    )?;
                }
                self.device.end_figure(name);
            },
            Some("Image") => {
                let width = stream
                    .dict
                    .get("Width")
                    .map(|o| self.doc.int_value(o))
                    .transpose()?
                    .unwrap_or(0);
                let height = stream
                    .dict
                    .get("Height")
                    .map(|o| self.doc.int_value(o))
                    .transpose()?
                    .unwrap_or(0);
                self.device.render_image(&stream, (width, height), &self.ctm);
            },
            other => {
                log::warn!("xobject {} has subtype {:?}", name, other);
            },
        }
        Ok(())
    }

    /// Consume an inline image: `BI <entries> ID <bytes> EI`.
    fn inline_image(&mut self, parser: &mut ObjectParser<'_>) -> Result<()> {
        let mut dict = Dict::new();
        loop {
            match parser.next_object() {
                Ok(Parsed::Keyword { ref name, .. }) if name == "ID" => break,
                Ok(Parsed::Object(Object::Name(key))) => match parser.next_object()? {
                    Parsed::Object(value) => {
                        dict.insert(key, value);
                    },
                    Parsed::Keyword { ref name, .. } if name == "ID" => break,
                    Parsed::Keyword { pos, name } => {
                        return Err(Error::Syntax {
                            offset: pos,
                            reason: format!("unexpected '{}' in inline image", name),
                        });
                    },
                },
                Ok(_) => {},
                Err(e) => return Err(e),
            }
        }

        // Binary data runs from one byte past ID to a whitespace-delimited EI
        let buf = parser.buffer();
        let start = (parser.pos() + 1).min(buf.len());
        let mut end = buf.len();
        let mut after = buf.len();
        let mut i = start;
        while i + 2 < buf.len() {
            if buf[i].is_ascii_whitespace() && &buf[i + 1..i + 3] == b"EI" {
                end = i;
                after = i + 3;
                break;
            }
            i += 1;
        }
        parser.seek(after);

        let width = dict
            .get("W")
            .or_else(|| dict.get("Width"))
            .and_then(|o| o.as_integer())
            .unwrap_or(0);
        let height = dict
            .get("H")
            .or_else(|| dict.get("Height"))
            .and_then(|o| o.as_integer())
            .unwrap_or(0);
        let image = Stream::new(dict, bytes::Bytes::copy_from_slice(&buf[start..end]));
        self.device.render_image(&image, (width, height), &self.ctm);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::device::Device;
    use crate::testing::minimal_doc;

    /// Device that records render_string calls.
    #[derive(Default)]
    struct Recorder {
        strings: Vec<(String, f64, f64, f64, f64)>, // text-ish, e, f, size, advance
        blocks: Vec<String>,
        figures: Vec<String>,
        ctms: Vec<Matrix>,
    }

    impl Device for Recorder {
        fn set_ctm(&mut self, ctm: &Matrix) {
            self.ctms.push(*ctm);
        }
        fn begin_block(&mut self, name: &str) {
            self.blocks.push(name.to_string());
        }
        fn begin_figure(&mut self, name: &str, _bbox: [f64; 4]) {
            self.figures.push(name.to_string());
        }
        fn render_string(
            &mut self,
            ts: &TextState,
            matrix: &Matrix,
            advance: f64,
            seq: &[TextElement],
        ) {
            let mut text = String::new();
            for e in seq {
                if let TextElement::Str(s) = e {
                    text.push_str(&String::from_utf8_lossy(s));
                }
            }
            self.strings
                .push((text, matrix.e, matrix.f, ts.font_size, advance));
        }
    }

    fn font_doc() -> Document {
        minimal_doc(
            &[(
                3,
                "<< /Type /Font /Subtype /Type1 /BaseFont /Courier /Encoding /WinAnsiEncoding >>",
            )],
            Options::default(),
        )
    }

    fn run(doc: &Document, content: &[u8]) -> Recorder {
        let fonts = FontRegistry::new();
        let mut device = Recorder::default();
        let mut interp = Interpreter::new(doc, &fonts, &mut device);
        let resources: Dict = doc
            .dict_value(
                &crate::parser::ObjectParser::new(
                    b"<< /Font << /F1 3 0 R >> >>",
                    0,
                    false,
                )
                .expect_object()
                .unwrap(),
            )
            .unwrap();
        interp.init(Matrix::identity());
        interp.load_resources(&resources).unwrap();
        interp.execute(content).unwrap();
        device
    }

    #[test]
    fn test_hello_world() {
        let doc = font_doc();
        let device = run(&doc, b"BT /F1 12 Tf 100 200 Td (Hello) Tj ET");
        assert_eq!(device.strings.len(), 1);
        let (text, e, f, size, advance) = &device.strings[0];
        assert_eq!(text, "Hello");
        assert_eq!(*e, 100.0);
        assert_eq!(*f, 200.0);
        assert_eq!(*size, 12.0);
        // Courier: 5 glyphs x 600/1000 x 12pt
        assert_eq!(*advance, 36.0);
    }

    #[test]
    fn test_tj_adjustment_advance() {
        let doc = font_doc();
        let device = run(&doc, b"BT /F1 10 Tf 0 0 Td [(A) -200 (B)] TJ ET");
        assert_eq!(device.strings.len(), 1);
        let advance = device.strings[0].4;
        // (600 + 600 - (-200)) / 1000 * 10
        assert_eq!(advance, 14.0);
    }

    #[test]
    fn test_line_matrix_advances_between_shows() {
        let doc = font_doc();
        let device = run(&doc, b"BT /F1 10 Tf 50 50 Td (AB) Tj (C) Tj ET");
        assert_eq!(device.strings.len(), 2);
        // Second show starts after the first advance (2 x 6pt)
        assert_eq!(device.strings[0].1, 50.0);
        assert_eq!(device.strings[1].1, 62.0);
    }

    #[test]
    fn test_word_space_counts_spaces() {
        let doc = font_doc();
        let device = run(&doc, b"BT /F1 10 Tf 2 Tw 0 0 Td (a b) Tj ET");
        // 3 glyphs x 6 + one space x 2
        assert_eq!(device.strings[0].4, 20.0);
    }

    #[test]
    fn test_word_space_ignores_multibyte_codes() {
        // 0x20 bytes inside the 2-byte codes of a composite font must
        // not trigger word spacing
        let doc = minimal_doc(
            &[
                (
                    3,
                    "<< /Type /Font /Subtype /Type0 /BaseFont /TestCJK \
                     /Encoding /Identity-H /DescendantFonts [4 0 R] >>",
                ),
                (
                    4,
                    "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /TestCJK \
                     /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
                     /DW 1000 >>",
                ),
            ],
            Options::default(),
        );
        let device = run(&doc, b"BT /F1 10 Tf 5 Tw 0 0 Td <00202041> Tj ET");
        // Two CIDs (0x0020 and 0x2041) at the default width of 1000 each
        assert_eq!(device.strings[0].4, 20.0);
    }

    #[test]
    fn test_scaling_applies() {
        let doc = font_doc();
        let device = run(&doc, b"BT /F1 10 Tf 50 Tz 0 0 Td (A) Tj ET");
        assert_eq!(device.strings[0].4, 3.0);
    }

    #[test]
    fn test_td_then_quote_moves_line() {
        let doc = font_doc();
        let device = run(&doc, b"BT /F1 10 Tf 14 TL 0 100 Td (x) Tj ET BT /F1 10 Tf 0 100 Td (y) ' ET");
        // The quote operator moves down by the leading before showing
        assert_eq!(device.strings[1].2, 100.0 + 14.0);
    }

    #[test]
    fn test_undefined_font_is_fatal() {
        let doc = font_doc();
        let fonts = FontRegistry::new();
        let mut device = Recorder::default();
        let mut interp = Interpreter::new(&doc, &fonts, &mut device);
        interp.init(Matrix::identity());
        let result = interp.execute(b"BT /F9 12 Tf (x) Tj ET");
        assert!(matches!(result, Err(Error::Interpreter(_))));
    }

    #[test]
    fn test_save_restore_round_trip() {
        let doc = font_doc();
        let device = run(
            &doc,
            b"BT /F1 12 Tf ET q 2 0 0 2 0 0 cm Q BT /F1 12 Tf 10 10 Td (A) Tj ET",
        );
        // After Q the CTM is identity again, so Td lands untransformed
        assert_eq!(device.strings[0].1, 10.0);
        let last = device.ctms.last().unwrap();
        assert_eq!(*last, Matrix::identity());
    }

    #[test]
    fn test_cm_multiplies_ctm() {
        let doc = font_doc();
        let device = run(&doc, b"2 0 0 2 0 0 cm 1 0 0 1 5 5 cm");
        let last = device.ctms.last().unwrap();
        // translate(5,5) then scale(2): e = 10
        assert_eq!((last.a, last.e, last.f), (2.0, 10.0, 10.0));
    }

    #[test]
    fn test_unknown_operator_lenient_vs_strict() {
        let doc = font_doc();
        let fonts = FontRegistry::new();
        let mut device = Recorder::default();
        let mut interp = Interpreter::new(&doc, &fonts, &mut device);
        interp.init(Matrix::identity());
        assert!(interp.execute(b"1 2 frobnicate").is_ok());

        let strict_doc = minimal_doc(&[], Options::strict());
        let fonts = FontRegistry::new();
        let mut device = Recorder::default();
        let mut interp = Interpreter::new(&strict_doc, &fonts, &mut device);
        interp.init(Matrix::identity());
        assert!(matches!(
            interp.execute(b"1 2 frobnicate"),
            Err(Error::Interpreter(_))
        ));
    }

    #[test]
    fn test_malformed_arity_skips_operator() {
        let doc = font_doc();
        // Td with a single operand is skipped, so Tj shows at the origin
        let device = run(&doc, b"BT /F1 10 Tf 5 Td (A) Tj ET");
        assert_eq!(device.strings[0].1, 0.0);
    }

    #[test]
    fn test_color_operators_pop_components() {
        let doc = font_doc();
        // scn pops one component for a Separation-like space bound via g
        let device = run(&doc, b"0.5 g 0.1 0.2 0.3 rg 1 0 0 RG BT /F1 10 Tf 0 0 Td (A) Tj ET");
        assert_eq!(device.strings.len(), 1);
    }

    #[test]
    fn test_scn_pops_by_colorspace() {
        let doc = font_doc();
        let fonts = FontRegistry::new();
        let mut device = Recorder::default();
        let mut interp = Interpreter::new(&doc, &fonts, &mut device);
        interp.init(Matrix::identity());
        // DeviceRGB bound: scn pops 3 operands, leaving a balanced stack
        interp.execute(b"0 0 0 rg 0.1 0.2 0.3 scn").unwrap();
        assert!(interp.argstack.is_empty());
    }

    #[test]
    fn test_bt_et_stack_discipline() {
        let doc = font_doc();
        let fonts = FontRegistry::new();
        let mut device = Recorder::default();
        let mut interp = Interpreter::new(&doc, &fonts, &mut device);
        let resources: Dict = doc
            .dict_value(
                &crate::parser::ObjectParser::new(
                    b"<< /Font << /F1 3 0 R >> >>",
                    0,
                    false,
                )
                .expect_object()
                .unwrap(),
            )
            .unwrap();
        interp.init(Matrix::identity());
        interp.load_resources(&resources).unwrap();
        interp
            .execute(b"BT /F1 10 Tf 1 2 Td (A) Tj ET")
            .unwrap();
        assert!(interp.argstack.is_empty());
    }

    #[test]
    fn test_inline_image_consumed() {
        let doc = font_doc();
        // The binary payload must not derail the operator stream
        let device = run(&doc, b"BI /W 2 /H 2 ID \x00\x01\x02\x03 EI BT /F1 10 Tf 0 0 Td (A) Tj ET");
        assert_eq!(device.strings.len(), 1);
    }
}
