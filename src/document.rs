//! Document: random-access object resolver and page tree walker.
//!
//! A [`Document`] owns the file bytes, the ordered cross-reference list,
//! and a cache of resolved objects. Objects materialize on demand: direct
//! entries seek to their file offset, packed entries decode their object
//! stream once and index into it. The page tree is walked lazily,
//! inheriting `Resources`, `MediaBox`, `CropBox` and `Rotate` from the
//! nearest ancestor that defines them.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use bytes::Bytes;

use crate::config::Options;
use crate::decoders::{self, DecodeParams};
use crate::error::{Error, Result};
use crate::object::{Dict, Object, Stream};
use crate::parser::ObjectParser;
use crate::xref::{XRefEntry, XRefSection, read_xref_chain};

/// Attributes a Pages node passes down to its kids.
const INHERITABLE_ATTRS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// An in-memory PDF document.
pub struct Document {
    buf: Vec<u8>,
    options: Options,
    version: (u8, u8),
    xrefs: Vec<XRefSection>,
    catalog: Dict,
    cache: RefCell<HashMap<u32, Object>>,
    objstm_cache: RefCell<HashMap<u32, Rc<Vec<(u32, Object)>>>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("xref_sections", &self.xrefs.len())
            .field("cached_objects", &self.cache.borrow().len())
            .finish()
    }
}

impl Document {
    /// Build a document from file bytes.
    ///
    /// Reads the header version, assembles the xref chain, locates the
    /// catalog and rejects encrypted files with
    /// [`Error::EncryptedNotSupported`].
    pub fn new(buf: Vec<u8>, options: Options) -> Result<Self> {
        let version = parse_header(&buf, options.strict)?;
        let xrefs = read_xref_chain(&buf, options.strict)?;

        for xref in &xrefs {
            if xref.trailer().contains_key("Encrypt") {
                return Err(Error::EncryptedNotSupported);
            }
        }

        let root = xrefs
            .iter()
            .find_map(|x| x.trailer().get("Root"))
            .cloned()
            .ok_or_else(|| Error::Value("no /Root object".to_string()))?;

        let mut doc = Self {
            buf,
            options,
            version,
            xrefs,
            catalog: Dict::new(),
            cache: RefCell::new(HashMap::new()),
            objstm_cache: RefCell::new(HashMap::new()),
        };

        let catalog = doc.dict_value(&root)?;
        if doc.options.strict {
            match catalog.get("Type").and_then(|o| o.as_name()) {
                Some("Catalog") => {},
                other => {
                    return Err(Error::Value(format!("catalog has /Type {:?}", other)));
                },
            }
        }
        doc.catalog = catalog;
        Ok(doc)
    }

    /// Open a document from a file path with the given options.
    pub fn open_with(path: impl AsRef<Path>, options: Options) -> Result<Self> {
        Self::new(std::fs::read(path)?, options)
    }

    /// Open a document from a file path with default (lenient) options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, Options::default())
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The catalog (Root) dictionary.
    pub fn catalog(&self) -> &Dict {
        &self.catalog
    }

    /// The newest trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        self.xrefs[0].trailer()
    }

    /// The options this document was opened with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    // ========================================================================
    // Object resolution
    // ========================================================================

    /// Materialize object `id`, consulting the cache first.
    pub fn get_object(&self, id: u32) -> Result<Object> {
        if id == 0 {
            if self.options.strict {
                return Err(Error::Value("object id 0 is reserved".to_string()));
            }
            return Ok(Object::Null);
        }
        if let Some(obj) = self.cache.borrow().get(&id) {
            return Ok(obj.clone());
        }

        let entry = self.xrefs.iter().find_map(|x| x.locate(id)).copied();
        let obj = match entry {
            None => {
                if self.options.strict {
                    return Err(Error::Value(format!("cannot locate object {}", id)));
                }
                log::warn!("object {} not in any xref section", id);
                return Ok(Object::Null);
            },
            Some(XRefEntry::Free) => {
                if self.options.strict {
                    return Err(Error::Value(format!("object {} is free", id)));
                }
                return Ok(Object::Null);
            },
            Some(XRefEntry::Offset(pos)) => self.load_at_offset(id, pos as usize)?,
            Some(XRefEntry::InStream { container, index }) => {
                self.load_from_objstm(id, container, index)?
            },
        };

        log::debug!("resolved object {}: {}", id, obj.type_name());
        self.cache.borrow_mut().insert(id, obj.clone());
        Ok(obj)
    }

    /// Read `id gen obj <object> endobj` at a file offset.
    fn load_at_offset(&self, id: u32, pos: usize) -> Result<Object> {
        if pos >= self.buf.len() {
            return Err(Error::Value(format!("object {} offset {} beyond EOF", id, pos)));
        }
        let mut parser = ObjectParser::new(&self.buf, pos, self.options.strict);
        let stored_id = parser.expect_object()?.as_integer();
        let _gen = parser.expect_object()?.as_integer();
        parser.expect_keyword("obj").map_err(|_| Error::Syntax {
            offset: pos,
            reason: format!("invalid obj framing for object {}", id),
        })?;
        if stored_id != Some(id as i64) {
            if self.options.strict {
                return Err(Error::Syntax {
                    offset: pos,
                    reason: format!("expected object {}, found {:?}", id, stored_id),
                });
            }
            log::warn!("object id mismatch at byte {}: want {}, found {:?}", pos, id, stored_id);
        }
        parser.expect_object()
    }

    /// Pull the `index`-th object out of object stream `container`.
    fn load_from_objstm(&self, id: u32, container: u32, index: u32) -> Result<Object> {
        let objects = self.objstm_objects(container)?;
        match objects.get(index as usize) {
            Some((stored_id, obj)) => {
                if *stored_id != id {
                    log::warn!(
                        "object stream {} slot {} holds object {}, expected {}",
                        container,
                        index,
                        stored_id,
                        id
                    );
                }
                Ok(obj.clone())
            },
            None => {
                if self.options.strict {
                    Err(Error::Value(format!(
                        "object stream {} has no slot {}",
                        container, index
                    )))
                } else {
                    log::warn!("object stream {} has no slot {}", container, index);
                    Ok(Object::Null)
                }
            },
        }
    }

    /// Decode and parse an object stream, cached per container.
    ///
    /// The decoded payload starts with `N` pairs of integers
    /// `(object id, offset)`; the n-th object begins at `First + offset_n`.
    fn objstm_objects(&self, container: u32) -> Result<Rc<Vec<(u32, Object)>>> {
        if let Some(objs) = self.objstm_cache.borrow().get(&container) {
            return Ok(objs.clone());
        }

        let stream = self.stream_value(&self.get_object(container)?)?;
        match stream.dict.get("Type").and_then(|o| o.as_name()) {
            Some("ObjStm") => {},
            other => {
                if self.options.strict {
                    return Err(Error::Syntax {
                        offset: 0,
                        reason: format!("object {} is not an ObjStm: /Type {:?}", container, other),
                    });
                }
                log::warn!("container {} lacks /Type /ObjStm", container);
            },
        }
        let n = match stream.dict.get("N") {
            Some(obj) => self.int_value(obj)?,
            None if self.options.strict => {
                return Err(Error::Syntax {
                    offset: 0,
                    reason: format!("object stream {} has no /N", container),
                });
            },
            None => 0,
        };
        let first = self.int_value(stream.dict.get("First").unwrap_or(&Object::Null))?;
        if !(0..=1_000_000).contains(&n) || first < 0 {
            return Err(Error::Value(format!(
                "object stream {}: bad /N {} or /First {}",
                container, n, first
            )));
        }
        let (n, first) = (n as usize, first as usize);

        let data = self.stream_data(&stream)?;
        if data.len() < first {
            return Err(Error::Value(format!(
                "object stream {}: data shorter than /First",
                container
            )));
        }

        // Leading pairs: (object id, offset from First)
        let mut pairs = Vec::with_capacity(n);
        let mut pair_parser = ObjectParser::new(&data[..first], 0, self.options.strict);
        for i in 0..n {
            let id = pair_parser.expect_object().and_then(|o| {
                o.as_integer().ok_or_else(|| {
                    Error::Value(format!("object stream {}: pair {} id not an integer", container, i))
                })
            })?;
            let offset = pair_parser.expect_object().and_then(|o| {
                o.as_integer().ok_or_else(|| {
                    Error::Value(format!(
                        "object stream {}: pair {} offset not an integer",
                        container, i
                    ))
                })
            })?;
            pairs.push((id as u32, offset as usize));
        }

        let mut objects = Vec::with_capacity(n);
        for (id, offset) in pairs {
            let at = first + offset;
            if at >= data.len() {
                log::warn!("object stream {}: object {} offset beyond payload", container, id);
                objects.push((id, Object::Null));
                continue;
            }
            let mut parser = ObjectParser::new(&data, at, self.options.strict);
            match parser.expect_object() {
                Ok(obj) => objects.push((id, obj)),
                Err(e) => {
                    if self.options.strict {
                        return Err(e);
                    }
                    log::warn!("object stream {}: object {} unparseable: {}", container, id, e);
                    objects.push((id, Object::Null));
                },
            }
        }

        let objects = Rc::new(objects);
        self.objstm_cache
            .borrow_mut()
            .insert(container, objects.clone());
        Ok(objects)
    }

    /// Chase reference chains until a non-reference value is reached.
    ///
    /// Resolution is idempotent: resolving an already-resolved value
    /// returns it unchanged.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        let mut depth = 0;
        while let Object::Reference(r) = current {
            depth += 1;
            if depth > 128 {
                return Err(Error::Value(format!("reference chain too deep at {}", r)));
            }
            current = self.get_object(r.id)?;
        }
        Ok(current)
    }

    // ========================================================================
    // Coercion helpers (strict/lenient policy lives here)
    // ========================================================================

    fn coerce_err<T>(&self, expected: &'static str, found: &Object, neutral: T) -> Result<T> {
        if self.options.strict {
            Err(Error::Type {
                expected,
                found: found.type_name(),
            })
        } else {
            Ok(neutral)
        }
    }

    /// Resolve and coerce to integer (lenient default 0).
    pub fn int_value(&self, obj: &Object) -> Result<i64> {
        let v = self.resolve(obj)?;
        match v.as_integer() {
            Some(i) => Ok(i),
            None => self.coerce_err("Integer", &v, 0),
        }
    }

    /// Resolve and coerce to a number (lenient default 0.0).
    pub fn num_value(&self, obj: &Object) -> Result<f64> {
        let v = self.resolve(obj)?;
        match v.as_number() {
            Some(n) => Ok(n),
            None => self.coerce_err("Number", &v, 0.0),
        }
    }

    /// Resolve and coerce to string bytes (lenient default empty).
    pub fn str_value(&self, obj: &Object) -> Result<Vec<u8>> {
        let v = self.resolve(obj)?;
        match v {
            Object::String(s) => Ok(s),
            other => self.coerce_err("String", &other, Vec::new()),
        }
    }

    /// Resolve and coerce to a name (lenient default empty).
    pub fn name_value(&self, obj: &Object) -> Result<String> {
        let v = self.resolve(obj)?;
        match v {
            Object::Name(s) => Ok(s),
            other => self.coerce_err("Name", &other, String::new()),
        }
    }

    /// Resolve and coerce to an array (lenient default empty).
    pub fn list_value(&self, obj: &Object) -> Result<Vec<Object>> {
        let v = self.resolve(obj)?;
        match v {
            Object::Array(a) => Ok(a),
            other => self.coerce_err("Array", &other, Vec::new()),
        }
    }

    /// Resolve and coerce to a dictionary (lenient default empty).
    ///
    /// Streams coerce to their dictionary.
    pub fn dict_value(&self, obj: &Object) -> Result<Dict> {
        let v = self.resolve(obj)?;
        match v {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(s.dict),
            other => self.coerce_err("Dictionary", &other, Dict::new()),
        }
    }

    /// Resolve and coerce to a stream (lenient default empty stream).
    pub fn stream_value(&self, obj: &Object) -> Result<Stream> {
        let v = self.resolve(obj)?;
        match v {
            Object::Stream(s) => Ok(s),
            other => self.coerce_err("Stream", &other, Stream::new(Dict::new(), Bytes::new())),
        }
    }

    // ========================================================================
    // Stream decoding
    // ========================================================================

    /// Decode a stream's payload through its filter pipeline, memoized.
    pub fn stream_data(&self, stream: &Stream) -> Result<Bytes> {
        if let Some(data) = stream.decoded.get() {
            return Ok(data.clone());
        }

        let filters = match stream.dict.get("Filter") {
            Some(f) => decoders::filter_names(&self.resolve(f)?),
            None => Vec::new(),
        };
        let params = match stream.dict.get("DecodeParms") {
            Some(p) => {
                let resolved = self.resolve(p)?;
                let dict = match &resolved {
                    Object::Dictionary(d) => Some(d.clone()),
                    // An array of parameter dictionaries parallels the
                    // filter array; only Flate is supported, take the first.
                    Object::Array(a) => a.iter().find_map(|o| o.as_dict().cloned()),
                    _ => None,
                };
                match dict {
                    Some(d) => {
                        let predictor = d
                            .get("Predictor")
                            .map(|o| self.int_value(o))
                            .transpose()?
                            .unwrap_or(1);
                        let columns = d
                            .get("Columns")
                            .map(|o| self.int_value(o))
                            .transpose()?
                            .unwrap_or(1);
                        if predictor == 12 && !d.contains_key("Columns") {
                            return Err(Error::Value(
                                "Columns undefined for predictor 12".to_string(),
                            ));
                        }
                        Some(DecodeParams {
                            predictor,
                            columns: columns.max(0) as usize,
                        })
                    },
                    None => None,
                }
            },
            None => None,
        };

        let decoded = decoders::decode_stream(
            stream.raw(),
            &filters,
            params.as_ref(),
            self.options.strict,
        )?;
        let decoded = Bytes::from(decoded);
        let _ = stream.decoded.set(decoded.clone());
        Ok(decoded)
    }

    // ========================================================================
    // Page tree
    // ========================================================================

    /// Lazily iterate the page tree in document order.
    pub fn pages(&self) -> Pages<'_> {
        let root = self
            .catalog
            .get("Pages")
            .cloned()
            .unwrap_or(Object::Null);
        let mut inherited = Dict::new();
        for key in INHERITABLE_ATTRS {
            if let Some(v) = self.catalog.get(key) {
                inherited.insert(key.to_string(), v.clone());
            }
        }
        Pages {
            doc: self,
            stack: vec![(root, inherited)],
            visited: HashSet::new(),
            next_index: 0,
            emitted: 0,
            done: false,
        }
    }
}

/// A page descriptor with inherited attributes applied.
#[derive(Debug, Clone)]
pub struct Page {
    /// Zero-based page index in document order
    pub index: usize,
    /// Resource dictionary (fonts, color spaces, XObjects)
    pub resources: Dict,
    /// MediaBox rectangle `[x0 y0 x1 y1]`
    pub media_box: [f64; 4],
    /// CropBox rectangle; defaults to the MediaBox
    pub crop_box: [f64; 4],
    /// Rotation angle in degrees, retained for the output sink
    pub rotate: i64,
    /// Content stream objects (possibly still indirect)
    pub contents: Vec<Object>,
}

/// Lazy page iterator returned by [`Document::pages`].
pub struct Pages<'a> {
    doc: &'a Document,
    stack: Vec<(Object, Dict)>,
    visited: HashSet<u32>,
    next_index: usize,
    emitted: usize,
    done: bool,
}

impl Pages<'_> {
    fn build_page(&self, index: usize, node: &Dict, merged: &Dict) -> Result<Page> {
        let doc = self.doc;
        let resources = match merged.get("Resources") {
            Some(r) => doc.dict_value(r)?,
            None => {
                return Err(Error::Value(format!("page {} has no Resources", index)));
            },
        };
        let media_box = match merged.get("MediaBox") {
            Some(r) => rect_value(doc, r)?,
            None => {
                return Err(Error::Value(format!("page {} has no MediaBox", index)));
            },
        };
        let crop_box = match merged.get("CropBox") {
            Some(r) => rect_value(doc, r)?,
            None => media_box,
        };
        let rotate = match merged.get("Rotate") {
            Some(r) => doc.int_value(r)?,
            None => 0,
        };
        let contents = match node.get("Contents") {
            Some(c) => match doc.resolve(c)? {
                Object::Array(items) => items,
                Object::Null => Vec::new(),
                single => vec![single],
            },
            None => Vec::new(),
        };
        Ok(Page {
            index,
            resources,
            media_box,
            crop_box,
            rotate,
            contents,
        })
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Result<Page>> {
        if self.done {
            return None;
        }
        let doc = self.doc;
        while let Some((node, inherited)) = self.stack.pop() {
            if let Object::Reference(r) = &node {
                if !self.visited.insert(r.id) {
                    log::warn!("page tree cycle through object {}", r.id);
                    continue;
                }
            }
            let dict = match doc.dict_value(&node) {
                Ok(d) => d,
                Err(e) => return Some(Err(e)),
            };

            // Copy inheritable attributes absent in this node.
            let mut merged = dict.clone();
            for key in INHERITABLE_ATTRS {
                if !merged.contains_key(key) {
                    if let Some(v) = inherited.get(key) {
                        merged.insert(key.to_string(), v.clone());
                    }
                }
            }

            match dict.get("Type").and_then(|o| o.as_name()) {
                Some("Pages") => {
                    let kids = match doc.list_value(dict.get("Kids").unwrap_or(&Object::Null)) {
                        Ok(kids) => kids,
                        Err(e) => return Some(Err(e)),
                    };
                    let mut pass_down = Dict::new();
                    for key in INHERITABLE_ATTRS {
                        if let Some(v) = merged.get(key) {
                            pass_down.insert(key.to_string(), v.clone());
                        }
                    }
                    for kid in kids.into_iter().rev() {
                        self.stack.push((kid, pass_down.clone()));
                    }
                },
                Some("Page") => {
                    let index = self.next_index;
                    self.next_index += 1;

                    if let Some(wanted) = &doc.options.page_numbers {
                        if !wanted.contains(&index) {
                            continue;
                        }
                    }
                    if doc.options.max_pages > 0 && self.emitted >= doc.options.max_pages {
                        self.done = true;
                        return None;
                    }
                    self.emitted += 1;
                    return Some(self.build_page(index, &dict, &merged));
                },
                other => {
                    if doc.options.strict {
                        return Some(Err(Error::Value(format!(
                            "page tree node with /Type {:?}",
                            other
                        ))));
                    }
                    log::warn!("skipping page tree node with /Type {:?}", other);
                },
            }
        }
        self.done = true;
        None
    }
}

/// Resolve a 4-number rectangle.
fn rect_value(doc: &Document, obj: &Object) -> Result<[f64; 4]> {
    let list = doc.list_value(obj)?;
    if list.len() != 4 {
        return Err(Error::Value(format!("rectangle with {} elements", list.len())));
    }
    let mut rect = [0.0; 4];
    for (i, item) in list.iter().enumerate() {
        rect[i] = doc.num_value(item)?;
    }
    Ok(rect)
}

/// Scan the first 1024 bytes for `%PDF-x.y`, tolerating leading junk.
fn parse_header(buf: &[u8], strict: bool) -> Result<(u8, u8)> {
    let window = &buf[..buf.len().min(1024)];
    if let Some(pos) = window.windows(5).position(|w| w == b"%PDF-") {
        let rest = &window[pos + 5..];
        if rest.len() >= 3 && rest[0].is_ascii_digit() && rest[1] == b'.' && rest[2].is_ascii_digit()
        {
            return Ok((rest[0] - b'0', rest[2] - b'0'));
        }
    }
    if strict {
        return Err(Error::Value("missing %PDF header".to_string()));
    }
    log::warn!("missing %PDF header, assuming 1.0");
    Ok((1, 0))
}
