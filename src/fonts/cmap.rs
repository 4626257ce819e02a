//! Character maps.
//!
//! A [`CMap`] carries the two mappings a composite font needs: input byte
//! sequences (1-4 bytes, delimited by codespace ranges) to CIDs, and CIDs
//! to Unicode. ToUnicode streams populate the Unicode side from
//! `bfchar`/`bfrange` sections; predefined CMaps (Identity-H/V built in,
//! others loaded from a search path in the Adobe CMap text format) populate
//! the CID side from `cidchar`/`cidrange` sections.
//!
//! [`CMapDb`] is the process-wide read-only cache: once a named CMap is
//! parsed it is shared via `Arc` for the rest of the run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

/// A character map: byte sequences to CIDs, CIDs to Unicode.
#[derive(Debug, Clone, Default)]
pub struct CMap {
    name: String,
    vertical: bool,
    /// (code byte length, low, high) triples delimiting valid codes
    codespace: Vec<(usize, u32, u32)>,
    /// Individual code to CID mappings
    single: HashMap<u32, u32>,
    /// (low, high, first cid) range mappings
    ranges: Vec<(u32, u32, u32)>,
    /// CID to Unicode string
    unicode: HashMap<u32, String>,
}

impl CMap {
    /// Create an empty CMap with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The 2-byte identity mapping (Identity-H / Identity-V).
    pub fn identity(vertical: bool) -> Self {
        let mut cmap = Self::new(if vertical { "Identity-V" } else { "Identity-H" });
        cmap.vertical = vertical;
        cmap.codespace.push((2, 0x0000, 0xFFFF));
        cmap.ranges.push((0x0000, 0xFFFF, 0x0000));
        cmap
    }

    /// CMap name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writing mode: true for vertical.
    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    /// Whether codes are wider than one byte.
    pub fn is_multibyte(&self) -> bool {
        self.codespace.iter().any(|(n, _, _)| *n > 1)
    }

    pub(crate) fn set_vertical(&mut self, vertical: bool) {
        self.vertical = vertical;
    }

    pub(crate) fn add_codespace(&mut self, nbytes: usize, low: u32, high: u32) {
        self.codespace.push((nbytes, low, high));
    }

    pub(crate) fn add_cid_single(&mut self, code: u32, cid: u32) {
        self.single.insert(code, cid);
    }

    pub(crate) fn add_cid_range(&mut self, low: u32, high: u32, cid: u32) {
        self.ranges.push((low, high, cid));
    }

    pub(crate) fn add_unicode(&mut self, cid: u32, text: String) {
        self.unicode.insert(cid, text);
    }

    pub(crate) fn merge_from(&mut self, other: &CMap) {
        self.codespace.extend_from_slice(&other.codespace);
        self.ranges.extend_from_slice(&other.ranges);
        for (k, v) in &other.single {
            self.single.entry(*k).or_insert(*v);
        }
        for (k, v) in &other.unicode {
            self.unicode.entry(*k).or_insert_with(|| v.clone());
        }
    }

    /// Map a single code to its CID.
    pub fn cid(&self, code: u32) -> Option<u32> {
        if let Some(&cid) = self.single.get(&code) {
            return Some(cid);
        }
        for &(low, high, base) in &self.ranges {
            if (low..=high).contains(&code) {
                return Some(base + (code - low));
            }
        }
        None
    }

    /// Decode a byte string into CIDs, consuming variable-length codes
    /// according to the codespace ranges.
    ///
    /// Bytes that match no codespace are consumed one at a time with the
    /// byte value as the code.
    pub fn decode(&self, bytes: &[u8]) -> Vec<u32> {
        let mut cids = Vec::new();
        let mut i = 0;
        'outer: while i < bytes.len() {
            for n in 1..=4usize {
                if i + n > bytes.len() {
                    break;
                }
                let code = bytes[i..i + n].iter().fold(0u32, |acc, &b| acc << 8 | b as u32);
                if self
                    .codespace
                    .iter()
                    .any(|&(len, low, high)| len == n && (low..=high).contains(&code))
                {
                    cids.push(self.cid(code).unwrap_or(code));
                    i += n;
                    continue 'outer;
                }
            }
            let code = bytes[i] as u32;
            cids.push(self.cid(code).unwrap_or(code));
            i += 1;
        }
        cids
    }

    /// Map a CID to its Unicode string.
    ///
    /// Falls back to the CID side for maps (like the predefined `*-UCS2`
    /// ones) whose output values are UTF-16 code units.
    pub fn to_unicode(&self, cid: u32) -> Option<String> {
        if let Some(s) = self.unicode.get(&cid) {
            return Some(s.clone());
        }
        if !self.ranges.is_empty() || !self.single.is_empty() {
            if let Some(unit) = self.cid(cid) {
                if let Ok(s) = String::from_utf16(&[unit as u16]) {
                    return Some(s);
                }
            }
        }
        None
    }

    /// Number of mappings on both sides.
    pub fn len(&self) -> usize {
        self.single.len() + self.ranges.len() + self.unicode.len()
    }

    /// True when no mapping is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.codespace.is_empty()
    }
}

fn hex_field(field: &str) -> Option<(usize, u32)> {
    let clean: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() || clean.len() > 8 {
        return None;
    }
    let value = u32::from_str_radix(&clean, 16).ok()?;
    Some((clean.len().div_ceil(2), value))
}

/// Decode a hex destination field as UTF-16BE text.
///
/// Handles single code units, surrogate pairs and multi-unit ligature
/// expansions uniformly.
fn hex_utf16(field: &str) -> Option<String> {
    let clean: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() {
        return None;
    }
    let mut units = Vec::with_capacity(clean.len() / 4 + 1);
    let chars: Vec<char> = clean.chars().collect();
    for chunk in chars.chunks(4) {
        let text: String = chunk.iter().collect();
        units.push(u16::from_str_radix(&text, 16).ok()?);
    }
    String::from_utf16(&units).ok()
}

fn extract_sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut sections = Vec::new();
    let mut remaining = content;
    while let Some(begin_pos) = remaining.find(begin) {
        let after = &remaining[begin_pos + begin.len()..];
        match after.find(end) {
            Some(end_pos) => {
                sections.push(&after[..end_pos]);
                remaining = &after[end_pos + end.len()..];
            },
            None => break,
        }
    }
    sections
}

/// Parse a ToUnicode CMap stream into the Unicode side of a [`CMap`].
///
/// Recognized sections:
/// - `beginbfchar`: `<src> <dst>` single mappings
/// - `beginbfrange`: `<lo> <hi> <dst>` sequential runs, or
///   `<lo> <hi> [<dst0> <dst1> ...]` per-code destinations
/// - `begincodespacerange`: code widths (kept for multi-byte decoding)
pub fn parse_tounicode(data: &[u8]) -> Result<CMap> {
    lazy_static! {
        static ref BFCHAR: Regex = Regex::new(r"<([^>]*)>\s*<([^>]*)>").unwrap();
        static ref BFRANGE_ARRAY: Regex =
            Regex::new(r"<([^>]*)>\s*<([^>]*)>\s*\[((?:\s*<[^>]*>\s*)+)\]").unwrap();
        static ref BFRANGE_SEQ: Regex =
            Regex::new(r"<([^>]*)>\s*<([^>]*)>\s*<([^>]*)>").unwrap();
        static ref HEX: Regex = Regex::new(r"<([^>]*)>").unwrap();
    }

    let content = String::from_utf8_lossy(data);
    let mut cmap = CMap::new("ToUnicode");

    for section in extract_sections(&content, "begincodespacerange", "endcodespacerange") {
        for caps in BFCHAR.captures_iter(section) {
            if let (Some((n1, low)), Some((n2, high))) = (hex_field(&caps[1]), hex_field(&caps[2]))
            {
                cmap.add_codespace(n1.max(n2), low, high);
            }
        }
    }

    for section in extract_sections(&content, "beginbfchar", "endbfchar") {
        for line in section.lines() {
            if let Some(caps) = BFCHAR.captures(line) {
                if let (Some((_, src)), Some(dst)) = (hex_field(&caps[1]), hex_utf16(&caps[2])) {
                    cmap.add_unicode(src, dst);
                }
            }
        }
    }

    for section in extract_sections(&content, "beginbfrange", "endbfrange") {
        for line in section.lines() {
            if let Some(caps) = BFRANGE_ARRAY.captures(line) {
                let bounds = (hex_field(&caps[1]), hex_field(&caps[2]));
                if let (Some((_, low)), Some((_, high))) = bounds {
                    for (i, dst) in HEX.captures_iter(&caps[3]).enumerate() {
                        let code = low + i as u32;
                        if code > high {
                            log::warn!("bfrange array longer than its range");
                            break;
                        }
                        if let Some(text) = hex_utf16(&dst[1]) {
                            cmap.add_unicode(code, text);
                        }
                    }
                }
                continue;
            }
            if let Some(caps) = BFRANGE_SEQ.captures(line) {
                let bounds = (hex_field(&caps[1]), hex_field(&caps[2]));
                if let (Some((_, low)), Some((_, high))) = bounds {
                    if high < low || high - low > 65_535 {
                        log::warn!("bad bfrange span {}-{}, skipping", low, high);
                        continue;
                    }
                    if let Some(base) = hex_utf16(&caps[3]) {
                        let mut units: Vec<u16> = base.encode_utf16().collect();
                        if units.is_empty() {
                            continue;
                        }
                        for i in 0..=(high - low) {
                            if let Ok(text) = String::from_utf16(&units) {
                                cmap.add_unicode(low + i, text);
                            }
                            // the last code unit advances through the range
                            let last = units.len() - 1;
                            units[last] = units[last].wrapping_add(1);
                        }
                    }
                }
            }
        }
    }

    Ok(cmap)
}

/// Parse a predefined CMap in the Adobe text format.
///
/// Reads `/WMode`, `codespacerange`, `cidrange` and `cidchar` sections and
/// returns the CMap plus the names referenced through `usecmap`.
pub fn parse_predefined(name: &str, data: &[u8]) -> Result<(CMap, Vec<String>)> {
    lazy_static! {
        static ref WMODE: Regex = Regex::new(r"/WMode\s+(\d+)\s+def").unwrap();
        static ref USECMAP: Regex = Regex::new(r"/([\w-]+)\s+usecmap").unwrap();
        static ref PAIR: Regex = Regex::new(r"<([^>]*)>\s*<([^>]*)>").unwrap();
        static ref CIDRANGE: Regex = Regex::new(r"<([^>]*)>\s*<([^>]*)>\s+(\d+)").unwrap();
        static ref CIDCHAR: Regex = Regex::new(r"<([^>]*)>\s+(\d+)").unwrap();
    }

    let content = String::from_utf8_lossy(data);
    let mut cmap = CMap::new(name);

    if let Some(caps) = WMODE.captures(&content) {
        cmap.set_vertical(&caps[1] == "1");
    }
    let used: Vec<String> = USECMAP
        .captures_iter(&content)
        .map(|caps| caps[1].to_string())
        .collect();

    for section in extract_sections(&content, "begincodespacerange", "endcodespacerange") {
        for caps in PAIR.captures_iter(section) {
            if let (Some((n1, low)), Some((n2, high))) = (hex_field(&caps[1]), hex_field(&caps[2]))
            {
                cmap.add_codespace(n1.max(n2), low, high);
            }
        }
    }
    for section in extract_sections(&content, "begincidrange", "endcidrange") {
        for caps in CIDRANGE.captures_iter(section) {
            let fields = (hex_field(&caps[1]), hex_field(&caps[2]), caps[3].parse::<u32>());
            if let (Some((_, low)), Some((_, high)), Ok(cid)) = fields {
                cmap.add_cid_range(low, high, cid);
            }
        }
    }
    for section in extract_sections(&content, "begincidchar", "endcidchar") {
        for caps in CIDCHAR.captures_iter(section) {
            if let (Some((_, code)), Ok(cid)) = (hex_field(&caps[1]), caps[2].parse::<u32>()) {
                cmap.add_cid_single(code, cid);
            }
        }
    }

    Ok((cmap, used))
}

lazy_static! {
    static ref CMAP_CACHE: Mutex<HashMap<String, Arc<CMap>>> = Mutex::new(HashMap::new());
}

/// Process-wide CMap database.
///
/// Identity-H and Identity-V are built in; any other name is loaded from
/// the configured search path and cached for the rest of the process.
pub struct CMapDb;

impl CMapDb {
    /// Fetch a CMap by name.
    pub fn get_cmap(name: &str, search_path: &[PathBuf]) -> Result<Arc<CMap>> {
        Self::get_cmap_inner(name, search_path, 0)
    }

    fn get_cmap_inner(name: &str, search_path: &[PathBuf], depth: usize) -> Result<Arc<CMap>> {
        if depth > 8 {
            return Err(Error::Resource(format!("usecmap chain too deep at {}", name)));
        }
        {
            let cache = CMAP_CACHE.lock().unwrap();
            if let Some(cmap) = cache.get(name) {
                return Ok(cmap.clone());
            }
        }

        let cmap = match name {
            "Identity-H" => CMap::identity(false),
            "Identity-V" => CMap::identity(true),
            _ => {
                let data = Self::find_file(name, search_path)?;
                let (mut cmap, used) = parse_predefined(name, &data)?;
                for base in used {
                    let parent = Self::get_cmap_inner(&base, search_path, depth + 1)?;
                    cmap.merge_from(&parent);
                }
                cmap
            },
        };

        let cmap = Arc::new(cmap);
        CMAP_CACHE
            .lock()
            .unwrap()
            .insert(name.to_string(), cmap.clone());
        Ok(cmap)
    }

    /// Register a synthesized CMap (e.g. from an embedded TrueType cmap
    /// table) under its name.
    pub fn register(cmap: CMap) -> Arc<CMap> {
        let cmap = Arc::new(cmap);
        CMAP_CACHE
            .lock()
            .unwrap()
            .insert(cmap.name().to_string(), cmap.clone());
        cmap
    }

    fn find_file(name: &str, search_path: &[PathBuf]) -> Result<Vec<u8>> {
        // CMap names never contain path separators, but don't trust input
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(Error::Resource(format!("invalid CMap name {:?}", name)));
        }
        for dir in search_path {
            let path = dir.join(name);
            if path.is_file() {
                log::debug!("loading CMap {} from {:?}", name, path);
                return Ok(std::fs::read(path)?);
            }
        }
        Err(Error::Resource(format!("CMap {} not found", name)))
    }
}
