//! Cross-reference index.
//!
//! The cross-reference machinery answers "where is object N?". A PDF file
//! carries one or more xref sections: classical `xref` tables
//! (subsections of `offset generation flag` lines followed by a `trailer`
//! dictionary) or, since PDF 1.5, cross-reference streams whose payload
//! packs entries as big-endian fields of widths `W = [w1 w2 w3]`.
//!
//! Incremental updates chain sections through `Prev` (and `XRefStm` for
//! hybrid files). Sections are kept most-recent-first so that later
//! updates shadow earlier ones: the first section whose subsection range
//! covers an object id answers for it, and older sections are never
//! consulted for that id.

use std::collections::HashSet;

use crate::decoders::{self, DecodeParams};
use crate::error::{Error, Result};
use crate::lexer::{is_pdf_whitespace, next_line, rev_lines};
use crate::object::{Dict, Object};
use crate::parser::ObjectParser;

/// Where an object lives according to one xref entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// The object id is free (deleted or never used)
    Free,
    /// In-use object at an absolute file offset
    Offset(u64),
    /// Packed as the `index`-th object inside object stream `container`
    InStream {
        /// Object id of the containing object stream
        container: u32,
        /// Zero-based index among the stream's packed objects
        index: u32,
    },
}

struct SubSection {
    start: u32,
    entries: Vec<XRefEntry>,
}

/// One xref section (classical table or stream) plus its trailer.
pub struct XRefSection {
    subsections: Vec<SubSection>,
    trailer: Dict,
}

impl XRefSection {
    /// Trailer dictionary (for xref streams, the stream dictionary).
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Look up an object id in this section.
    ///
    /// Returns the entry of the first subsection whose range
    /// `[start, start + count)` contains the id.
    pub fn locate(&self, id: u32) -> Option<&XRefEntry> {
        for sub in &self.subsections {
            if id >= sub.start {
                let rel = (id - sub.start) as usize;
                if rel < sub.entries.len() {
                    return Some(&sub.entries[rel]);
                }
            }
        }
        None
    }

    /// Total number of entries across subsections.
    pub fn len(&self) -> usize {
        self.subsections.iter().map(|s| s.entries.len()).sum()
    }

    /// True if the section carries no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Find the byte offset of the newest xref by scanning backward for
/// `startxref`; the following non-empty line holds the offset.
pub fn find_startxref(buf: &[u8], strict: bool) -> Result<u64> {
    let tail_start = buf.len().saturating_sub(4096);
    let mut offset_line: Option<&[u8]> = None;
    for line in rev_lines(&buf[tail_start..]) {
        let trimmed = trim(line);
        if trimmed == b"startxref" {
            let line = offset_line.ok_or_else(|| {
                Error::Value("startxref with no following offset".to_string())
            })?;
            let text = std::str::from_utf8(trim(line))
                .map_err(|_| Error::Value("non-numeric startxref offset".to_string()))?;
            return text
                .parse::<u64>()
                .map_err(|_| Error::Value(format!("invalid startxref offset: {:?}", text)));
        }
        if !trimmed.is_empty() {
            offset_line = Some(trimmed);
        }
    }
    if strict {
        return Err(Error::Value("startxref not found".to_string()));
    }
    // Best effort: fall back to the last literal xref keyword in the file.
    log::warn!("startxref not found, scanning for the last xref section");
    buf.windows(4)
        .rposition(|w| w == b"xref")
        .map(|p| p as u64)
        .ok_or_else(|| Error::Value("no xref section found".to_string()))
}

/// Read the full xref chain starting from `startxref`, following `Prev`
/// and `XRefStm` pointers. The result is ordered most-recent-first.
pub fn read_xref_chain(buf: &[u8], strict: bool) -> Result<Vec<XRefSection>> {
    let start = find_startxref(buf, strict)?;
    let mut sections = Vec::new();
    let mut queue = std::collections::VecDeque::new();
    let mut seen = HashSet::new();
    queue.push_back(start);

    while let Some(offset) = queue.pop_front() {
        if !seen.insert(offset) {
            log::warn!("circular xref chain at offset {}", offset);
            continue;
        }
        if sections.len() >= 1024 {
            return Err(Error::Value("xref chain exceeds 1024 sections".to_string()));
        }
        let section = match parse_section(buf, offset as usize, strict) {
            Ok(section) => section,
            Err(e) if !strict => {
                log::warn!("skipping unreadable xref section at offset {}: {}", offset, e);
                continue;
            },
            Err(e) => return Err(e),
        };
        // Hybrid files: the classical table's companion stream is shadowed
        // by the table but wins over anything reached through Prev.
        if let Some(stm) = section.trailer.get("XRefStm").and_then(|o| o.as_integer()) {
            queue.push_back(stm as u64);
        }
        if let Some(prev) = section.trailer.get("Prev").and_then(|o| o.as_integer()) {
            queue.push_back(prev as u64);
        }
        sections.push(section);
    }

    if sections.is_empty() {
        return Err(Error::Value("no usable xref section".to_string()));
    }
    Ok(sections)
}

/// Parse the section at `pos`: a leading ASCII digit means an xref stream
/// (the object header `N G obj`), anything else must be the `xref` keyword.
fn parse_section(buf: &[u8], pos: usize, strict: bool) -> Result<XRefSection> {
    let mut peek = pos;
    while peek < buf.len() && is_pdf_whitespace(buf[peek]) {
        peek += 1;
    }
    if peek >= buf.len() {
        return Err(Error::Syntax {
            offset: pos,
            reason: "xref offset beyond end of file".to_string(),
        });
    }
    if buf[peek].is_ascii_digit() {
        parse_stream_section(buf, peek, strict)
    } else {
        parse_table_section(buf, peek, strict)
    }
}

/// Parse a classical xref table and its trailer dictionary.
fn parse_table_section(buf: &[u8], pos: usize, strict: bool) -> Result<XRefSection> {
    let (first, mut pos) = next_line(buf, pos);
    if trim(first) != b"xref" {
        return Err(Error::Syntax {
            offset: pos,
            reason: format!("expected 'xref', found {:?}", String::from_utf8_lossy(first)),
        });
    }

    let mut subsections = Vec::new();
    let trailer_pos;
    loop {
        let line_start = pos;
        let (line, next) = next_line(buf, pos);
        pos = next;
        let trimmed = trim(line);

        if trimmed.is_empty() || trimmed.first() == Some(&b'%') {
            if pos >= buf.len() {
                if strict {
                    return Err(Error::Syntax {
                        offset: line_start,
                        reason: "xref table without trailer".to_string(),
                    });
                }
                trailer_pos = None;
                break;
            }
            continue;
        }
        if trimmed.starts_with(b"trailer") {
            trailer_pos = Some(line_start);
            break;
        }

        // Subsection header: "start count"
        let header = std::str::from_utf8(trimmed).unwrap_or("");
        let mut parts = header.split_whitespace();
        let (start, count) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) => {
                let start: u32 = a.parse().map_err(|_| Error::Syntax {
                    offset: line_start,
                    reason: format!("invalid xref subsection start: {:?}", a),
                })?;
                let count: u32 = b.parse().map_err(|_| Error::Syntax {
                    offset: line_start,
                    reason: format!("invalid xref subsection count: {:?}", b),
                })?;
                (start, count)
            },
            _ => {
                return Err(Error::Syntax {
                    offset: line_start,
                    reason: format!("invalid xref subsection header: {:?}", header),
                });
            },
        };
        if count > 1_000_000 {
            return Err(Error::Value(format!("xref subsection count {} exceeds limit", count)));
        }

        let mut entries = Vec::with_capacity(count as usize);
        while (entries.len() as u32) < count {
            let entry_start = pos;
            let (line, next) = next_line(buf, pos);
            let trimmed = trim(line);
            if trimmed.is_empty() {
                if next >= buf.len() {
                    break;
                }
                pos = next;
                continue;
            }
            if trimmed.starts_with(b"trailer") {
                log::warn!(
                    "xref subsection promised {} entries, found {}",
                    count,
                    entries.len()
                );
                break; // leave pos at the trailer line
            }
            pos = next;

            match parse_table_entry(trimmed) {
                Some(entry) => entries.push(entry),
                None => {
                    if strict {
                        return Err(Error::Syntax {
                            offset: entry_start,
                            reason: format!(
                                "malformed xref entry: {:?}",
                                String::from_utf8_lossy(trimmed)
                            ),
                        });
                    }
                    log::warn!("malformed xref entry at byte {}, marking free", entry_start);
                    entries.push(XRefEntry::Free);
                },
            }
        }
        subsections.push(SubSection { start, entries });
    }

    let trailer = match trailer_pos {
        Some(p) => {
            let mut parser = ObjectParser::new(buf, p, strict);
            parser.expect_keyword("trailer")?;
            match parser.expect_object()? {
                Object::Dictionary(d) => d,
                other => {
                    return Err(Error::Syntax {
                        offset: p,
                        reason: format!("trailer is not a dictionary: {}", other.type_name()),
                    });
                },
            }
        },
        None => Dict::new(),
    };

    Ok(XRefSection { subsections, trailer })
}

fn parse_table_entry(line: &[u8]) -> Option<XRefEntry> {
    let text = std::str::from_utf8(line).ok()?;
    let mut parts = text.split_whitespace();
    let offset: u64 = parts.next()?.parse().ok()?;
    let _generation: u16 = parts.next()?.parse().ok()?;
    let flag = parts.next()?;
    match flag {
        "n" => Some(XRefEntry::Offset(offset)),
        "f" => Some(XRefEntry::Free),
        _ => None,
    }
}

/// Parse a cross-reference stream: the indirect object at `pos` whose
/// decoded payload packs `[type, field2, field3]` big-endian entries.
fn parse_stream_section(buf: &[u8], pos: usize, strict: bool) -> Result<XRefSection> {
    let mut parser = ObjectParser::new(buf, pos, strict);
    let _id = parser.expect_object()?;
    let _gen = parser.expect_object()?;
    parser.expect_keyword("obj")?;
    let stream = match parser.expect_object()? {
        Object::Stream(s) => s,
        other => {
            return Err(Error::Syntax {
                offset: pos,
                reason: format!("xref stream is not a stream object: {}", other.type_name()),
            });
        },
    };

    match stream.dict.get("Type").and_then(|o| o.as_name()) {
        Some("XRef") => {},
        other => {
            if strict {
                return Err(Error::Syntax {
                    offset: pos,
                    reason: format!("expected /Type /XRef, found {:?}", other),
                });
            }
            log::warn!("xref stream at byte {} lacks /Type /XRef", pos);
        },
    }

    let widths = stream
        .dict
        .get("W")
        .and_then(|o| o.as_array())
        .ok_or_else(|| Error::Value("xref stream missing /W".to_string()))?;
    if widths.len() != 3 {
        return Err(Error::Value(format!("/W must have 3 fields, found {}", widths.len())));
    }
    let w: Vec<usize> = widths
        .iter()
        .map(|o| o.as_integer().unwrap_or(-1))
        .map(|n| {
            if (0..=8).contains(&n) {
                Ok(n as usize)
            } else {
                Err(Error::Value(format!("invalid /W field: {}", n)))
            }
        })
        .collect::<Result<_>>()?;
    let entry_len = w[0] + w[1] + w[2];
    if entry_len == 0 {
        return Err(Error::Value("/W fields are all zero".to_string()));
    }

    let size = stream
        .dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::Value("xref stream missing /Size".to_string()))? as u32;

    let index_ranges: Vec<(u32, u32)> = match stream.dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| match pair {
                [a, b] => Some((a.as_integer()? as u32, b.as_integer()? as u32)),
                _ => None,
            })
            .collect(),
        None => vec![(0, size)],
    };

    let filters = stream
        .dict
        .get("Filter")
        .map(decoders::filter_names)
        .unwrap_or_default();
    let params = stream
        .dict
        .get("DecodeParms")
        .and_then(|o| o.as_dict())
        .map(|d| DecodeParams {
            predictor: d.get("Predictor").and_then(|o| o.as_integer()).unwrap_or(1),
            columns: d.get("Columns").and_then(|o| o.as_integer()).unwrap_or(1) as usize,
        });
    let data = decoders::decode_stream(stream.raw(), &filters, params.as_ref(), strict)?;

    let mut subsections = Vec::new();
    let mut cursor = 0;
    for (start, count) in index_ranges {
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if cursor + entry_len > data.len() {
                return Err(Error::Value("truncated xref stream data".to_string()));
            }
            let entry = &data[cursor..cursor + entry_len];
            cursor += entry_len;

            // A zero-width type field defaults to type 1
            let kind = if w[0] > 0 { read_be(&entry[..w[0]]) } else { 1 };
            let field2 = read_be(&entry[w[0]..w[0] + w[1]]);
            let field3 = read_be(&entry[w[0] + w[1]..]);

            entries.push(match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::Offset(field2),
                2 => XRefEntry::InStream {
                    container: field2 as u32,
                    index: field3 as u32,
                },
                other => {
                    if strict {
                        return Err(Error::Value(format!("invalid xref entry type: {}", other)));
                    }
                    log::warn!("treating xref entry of unknown type {} as free", other);
                    XRefEntry::Free
                },
            });
        }
        subsections.push(SubSection { start, entries });
    }

    Ok(XRefSection {
        subsections,
        trailer: stream.dict,
    })
}

/// Accumulate a big-endian unsigned integer.
fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u64)
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|c| !c.is_ascii_whitespace());
    let end = line.iter().rposition(|c| !c.is_ascii_whitespace());
    match (start, end) {
        (Some(s), Some(e)) => &line[s..=e],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_startxref() {
        let pdf = b"%PDF-1.4\ncontent\nstartxref\n50\n%%EOF";
        assert_eq!(find_startxref(pdf, true).unwrap(), 50);
    }

    #[test]
    fn test_find_startxref_blank_line() {
        let pdf = b"%PDF-1.4\nstartxref\n\n12345\n%%EOF";
        assert_eq!(find_startxref(pdf, true).unwrap(), 12345);
    }

    #[test]
    fn test_find_startxref_cr_only() {
        let pdf = b"content\rstartxref\r173\r%%EOF\r";
        assert_eq!(find_startxref(pdf, true).unwrap(), 173);
    }

    #[test]
    fn test_find_startxref_missing_strict() {
        assert!(find_startxref(b"%PDF-1.4\nno tail here", true).is_err());
    }

    #[test]
    fn test_parse_table_single_subsection() {
        let data = b"xref\n\
            0 3\n\
            0000000000 65535 f \n\
            0000000018 00000 n \n\
            0000000154 00000 n \n\
            trailer\n<< /Size 3 >>\n";
        let section = parse_section(data, 0, true).unwrap();
        assert_eq!(section.len(), 3);
        assert_eq!(section.locate(0), Some(&XRefEntry::Free));
        assert_eq!(section.locate(1), Some(&XRefEntry::Offset(18)));
        assert_eq!(section.locate(2), Some(&XRefEntry::Offset(154)));
        assert_eq!(section.locate(3), None);
        assert_eq!(section.trailer().get("Size").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_parse_table_multiple_subsections() {
        let data = b"xref\n\
            0 2\n\
            0000000000 65535 f \n\
            0000000018 00000 n \n\
            5 2\n\
            0000000200 00000 n \n\
            0000000300 00000 n \n\
            trailer\n<< /Size 7 >>\n";
        let section = parse_section(data, 0, true).unwrap();
        assert_eq!(section.len(), 4);
        assert_eq!(section.locate(5), Some(&XRefEntry::Offset(200)));
        assert_eq!(section.locate(6), Some(&XRefEntry::Offset(300)));
        // Gap between subsections
        assert_eq!(section.locate(3), None);
    }

    #[test]
    fn test_parse_table_malformed_entry_lenient() {
        let data = b"xref\n\
            0 2\n\
            0000000000 65535 f \n\
            garbage here\n\
            trailer\n<< >>\n";
        let section = parse_section(data, 0, false).unwrap();
        assert_eq!(section.len(), 2);
        assert_eq!(section.locate(1), Some(&XRefEntry::Free));
    }

    #[test]
    fn test_parse_table_malformed_entry_strict() {
        let data = b"xref\n\
            0 2\n\
            0000000000 65535 f \n\
            garbage here\n\
            trailer\n<< >>\n";
        assert!(parse_section(data, 0, true).is_err());
    }

    #[test]
    fn test_parse_table_excessive_count() {
        let data = b"xref\n0 2000000\n0000000000 65535 f \ntrailer\n<< >>\n";
        assert!(parse_section(data, 0, true).is_err());
    }

    #[test]
    fn test_parse_stream_section() {
        // W = [1 2 1]: type, offset, generation; entries for objects 0-2
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0, 0, 0, 255]); // obj 0: free
        payload.extend_from_slice(&[1, 0, 18, 0]); // obj 1: offset 18
        payload.extend_from_slice(&[2, 0, 9, 4]); // obj 2: in stream 9, index 4
        let mut data = Vec::new();
        data.extend_from_slice(b"7 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Length ");
        data.extend_from_slice(payload.len().to_string().as_bytes());
        data.extend_from_slice(b" >>\nstream\n");
        data.extend_from_slice(&payload);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let section = parse_section(&data, 0, true).unwrap();
        assert_eq!(section.locate(0), Some(&XRefEntry::Free));
        assert_eq!(section.locate(1), Some(&XRefEntry::Offset(18)));
        assert_eq!(
            section.locate(2),
            Some(&XRefEntry::InStream {
                container: 9,
                index: 4
            })
        );
    }

    #[test]
    fn test_parse_stream_section_with_index() {
        // Index [5 2]: entries describe objects 5 and 6
        let payload = vec![1u8, 0, 10, 0, 1, 0, 20, 0];
        let mut data = Vec::new();
        data.extend_from_slice(
            b"7 0 obj\n<< /Type /XRef /Size 7 /Index [5 2] /W [1 2 1] /Length 8 >>\nstream\n",
        );
        data.extend_from_slice(&payload);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let section = parse_section(&data, 0, true).unwrap();
        assert_eq!(section.locate(4), None);
        assert_eq!(section.locate(5), Some(&XRefEntry::Offset(10)));
        assert_eq!(section.locate(6), Some(&XRefEntry::Offset(20)));
    }

    #[test]
    fn test_read_be() {
        assert_eq!(read_be(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_be(&[0xFF]), 0xFF);
        assert_eq!(read_be(&[]), 0);
    }

    #[test]
    fn test_chain_with_prev() {
        // Newest section at the end defines object 1; older section defines 1 and 2.
        // Newer must shadow older for object 1 (checked via order in the chain).
        let older = b"xref\n0 3\n0000000000 65535 f \n0000000111 00000 n \n0000000222 00000 n \ntrailer\n<< /Size 3 >>\n";
        let mut buf = Vec::new();
        buf.extend_from_slice(older);
        let newer_pos = buf.len();
        buf.extend_from_slice(
            b"xref\n1 1\n0000000999 00000 n \ntrailer\n<< /Size 3 /Prev 0 >>\nstartxref\n",
        );
        buf.extend_from_slice(newer_pos.to_string().as_bytes());
        buf.extend_from_slice(b"\n%%EOF");

        let chain = read_xref_chain(&buf, true).unwrap();
        assert_eq!(chain.len(), 2);
        // Most recent first: probing finds the newer offset for object 1
        let entry = chain.iter().find_map(|s| s.locate(1)).unwrap();
        assert_eq!(entry, &XRefEntry::Offset(999));
        // Object 2 only exists in the older section
        let entry = chain.iter().find_map(|s| s.locate(2)).unwrap();
        assert_eq!(entry, &XRefEntry::Offset(222));
    }
}
