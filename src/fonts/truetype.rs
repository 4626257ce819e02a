//! TrueType `cmap` table parsing.
//!
//! CID fonts with an embedded TrueType program (`FontFile2`), an
//! `Adobe-Identity` coding and no `ToUnicode` stream still carry enough
//! information to recover text: the font's own `cmap` table maps Unicode
//! characters to glyph ids, and under Identity encoding the glyph id is
//! the CID. This module reads the table directory, scans `cmap`
//! subtables of formats 0 (byte table), 2 (high-byte subheaders) and 4
//! (segment mapping), and synthesizes a [`CMap`] named
//! `Adobe-Identity-UCS-<fontname>` holding both directions.

use std::collections::HashMap;
use std::io::{Cursor, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::fonts::cmap::CMap;

/// A parsed TrueType font table directory.
pub struct TrueTypeFont<'a> {
    name: String,
    data: &'a [u8],
    tables: HashMap<[u8; 4], (u32, u32)>,
}

impl<'a> TrueTypeFont<'a> {
    /// Read the table directory of a TrueType font.
    pub fn parse(name: impl Into<String>, data: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        cursor.seek(SeekFrom::Start(4))?; // sfnt version tag
        let ntables = cursor.read_u16::<BigEndian>()?;
        cursor.seek(SeekFrom::Current(6))?; // searchRange, entrySelector, rangeShift

        let mut tables = HashMap::new();
        for _ in 0..ntables {
            let mut tag = [0u8; 4];
            std::io::Read::read_exact(&mut cursor, &mut tag)?;
            let _checksum = cursor.read_u32::<BigEndian>()?;
            let offset = cursor.read_u32::<BigEndian>()?;
            let length = cursor.read_u32::<BigEndian>()?;
            tables.insert(tag, (offset, length));
        }
        Ok(Self {
            name: name.into(),
            data,
            tables,
        })
    }

    /// True if the font carries the named table.
    pub fn has_table(&self, tag: &[u8; 4]) -> bool {
        self.tables.contains_key(tag)
    }

    /// Parse the `cmap` table and synthesize a character map.
    ///
    /// The result maps characters to glyph ids on the CID side and glyph
    /// ids back to Unicode strings, so it can serve directly as the
    /// Unicode companion of an Identity-encoded CID font.
    pub fn create_unicode_cmap(&self) -> Result<CMap> {
        let &(base, _len) = self
            .tables
            .get(b"cmap")
            .ok_or_else(|| Error::Font(format!("{}: no cmap table", self.name)))?;
        let mut cursor = Cursor::new(self.data);
        cursor.seek(SeekFrom::Start(base as u64))?;
        let _version = cursor.read_u16::<BigEndian>()?;
        let nsubtables = cursor.read_u16::<BigEndian>()?;

        let mut subtables = Vec::with_capacity(nsubtables as usize);
        for _ in 0..nsubtables {
            let platform = cursor.read_u16::<BigEndian>()?;
            let encoding = cursor.read_u16::<BigEndian>()?;
            let offset = cursor.read_u32::<BigEndian>()?;
            subtables.push((platform, encoding, offset));
        }

        let mut char2gid: HashMap<u32, u16> = HashMap::new();
        for (_platform, _encoding, st_offset) in subtables {
            cursor.seek(SeekFrom::Start(base as u64 + st_offset as u64))?;
            let format = cursor.read_u16::<BigEndian>()?;
            let _length = cursor.read_u16::<BigEndian>()?;
            let _language = cursor.read_u16::<BigEndian>()?;
            match format {
                0 => self.read_format0(&mut cursor, &mut char2gid)?,
                2 => self.read_format2(&mut cursor, &mut char2gid)?,
                4 => self.read_format4(&mut cursor, &mut char2gid)?,
                other => {
                    log::debug!("{}: skipping cmap subtable format {}", self.name, other);
                },
            }
        }

        let mut cmap = CMap::new(format!("Adobe-Identity-UCS-{}", self.name));
        cmap.add_codespace(2, 0x0000, 0xFFFF);
        for (ch, gid) in char2gid {
            cmap.add_cid_single(ch, gid as u32);
            if let Some(c) = char::from_u32(ch) {
                cmap.add_unicode(gid as u32, c.to_string());
            }
        }
        Ok(cmap)
    }

    /// Format 0: 256-entry byte table.
    fn read_format0(
        &self,
        cursor: &mut Cursor<&[u8]>,
        char2gid: &mut HashMap<u32, u16>,
    ) -> Result<()> {
        for code in 0..256u32 {
            let gid = cursor.read_u8()?;
            char2gid.insert(code, gid as u16);
        }
        Ok(())
    }

    /// Format 2: 256 sub-header keys selecting blocks of 2-byte codes.
    fn read_format2(
        &self,
        cursor: &mut Cursor<&[u8]>,
        char2gid: &mut HashMap<u32, u16>,
    ) -> Result<()> {
        let mut keys = [0u16; 256];
        for key in keys.iter_mut() {
            *key = cursor.read_u16::<BigEndian>()?;
        }
        // keys are byte offsets into the sub-header array: key/8 = index.
        // Sub-header 0 serves single-byte codes, so it gets no high byte.
        let mut first_bytes = vec![0u32; 8192];
        let mut nheaders = 1;
        for (byte, &key) in keys.iter().enumerate() {
            let index = (key / 8) as usize;
            if index != 0 {
                first_bytes[index] = byte as u32;
            }
            nheaders = nheaders.max(index + 1);
        }

        let mut headers = Vec::with_capacity(nheaders);
        for i in 0..nheaders {
            let first_code = cursor.read_u16::<BigEndian>()?;
            let entry_count = cursor.read_u16::<BigEndian>()?;
            let id_delta = cursor.read_i16::<BigEndian>()?;
            let id_range_offset = cursor.read_u16::<BigEndian>()?;
            // the range offset is relative to its own field position
            let glyph_pos = cursor.position() - 2 + id_range_offset as u64;
            headers.push((i, first_code, entry_count, id_delta, glyph_pos));
        }

        for (i, first_code, entry_count, delta, glyph_pos) in headers {
            if entry_count == 0 {
                continue;
            }
            let first = first_code as u32 + (first_bytes[i] << 8);
            cursor.seek(SeekFrom::Start(glyph_pos))?;
            for c in 0..entry_count as u32 {
                let gid = cursor.read_u16::<BigEndian>()?;
                let gid = if gid != 0 {
                    (gid as i32 + delta as i32) as u16
                } else {
                    0
                };
                char2gid.insert(first + c, gid);
            }
        }
        Ok(())
    }

    /// Format 4: segment mapping with deltas or a glyph id array.
    fn read_format4(
        &self,
        cursor: &mut Cursor<&[u8]>,
        char2gid: &mut HashMap<u32, u16>,
    ) -> Result<()> {
        let segcount = (cursor.read_u16::<BigEndian>()? / 2) as usize;
        cursor.seek(SeekFrom::Current(6))?; // searchRange, entrySelector, rangeShift

        let mut end_codes = Vec::with_capacity(segcount);
        for _ in 0..segcount {
            end_codes.push(cursor.read_u16::<BigEndian>()?);
        }
        let _reserved = cursor.read_u16::<BigEndian>()?;
        let mut start_codes = Vec::with_capacity(segcount);
        for _ in 0..segcount {
            start_codes.push(cursor.read_u16::<BigEndian>()?);
        }
        let mut deltas = Vec::with_capacity(segcount);
        for _ in 0..segcount {
            deltas.push(cursor.read_i16::<BigEndian>()?);
        }
        let range_offset_base = cursor.position();
        let mut range_offsets = Vec::with_capacity(segcount);
        for _ in 0..segcount {
            range_offsets.push(cursor.read_u16::<BigEndian>()?);
        }

        for i in 0..segcount {
            let (sc, ec) = (start_codes[i], end_codes[i]);
            if sc > ec {
                continue;
            }
            let delta = deltas[i];
            let idr = range_offsets[i];
            if idr == 0 {
                for c in sc..=ec {
                    char2gid.insert(c as u32, (c as i32 + delta as i32) as u16);
                }
            } else {
                // glyph id array: address of this idRangeOffset field + offset
                let field_pos = range_offset_base + 2 * i as u64;
                for c in sc..=ec {
                    let at = field_pos + idr as u64 + 2 * (c - sc) as u64;
                    cursor.seek(SeekFrom::Start(at))?;
                    let gid = cursor.read_u16::<BigEndian>()?;
                    let gid = if gid != 0 {
                        (gid as i32 + delta as i32) as u16
                    } else {
                        0
                    };
                    char2gid.insert(c as u32, gid);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_be_bytes());
    }

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_be_bytes());
    }

    /// A font with only a cmap table holding the given subtable bytes.
    fn font_with_cmap(subtable: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, 0x0001_0000); // sfnt version
        push_u16(&mut buf, 1); // one table
        push_u16(&mut buf, 0);
        push_u16(&mut buf, 0);
        push_u16(&mut buf, 0);
        buf.extend_from_slice(b"cmap");
        push_u32(&mut buf, 0); // checksum
        let table_offset = buf.len() as u32 + 8;
        push_u32(&mut buf, table_offset);
        push_u32(&mut buf, (4 + 8 + subtable.len()) as u32);
        // cmap header: version 0, 1 subtable at offset 12
        push_u16(&mut buf, 0);
        push_u16(&mut buf, 1);
        push_u16(&mut buf, 3); // platform
        push_u16(&mut buf, 1); // encoding
        push_u32(&mut buf, 12);
        buf.extend_from_slice(subtable);
        buf
    }

    #[test]
    fn test_missing_cmap_table() {
        let mut buf = Vec::new();
        push_u32(&mut buf, 0x0001_0000);
        push_u16(&mut buf, 0);
        push_u16(&mut buf, 0);
        push_u16(&mut buf, 0);
        push_u16(&mut buf, 0);
        let font = TrueTypeFont::parse("Empty", &buf).unwrap();
        assert!(!font.has_table(b"cmap"));
        assert!(matches!(font.create_unicode_cmap(), Err(Error::Font(_))));
    }

    #[test]
    fn test_format0_table() {
        let mut sub = Vec::new();
        push_u16(&mut sub, 0); // format
        push_u16(&mut sub, 262); // length
        push_u16(&mut sub, 0); // language
        let mut table = [0u8; 256];
        table[0x41] = 7; // 'A' -> gid 7
        table[0x42] = 8;
        sub.extend_from_slice(&table);

        let data = font_with_cmap(&sub);
        let font = TrueTypeFont::parse("F0", &data).unwrap();
        let cmap = font.create_unicode_cmap().unwrap();
        assert_eq!(cmap.cid(0x41), Some(7));
        assert_eq!(cmap.to_unicode(7), Some("A".to_string()));
        assert_eq!(cmap.name(), "Adobe-Identity-UCS-F0");
    }

    #[test]
    fn test_format4_delta_segment() {
        let mut sub = Vec::new();
        push_u16(&mut sub, 4); // format
        push_u16(&mut sub, 0); // length (unused)
        push_u16(&mut sub, 0); // language
        push_u16(&mut sub, 4); // segCountX2: 2 segments
        push_u16(&mut sub, 0);
        push_u16(&mut sub, 0);
        push_u16(&mut sub, 0);
        // end codes: 0x45, 0xFFFF
        push_u16(&mut sub, 0x45);
        push_u16(&mut sub, 0xFFFF);
        push_u16(&mut sub, 0); // reservedPad
        // start codes: 0x41, 0xFFFF
        push_u16(&mut sub, 0x41);
        push_u16(&mut sub, 0xFFFF);
        // idDelta: map 0x41..=0x45 to gid 1..=5, sentinel to 0
        sub.extend_from_slice(&(-0x40i16).to_be_bytes());
        push_u16(&mut sub, 1);
        // idRangeOffset: both 0 (delta arithmetic)
        push_u16(&mut sub, 0);
        push_u16(&mut sub, 0);

        let data = font_with_cmap(&sub);
        let font = TrueTypeFont::parse("F4", &data).unwrap();
        let cmap = font.create_unicode_cmap().unwrap();
        assert_eq!(cmap.cid(0x41), Some(1));
        assert_eq!(cmap.cid(0x45), Some(5));
        assert_eq!(cmap.to_unicode(1), Some("A".to_string()));
        assert_eq!(cmap.to_unicode(5), Some("E".to_string()));
    }

    #[test]
    fn test_format4_glyph_array_segment() {
        let mut sub = Vec::new();
        push_u16(&mut sub, 4);
        push_u16(&mut sub, 0);
        push_u16(&mut sub, 0);
        push_u16(&mut sub, 4); // 2 segments
        push_u16(&mut sub, 0);
        push_u16(&mut sub, 0);
        push_u16(&mut sub, 0);
        push_u16(&mut sub, 0x42); // end codes
        push_u16(&mut sub, 0xFFFF);
        push_u16(&mut sub, 0); // reservedPad
        push_u16(&mut sub, 0x41); // start codes
        push_u16(&mut sub, 0xFFFF);
        push_u16(&mut sub, 0); // idDelta
        push_u16(&mut sub, 1);
        // idRangeOffset[0] = 4: points past the second offset to the array
        push_u16(&mut sub, 4);
        push_u16(&mut sub, 0);
        // glyph id array for codes 0x41, 0x42
        push_u16(&mut sub, 20);
        push_u16(&mut sub, 30);

        let data = font_with_cmap(&sub);
        let font = TrueTypeFont::parse("F4arr", &data).unwrap();
        let cmap = font.create_unicode_cmap().unwrap();
        assert_eq!(cmap.cid(0x41), Some(20));
        assert_eq!(cmap.cid(0x42), Some(30));
        assert_eq!(cmap.to_unicode(20), Some("A".to_string()));
    }

    #[test]
    fn test_format2_single_byte_block() {
        // Subtable with all keys pointing at sub-header 0: behaves like a
        // single-byte encoding for codes 0..entry_count.
        let mut sub = Vec::new();
        push_u16(&mut sub, 2); // format
        push_u16(&mut sub, 0); // length
        push_u16(&mut sub, 0); // language
        for _ in 0..256 {
            push_u16(&mut sub, 0); // all keys select sub-header 0
        }
        // one sub-header: firstCode 0x41, entryCount 2, idDelta 5,
        // idRangeOffset 2 (the glyph array follows the header)
        push_u16(&mut sub, 0x41);
        push_u16(&mut sub, 2);
        push_u16(&mut sub, 5);
        push_u16(&mut sub, 2);
        push_u16(&mut sub, 10); // raw gid for 0x41 -> 15
        push_u16(&mut sub, 0); // missing glyph stays 0

        let data = font_with_cmap(&sub);
        let font = TrueTypeFont::parse("F2", &data).unwrap();
        let cmap = font.create_unicode_cmap().unwrap();
        assert_eq!(cmap.cid(0x41), Some(15));
        assert_eq!(cmap.cid(0x42), Some(0));
    }
}
