//! Adobe glyph name to Unicode mapping.
//!
//! A compact subset of the Adobe Glyph List covering the names used by the
//! base encodings and typical `Differences` arrays. Names outside the table
//! fall back to the `uniXXXX` / `uXXXX` conventions.

/// Glyph names with fixed Unicode values.
static GLYPH_LIST: phf::Map<&'static str, char> = phf::phf_map! {
    // ASCII
    "space" => ' ', "exclam" => '!', "quotedbl" => '"', "numbersign" => '#',
    "dollar" => '$', "percent" => '%', "ampersand" => '&', "quotesingle" => '\'',
    "parenleft" => '(', "parenright" => ')', "asterisk" => '*', "plus" => '+',
    "comma" => ',', "hyphen" => '-', "period" => '.', "slash" => '/',
    "zero" => '0', "one" => '1', "two" => '2', "three" => '3', "four" => '4',
    "five" => '5', "six" => '6', "seven" => '7', "eight" => '8', "nine" => '9',
    "colon" => ':', "semicolon" => ';', "less" => '<', "equal" => '=',
    "greater" => '>', "question" => '?', "at" => '@',
    "A" => 'A', "B" => 'B', "C" => 'C', "D" => 'D', "E" => 'E', "F" => 'F',
    "G" => 'G', "H" => 'H', "I" => 'I', "J" => 'J', "K" => 'K', "L" => 'L',
    "M" => 'M', "N" => 'N', "O" => 'O', "P" => 'P', "Q" => 'Q', "R" => 'R',
    "S" => 'S', "T" => 'T', "U" => 'U', "V" => 'V', "W" => 'W', "X" => 'X',
    "Y" => 'Y', "Z" => 'Z',
    "bracketleft" => '[', "backslash" => '\\', "bracketright" => ']',
    "asciicircum" => '^', "underscore" => '_', "grave" => '`',
    "a" => 'a', "b" => 'b', "c" => 'c', "d" => 'd', "e" => 'e', "f" => 'f',
    "g" => 'g', "h" => 'h', "i" => 'i', "j" => 'j', "k" => 'k', "l" => 'l',
    "m" => 'm', "n" => 'n', "o" => 'o', "p" => 'p', "q" => 'q', "r" => 'r',
    "s" => 's', "t" => 't', "u" => 'u', "v" => 'v', "w" => 'w', "x" => 'x',
    "y" => 'y', "z" => 'z',
    "braceleft" => '{', "bar" => '|', "braceright" => '}', "asciitilde" => '~',

    // Quotes and dashes
    "quoteleft" => '\u{2018}', "quoteright" => '\u{2019}',
    "quotedblleft" => '\u{201C}', "quotedblright" => '\u{201D}',
    "quotesinglbase" => '\u{201A}', "quotedblbase" => '\u{201E}',
    "guillemotleft" => '\u{00AB}', "guillemotright" => '\u{00BB}',
    "guilsinglleft" => '\u{2039}', "guilsinglright" => '\u{203A}',
    "endash" => '\u{2013}', "emdash" => '\u{2014}', "minus" => '\u{2212}',

    // Symbols and punctuation
    "exclamdown" => '\u{00A1}', "questiondown" => '\u{00BF}',
    "cent" => '\u{00A2}', "sterling" => '\u{00A3}', "yen" => '\u{00A5}',
    "currency" => '\u{00A4}', "Euro" => '\u{20AC}', "florin" => '\u{0192}',
    "section" => '\u{00A7}', "paragraph" => '\u{00B6}',
    "periodcentered" => '\u{00B7}', "bullet" => '\u{2022}',
    "dagger" => '\u{2020}', "daggerdbl" => '\u{2021}',
    "ellipsis" => '\u{2026}', "perthousand" => '\u{2030}',
    "fraction" => '\u{2044}', "trademark" => '\u{2122}',
    "copyright" => '\u{00A9}', "registered" => '\u{00AE}',
    "degree" => '\u{00B0}', "plusminus" => '\u{00B1}', "mu" => '\u{00B5}',
    "brokenbar" => '\u{00A6}', "logicalnot" => '\u{00AC}',
    "ordfeminine" => '\u{00AA}', "ordmasculine" => '\u{00BA}',
    "onequarter" => '\u{00BC}', "onehalf" => '\u{00BD}',
    "threequarters" => '\u{00BE}', "onesuperior" => '\u{00B9}',
    "twosuperior" => '\u{00B2}', "threesuperior" => '\u{00B3}',
    "multiply" => '\u{00D7}', "divide" => '\u{00F7}',
    "notequal" => '\u{2260}', "lessequal" => '\u{2264}',
    "greaterequal" => '\u{2265}', "infinity" => '\u{221E}',
    "partialdiff" => '\u{2202}', "summation" => '\u{2211}',
    "product" => '\u{220F}', "pi" => '\u{03C0}', "integral" => '\u{222B}',
    "Omega" => '\u{03A9}', "radical" => '\u{221A}', "approxequal" => '\u{2248}',
    "Delta" => '\u{2206}', "lozenge" => '\u{25CA}',

    // Accents
    "acute" => '\u{00B4}', "dieresis" => '\u{00A8}', "macron" => '\u{00AF}',
    "cedilla" => '\u{00B8}', "circumflex" => '\u{02C6}', "tilde" => '\u{02DC}',
    "caron" => '\u{02C7}', "breve" => '\u{02D8}', "dotaccent" => '\u{02D9}',
    "ring" => '\u{02DA}', "ogonek" => '\u{02DB}', "hungarumlaut" => '\u{02DD}',

    // Ligatures
    "fi" => '\u{FB01}', "fl" => '\u{FB02}', "ff" => '\u{FB00}',
    "ffi" => '\u{FB03}', "ffl" => '\u{FB04}',

    // Latin letters with diacritics
    "Agrave" => '\u{00C0}', "Aacute" => '\u{00C1}', "Acircumflex" => '\u{00C2}',
    "Atilde" => '\u{00C3}', "Adieresis" => '\u{00C4}', "Aring" => '\u{00C5}',
    "AE" => '\u{00C6}', "Ccedilla" => '\u{00C7}', "Egrave" => '\u{00C8}',
    "Eacute" => '\u{00C9}', "Ecircumflex" => '\u{00CA}', "Edieresis" => '\u{00CB}',
    "Igrave" => '\u{00CC}', "Iacute" => '\u{00CD}', "Icircumflex" => '\u{00CE}',
    "Idieresis" => '\u{00CF}', "Eth" => '\u{00D0}', "Ntilde" => '\u{00D1}',
    "Ograve" => '\u{00D2}', "Oacute" => '\u{00D3}', "Ocircumflex" => '\u{00D4}',
    "Otilde" => '\u{00D5}', "Odieresis" => '\u{00D6}', "Oslash" => '\u{00D8}',
    "Ugrave" => '\u{00D9}', "Uacute" => '\u{00DA}', "Ucircumflex" => '\u{00DB}',
    "Udieresis" => '\u{00DC}', "Yacute" => '\u{00DD}', "Thorn" => '\u{00DE}',
    "germandbls" => '\u{00DF}',
    "agrave" => '\u{00E0}', "aacute" => '\u{00E1}', "acircumflex" => '\u{00E2}',
    "atilde" => '\u{00E3}', "adieresis" => '\u{00E4}', "aring" => '\u{00E5}',
    "ae" => '\u{00E6}', "ccedilla" => '\u{00E7}', "egrave" => '\u{00E8}',
    "eacute" => '\u{00E9}', "ecircumflex" => '\u{00EA}', "edieresis" => '\u{00EB}',
    "igrave" => '\u{00EC}', "iacute" => '\u{00ED}', "icircumflex" => '\u{00EE}',
    "idieresis" => '\u{00EF}', "eth" => '\u{00F0}', "ntilde" => '\u{00F1}',
    "ograve" => '\u{00F2}', "oacute" => '\u{00F3}', "ocircumflex" => '\u{00F4}',
    "otilde" => '\u{00F5}', "odieresis" => '\u{00F6}', "oslash" => '\u{00F8}',
    "ugrave" => '\u{00F9}', "uacute" => '\u{00FA}', "ucircumflex" => '\u{00FB}',
    "udieresis" => '\u{00FC}', "yacute" => '\u{00FD}', "thorn" => '\u{00FE}',
    "ydieresis" => '\u{00FF}', "Ydieresis" => '\u{0178}',
    "Lslash" => '\u{0141}', "lslash" => '\u{0142}',
    "Scaron" => '\u{0160}', "scaron" => '\u{0161}',
    "Zcaron" => '\u{017D}', "zcaron" => '\u{017E}',
    "OE" => '\u{0152}', "oe" => '\u{0153}', "dotlessi" => '\u{0131}',
};

/// Resolve a glyph name to its Unicode character.
///
/// Falls back to the `uniXXXX` (exactly 4 hex digits) and `uXXXX`-`uXXXXXX`
/// conventions for names outside the table.
pub fn glyph_to_unicode(name: &str) -> Option<char> {
    if let Some(&ch) = GLYPH_LIST.get(name) {
        return Some(ch);
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() == 4 {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }
    None
}
