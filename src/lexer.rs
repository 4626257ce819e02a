//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of PDF byte buffers. PDF borrows a PostScript-like
//! grammar with the following token types:
//! - Numbers: integers (42, -123) and reals (3.14, -.002, 5.)
//! - Strings: literal ((Hello)) and hexadecimal (<48656C6C6F>)
//! - Names: identifiers starting with / (/Type, /A#20B)
//! - Delimiters: `[`, `]`, `<<`, `>>`
//! - Keywords: everything else (true, obj, endstream, content operators)
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are
//! skipped before each token. The lexer works over in-memory slices so the
//! caller can seek to arbitrary byte offsets; [`rev_lines`] provides the
//! reverse line scan needed to locate `startxref` at the end of a file.

use nom::{
    IResult,
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::opt,
    sequence::preceded,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),
    /// Literal string bytes (content of "(Hello)"); escapes NOT yet decoded
    LiteralString(&'a [u8]),
    /// Hexadecimal string bytes (content of "<48656C6C6F>"); not yet decoded
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded (e.g., "Type" from "/Type")
    Name(String),
    /// Boolean true keyword
    True,
    /// Boolean false keyword
    False,
    /// Null keyword
    Null,
    /// Array start delimiter `[`
    ArrayStart,
    /// Array end delimiter `]`
    ArrayEnd,
    /// Dictionary start delimiter `<<`
    DictStart,
    /// Dictionary end delimiter `>>`
    DictEnd,
    /// Any other keyword: `obj`, `endstream`, `R`, content operators, ...
    Keyword(&'a str),
}

/// True for the six PDF whitespace bytes (PDF Ref 1.7, Table 3.1).
pub fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// True for bytes that terminate a name or keyword.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Skip whitespace and `%` comments.
fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;
    loop {
        let ws: IResult<&[u8], &[u8]> = take_while(is_pdf_whitespace)(remaining);
        if let Ok((rest, skipped)) = ws {
            remaining = rest;
            if !skipped.is_empty() {
                continue;
            }
        }
        if remaining.first() == Some(&b'%') {
            let comment: IResult<&[u8], &[u8]> =
                preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(remaining);
            if let Ok((rest, _)) = comment {
                remaining = rest;
                continue;
            }
        }
        return remaining;
    }
}

/// Parse an integer or real number.
///
/// PDF allows leading +/- signs, numbers starting with a decimal point
/// (.5) and trailing decimal points (5.).
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    if let Some(frac) = frac_part {
        let mut num = String::new();
        if sign == Some('-') {
            num.push('-');
        }
        num.push_str(
            int_part
                .map(|b| std::str::from_utf8(b).unwrap_or("0"))
                .unwrap_or("0"),
        );
        num.push('.');
        num.push_str(
            frac.map(|b| std::str::from_utf8(b).unwrap_or("0"))
                .unwrap_or("0"),
        );
        let value: f64 = num.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((input, Token::Real(value)))
    } else {
        let digits = std::str::from_utf8(int_part.unwrap()).map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        let mut value: i64 = digits.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        if sign == Some('-') {
            value = -value;
        }
        Ok((input, Token::Integer(value)))
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Tracks balanced nested parentheses and skips over escape sequences,
/// including 1-3 digit octal escapes. The raw content (with escapes) is
/// returned; decoding happens at the parser level.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                pos += 1;
                if pos < remaining.len() {
                    if remaining[pos].is_ascii_digit() {
                        let mut n = 0;
                        while n < 3 && pos < remaining.len() && remaining[pos].is_ascii_digit() {
                            pos += 1;
                            n += 1;
                        }
                    } else {
                        pos += 1;
                    }
                }
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    let content = &remaining[..pos - 1];
    Ok((&remaining[pos..], Token::LiteralString(content)))
}

/// Parse a hexadecimal string enclosed in angle brackets.
///
/// Whitespace inside the brackets is preserved here and dropped during
/// decoding. `<<` is a dictionary start, never a hex string.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.len() >= 2 && input[0] == b'<' && input[1] == b'<' {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    let (input, _) = char('<')(input)?;
    let (input, content) =
        take_while(|c: u8| c.is_ascii_hexdigit() || is_pdf_whitespace(c))(input)?;
    let (input, _) = char('>')(input)?;
    Ok((input, Token::HexString(content)))
}

/// Decode `#XX` escape sequences in PDF names (PDF Ref 1.7, 3.2.4).
///
/// Invalid escapes keep the `#` literal, matching common-reader behavior.
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '#' {
            result.push(ch);
            continue;
        }
        let h1 = chars.next();
        let h2 = chars.next();
        if let (Some(h1), Some(h2)) = (h1, h2) {
            if let (Some(a), Some(b)) = (h1.to_digit(16), h2.to_digit(16)) {
                result.push((a * 16 + b) as u8 as char);
                continue;
            }
            result.push('#');
            result.push(h1);
            result.push(h2);
        } else {
            result.push('#');
            if let Some(h1) = h1 {
                result.push(h1);
            }
        }
    }
    result
}

/// Parse a name starting with `/`.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = char('/')(input)?;
    let (input, bytes) = take_while(|c: u8| !is_pdf_whitespace(c) && !is_delimiter(c))(input)?;
    let name = std::str::from_utf8(bytes).unwrap_or("");
    Ok((input, Token::Name(decode_name_escapes(name))))
}

/// Parse a keyword: a run of regular characters, or `'` / `"`.
///
/// `true`, `false` and `null` become their own token kinds; everything
/// else (obj, endobj, stream, R, content operators like Tj or T*) is a
/// generic [`Token::Keyword`].
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    // ' and " are single-character text-show operators
    if let Some(&c) = input.first() {
        if c == b'\'' || c == b'"' {
            let s = std::str::from_utf8(&input[..1]).unwrap();
            return Ok((&input[1..], Token::Keyword(s)));
        }
    }
    let (rest, bytes) = take_while1(|c: u8| {
        !is_pdf_whitespace(c) && !is_delimiter(c) && !matches!(c, b'+' | b'-' | b'\'' | b'"')
    })(input)?;
    let word = std::str::from_utf8(bytes)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;
    let token = match word {
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        _ => Token::Keyword(word),
    };
    Ok((rest, token))
}

/// Parse a single PDF token, skipping leading whitespace and comments.
///
/// Returns the remaining input and the token, or an error at end of input.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    if input.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)));
    }
    match input[0] {
        b'/' => parse_name(input),
        b'[' => Ok((&input[1..], Token::ArrayStart)),
        b']' => Ok((&input[1..], Token::ArrayEnd)),
        b'<' => {
            if input.len() >= 2 && input[1] == b'<' {
                Ok((&input[2..], Token::DictStart))
            } else {
                parse_hex_string(input)
            }
        },
        b'>' => {
            if input.len() >= 2 && input[1] == b'>' {
                Ok((&input[2..], Token::DictEnd))
            } else {
                Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
            }
        },
        b'(' => parse_literal_string(input),
        b'0'..=b'9' | b'+' | b'-' | b'.' => parse_number(input),
        _ => parse_keyword(input),
    }
}

/// Iterate lines of a byte buffer from the end towards the start.
///
/// Recognizes LF, CRLF and bare CR line endings. Used to locate the
/// `startxref` keyword and its offset near the end of the file.
pub fn rev_lines(buf: &[u8]) -> RevLines<'_> {
    RevLines { buf, end: buf.len() }
}

/// Iterator returned by [`rev_lines`].
pub struct RevLines<'a> {
    buf: &'a [u8],
    end: usize,
}

impl<'a> Iterator for RevLines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.end == 0 {
            return None;
        }
        let mut end = self.end;
        // drop the terminator of the line we are about to yield
        if end > 0 && self.buf[end - 1] == b'\n' {
            end -= 1;
            if end > 0 && self.buf[end - 1] == b'\r' {
                end -= 1;
            }
        } else if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && self.buf[start - 1] != b'\n' && self.buf[start - 1] != b'\r' {
            start -= 1;
        }
        self.end = start;
        Some(&self.buf[start..end])
    }
}

/// Read one line forward from `pos`, returning `(line, next_pos)`.
///
/// The line excludes its terminator; `next_pos` points just past it.
/// LF, CRLF and bare CR are all accepted.
pub fn next_line(buf: &[u8], pos: usize) -> (&[u8], usize) {
    let mut i = pos;
    while i < buf.len() && buf[i] != b'\n' && buf[i] != b'\r' {
        i += 1;
    }
    let line = &buf[pos..i];
    if i < buf.len() {
        if buf[i] == b'\r' && i + 1 < buf.len() && buf[i + 1] == b'\n' {
            i += 2;
        } else {
            i += 1;
        }
    }
    (line, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Number tests
    // ========================================================================

    #[test]
    fn test_parse_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+17"), Ok((&b""[..], Token::Integer(17))));
        assert_eq!(token(b"0"), Ok((&b""[..], Token::Integer(0))));
    }

    #[test]
    fn test_parse_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
        assert_eq!(token(b"-.002"), Ok((&b""[..], Token::Real(-0.002))));
    }

    // ========================================================================
    // String tests
    // ========================================================================

    #[test]
    fn test_parse_literal_string() {
        assert_eq!(token(b"(Hello)"), Ok((&b""[..], Token::LiteralString(b"Hello"))));
        assert_eq!(
            token(b"(Hello (nested) World)"),
            Ok((&b""[..], Token::LiteralString(b"Hello (nested) World")))
        );
        assert_eq!(token(b"()"), Ok((&b""[..], Token::LiteralString(b""))));
    }

    #[test]
    fn test_parse_literal_string_with_escaped_paren() {
        assert_eq!(
            token(b"(Open \\( Close \\))"),
            Ok((&b""[..], Token::LiteralString(b"Open \\( Close \\)")))
        );
    }

    #[test]
    fn test_parse_hex_string() {
        assert_eq!(token(b"<48656C6C6F>"), Ok((&b""[..], Token::HexString(b"48656C6C6F"))));
        assert_eq!(token(b"<48 65 6C>"), Ok((&b""[..], Token::HexString(b"48 65 6C"))));
        assert_eq!(token(b"<>"), Ok((&b""[..], Token::HexString(b""))));
    }

    // ========================================================================
    // Name tests
    // ========================================================================

    #[test]
    fn test_parse_name() {
        assert_eq!(token(b"/Type"), Ok((&b""[..], Token::Name("Type".to_string()))));
        assert_eq!(
            token(b"/A;Name_With-Various***Characters"),
            Ok((&b""[..], Token::Name("A;Name_With-Various***Characters".to_string())))
        );
    }

    #[test]
    fn test_parse_name_with_hex_escape() {
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/A#20B#23C"), Ok((&b""[..], Token::Name("A B#C".to_string()))));
        // Invalid escape keeps # literal
        assert_eq!(token(b"/A#ZZ"), Ok((&b""[..], Token::Name("A#ZZ".to_string()))));
    }

    // ========================================================================
    // Keyword and delimiter tests
    // ========================================================================

    #[test]
    fn test_parse_bool_null() {
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"false"), Ok((&b""[..], Token::False)));
        assert_eq!(token(b"null"), Ok((&b""[..], Token::Null)));
    }

    #[test]
    fn test_parse_delimiters() {
        assert_eq!(token(b"["), Ok((&b""[..], Token::ArrayStart)));
        assert_eq!(token(b"]"), Ok((&b""[..], Token::ArrayEnd)));
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b">>"), Ok((&b""[..], Token::DictEnd)));
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(token(b"obj"), Ok((&b""[..], Token::Keyword("obj"))));
        assert_eq!(token(b"endstream x"), Ok((&b" x"[..], Token::Keyword("endstream"))));
        assert_eq!(token(b"R"), Ok((&b""[..], Token::Keyword("R"))));
        assert_eq!(token(b"T*"), Ok((&b""[..], Token::Keyword("T*"))));
        assert_eq!(token(b"'"), Ok((&b""[..], Token::Keyword("'"))));
        assert_eq!(token(b"\"(a)"), Ok((&b"(a)"[..], Token::Keyword("\""))));
    }

    #[test]
    fn test_dict_vs_hex_string() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b"<ABC>"), Ok((&b""[..], Token::HexString(b"ABC"))));
    }

    // ========================================================================
    // Whitespace and comments
    // ========================================================================

    #[test]
    fn test_skip_whitespace_and_comments() {
        assert_eq!(token(b"  \n\t42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"% comment\n42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"% a\n% b\n  42"), Ok((&b""[..], Token::Integer(42))));
    }

    #[test]
    fn test_token_sequence() {
        let mut input: &[u8] = b"1 0 obj << /Type /Catalog >> endobj";
        let expected = [
            Token::Integer(1),
            Token::Integer(0),
            Token::Keyword("obj"),
            Token::DictStart,
            Token::Name("Type".to_string()),
            Token::Name("Catalog".to_string()),
            Token::DictEnd,
            Token::Keyword("endobj"),
        ];
        for want in expected {
            let (rest, tok) = token(input).unwrap();
            assert_eq!(tok, want);
            input = rest;
        }
    }

    // ========================================================================
    // Line scanning
    // ========================================================================

    #[test]
    fn test_rev_lines() {
        let lines: Vec<&[u8]> = rev_lines(b"a\nbb\r\nccc\rdddd").collect();
        assert_eq!(lines, vec![&b"dddd"[..], b"ccc", b"bb", b"a"]);
    }

    #[test]
    fn test_rev_lines_trailing_newline() {
        let lines: Vec<&[u8]> = rev_lines(b"startxref\n173\n%%EOF\n").collect();
        assert_eq!(lines, vec![&b"%%EOF"[..], b"173", b"startxref"]);
    }

    #[test]
    fn test_next_line() {
        let buf = b"abc\r\ndef\nghi";
        let (l1, p1) = next_line(buf, 0);
        assert_eq!(l1, b"abc");
        let (l2, p2) = next_line(buf, p1);
        assert_eq!(l2, b"def");
        let (l3, p3) = next_line(buf, p2);
        assert_eq!(l3, b"ghi");
        assert_eq!(p3, buf.len());
    }
}
