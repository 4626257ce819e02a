//! Output devices.
//!
//! The interpreter drives a [`Device`]: the sink receiving CTM changes,
//! page and block brackets, positioned strings and images. All methods
//! default to no-ops so a sink only implements what it consumes.
//!
//! [`PageAggregator`] is the built-in device: it decodes shown strings
//! through their font and collects positioned text fragments and figure
//! groupings per page.

use crate::content::{Matrix, TextElement, TextState};
use crate::document::Page;
use crate::error::Error;
use crate::object::Stream;

/// Sink interface consumed by the content-stream interpreter.
pub trait Device {
    /// The current transformation matrix changed.
    fn set_ctm(&mut self, _ctm: &Matrix) {}

    /// A content-stream block (page or form) starts.
    fn begin_block(&mut self, _name: &str) {}

    /// The current content-stream block ended.
    fn end_block(&mut self) {}

    /// A page starts.
    fn begin_page(&mut self, _page: &Page) {}

    /// The page ended.
    fn end_page(&mut self, _page: &Page) {}

    /// A form XObject execution starts.
    fn begin_figure(&mut self, _name: &str, _bbox: [f64; 4]) {}

    /// The form XObject execution ended.
    fn end_figure(&mut self, _name: &str) {}

    /// A string was shown.
    ///
    /// `matrix` is the text matrix with the line offset applied;
    /// `advance` is the computed width along the writing direction.
    fn render_string(
        &mut self,
        _text_state: &TextState,
        _matrix: &Matrix,
        _advance: f64,
        _seq: &[TextElement],
    ) {
    }

    /// An image XObject (or inline image) was placed.
    fn render_image(&mut self, _stream: &Stream, _size: (i64, i64), _matrix: &Matrix) {}

    /// A character had no Unicode mapping.
    ///
    /// Returning a substitute emits it in place of the character;
    /// returning `None` omits the character.
    fn handle_undefined_char(&mut self, _encoding: Option<&str>, _cid: u32) -> Option<String> {
        None
    }
}

/// A positioned run of decoded text.
#[derive(Debug, Clone)]
pub struct TextFragment {
    /// Decoded Unicode text
    pub text: String,
    /// Text matrix multiplied by the CTM at show time
    pub matrix: Matrix,
    /// Font size in text space
    pub font_size: f64,
    /// Advance width along the writing direction
    pub advance: f64,
    /// Writing mode of the font that shaped this run
    pub vertical: bool,
}

/// A placed image.
#[derive(Debug, Clone)]
pub struct ImageRef {
    /// Pixel dimensions from the image dictionary
    pub size: (i64, i64),
    /// CTM at placement
    pub matrix: Matrix,
}

/// Nested figure produced by a form XObject.
#[derive(Debug)]
pub struct Figure {
    /// XObject resource name
    pub name: String,
    /// The form's BBox
    pub bbox: [f64; 4],
    /// Items rendered inside the form
    pub items: Vec<Item>,
}

/// One item of page content.
#[derive(Debug)]
pub enum Item {
    /// A text fragment
    Text(TextFragment),
    /// A nested figure
    Figure(Figure),
    /// An image placement
    Image(ImageRef),
}

/// One extracted page.
#[derive(Debug)]
pub struct PageItems {
    /// Zero-based page index
    pub index: usize,
    /// Page MediaBox
    pub bbox: [f64; 4],
    /// Rotation angle for the consumer; never applied here
    pub rotate: i64,
    /// Content in content-stream order
    pub items: Vec<Item>,
}

/// Device collecting positioned text fragments per page.
#[derive(Default)]
pub struct PageAggregator {
    ctm: Matrix,
    pages: Vec<PageItems>,
    current: Vec<Item>,
    figures: Vec<Figure>,
    open_page: Option<(usize, [f64; 4], i64)>,
    undefined: Vec<(Option<String>, u32)>,
}

impl PageAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages collected so far.
    pub fn pages(&self) -> &[PageItems] {
        &self.pages
    }

    /// Consume the aggregator, returning its pages.
    pub fn into_pages(self) -> Vec<PageItems> {
        self.pages
    }

    /// The `(encoding, cid)` pairs that had no Unicode mapping.
    pub fn undefined_chars(&self) -> &[(Option<String>, u32)] {
        &self.undefined
    }

    fn push_item(&mut self, item: Item) {
        match self.figures.last_mut() {
            Some(figure) => figure.items.push(item),
            None => self.current.push(item),
        }
    }
}

impl Device for PageAggregator {
    fn set_ctm(&mut self, ctm: &Matrix) {
        self.ctm = *ctm;
    }

    fn begin_page(&mut self, page: &Page) {
        self.open_page = Some((page.index, page.media_box, page.rotate));
        self.current = Vec::new();
    }

    fn end_page(&mut self, _page: &Page) {
        if let Some((index, bbox, rotate)) = self.open_page.take() {
            self.pages.push(PageItems {
                index,
                bbox,
                rotate,
                items: std::mem::take(&mut self.current),
            });
        }
    }

    fn begin_figure(&mut self, name: &str, bbox: [f64; 4]) {
        self.figures.push(Figure {
            name: name.to_string(),
            bbox,
            items: Vec::new(),
        });
    }

    fn end_figure(&mut self, _name: &str) {
        if let Some(figure) = self.figures.pop() {
            self.push_item(Item::Figure(figure));
        }
    }

    fn render_string(
        &mut self,
        text_state: &TextState,
        matrix: &Matrix,
        advance: f64,
        seq: &[TextElement],
    ) {
        let font = match &text_state.font {
            Some(font) => font.clone(),
            None => return,
        };
        let matrix = matrix.mult(&self.ctm);

        let mut text = String::new();
        for element in seq {
            let bytes = match element {
                TextElement::Str(bytes) => bytes,
                TextElement::Adjust(_) => continue,
            };
            for cid in font.decode(bytes) {
                match font.to_unicode(cid) {
                    Ok(s) => text.push_str(&s),
                    Err(Error::UnicodeNotDefined { encoding, cid }) => {
                        if let Some(substitute) =
                            self.handle_undefined_char(encoding.as_deref(), cid)
                        {
                            text.push_str(&substitute);
                        }
                    },
                    Err(e) => log::warn!("cannot decode cid {}: {}", cid, e),
                }
            }
        }

        self.push_item(Item::Text(TextFragment {
            text,
            matrix,
            font_size: text_state.font_size,
            advance,
            vertical: font.is_vertical(),
        }));
    }

    fn render_image(&mut self, _stream: &Stream, size: (i64, i64), matrix: &Matrix) {
        self.push_item(Item::Image(ImageRef {
            size,
            matrix: *matrix,
        }));
    }

    fn handle_undefined_char(&mut self, encoding: Option<&str>, cid: u32) -> Option<String> {
        log::debug!("undefined character: encoding {:?}, cid {}", encoding, cid);
        self.undefined.push((encoding.map(|s| s.to_string()), cid));
        None
    }
}
