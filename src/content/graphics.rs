//! Graphics and text state for content-stream execution.

use std::rc::Rc;

use crate::fonts::Font;

/// A 2D affine transformation.
///
/// PDF matrices are the 6-tuple `(a b c d e f)` of
/// ```text
/// [ a  b  0 ]
/// [ c  d  0 ]
/// [ e  f  1 ]
/// ```
/// with points treated as row vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// Horizontal scaling component
    pub a: f64,
    /// Rotation/skew component
    pub b: f64,
    /// Rotation/skew component
    pub c: f64,
    /// Vertical scaling component
    pub d: f64,
    /// Horizontal translation
    pub e: f64,
    /// Vertical translation
    pub f: f64,
}

impl Matrix {
    /// Create a matrix from its six parameters.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// The identity transformation.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// A pure translation.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Compose `self` onto `base`: the result applies `self` first, then
    /// `base`. This is the composition `cm` and form matrices use.
    pub fn mult(&self, base: &Matrix) -> Matrix {
        Matrix {
            a: base.a * self.a + base.c * self.b,
            b: base.b * self.a + base.d * self.b,
            c: base.a * self.c + base.c * self.d,
            d: base.b * self.c + base.d * self.d,
            e: base.a * self.e + base.c * self.f + base.e,
            f: base.b * self.e + base.d * self.f + base.f,
        }
    }

    /// Transform a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Transform a displacement (ignores translation).
    pub fn apply_norm(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y, self.b * x + self.d * y)
    }

    /// This matrix with its translation shifted by `(dx, dy)`.
    pub fn shifted(&self, dx: f64, dy: f64) -> Matrix {
        Matrix {
            e: self.e + dx,
            f: self.f + dy,
            ..*self
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Text state: the `T*` operator family's parameters plus the text and
/// line matrices.
#[derive(Clone)]
pub struct TextState {
    /// Current font, bound by `Tf`
    pub font: Option<Rc<dyn Font>>,
    /// Font size in text-space units
    pub font_size: f64,
    /// Character spacing (`Tc`)
    pub char_space: f64,
    /// Word spacing (`Tw`), applied per single-byte space code (CID 32)
    pub word_space: f64,
    /// Horizontal scaling percentage (`Tz`), default 100
    pub scaling: f64,
    /// Text leading (`TL`)
    pub leading: f64,
    /// Text rendering mode (`Tr`)
    pub render: i64,
    /// Text rise (`Ts`)
    pub rise: f64,
    /// Text matrix, reset by `BT` and set by `Tm`
    pub matrix: Matrix,
    /// Line matrix: the advance accumulated since the last line move
    pub line_matrix: (f64, f64),
}

impl TextState {
    /// Fresh text state with PDF defaults.
    pub fn new() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            char_space: 0.0,
            word_space: 0.0,
            scaling: 100.0,
            leading: 0.0,
            render: 0,
            rise: 0.0,
            matrix: Matrix::identity(),
            line_matrix: (0.0, 0.0),
        }
    }

    /// Reset the text and line matrices (at `BT` and line moves).
    pub fn reset_matrix(&mut self) {
        self.matrix = Matrix::identity();
        self.line_matrix = (0.0, 0.0);
    }
}

impl Default for TextState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextState")
            .field("font", &self.font.as_ref().map(|font| font.name().to_string()))
            .field("font_size", &self.font_size)
            .field("char_space", &self.char_space)
            .field("word_space", &self.word_space)
            .field("scaling", &self.scaling)
            .field("leading", &self.leading)
            .field("render", &self.render)
            .field("rise", &self.rise)
            .field("matrix", &self.matrix)
            .field("line_matrix", &self.line_matrix)
            .finish()
    }
}
