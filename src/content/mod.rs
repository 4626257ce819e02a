//! Content-stream interpretation.
//!
//! The interpreter executes the drawing and text operators of page (and
//! form XObject) content streams against a graphics/text state, emitting
//! positioned strings and images to a [`crate::device::Device`].

mod graphics;
mod interp;

pub use graphics::{Matrix, TextState};
pub use interp::Interpreter;

/// One element of a text-showing sequence (`TJ` operand).
#[derive(Debug, Clone, PartialEq)]
pub enum TextElement {
    /// A byte string to show
    Str(Vec<u8>),
    /// A glyph-space adjustment, subtracted from the advance
    Adjust(f64),
}
