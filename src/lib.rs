#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_range_contains)]

//! # pdf_sift
//!
//! Structured text and layout extraction from PDF documents.
//!
//! Given a byte stream in the Portable Document Format, the library yields
//! a per-page sequence of positioned text fragments (and figure groupings)
//! suitable for conversion into plain text or positioned markup. Three
//! subsystems do the work:
//!
//! - the **object layer** — a random-access resolver over cross-reference
//!   tables (classical and stream-encoded), indirect-object dereferencing
//!   and stream-filter decoding;
//! - the **content-stream interpreter** — a stack-based machine executing
//!   the drawing/text operators of each page against a graphics and text
//!   state, reporting to a sink;
//! - the **font/encoding subsystem** — mapping raw content-stream bytes to
//!   Unicode through built-in encodings, embedded and predefined CMaps,
//!   `Differences` arrays and TrueType `cmap` tables.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_sift::config::Options;
//! use pdf_sift::content::Interpreter;
//! use pdf_sift::device::PageAggregator;
//! use pdf_sift::document::Document;
//! use pdf_sift::fonts::FontRegistry;
//!
//! # fn main() -> pdf_sift::error::Result<()> {
//! let doc = Document::open_with("paper.pdf", Options::default())?;
//! let fonts = FontRegistry::new();
//! let mut device = PageAggregator::new();
//! for page in doc.pages() {
//!     let page = page?;
//!     Interpreter::new(&doc, &fonts, &mut device).process_page(&page)?;
//! }
//! for page in device.pages() {
//!     println!("page {}: {} items", page.index, page.items.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Rendering to pixels, writing PDFs and encrypted documents are out of
//! scope; encrypted files fail with
//! [`error::Error::EncryptedNotSupported`].

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod config;
pub mod document;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Text extraction
pub mod content;
pub mod device;
pub mod fonts;

// Re-exports
pub use config::Options;
pub use document::{Document, Page};
pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
