//! Extraction options.
//!
//! All knobs are threaded explicitly through the document and interpreter
//! constructors; there is no process-wide mutable switch.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// Options controlling parsing and extraction.
#[derive(Debug, Clone)]
pub struct Options {
    /// Fail on malformed structures instead of best-effort recovery.
    pub strict: bool,
    /// Password placeholder. Encryption is not implemented: any encrypted
    /// document fails with [`crate::error::Error::EncryptedNotSupported`].
    pub password: Vec<u8>,
    /// Directories searched for Adobe CMap resources by name.
    pub cmap_search_path: Vec<PathBuf>,
    /// Stop after this many pages (0 = no limit).
    pub max_pages: usize,
    /// Extract only these zero-based page indices, when set.
    pub page_numbers: Option<BTreeSet<usize>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strict: false,
            password: Vec::new(),
            cmap_search_path: Vec::new(),
            max_pages: 0,
            page_numbers: None,
        }
    }
}

impl Options {
    /// Options with strict mode enabled.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Set the CMap search path.
    pub fn with_cmap_search_path(mut self, paths: Vec<PathBuf>) -> Self {
        self.cmap_search_path = paths;
        self
    }

    /// Limit extraction to the first `n` pages.
    pub fn with_max_pages(mut self, n: usize) -> Self {
        self.max_pages = n;
        self
    }

    /// Extract only the given zero-based page indices.
    pub fn with_page_numbers(mut self, pages: BTreeSet<usize>) -> Self {
        self.page_numbers = Some(pages);
        self
    }
}
