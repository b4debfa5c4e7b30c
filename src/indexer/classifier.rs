//! Per-file routing by size and extension.
//!
//! The size ceiling is checked before anything else, so a file above
//! `max_absolute_file_size_bytes` is rejected from its metadata alone and
//! never opened.

use std::path::Path;

use crate::config::LimitsConfig;
use crate::types::Language;

/// Extensions routed to the text chunker.
pub const TEXT_EXTENSIONS: &[&str] = &[".md", ".txt", ".rst", ".markdown"];

/// Where a file goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRoute {
    /// AST pipeline. `batched` files are above the direct-path limit.
    Code { language: Language, batched: bool },
    /// Text chunking pipeline.
    Text,
    /// Not indexed.
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Above the absolute ceiling; recorded as an error.
    TooLarge { size: u64, limit: u64 },
    /// Neither code nor documentation; skipped silently.
    Unrecognized,
}

/// Lowercased extension including the dot, e.g. `.py`.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

/// Route one file.
pub fn classify(relative_path: &str, size: u64, limits: &LimitsConfig) -> FileRoute {
    if size > limits.max_absolute_file_size_bytes {
        return FileRoute::Skip(SkipReason::TooLarge {
            size,
            limit: limits.max_absolute_file_size_bytes,
        });
    }

    let Some(ext) = extension_of(relative_path) else {
        return FileRoute::Skip(SkipReason::Unrecognized);
    };

    if let Some(language) = Language::from_extension(&ext) {
        return FileRoute::Code {
            language,
            batched: size > limits.max_file_size_bytes,
        };
    }

    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return FileRoute::Text;
    }

    FileRoute::Skip(SkipReason::Unrecognized)
}
