//! Extension based MIME lookup.

use std::path::Path;

/// MIME type for a path, from its extension. `None` when the extension is unknown.
#[inline]
pub fn from_path(path: impl AsRef<Path>) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.essence_str().to_string())
}

/// Whether a MIME type is part of the extension table.
#[inline]
pub fn is_known(mime: &str) -> bool {
    mime_guess::get_mime_extensions_str(mime).is_some()
}
