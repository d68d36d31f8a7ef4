//! `Content-Disposition` values for downloads (RFC 6266 / RFC 5987).

use percent_encoding::utf8_percent_encode;

use super::URI_COMPONENT;

/// Fallback filename when nothing ASCII-safe remains.
const FALLBACK_NAME: &str = "download";

/// How a served file should be offered to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Download {
    /// Plain `attachment`.
    Attachment,
    /// `attachment` with an explicit filename.
    Named(String),
}

impl Download {
    /// Render the header value.
    pub fn to_header_value(&self) -> String {
        match self {
            Download::Attachment => "attachment".to_string(),
            Download::Named(name) => attachment(name),
        }
    }
}

impl From<&str> for Download {
    fn from(name: &str) -> Self {
        Download::Named(name.to_string())
    }
}

impl From<String> for Download {
    fn from(name: String) -> Self {
        Download::Named(name)
    }
}

/// Build `attachment; filename="<ascii>"; filename*=UTF-8''<encoded>`.
pub fn attachment(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback(filename),
        encode_extended(filename)
    )
}

/// ASCII-only variant of a filename: printable ASCII minus `"` and `\`.
pub fn ascii_fallback(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(|c| matches!(c, ' '..='~') && *c != '"' && *c != '\\')
        .collect();

    if ascii.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        ascii
    }
}

/// Percent-encode a filename for the `filename*` parameter.
///
/// Code points outside the BMP are emitted as two U+FFFD (one per UTF-16
/// surrogate half), which is the byte output clients already receive.
pub fn encode_extended(filename: &str) -> String {
    let mut normalized = String::with_capacity(filename.len());
    for c in filename.chars() {
        if (c as u32) > 0xFFFF {
            normalized.push(char::REPLACEMENT_CHARACTER);
            normalized.push(char::REPLACEMENT_CHARACTER);
        } else {
            normalized.push(c);
        }
    }

    utf8_percent_encode(&normalized, URI_COMPONENT).to_string()
}
