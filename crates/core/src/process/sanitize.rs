//! Terminal-output cleanup for non-terminal rendering surfaces.
//!
//! Strips ANSI CSI escape sequences (`ESC [ params intermediates final`)
//! and collapses `<char><BS>` overstrike pairs such as the bold/underline
//! encoding produced by `man`.

use std::sync::LazyLock;

use regex::Regex;

/// Longest output (in characters) delivered inline; anything longer should
/// be sent as a document.
pub const OUTPUT_LIMIT_LENGTH: usize = 4095;

static ANSI_CSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[\x30-\x3f\x20-\x2f]*?[\x40-\x7e]").expect("valid regex")
});

static BACKSPACE_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".\x08").expect("valid regex"));

/// Remove CSI sequences, then `<char><BS>` pairs.
pub fn ansi_filter(text: &str) -> String {
    let without_csi = ANSI_CSI_RE.replace_all(text, "");
    BACKSPACE_PAIR_RE.replace_all(&without_csi, "").into_owned()
}

/// Plain text produced by [`ansi_filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn new(raw: &str) -> Self {
        Self(ansi_filter(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in characters, as a chat surface would count it.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// Whether the caller should switch to file delivery.
    pub fn exceeds_inline_limit(&self) -> bool {
        self.char_len() > OUTPUT_LIMIT_LENGTH
    }
}

impl std::fmt::Display for SanitizedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
