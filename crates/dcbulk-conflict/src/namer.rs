//! Autorename naming
//!
//! Generates the numbered alternatives for a taken name, following the
//! pattern `stem (n).ext` with `n` starting at 1.

/// Generates deterministic alternative names
pub struct AutoRenamer;

impl AutoRenamer {
    /// The `n`-th alternative for `original_name`
    ///
    /// Given "report.docx" and 2, produces "report (2).docx". Leading dots
    /// (hidden files) are part of the stem.
    #[must_use]
    pub fn candidate(original_name: &str, n: usize) -> String {
        match original_name.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => {
                let stem = &original_name[..dot_pos];
                let ext = &original_name[dot_pos..];
                format!("{stem} ({n}){ext}")
            }
            _ => format!("{original_name} ({n})"),
        }
    }

    /// The first alternative for which `taken` returns false
    pub fn first_unused<F>(original_name: &str, mut taken: F) -> String
    where
        F: FnMut(&str) -> bool,
    {
        (1..)
            .map(|n| Self::candidate(original_name, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| original_name.to_string())
    }
}
