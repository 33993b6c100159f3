use crate::types::syntax::{Kind, Syntax};

/// Finds the open sequences of the configured syntax in raw template text.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Searcher {
    /// Open sequences, longest first.
    openers: Vec<(Kind, Vec<u8>)>,
    /// The set of bytes that can start an open sequence.
    starts: Vec<u8>,
}

impl Searcher {
    pub fn new(syntax: &Syntax) -> Self {
        let openers: Vec<_> = syntax
            .openers
            .iter()
            .map(|(kind, s)| (*kind, s.as_bytes().to_vec()))
            .collect();
        let mut starts: Vec<u8> = openers.iter().map(|(_, s)| s[0]).collect();
        starts.sort_unstable();
        starts.dedup();
        Self { openers, starts }
    }

    /// Returns the kind, start and end of the first open sequence at or after
    /// `at`.
    ///
    /// Line statement openers only match at the start of a line.
    pub fn find_at(&self, haystack: &str, at: usize) -> Option<(Kind, usize, usize)> {
        let bytes = haystack.as_bytes();
        let mut i = at;
        while i < bytes.len() {
            // Skip straight to the next byte that could start an open sequence.
            i += bytes[i..].iter().position(|b| self.starts.contains(b))?;
            let rest = &bytes[i..];
            let line_start = i == 0 || bytes[i - 1] == b'\n';
            for (kind, pat) in &self.openers {
                if rest.starts_with(pat) && (*kind != Kind::Line || line_start) {
                    return Some((*kind, i, i + pat.len()));
                }
            }
            i += 1;
        }
        None
    }
}
