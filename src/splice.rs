//! Text substitutions applied to the original source in a single pass.
use std::ops::Range;

/// Replace the bytes in `range` with `replacement`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    pub range: Range<usize>,
    pub replacement: String,
}

/// An ordered list of non-overlapping directives.
#[derive(Clone, Debug, Default)]
pub struct Splices {
    directives: Vec<Directive>,
}
impl Splices {
    /// Sorts `directives` by position, dropping any that overlap an earlier one.
    pub fn new(mut directives: Vec<Directive>) -> Self {
        directives.sort_by_key(|d| (d.range.start, d.range.end));
        let mut end = 0;
        directives.retain(|d| {
            if d.range.start < end || d.range.start > d.range.end {
                tracing::trace!(?d.range, "dropping overlapping splice");
                return false;
            }
            end = d.range.end;
            true
        });
        Self { directives }
    }
    pub fn len(&self) -> usize {
        self.directives.len()
    }
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
    /// Produces `text` with every directive applied.
    ///
    /// Directives reaching past the end of `text` or off a char boundary are
    /// skipped.
    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(
            text.len() + self.directives.iter().map(|d| d.replacement.len()).sum::<usize>(),
        );
        let mut cursor = 0;
        for d in &self.directives {
            if d.range.end > text.len()
                || !text.is_char_boundary(d.range.start)
                || !text.is_char_boundary(d.range.end)
            {
                continue;
            }
            out.push_str(&text[cursor..d.range.start]);
            out.push_str(&d.replacement);
            cursor = d.range.end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}
