//! Applies streamed fragments to the live document at the position generation started from.
//!
//! The opening text is cleaned before insertion: models like to open with "Continuation:"
//! chatter, to restate the words right before the cursor, to open a quote nobody asked for, and
//! to begin a new word without a separating space. Leading fragments are held back while they
//! could still turn out to be chatter or a restatement split across several stream lines. Once
//! cleaned text has been inserted, later fragments go in verbatim.

use std::fmt;

use tracing::{debug, info};

use crate::core::document::DocumentView;

/// Openers a model sometimes emits instead of just continuing. Matched case-insensitively.
const CHATTER_PREFIXES: &[&str] = &[
    "here's the continuation:",
    "continuation:",
    "continued:",
    "here is the completion:",
    "here's the completion:",
    "the continuation is:",
    "completion:",
];

/// Where generated text goes, and the document revision it was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentAnchor {
    pub revision: u64,
    /// Char offset of the cursor when generation started.
    pub offset: usize,
}

impl DocumentAnchor {
    pub fn capture<D: DocumentView + ?Sized>(doc: &D) -> Self {
        Self {
            revision: doc.revision(),
            offset: doc.cursor_offset(),
        }
    }
}

/// The user edited the document after generation started; nothing more will be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleDocumentNotice {
    pub expected_revision: u64,
    pub found_revision: u64,
}

impl fmt::Display for StaleDocumentNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document was edited during generation; further text will not be inserted"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Text that went into the document, after cleanup.
    Inserted(String),
    /// Nothing left to insert once cleaned.
    Suppressed,
    /// Held back until it is clear whether the opening repeats the document.
    Pending,
    /// First fragment to arrive after a user edit. Reported once.
    Stale(StaleDocumentNotice),
    /// Insertion has stopped; the fragment was discarded.
    Halted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: String,
    pub stale: bool,
}

#[derive(Debug)]
pub struct Reconciler {
    anchor: DocumentAnchor,
    /// Document text before the anchor, used by first-fragment cleanup.
    preceding: String,
    offset: usize,
    cleanup_armed: bool,
    /// Leading text not yet inserted while cleanup is armed.
    pending: String,
    stale: bool,
    finalized: bool,
    inserted: String,
}

impl Reconciler {
    /// Capture the anchor and surrounding text from the document as it is now.
    pub fn new<D: DocumentView + ?Sized>(doc: &D) -> Self {
        let anchor = DocumentAnchor::capture(doc);
        Self::with_anchor(anchor, doc.text_before(anchor.offset))
    }

    pub fn with_anchor(anchor: DocumentAnchor, preceding: String) -> Self {
        Self {
            anchor,
            preceding,
            offset: anchor.offset,
            cleanup_armed: true,
            pending: String::new(),
            stale: false,
            finalized: false,
            inserted: String::new(),
        }
    }

    pub fn anchor(&self) -> DocumentAnchor {
        self.anchor
    }

    /// Where the next fragment will be inserted.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn apply_fragment<D: DocumentView + ?Sized>(
        &mut self,
        doc: &mut D,
        fragment: &str,
    ) -> ApplyOutcome {
        if let Some(halted) = self.check_revision(doc.revision()) {
            return halted;
        }
        if fragment.is_empty() {
            return ApplyOutcome::Suppressed;
        }
        if !self.cleanup_armed {
            return self.insert(doc, fragment.to_string());
        }

        self.pending.push_str(fragment);
        if opening_may_grow(&self.preceding, &self.pending) {
            debug!(pending = %self.pending, "holding opening text");
            return ApplyOutcome::Pending;
        }
        self.clean_pending(doc)
    }

    /// Clean and insert any held opening text. Called when the stream ends.
    pub fn flush<D: DocumentView + ?Sized>(&mut self, doc: &mut D) -> ApplyOutcome {
        if self.stale || self.finalized {
            return ApplyOutcome::Halted;
        }
        if self.pending.is_empty() {
            return ApplyOutcome::Suppressed;
        }
        if let Some(halted) = self.check_revision(doc.revision()) {
            return halted;
        }
        self.clean_pending(doc)
    }

    /// Flush held text and stop accepting fragments. Text already inserted is left as is.
    pub fn finalize<D: DocumentView + ?Sized>(&mut self, doc: &mut D) -> ReconcileSummary {
        self.flush(doc);
        self.finalized = true;
        ReconcileSummary {
            inserted: self.inserted.clone(),
            stale: self.stale,
        }
    }

    fn check_revision(&mut self, found_revision: u64) -> Option<ApplyOutcome> {
        if self.stale || self.finalized {
            return Some(ApplyOutcome::Halted);
        }
        if found_revision == self.anchor.revision {
            return None;
        }
        self.stale = true;
        self.pending.clear();
        info!(
            expected = self.anchor.revision,
            found = found_revision,
            "document changed during generation, halting insertion"
        );
        Some(ApplyOutcome::Stale(StaleDocumentNotice {
            expected_revision: self.anchor.revision,
            found_revision,
        }))
    }

    fn clean_pending<D: DocumentView + ?Sized>(&mut self, doc: &mut D) -> ApplyOutcome {
        let opening = std::mem::take(&mut self.pending);
        let cleaned = clean_first_fragment(&self.preceding, &opening);
        if cleaned.is_empty() {
            debug!(opening = %opening, "opening text emptied by cleanup");
            return ApplyOutcome::Suppressed;
        }
        self.cleanup_armed = false;
        self.insert(doc, cleaned)
    }

    fn insert<D: DocumentView + ?Sized>(&mut self, doc: &mut D, text: String) -> ApplyOutcome {
        doc.insert_text(self.offset, &text);
        self.offset += text.chars().count();
        self.inserted.push_str(&text);
        ApplyOutcome::Inserted(text)
    }
}

/// Whether more fragments could still turn `opening` into chatter or a restatement of `preceding`.
fn opening_may_grow(preceding: &str, opening: &str) -> bool {
    chatter_may_grow(opening) || overlap_may_grow(preceding, strip_chatter_prefix(opening))
}

fn chatter_may_grow(opening: &str) -> bool {
    let head = opening.trim_start().to_ascii_lowercase();
    !head.is_empty()
        && CHATTER_PREFIXES
            .iter()
            .any(|prefix| prefix.len() > head.len() && prefix.starts_with(&head))
}

/// True when `opening` starts a word-aligned run of `preceding` that it has not yet covered,
/// or covers a suffix whose trailing word boundary depends on what comes next.
fn overlap_may_grow(preceding: &str, opening: &str) -> bool {
    if opening.is_empty() {
        return false;
    }

    let mut from = 0;
    while let Some(found) = preceding[from..].find(opening) {
        let start = from + found;
        let end = start + opening.len();
        let starts_on_boundary = opening.starts_with(char::is_whitespace)
            || preceding[..start]
                .chars()
                .next_back()
                .map_or(true, char::is_whitespace);
        let open_ended = end < preceding.len() || !opening.ends_with(char::is_whitespace);
        if starts_on_boundary && open_ended {
            return true;
        }
        from = start + preceding[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Chatter removal, then anti-repetition, then quote matching, then join spacing.
pub fn clean_first_fragment(preceding: &str, fragment: &str) -> String {
    let without_chatter = strip_chatter_prefix(fragment);
    let without_repeat = drop_repeated_prefix(preceding, without_chatter);
    let cleaned = drop_unmatched_quote(preceding, without_repeat);
    if cleaned.is_empty() {
        return String::new();
    }

    let needs_space = preceding
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace())
        && cleaned.chars().next().is_some_and(char::is_alphanumeric);

    if needs_space {
        format!(" {cleaned}")
    } else {
        cleaned.to_string()
    }
}

/// Drop an opening `"` unless the text before the cursor ends with one.
pub fn drop_unmatched_quote<'a>(preceding: &str, fragment: &'a str) -> &'a str {
    match fragment.trim_start().strip_prefix('"') {
        Some(rest) if !preceding.trim_end().ends_with('"') => rest.trim_start(),
        _ => fragment,
    }
}

pub fn strip_chatter_prefix(fragment: &str) -> &str {
    let trimmed = fragment.trim_start();
    for prefix in CHATTER_PREFIXES {
        let matches = trimmed
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            return trimmed[prefix.len()..].trim_start();
        }
    }
    fragment
}

/// Drop the longest prefix of `fragment` that repeats the end of `preceding` on word boundaries.
pub fn drop_repeated_prefix<'a>(preceding: &str, fragment: &'a str) -> &'a str {
    let mut ends: Vec<usize> = fragment
        .char_indices()
        .map(|(index, c)| index + c.len_utf8())
        .filter(|&end| end <= preceding.len())
        .collect();
    ends.reverse();

    for end in ends {
        let candidate = &fragment[..end];
        if candidate.trim().is_empty() || !preceding.ends_with(candidate) {
            continue;
        }

        let start_in_doc = preceding.len() - end;
        let starts_on_boundary = candidate.starts_with(char::is_whitespace)
            || preceding[..start_in_doc]
                .chars()
                .next_back()
                .map_or(true, char::is_whitespace);
        let rest = &fragment[end..];
        let ends_on_boundary = candidate.ends_with(char::is_whitespace)
            || rest.is_empty()
            || rest.starts_with(char::is_whitespace);

        if starts_on_boundary && ends_on_boundary {
            debug!(repeated = candidate, "dropping repeated text");
            return rest;
        }
    }
    fragment
}
