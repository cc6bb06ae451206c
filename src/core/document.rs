//! The document as seen by the generation pipeline.
//!
//! Offsets are counted in chars, matching how editors report cursor positions.

use std::ops::Range;

/// What the pipeline needs from whatever holds the user's text.
pub trait DocumentView {
    /// Bumped on every user-originated edit. Generated insertions do not bump it.
    fn revision(&self) -> u64;
    fn cursor_offset(&self) -> usize;
    /// Text from the start of the document up to `offset` (clamped to the end).
    fn text_before(&self, offset: usize) -> String;
    /// Insert generated text at `offset` without counting it as a user edit.
    fn insert_text(&mut self, offset: usize, text: &str);
}

/// In-memory document with a cursor and a user-edit revision counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    cursor: usize,
    revision: u64,
}

impl TextBuffer {
    /// Buffer holding `text` with the cursor at the end.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self {
            text,
            cursor,
            revision: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn set_cursor(&mut self, offset: usize) {
        self.cursor = offset.min(self.len_chars());
    }

    /// User typing at `offset`.
    pub fn edit_insert(&mut self, offset: usize, text: &str) {
        let offset = offset.min(self.len_chars());
        let at = self.byte_index(offset);
        self.text.insert_str(at, text);
        if self.cursor >= offset {
            self.cursor += text.chars().count();
        }
        self.revision += 1;
    }

    /// User deleting the chars in `range`.
    pub fn edit_delete(&mut self, range: Range<usize>) {
        let len = self.len_chars();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        if start == end {
            return;
        }
        let (from, to) = (self.byte_index(start), self.byte_index(end));
        self.text.replace_range(from..to, "");
        if self.cursor >= end {
            self.cursor -= end - start;
        } else if self.cursor > start {
            self.cursor = start;
        }
        self.revision += 1;
    }

    fn byte_index(&self, char_offset: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_offset)
            .map(|(index, _)| index)
            .unwrap_or(self.text.len())
    }
}

impl DocumentView for TextBuffer {
    fn revision(&self) -> u64 {
        self.revision
    }

    fn cursor_offset(&self) -> usize {
        self.cursor
    }

    fn text_before(&self, offset: usize) -> String {
        self.text.chars().take(offset).collect()
    }

    fn insert_text(&mut self, offset: usize, text: &str) {
        let offset = offset.min(self.len_chars());
        let at = self.byte_index(offset);
        self.text.insert_str(at, text);
        if self.cursor >= offset {
            self.cursor += text.chars().count();
        }
    }
}
