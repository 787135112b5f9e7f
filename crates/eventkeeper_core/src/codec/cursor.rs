//! Groups physical lines into logical records.
//!
//! A quoted field may hold a line break, so one record can span several
//! physical lines. A record stays open while its quote count is odd.
//!
//! Lines are split on `\n` only. A `\r` before it is a line terminator
//! when it closes a record and field text when it sits inside a quote.

use super::QUOTE;

/// One logical record read from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based number of the first physical line.
    pub line_no: usize,
    /// Number of physical lines joined into `text`.
    pub line_count: usize,
    /// Record text; joined lines are separated by `\n`.
    pub text: String,
}

/// Forward-only reader over the logical records of one file's content.
///
/// Blank lines are skipped. When the input ends inside an open quote, only
/// the first physical line is returned, so a stray quote never swallows the
/// rest of the file.
pub struct RecordCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> RecordCursor<'a> {
    pub fn new(content: &'a str) -> Self {
        let mut lines: Vec<&str> = content.split('\n').collect();
        if lines.last() == Some(&"") {
            lines.pop();
        }
        Self { lines, pos: 0 }
    }

    /// Re-reads the input starting right after the first line of `record`.
    ///
    /// Used when a multi-line record fails to decode: its first line is
    /// dropped and the following lines get a chance as records of their own.
    pub fn resume_after_first_line(&mut self, record: &RawRecord) {
        self.pos = record.line_no;
    }
}

impl Iterator for RecordCursor<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.lines.len() && self.lines[self.pos].trim().is_empty() {
            self.pos += 1;
        }
        let start = self.pos;
        let first = *self.lines.get(start)?;

        let mut text = first.to_string();
        let mut open = quote_count(first) % 2 == 1;
        let mut end = start + 1;
        while open && end < self.lines.len() {
            text.push('\n');
            text.push_str(self.lines[end]);
            open ^= quote_count(self.lines[end]) % 2 == 1;
            end += 1;
        }

        if open {
            // Unbalanced to the end of input: treat the first line alone.
            text = strip_carriage_return(first).to_string();
            end = start + 1;
        } else if text.ends_with('\r') {
            text.pop();
        }

        self.pos = end;
        Some(RawRecord {
            line_no: start + 1,
            line_count: end - start,
            text,
        })
    }
}

fn quote_count(line: &str) -> usize {
    line.chars().filter(|c| *c == QUOTE).count()
}

fn strip_carriage_return(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}
