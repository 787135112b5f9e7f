//! Quoted, comma-delimited record codec.
//!
//! # Responsibility
//! - Encode one text field so it survives embedding in a delimited record.
//! - Split one record back into its decoded fields.
//! - Map `Event`/`Attendee` values to records and back (see [`record`]).
//!
//! # Invariants
//! - For every string `s` without line breaks,
//!   `decode_field(&encode_field(Some(s))) == s`.
//! - `decode_line` of encoded fields joined by `FIELD_DELIMITER` yields the
//!   original fields.
//! - Everything here is a pure function over constants; no shared state.

pub mod cursor;
pub mod record;

pub use cursor::{RawRecord, RecordCursor};
pub use record::{
    attendee_to_record, decode_attendee, decode_event, event_to_record, DecodeError, EventRecord,
};

/// Separates fields within one record.
pub const FIELD_DELIMITER: char = ',';
/// Separates attendee ids inside the event record's last field.
pub const ID_LIST_DELIMITER: char = ';';
/// Opens and closes a quoted field; doubled inside a quoted field.
pub const QUOTE: char = '"';
/// `chrono` format used for every persisted date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Encodes one field, quoting only when required.
///
/// `None` encodes to the empty string.
pub fn encode_field(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    if needs_quoting(text) {
        let escaped = text.replace(QUOTE, "\"\"");
        return format!("{QUOTE}{escaped}{QUOTE}");
    }
    text.to_string()
}

fn needs_quoting(text: &str) -> bool {
    text.contains([FIELD_DELIMITER, QUOTE, '\n', '\r'])
}

/// Splits one record into decoded fields with a single left-to-right scan.
///
/// Quotes toggle the inside-quotes state; a doubled quote emits one literal
/// quote without changing state. The doubled form is only recognized once a
/// field has started, so a leading quote always opens a quoted section. The
/// last field is terminated by end of input.
pub fn decode_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == QUOTE {
            if field_started && chars.peek() == Some(&QUOTE) {
                chars.next();
                current.push(QUOTE);
            } else {
                in_quotes = !in_quotes;
            }
            field_started = true;
        } else if c == FIELD_DELIMITER && !in_quotes {
            fields.push(std::mem::take(&mut current));
            field_started = false;
        } else {
            current.push(c);
            field_started = true;
        }
    }

    fields.push(current);
    fields
}

/// Removes outer quotes and collapses doubled quotes of one raw field.
///
/// Fields that are not fully quoted are returned unchanged.
pub fn decode_field(raw: &str) -> String {
    let quote_len = QUOTE.len_utf8();
    if raw.len() > quote_len && raw.starts_with(QUOTE) && raw.ends_with(QUOTE) {
        let inner = &raw[quote_len..raw.len() - quote_len];
        return inner.replace("\"\"", "\"");
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::{decode_field, decode_line, encode_field};

    #[test]
    fn plain_fields_are_left_alone() {
        assert_eq!(encode_field(Some("Main Hall")), "Main Hall");
        assert_eq!(encode_field(Some("")), "");
        assert_eq!(encode_field(None), "");
        assert_eq!(decode_field("Main Hall"), "Main Hall");
    }

    #[test]
    fn delimiter_and_quotes_force_quoting() {
        let raw = r#"Annual Meeting, Part "2""#;
        let encoded = encode_field(Some(raw));
        assert_eq!(encoded, r#""Annual Meeting, Part ""2""""#);
        assert_eq!(decode_field(&encoded), raw);
    }

    #[test]
    fn line_breaks_force_quoting() {
        assert_eq!(encode_field(Some("a\nb")), "\"a\nb\"");
        assert_eq!(encode_field(Some("a\rb")), "\"a\rb\"");
    }

    #[test]
    fn decode_line_keeps_quoted_delimiters() {
        let fields = decode_line(r#"1,"Rust, Part ""2""",2030-01-01"#);
        assert_eq!(fields, vec!["1", r#"Rust, Part "2""#, "2030-01-01"]);
    }

    #[test]
    fn decode_line_emits_trailing_empty_field() {
        assert_eq!(decode_line("1,a,"), vec!["1", "a", ""]);
        assert_eq!(decode_line(""), vec![""]);
    }

    #[test]
    fn decode_line_terminates_unclosed_field_at_end_of_input() {
        assert_eq!(decode_line(r#"1,"open, field"#), vec!["1", "open, field"]);
    }

    #[test]
    fn decode_line_handles_leading_quote_values() {
        let lone_quote = encode_field(Some("\""));
        assert_eq!(lone_quote, r#""""""#);
        assert_eq!(decode_line(&lone_quote), vec!["\""]);

        let wrapped = encode_field(Some(r#""quoted""#));
        assert_eq!(decode_line(&format!("x,{wrapped}")), vec!["x", r#""quoted""#]);
    }

    #[test]
    fn decode_line_accepts_doubled_quote_in_unquoted_field() {
        assert_eq!(decode_line(r#"a""b,c"#), vec![r#"a"b"#, "c"]);
    }

    #[test]
    fn decode_field_ignores_single_quote_and_partial_quoting() {
        assert_eq!(decode_field("\""), "\"");
        assert_eq!(decode_field("\"abc"), "\"abc");
        assert_eq!(decode_field("\"\""), "");
    }
}
