//! # Text Wrapping
//!
//! Greedy word wrap used to estimate how tall a block's text will be.
//!
//! This approximates the downstream renderer's line breaking rather than
//! reproducing it: words are never split, a word wider than the column sits
//! alone on its line, and every mandatory break (UAX#14: LF, CR LF, NEL,
//! U+2028/2029, ...) closes the current line. The guarantees are the ones
//! pagination needs:
//!
//! - **stable**: the same input always yields the same lines;
//! - **monotonic**: appending words never reduces the line count.

use serde::Serialize;
use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::font::TextMeasure;

/// A line of text after wrapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrappedLine {
    pub text: String,
    /// Measured width in points.
    pub width: f64,
}

/// Greedy line wrapper bound to one reference font family.
pub struct LineWrapper<'a> {
    measure: &'a dyn TextMeasure,
    font_family: &'a str,
}

impl<'a> LineWrapper<'a> {
    pub fn new(measure: &'a dyn TextMeasure, font_family: &'a str) -> Self {
        Self {
            measure,
            font_family,
        }
    }

    /// Break `text` into lines no wider than `max_width` where possible.
    ///
    /// Whitespace-only input yields no lines. A blank line between
    /// paragraphs yields one empty line.
    pub fn wrap(&self, text: &str, max_width: f64, font_size: f64) -> Vec<WrappedLine> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut lines = Vec::new();
        for paragraph in split_paragraphs(text) {
            let mut current = String::new();

            for word in paragraph.split_whitespace() {
                if current.is_empty() {
                    current.push_str(word);
                    continue;
                }
                let candidate = format!("{} {}", current, word);
                if self.width(&candidate, font_size) <= max_width {
                    current = candidate;
                } else {
                    let finished = std::mem::replace(&mut current, word.to_string());
                    lines.push(self.make_line(finished, font_size));
                }
            }

            // An empty `current` here means the paragraph had no words: a blank line.
            lines.push(self.make_line(current, font_size));
        }

        lines
    }

    /// Number of lines `text` wraps to.
    pub fn line_count(&self, text: &str, max_width: f64, font_size: f64) -> usize {
        self.wrap(text, max_width, font_size).len()
    }

    fn width(&self, text: &str, font_size: f64) -> f64 {
        self.measure.width(text, self.font_family, font_size)
    }

    fn make_line(&self, text: String, font_size: f64) -> WrappedLine {
        let width = self.width(&text, font_size);
        WrappedLine { text, width }
    }
}

/// Split text at mandatory line breaks, dropping the terminators.
///
/// `linebreaks` always reports a mandatory break at the end of the text,
/// so a trailing newline does not produce an extra empty paragraph.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start = 0;
    for (offset, opportunity) in linebreaks(text) {
        if matches!(opportunity, BreakOpportunity::Mandatory) {
            paragraphs.push(text[start..offset].trim_end_matches(is_line_terminator));
            start = offset;
        }
    }
    if start < text.len() {
        paragraphs.push(&text[start..]);
    }
    paragraphs
}

fn is_line_terminator(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}
