/*!
 * Batch wire format.
 *
 * All texts of a chunk travel in one user message, each preceded by an
 * `<<ENTRY_i>>` marker line, with a closing `<<END>>` marker:
 *
 * ```text
 * <<ENTRY_0>>
 * Hello
 * <<ENTRY_1>>
 * World
 * <<END>>
 * ```
 *
 * When a source text already contains something that reads as one of these
 * markers, the batch switches to tagged markers (`<<ENTRY_X1_0>>`,
 * `<<END_X1>>`, ...) using the first tag that no source text contains. The
 * parser only recognises the markers of its own batch, so marker-like text
 * inside an entry is plain content.
 *
 * The model is asked to return the same markers with translated content.
 * Responses are untrusted: markers must appear exactly once each, in order,
 * the end marker must be the last one, and every entry must carry some text.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::errors::ChunkError;

/// Closing marker of an untagged batch
pub const END_MARKER: &str = "<<END>>";

// 1: entry tag, 2: entry index, 3: end tag
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<<(?:ENTRY(?:_X(\d+))?_(\d+)|END(?:_X(\d+))?)>>").expect("marker pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Entry(usize),
    End,
}

/// A marker found in a text
#[derive(Debug, Clone, Copy)]
struct FoundMarker {
    tag: Option<u32>,
    kind: MarkerKind,
    start: usize,
    end: usize,
}

/// Markers whose numbers do not fit are never produced by `compose` and are skipped
fn scan_markers(text: &str) -> impl Iterator<Item = FoundMarker> + '_ {
    MARKER_RE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let tag_digits = caps.get(1).or_else(|| caps.get(3));
        let tag = match tag_digits {
            Some(digits) => Some(digits.as_str().parse::<u32>().ok()?),
            None => None,
        };
        let kind = match caps.get(2) {
            Some(digits) => MarkerKind::Entry(digits.as_str().parse::<usize>().ok()?),
            None => MarkerKind::End,
        };
        Some(FoundMarker {
            tag,
            kind,
            start: whole.start(),
            end: whole.end(),
        })
    })
}

/// One composed chunk: the message sent to the model and the marker tag it uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    tag: Option<u32>,
    message: String,
    len: usize,
}

/// Combine the texts of a chunk into one marked-up message
pub fn compose<S: AsRef<str>>(texts: &[S]) -> Batch {
    let taken: HashSet<Option<u32>> = texts
        .iter()
        .flat_map(|text| scan_markers(text.as_ref()))
        .map(|marker| marker.tag)
        .collect();
    let tag = if taken.contains(&None) {
        (1u32..).find(|n| !taken.contains(&Some(*n)))
    } else {
        None
    };

    let mut message = String::new();
    for (idx, text) in texts.iter().enumerate() {
        message.push_str(&entry_marker(tag, idx));
        message.push('\n');
        message.push_str(text.as_ref());
        message.push('\n');
    }
    message.push_str(&end_marker(tag));

    Batch {
        tag,
        message,
        len: texts.len(),
    }
}

fn entry_marker(tag: Option<u32>, index: usize) -> String {
    match tag {
        Some(tag) => format!("<<ENTRY_X{}_{}>>", tag, index),
        None => format!("<<ENTRY_{}>>", index),
    }
}

fn end_marker(tag: Option<u32>) -> String {
    match tag {
        Some(tag) => format!("<<END_X{}>>", tag),
        None => END_MARKER.to_string(),
    }
}

impl Batch {
    /// User message carrying the marked-up texts
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the batch has no entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Opening marker of entry `index` in this batch
    pub fn entry_marker(&self, index: usize) -> String {
        entry_marker(self.tag, index)
    }

    /// Closing marker of this batch
    pub fn end_marker(&self) -> String {
        end_marker(self.tag)
    }

    /// Split a response back into exactly one trimmed entry per source text
    pub fn parse(&self, response: &str) -> Result<Vec<String>, ChunkError> {
        let expected = self.len;
        let markers: Vec<FoundMarker> = scan_markers(response)
            .filter(|marker| marker.tag == self.tag)
            .collect();

        let entries = markers
            .iter()
            .filter(|marker| matches!(marker.kind, MarkerKind::Entry(_)))
            .count();
        if entries != expected {
            return Err(ChunkError::CountMismatch {
                expected,
                actual: entries,
            });
        }

        let mut translations = Vec::with_capacity(expected);
        for (position, window) in markers.windows(2).enumerate().take(expected) {
            if window[0].kind != MarkerKind::Entry(position) {
                return Err(ChunkError::MissingMarker(position));
            }

            let text = response[window[0].end..window[1].start].trim();
            if text.is_empty() {
                return Err(ChunkError::EmptyTranslation(position));
            }
            translations.push(text.to_string());
        }

        if translations.len() != expected
            || markers.get(expected).map(|marker| marker.kind) != Some(MarkerKind::End)
        {
            return Err(ChunkError::MissingMarker(translations.len()));
        }
        // Anything after the end marker would mean an entry was cut short
        if markers.len() > expected + 1 {
            return Err(ChunkError::TrailingMarker);
        }
        Ok(translations)
    }
}

/// Carry the source's leading and trailing whitespace over to a trimmed translation.
///
/// Runs inside a paragraph are often separated only by the spaces they end
/// or start with, so dropping them would glue words together.
pub fn restore_padding(source: &str, translated: &str) -> String {
    let core = translated.trim();
    let leading = &source[..source.len() - source.trim_start().len()];
    let trailing = &source[source.trim_end().len()..];
    format!("{}{}{}", leading, core, trailing)
}
