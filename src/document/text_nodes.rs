/*!
 * Text-node scanning for WordprocessingML parts.
 *
 * A text node is one `<w:t>` element. Nodes are addressed by their ordinal
 * within the part, counting every `<w:t>` element in document order, so the
 * addresses are the same on every pass over an unmodified part.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;

/// Matches `<w:t>` / `<w:t attr="...">` ... `</w:t>`, capturing the open tag and the content
static TEXT_NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(<w:t(?:\s[^>]*)?>)([^<]*)</w:t>").expect("text node pattern is valid")
});

/// A `<w:t>` element located inside an XML part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    /// Ordinal of the element within the part
    pub index: usize,
    /// Byte range of the opening tag
    pub open_tag: Range<usize>,
    /// Byte range of the escaped text content
    pub content: Range<usize>,
    /// Unescaped text
    pub text: String,
}

impl TextNode {
    /// Whether the node carries anything worth translating
    pub fn is_translatable(&self) -> bool {
        is_translatable(&self.text)
    }
}

/// A node is translatable iff it has at least one non-whitespace character
pub fn is_translatable(text: &str) -> bool {
    text.chars().any(|c| !c.is_whitespace())
}

/// Find every text node of a part, in document order
pub fn scan_text_nodes(xml: &str) -> Vec<TextNode> {
    TEXT_NODE_RE
        .captures_iter(xml)
        .enumerate()
        .filter_map(|(index, caps)| {
            let open = caps.get(1)?;
            let content = caps.get(2)?;
            Some(TextNode {
                index,
                open_tag: open.range(),
                content: content.range(),
                text: unescape_xml(content.as_str()),
            })
        })
        .collect()
}

/// Rewrite the content of the given nodes, copying every other byte verbatim.
///
/// Returns the new part and the node indices that did not exist in `xml`.
pub fn replace_text_nodes(xml: &str, replacements: &BTreeMap<usize, String>) -> (String, Vec<usize>) {
    let nodes = scan_text_nodes(xml);
    let mut output = String::with_capacity(xml.len());
    let mut cursor = 0;

    for node in &nodes {
        let Some(new_text) = replacements.get(&node.index) else {
            continue;
        };

        let open_tag = &xml[node.open_tag.clone()];
        output.push_str(&xml[cursor..node.open_tag.start]);
        if needs_space_preserve(new_text) && !open_tag.contains("xml:space") {
            // "<w:t" + ' xml:space="preserve"' + rest of the tag
            output.push_str("<w:t xml:space=\"preserve\"");
            output.push_str(&open_tag[4..]);
        } else {
            output.push_str(open_tag);
        }
        output.push_str(&escape_xml(new_text));
        cursor = node.content.end;
    }
    output.push_str(&xml[cursor..]);

    let missing = replacements
        .keys()
        .filter(|index| **index >= nodes.len())
        .copied()
        .collect();

    (output, missing)
}

fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

/// Escape text for use as XML character data
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Resolve predefined entities and character references.
/// Unknown or malformed references are kept literally.
pub fn unescape_xml(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut result = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let after = &rest[amp..];

        let decoded = after.find(';').and_then(|semi| {
            let entity = &after[1..semi];
            let ch = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
                _ => None,
            };
            ch.map(|c| (c, semi + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                result.push(c);
                rest = &after[consumed..];
            }
            None => {
                result.push('&');
                rest = &after[1..];
            }
        }
    }
    result.push_str(rest);
    result
}
