//! Minimal document query capability over raw HTML.
//!
//! The core logic only ever needs three things from a page: select elements
//! by tag name or `#id`, read an attribute, and read text. [`DocumentQuery`]
//! is that narrow interface; [`HtmlDocument`] implements it with a small
//! regex-based tag scanner, in the same spirit as the meta-tag extraction used
//! elsewhere in the project.
//!
//! The scanner is not a conforming HTML parser. It ignores comments and
//! `<script>`/`<style>` bodies, handles quoted attributes containing `>`, and
//! decodes the common character references in attribute values and text.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use regex::{Captures, Regex};

use crate::resolver::utils::compile_static_regex;

static SKIPPED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
});
static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"<([A-Za-z][A-Za-z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
});
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"<[^>]*>"));
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z]+);"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

/// Elements that never have content or a closing tag.
const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// What to select from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// All elements with this tag name (case-insensitive).
    Tag(String),
    /// All elements whose `id` attribute equals this value (case-sensitive).
    Id(String),
}

impl Selector {
    /// Parses `#id` or `tag` selector syntax.
    #[must_use]
    pub fn parse(selector: &str) -> Self {
        match selector.trim().strip_prefix('#') {
            Some(id) => Self::Id(id.to_string()),
            None => Self::Tag(selector.trim().to_ascii_lowercase()),
        }
    }

    /// Selects by tag name.
    #[must_use]
    pub fn tag(name: &str) -> Self {
        Self::Tag(name.to_ascii_lowercase())
    }

    /// Selects by element id.
    #[must_use]
    pub fn id(id: &str) -> Self {
        Self::Id(id.to_string())
    }

    fn matches(&self, element: &Element) -> bool {
        match self {
            Self::Tag(name) => element.tag == *name,
            Self::Id(id) => element.attr("id") == Some(id.as_str()),
        }
    }
}

/// Cleaned document source shared by every element parsed from it.
#[derive(Clone, PartialEq, Eq)]
struct Source {
    html: String,
    lowered: String,
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("len", &self.html.len())
            .finish_non_exhaustive()
    }
}

/// Element text, resolved from the document on first access.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    Empty,
    Fixed(String),
    Deferred {
        source: Arc<Source>,
        start: usize,
        text: OnceLock<String>,
    },
}

/// One element found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    content: Content,
}

impl Element {
    /// Builds an element directly (useful for fixture documents).
    #[must_use]
    pub fn new(tag: &str, attributes: &[(&str, &str)], text: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), (*value).to_string()))
                .collect(),
            content: Content::Fixed(text.to_string()),
        }
    }

    /// Lowercased tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the decoded value of the first attribute named `name` (case-insensitive).
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the element's text content with whitespace runs collapsed.
    ///
    /// Parsed elements compute this on first call.
    #[must_use]
    pub fn text(&self) -> &str {
        match &self.content {
            Content::Empty => "",
            Content::Fixed(text) => text,
            Content::Deferred {
                source,
                start,
                text,
            } => text.get_or_init(|| inner_text(&source.html, &source.lowered, &self.tag, *start)),
        }
    }

    #[cfg(test)]
    fn text_resolved(&self) -> bool {
        match &self.content {
            Content::Deferred { text, .. } => text.get().is_some(),
            Content::Empty | Content::Fixed(_) => true,
        }
    }
}

/// Narrow query interface over a parsed document.
pub trait DocumentQuery: Send + Sync {
    /// Returns every element matching `selector`, in document order.
    fn select(&self, selector: &Selector) -> Vec<&Element>;
}

/// A parsed HTML document.
#[derive(Debug, Clone, Default)]
pub struct HtmlDocument {
    elements: Vec<Element>,
}

impl HtmlDocument {
    /// Parses raw HTML.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let html = SKIPPED_BLOCK_RE.replace_all(html, " ").into_owned();
        let source = Arc::new(Source {
            lowered: html.to_ascii_lowercase(),
            html,
        });

        let elements = OPEN_TAG_RE
            .captures_iter(&source.html)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let tag = caps.get(1)?.as_str().to_ascii_lowercase();
                let attributes = caps
                    .get(2)
                    .map(|raw| parse_attributes(raw.as_str()))
                    .unwrap_or_default();
                let self_closing = whole.as_str().ends_with("/>");
                let content = if self_closing || VOID_TAGS.contains(&tag.as_str()) {
                    Content::Empty
                } else {
                    Content::Deferred {
                        source: Arc::clone(&source),
                        start: whole.end(),
                        text: OnceLock::new(),
                    }
                };
                Some(Element {
                    tag,
                    attributes,
                    content,
                })
            })
            .collect();

        Self { elements }
    }

    /// Builds a document from pre-made elements.
    #[must_use]
    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    /// Returns the number of elements found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if no elements were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl DocumentQuery for HtmlDocument {
    fn select(&self, selector: &Selector) -> Vec<&Element> {
        self.elements
            .iter()
            .filter(|element| selector.matches(element))
            .collect()
    }
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some((name, decode_entities(value).into_owned()))
        })
        .collect()
}

/// Text between the end of an opening tag and the next matching closing tag.
fn inner_text(html: &str, lowered: &str, tag: &str, start: usize) -> String {
    let closing = format!("</{tag}");
    let Some(offset) = lowered[start..].find(&closing) else {
        return String::new();
    };
    let inner = &html[start..start + offset];
    let stripped = TAG_RE.replace_all(inner, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

/// Decodes numeric and common named character references.
#[must_use]
pub fn decode_entities(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    ENTITY_RE.replace_all(value, |caps: &Captures<'_>| {
        let entity = &caps[1];
        let decoded = if let Some(hex) = entity
            .strip_prefix("#x")
            .or_else(|| entity.strip_prefix("#X"))
        {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = entity.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32)
        } else {
            match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => None,
            }
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    })
}
