//! Markdown heading splitter.
//!
//! Layout analysis emits Markdown with `#`-style headings. This module cuts that text into
//! [`HeaderSection`]s, one per heading, and records which headings are in force for each span
//! (the heading itself plus its ancestors). Lines inside fenced code blocks never start a section.

use super::types::{HeaderMap, HeaderSection};

/// Marker prefix and the metadata label it maps to, e.g. `("##", "Header 2")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRule {
    /// Line prefix that introduces the heading.
    pub marker: String,
    /// Key stored in [`HeaderSection::headers`].
    pub label: String,
}

impl HeadingRule {
    /// Build a rule from a marker and label.
    pub fn new(marker: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            label: label.into(),
        }
    }

    /// Standard Markdown rules `#` through `#` x `depth`, labelled `Header 1`..`Header N`.
    pub fn markdown_levels(depth: usize) -> Vec<Self> {
        (1..=depth)
            .map(|level| Self::new("#".repeat(level), format!("Header {level}")))
            .collect()
    }

    fn level(&self) -> usize {
        self.marker.chars().count()
    }
}

struct ActiveHeading<'a> {
    level: usize,
    label: &'a str,
    text: String,
}

/// Split `text` into sections along the configured headings, preserving document order.
///
/// Section content is the exact text between two heading lines, minus the newline that ends the
/// last content line. Blank sections are dropped, so a non-blank document without headings yields
/// one section equal to the input.
pub fn split_by_headers(text: &str, rules: &[HeadingRule]) -> Vec<HeaderSection> {
    let mut ordered: Vec<&HeadingRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| std::cmp::Reverse(rule.marker.len()));

    let mut sections = Vec::new();
    let mut stack: Vec<ActiveHeading<'_>> = Vec::new();
    let mut content_start = 0;
    let mut offset = 0;
    let mut fence: Option<&'static str> = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let stripped = line.trim();

        if let Some(marker) = fence {
            if closes_fence(stripped, marker) {
                fence = None;
            }
            continue;
        }
        if let Some(marker) = opening_fence(stripped) {
            fence = Some(marker);
            continue;
        }

        let Some((rule, title)) = match_heading(stripped, &ordered) else {
            continue;
        };

        push_section(&mut sections, &text[content_start..line_start], true, &stack);

        let level = rule.level();
        stack.retain(|active| active.level < level);
        stack.push(ActiveHeading {
            level,
            label: &rule.label,
            text: title.to_string(),
        });
        content_start = offset;
    }

    push_section(&mut sections, &text[content_start..], false, &stack);
    sections
}

fn opening_fence(line: &str) -> Option<&'static str> {
    ["```", "~~~"]
        .into_iter()
        .find(|marker| line.starts_with(marker))
}

/// A closing fence is the marker character repeated, with no info string.
fn closes_fence(line: &str, marker: &str) -> bool {
    let Some(fence_char) = marker.chars().next() else {
        return false;
    };
    line.starts_with(marker) && line.chars().all(|ch| ch == fence_char)
}

fn match_heading<'r, 'l>(
    line: &'l str,
    rules: &[&'r HeadingRule],
) -> Option<(&'r HeadingRule, &'l str)> {
    rules.iter().find_map(|rule| {
        let rest = line.strip_prefix(rule.marker.as_str())?;
        if rest.is_empty() || rest.starts_with([' ', '\t']) {
            Some((*rule, rest.trim()))
        } else {
            None
        }
    })
}

fn push_section(
    sections: &mut Vec<HeaderSection>,
    span: &str,
    followed_by_heading: bool,
    stack: &[ActiveHeading<'_>],
) {
    let content = if followed_by_heading {
        let without_newline = span.strip_suffix('\n').unwrap_or(span);
        without_newline.strip_suffix('\r').unwrap_or(without_newline)
    } else {
        span
    };

    if content.trim().is_empty() {
        return;
    }

    let headers: HeaderMap = stack
        .iter()
        .map(|active| (active.label.to_string(), active.text.clone()))
        .collect();

    sections.push(HeaderSection {
        content: content.to_string(),
        headers,
    });
}
