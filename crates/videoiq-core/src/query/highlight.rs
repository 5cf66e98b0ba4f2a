//! Case-insensitive match highlighting over transcript text.

use regex::RegexBuilder;
use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// Transcript text with the byte ranges where a query occurs
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightedText {
    text: String,
    spans: Vec<Range<usize>>,
}

impl HighlightedText {
    /// Finds every non-overlapping, case-insensitive occurrence of `query`.
    ///
    /// The query is matched as a literal. Spans keep the original casing of
    /// `text`.
    pub fn find(text: &str, query: &str) -> Self {
        let query = query.trim();
        let spans = if query.is_empty() {
            Vec::new()
        } else {
            match RegexBuilder::new(&regex::escape(query))
                .case_insensitive(true)
                .build()
            {
                Ok(re) => re.find_iter(text).map(|m| m.range()).collect(),
                Err(e) => {
                    tracing::warn!("Cannot build highlight pattern: {}", e);
                    Vec::new()
                }
            }
        };

        Self {
            text: text.to_string(),
            spans,
        }
    }

    pub fn is_match(&self) -> bool {
        !self.spans.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    /// Matched substrings in order of appearance
    pub fn matches(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(move |span| &self.text[span.clone()])
    }

    /// Wraps every span with `open`/`close`
    pub fn render_with(&self, open: &str, close: &str) -> String {
        let mut out = String::with_capacity(
            self.text.len() + self.spans.len() * (open.len() + close.len()),
        );
        let mut cursor = 0;
        for span in &self.spans {
            out.push_str(&self.text[cursor..span.start]);
            out.push_str(open);
            out.push_str(&self.text[span.clone()]);
            out.push_str(close);
            cursor = span.end;
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

impl fmt::Display for HighlightedText {
    /// Markdown emphasis
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_with("**", "**"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_keeps_original_casing() {
        let hl = HighlightedText::find("We discussed Pricing strategy", "pricing");
        assert_eq!(hl.spans(), &[13..20]);
        assert_eq!(hl.matches().collect::<Vec<_>>(), vec!["Pricing"]);
        assert_eq!(hl.to_string(), "We discussed **Pricing** strategy");
    }

    #[test]
    fn test_mixed_case_occurrences_highlighted_once_each() {
        let hl = HighlightedText::find("Price, price and PRICE", "price");
        assert_eq!(hl.spans().len(), 3);
        assert_eq!(hl.to_string(), "**Price**, **price** and **PRICE**");
    }

    #[test]
    fn test_query_is_literal() {
        let hl = HighlightedText::find("We write C++ (mostly)", "c++ (");
        assert_eq!(hl.to_string(), "We write **C++ (**mostly)");

        let hl = HighlightedText::find("anything", ".*");
        assert!(!hl.is_match());
    }

    #[test]
    fn test_occurrences_do_not_overlap() {
        let hl = HighlightedText::find("aaaa", "aa");
        assert_eq!(hl.spans(), &[0..2, 2..4]);
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let hl = HighlightedText::find("some text", "   ");
        assert!(!hl.is_match());
        assert_eq!(hl.to_string(), "some text");
    }

    #[test]
    fn test_query_is_trimmed() {
        let hl = HighlightedText::find("the intro part", "  intro ");
        assert_eq!(hl.render_with("<", ">"), "the <intro> part");
    }
}
