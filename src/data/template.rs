use regex::Regex;

use super::placeholder::{ExtractionError, Placeholder, SENTINEL_CLOSE, SENTINEL_OPEN};

/// Sentinel-bearing document text together with a matcher for its placeholder ids.
///
/// The matcher is a single alternation of regex-escaped ids, so ids containing
/// pattern metacharacters are matched literally and one pass over the text finds
/// every sentinel without overlaps. Sentinels naming unknown ids are never matched.
#[derive(Debug, Clone)]
pub struct Template {
    text: String,
    pattern: Option<Regex>,
}

impl Template {
    pub fn compile(text: impl Into<String>, placeholders: &[Placeholder]) -> Result<Self, ExtractionError> {
        let text = text.into();
        if placeholders.is_empty() {
            return Ok(Self { text, pattern: None });
        }

        // Longest first, so a prefix id never shadows a longer one.
        let mut ids: Vec<&str> = placeholders.iter().map(|p| p.id.as_str()).collect();
        ids.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = ids
            .iter()
            .map(|id| regex::escape(id))
            .collect::<Vec<_>>()
            .join("|");

        let source = format!(
            "{}({}){}",
            regex::escape(SENTINEL_OPEN),
            alternation,
            regex::escape(SENTINEL_CLOSE)
        );
        let pattern = Regex::new(&source).map_err(|e| ExtractionError::Pattern(e.to_string()))?;

        Ok(Self {
            text,
            pattern: Some(pattern),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of sentinel occurrences for `id`
    pub fn occurrences(&self, id: &str) -> usize {
        match &self.pattern {
            Some(pattern) => pattern
                .captures_iter(&self.text)
                .filter(|caps| caps.get(1).is_some_and(|m| m.as_str() == id))
                .count(),
            None => 0,
        }
    }

    /// Rebuilds the text in one left-to-right pass.
    ///
    /// `literal` receives every stretch of text between sentinels, `fragment` receives
    /// the id of every sentinel; both append to the output buffer.
    pub fn substitute<L, F>(&self, mut literal: L, mut fragment: F) -> String
    where
        L: FnMut(&str, &mut String),
        F: FnMut(&str, &mut String),
    {
        let mut out = String::with_capacity(self.text.len());
        let Some(pattern) = &self.pattern else {
            literal(&self.text, &mut out);
            return out;
        };

        let mut last_end = 0;
        for caps in pattern.captures_iter(&self.text) {
            let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            literal(&self.text[last_end..whole.start()], &mut out);
            fragment(id.as_str(), &mut out);
            last_end = whole.end();
        }
        literal(&self.text[last_end..], &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholders(ids: &[&str]) -> Vec<Placeholder> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Placeholder::new(*id, i, *id))
            .collect()
    }

    fn bracketed(template: &Template) -> String {
        template.substitute(
            |text, out| out.push_str(text),
            |id, out| {
                out.push('{');
                out.push_str(id);
                out.push('}');
            },
        )
    }

    #[test]
    fn test_counts_repeated_occurrences() {
        let template = Template::compile("<<a>> and <<a>> and <<b>>", &placeholders(&["a", "b"])).unwrap();
        assert_eq!(template.occurrences("a"), 2);
        assert_eq!(template.occurrences("b"), 1);
        assert_eq!(template.occurrences("c"), 0);
    }

    #[test]
    fn test_prefix_ids_resolve_to_the_right_placeholder() {
        let template =
            Template::compile("<<name>> / <<name_full>>", &placeholders(&["name", "name_full"])).unwrap();
        assert_eq!(bracketed(&template), "{name} / {name_full}");
    }

    #[test]
    fn test_metacharacter_ids_match_literally() {
        let template = Template::compile("Pay $<<amount.(usd)+>> to <<amountX(usd)>>", &placeholders(&["amount.(usd)+"]))
            .unwrap();
        assert_eq!(bracketed(&template), "Pay ${amount.(usd)+} to <<amountX(usd)>>");
    }

    #[test]
    fn test_unknown_sentinels_are_left_alone() {
        let template = Template::compile("<<known>> <<unknown>>", &placeholders(&["known"])).unwrap();
        assert_eq!(bracketed(&template), "{known} <<unknown>>");
    }

    #[test]
    fn test_no_placeholders_passes_text_through() {
        let template = Template::compile("plain text <<x>>", &[]).unwrap();
        assert_eq!(bracketed(&template), "plain text <<x>>");
        assert_eq!(template.text(), "plain text <<x>>");
    }
}
