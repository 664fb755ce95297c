use crate::contexts::resolution::ResolutionState;
use crate::data::Template;

/// Shown in place of an empty value so the fragment stays visible
pub const BLANK_GLYPH: &str = "&nbsp;";

/// Highlight of a placeholder in the preview, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Current,
    Skipped,
    Filled,
    Untouched,
}

impl Highlight {
    pub fn class(&self) -> Option<&'static str> {
        match self {
            Highlight::Current => Some("current-editing"),
            Highlight::Skipped => Some("skipped"),
            Highlight::Filled => Some("filled"),
            Highlight::Untouched => None,
        }
    }
}

/// Highlight for `id` given the current state
pub fn highlight(state: &ResolutionState, id: &str) -> Highlight {
    if state.active_id() == Some(id) {
        Highlight::Current
    } else if state.is_skipped(id) {
        Highlight::Skipped
    } else if state.value(id).is_some_and(|v| !v.trim().is_empty()) {
        Highlight::Filled
    } else {
        Highlight::Untouched
    }
}

/// Renders the live HTML preview.
///
/// Every sentinel becomes `<span id="preview-{id}" class="placeholder-span {class}">`
/// holding the current value. Literal template text and values are HTML-escaped.
/// The output depends only on the template and the state.
pub fn render_preview(template: &Template, state: &ResolutionState) -> String {
    template.substitute(
        |text, out| escape_html_into(text, out),
        |id, out| {
            let value = state.value(id).unwrap_or("");
            out.push_str("<span id=\"preview-");
            escape_html_into(id, out);
            out.push_str("\" class=\"placeholder-span");
            if let Some(class) = highlight(state, id).class() {
                out.push(' ');
                out.push_str(class);
            }
            out.push_str("\">");
            if value.is_empty() {
                out.push_str(BLANK_GLYPH);
            } else {
                escape_html_into(value, out);
            }
            out.push_str("</span>");
        },
    )
}

/// Converts a rendered preview to wrapped plain text for terminal display
pub fn preview_text(preview_html: &str, width: usize) -> Result<String, html2text::Error> {
    let wrapped = format!("<pre>{}</pre>", preview_html);
    html2text::from_read(wrapped.as_bytes(), width)
}

fn escape_html_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Placeholder;

    fn setup() -> (Template, ResolutionState) {
        let placeholders = vec![
            Placeholder::new("NAME", 3, "Name"),
            Placeholder::new("DATE", 7, "Date"),
        ];
        let template =
            Template::compile("Hello <<NAME>>, today is <<DATE>>. Signed <<NAME>>.", &placeholders).unwrap();
        (template, ResolutionState::new(placeholders))
    }

    #[test]
    fn test_initial_preview_marks_first_as_current() {
        let (template, state) = setup();
        let html = render_preview(&template, &state);
        assert_eq!(
            html,
            "Hello <span id=\"preview-NAME\" class=\"placeholder-span current-editing\">&nbsp;</span>, \
             today is <span id=\"preview-DATE\" class=\"placeholder-span\">&nbsp;</span>. \
             Signed <span id=\"preview-NAME\" class=\"placeholder-span current-editing\">&nbsp;</span>."
        );
    }

    #[test]
    fn test_highlight_priority() {
        let (_, state) = setup();
        let state = state.submit("Alice").unwrap().skip("DATE").unwrap();
        assert_eq!(highlight(&state, "NAME"), Highlight::Filled);
        assert_eq!(highlight(&state, "DATE"), Highlight::Skipped);

        let editing = state.edit("DATE").unwrap();
        assert_eq!(highlight(&editing, "DATE"), Highlight::Current);
    }

    #[test]
    fn test_whitespace_value_is_not_filled() {
        let (_, state) = setup();
        let state = state.submit("   ").unwrap();
        assert_eq!(highlight(&state, "NAME"), Highlight::Untouched);
    }

    #[test]
    fn test_live_typing_shows_in_preview() {
        let (template, state) = setup();
        let state = state.live_update("Al").unwrap();
        let html = render_preview(&template, &state);
        assert_eq!(html.matches(">Al</span>").count(), 2);
    }

    #[test]
    fn test_render_is_idempotent_and_pure() {
        let (template, state) = setup();
        let state = state.submit("Alice").unwrap();
        let before = state.clone();
        let first = render_preview(&template, &state);
        let second = render_preview(&template, &state);
        assert_eq!(first, second);
        assert_eq!(state, before);
    }

    #[test]
    fn test_values_and_text_are_escaped() {
        let placeholders = vec![Placeholder::new("x", 0, "X")];
        let template = Template::compile("a < b: <<x>>", &placeholders).unwrap();
        let state = ResolutionState::new(placeholders).submit("<b>bold</b>").unwrap();
        let html = render_preview(&template, &state);
        assert_eq!(
            html,
            "a &lt; b: <span id=\"preview-x\" class=\"placeholder-span filled\">&lt;b&gt;bold&lt;/b&gt;</span>"
        );
    }

    #[test]
    fn test_preview_text_keeps_values() {
        let (template, state) = setup();
        let state = state.submit("Alice").unwrap();
        let text = preview_text(&render_preview(&template, &state), 80).unwrap();
        assert!(text.contains("Hello Alice"));
    }
}
