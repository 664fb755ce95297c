use crate::contexts::resolution::ValueMap;
use crate::data::Template;

/// File name offered for the finished document
pub const DOWNLOAD_FILENAME: &str = "completed-document.txt";

/// Substitutes every sentinel with its recorded value.
///
/// Skipped and blank answers substitute as the empty string. A placeholder with
/// no recorded value substitutes as `[id]`. Text outside sentinels is copied
/// byte for byte.
pub fn assemble(template: &Template, values: &ValueMap) -> String {
    template.substitute(
        |text, out| out.push_str(text),
        |id, out| match values.get(id) {
            Some(value) => out.push_str(value),
            None => {
                out.push('[');
                out.push_str(id);
                out.push(']');
            }
        },
    )
}
