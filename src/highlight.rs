use regex::{Regex, RegexBuilder};

/// Case-insensitive matcher for the note list filter. The query is matched as
/// one literal fragment, the same way the list itself filters.
pub fn filter_regex(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}
