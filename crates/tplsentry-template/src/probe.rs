/// Cheap check for template directives.
///
/// True when the text contains an opening `{{` followed somewhere later by a
/// closing `}}`. Files failing this check skip evaluation and are parsed as-is.
#[must_use]
pub fn contains_template_directives(source: &str) -> bool {
    source
        .find("{{")
        .is_some_and(|open| source[open + 2..].contains("}}"))
}
