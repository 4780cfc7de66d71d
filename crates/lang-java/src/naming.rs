//! Qualified names and erased type text.

/// Strips type arguments and whitespace: `Map<String, List<Integer>>` ->
/// `Map`, `int []` -> `int[]`, `String ...` -> `String...`.
pub fn erase_type(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if depth == 0 && !c.is_whitespace() => out.push(c),
            _ => {}
        }
    }
    out
}

/// Whitespace-collapsed type text with generics kept: `List< String >` ->
/// `List<String>`.
pub fn compact_type(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
        .replace("< ", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
}

pub fn qualify(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(scope) if !scope.is_empty() => format!("{scope}.{name}"),
        _ => name.to_string(),
    }
}

pub fn method_name(class: &str, name: &str, parameters: &[String]) -> String {
    format!("{}.{}({})", class, name, parameters.join(","))
}

/// `Foo`, `a.b.Foo`, `Outer.Inner`: dotted identifiers whose last segment
/// starts with an upper-case letter.
pub fn looks_like_type(text: &str) -> bool {
    let mut segments = text.split('.');
    let valid = segments
        .clone()
        .all(|s| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'));
    valid
        && segments
            .next_back()
            .and_then(|last| last.chars().next())
            .is_some_and(char::is_uppercase)
}
