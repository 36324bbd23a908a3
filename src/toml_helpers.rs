// Shared formatting of TOML parse errors for the file loaders.

/// 1-based (line, column) of a byte offset in `source`.
#[must_use]
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    (line, col)
}

/// `"<what> parse error at L:C: <message>"`, or without position when the
/// error carries no span.
#[must_use]
pub fn describe_toml_error(what: &str, source: &str, err: &toml::de::Error) -> String {
    let msg = err.message();
    match err.span() {
        Some(span) => {
            let (line, col) = line_col(source, span.start);
            format!("{what} parse error at {line}:{col}: {msg}")
        }
        None => format!("{what} parse error: {msg}"),
    }
}
