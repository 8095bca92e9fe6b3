/// Statements may only start with one of these keywords when the guard is enabled.
pub const ALLOWED_LEADING_KEYWORDS: &[&str] = &["SELECT", "WITH", "EXPLAIN", "SHOW", "VALUES"];

/// Rejected wherever they appear outside quotes, so writes cannot hide in a CTE or `SELECT INTO`.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE", "DROP", "ALTER", "CREATE", "GRANT", "INTO",
];

/// Reject SQL whose statements do not all start with a read-only keyword, or that mention a
/// [`FORBIDDEN_KEYWORDS`] word anywhere outside quotes.
///
/// Comments and leading parentheses are skipped; `;` inside quotes does not split statements.
/// Returns the rejection message on failure.
pub fn check_read_only(sql: &str) -> Result<(), String> {
    let statements = split_statements(sql);
    if statements.iter().all(|s| s.trim().is_empty()) {
        return Err("empty query".to_string());
    }

    for stmt in statements.iter().filter(|s| !s.trim().is_empty()) {
        let keyword = leading_keyword(stmt).to_ascii_uppercase();
        if !ALLOWED_LEADING_KEYWORDS.contains(&keyword.as_str()) {
            let shown = if keyword.is_empty() { "<none>" } else { &keyword };
            return Err(format!(
                "read-only mode: `{shown}` statements are not allowed (allowed: {})",
                ALLOWED_LEADING_KEYWORDS.join(", ")
            ));
        }
        if let Some(word) = forbidden_word(stmt) {
            return Err(format!("read-only mode: `{word}` is not allowed"));
        }
    }
    Ok(())
}

fn split_statements(sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                    current.push(' ');
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut prev = '\0';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                    current.push(' ');
                }
                ';' => out.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    out.push(current);
    out
}

/// First unquoted word of `stmt` listed in [`FORBIDDEN_KEYWORDS`], uppercased.
fn forbidden_word(stmt: &str) -> Option<String> {
    let mut quote: Option<char> = None;
    let mut word = String::new();

    for c in stmt.chars().chain(std::iter::once(' ')) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c.to_ascii_uppercase());
            continue;
        }
        if FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
            return Some(word);
        }
        word.clear();
        if c == '\'' || c == '"' {
            quote = Some(c);
        }
    }
    None
}

fn leading_keyword(stmt: &str) -> &str {
    let trimmed = stmt.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
    let end = trimmed
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}
