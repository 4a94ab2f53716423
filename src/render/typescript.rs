//! TypeScript literal and comment helpers

/// JSON-escaped double-quoted string literal (valid TypeScript).
pub fn string_literal(value: &str) -> String {
    serde_json::to_string(value).expect("serializing a str to JSON is infallible")
}

/// Object property key: bare when it is a valid identifier, quoted otherwise.
pub fn property_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        string_literal(name)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Single-line comment text: whitespace runs collapse to one space and a
/// closing `*/` cannot terminate the surrounding block comment.
pub fn comment_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("*/", "*\\/")
}

/// JSDoc block for the given lines at `indent`; empty input renders nothing.
pub fn doc_comment(lines: &[String], indent: &str) -> String {
    match lines {
        [] => String::new(),
        [line] => format!("{}/** {} */\n", indent, line),
        _ => {
            let mut out = format!("{}/**\n", indent);
            for line in lines {
                out.push_str(&format!("{} * {}\n", indent, line));
            }
            out.push_str(&format!("{} */\n", indent));
            out
        }
    }
}
