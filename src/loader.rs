//! Loading scripts from their authoring format.
//!
//! Scripts are usually written as relaxed JSON: whole-line `//` comments,
//! trailing commas and an optional `export default ... ;` wrapper are
//! accepted and removed before parsing.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;

lazy_static! {
    static ref EXPORT_DEFAULT: Regex = Regex::new(r"^\s*export\s+default\s+").expect("regex ok");
}

/// Blank out every line whose first non-blank characters are `//`.
/// Line breaks are kept so positions in parse errors still line up.
pub fn strip_comments(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim_start().starts_with("//") {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove a leading `export default` and a trailing `;`.
pub fn strip_export(text: &str) -> String {
    let text = EXPORT_DEFAULT.replace(text, "");
    text.trim_end().trim_end_matches(';').trim().to_string()
}

/// Drop commas that directly precede a closing `]` or `}`.
/// Commas inside string literals are left alone.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parse a script in authoring format into a raw document, ready for
/// [`CompiledScript::compile`](crate::CompiledScript::compile).
///
/// # Errors
///
/// Returns [`ElizaError::Serialization`](crate::ElizaError::Serialization)
/// when the cleaned text is not valid JSON.
pub fn read_script(text: &str) -> Result<Value> {
    let cleaned = remove_trailing_commas(&strip_export(&strip_comments(text)));
    Ok(serde_json::from_str(&cleaned)?)
}

/// The bundled DOCTOR script.
pub fn doctor_script() -> Result<Value> {
    read_script(include_str!("../scripts/doctor.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ElizaError;
    use serde_json::json;

    #[test]
    fn test_strip_comments() {
        let text = "{\n    // comment 1\n  \"a\": 1, // kept\n// comment 2\n}";
        assert_eq!(
            strip_comments(text),
            "{\n\n  \"a\": 1, // kept\n\n}"
        );
    }

    #[test]
    fn test_strip_export() {
        assert_eq!(strip_export("    export   default {};  "), "{}");
        assert_eq!(strip_export("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_remove_trailing_commas() {
        assert_eq!(remove_trailing_commas("[1, 2, ]"), "[1, 2 ]");
        assert_eq!(remove_trailing_commas("{\"a\": [1,],\n}"), "{\"a\": [1]\n}");
        assert_eq!(
            remove_trailing_commas(r#"{"a": "x, }", "b": "\", ]"}"#),
            r#"{"a": "x, }", "b": "\", ]"}"#
        );
    }

    #[test]
    fn test_read_script() {
        let text = r#"
            // greeting pool
            export default {
                "initial": ["Hi, there.",],
                "keywords": {
                    "sorry": "Never mind.",
                },
            };
        "#;
        let value = read_script(text).unwrap();
        assert_eq!(
            value,
            json!({"initial": ["Hi, there."], "keywords": {"sorry": "Never mind."}})
        );
    }

    #[test]
    fn test_read_script_reports_bad_json() {
        let err = read_script("{\"a\": }").unwrap_err();
        assert!(matches!(err, ElizaError::Serialization(_)));
    }

    #[test]
    fn test_doctor_script_loads() {
        let value = doctor_script().unwrap();
        for field in ["initial", "final", "quit", "none", "pre", "post", "tags", "keywords"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
    }
}
