//! Prompt template rendering with strict identifier-only substitution
//! (spec §4.4).
//!
//! Allowed placeholder shape: `{name}` where `name` matches
//! `[A-Za-z_][A-Za-z0-9_]*`. Doubled braces `{{`/`}}` render as literal
//! `{`/`}`. Any other placeholder form is rejected with
//! `UnsupportedPlaceholder`.
//!
//! Python's `string.Formatter` has no direct Rust stdlib or ecosystem
//! equivalent with this exact contract, so the scanner below is
//! hand-written rather than adapted from a template engine.

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::RenderError;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// One parsed fragment of a template: literal text, or a placeholder
/// identifier to substitute.
enum Token<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Scans `template` for `{{`, `}}`, and `{identifier}` spans. Any other use
/// of a single brace is an error: an unmatched `}` or a `{...}` whose inner
/// text is not a bare identifier.
fn tokenize<'a>(path: &Path, template: &'a str) -> Result<Vec<Token<'a>>, RenderError> {
    let mut tokens = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0usize;
    let mut i = 0usize;

    macro_rules! flush_literal {
        ($end:expr) => {
            if $end > literal_start {
                tokens.push(Token::Literal(&template[literal_start..$end]));
            }
        };
    }

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                if bytes.get(i + 1) == Some(&b'{') {
                    flush_literal!(i);
                    tokens.push(Token::Literal("{"));
                    i += 2;
                    literal_start = i;
                    continue;
                }
                let close = template[i + 1..].find('}').map(|off| i + 1 + off);
                let Some(close) = close else {
                    return Err(invalid_format(path, "unterminated '{' in template"));
                };
                let inner = &template[i + 1..close];
                flush_literal!(i);
                if !IDENTIFIER_RE.is_match(inner) {
                    return Err(RenderError::UnsupportedPlaceholder {
                        path: path.to_path_buf(),
                        placeholder: inner.to_string(),
                    });
                }
                tokens.push(Token::Placeholder(inner));
                i = close + 1;
                literal_start = i;
            }
            b'}' => {
                if bytes.get(i + 1) == Some(&b'}') {
                    flush_literal!(i);
                    tokens.push(Token::Literal("}"));
                    i += 2;
                    literal_start = i;
                    continue;
                }
                return Err(invalid_format(path, "single '}' encountered in template"));
            }
            _ => i += 1,
        }
    }
    flush_literal!(bytes.len());
    Ok(tokens)
}

fn invalid_format(path: &Path, detail: &str) -> RenderError {
    RenderError::UnsupportedPlaceholder {
        path: path.to_path_buf(),
        placeholder: detail.to_string(),
    }
}

fn required_identifiers<'a>(tokens: &[Token<'a>]) -> BTreeSet<&'a str> {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Placeholder(name) => Some(*name),
            Token::Literal(_) => None,
        })
        .collect()
}

/// Renders `template_path` with `variables`. Values are rendered by their
/// natural textual form (strings verbatim, numbers/bools via their JSON
/// text). Extra provided variables are tolerated.
pub fn render_prompt(
    template_path: &Path,
    variables: &std::collections::BTreeMap<String, Value>,
) -> Result<String, RenderError> {
    if !template_path.exists() {
        return Err(RenderError::TemplateNotFound(template_path.to_path_buf()));
    }

    let bytes = std::fs::read(template_path).map_err(|source| RenderError::Io {
        path: template_path.to_path_buf(),
        source,
    })?;
    let template_content = String::from_utf8(bytes)
        .map_err(|_| RenderError::InvalidUtf8(template_path.to_path_buf()))?;

    let tokens = tokenize(template_path, &template_content)?;
    let required = required_identifiers(&tokens);
    let provided: BTreeSet<&str> = variables.keys().map(String::as_str).collect();

    let missing: Vec<&str> = required.difference(&provided).copied().collect();
    if !missing.is_empty() {
        let mut missing = missing;
        missing.sort_unstable();
        return Err(RenderError::MissingVariables {
            path: template_path.to_path_buf(),
            missing: missing.join(", "),
        });
    }

    let mut out = String::with_capacity(template_content.len());
    for token in &tokens {
        match token {
            Token::Literal(s) => out.push_str(s),
            Token::Placeholder(name) => {
                let value = variables.get(*name).expect("checked as required above");
                out.push_str(&render_value(value));
            }
        }
    }
    Ok(out)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn write_template(content: &str) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    #[test]
    fn renders_simple_identifier() {
        let file = write_template("Hello, {name}!");
        let out = render_prompt(file.path(), &vars(&[("name", "world")])).unwrap();
        assert_eq!(out, "Hello, world!");
    }

    #[test]
    fn doubled_braces_round_trip_as_literal() {
        let file = write_template("{{literal}} and {name}");
        let out = render_prompt(file.path(), &vars(&[("name", "x")])).unwrap();
        assert_eq!(out, "{literal} and x");
    }

    #[test]
    fn rejects_attribute_access_placeholder() {
        let file = write_template("{foo.bar}");
        let err = render_prompt(file.path(), &vars(&[])).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedPlaceholder { .. }));
    }

    #[test]
    fn missing_variables_are_sorted_in_error() {
        let file = write_template("{zebra} {alpha}");
        let err = render_prompt(file.path(), &vars(&[])).unwrap_err();
        match err {
            RenderError::MissingVariables { missing, .. } => {
                assert_eq!(missing, "alpha, zebra");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn extra_variables_are_tolerated() {
        let file = write_template("{name}");
        let out = render_prompt(file.path(), &vars(&[("name", "x"), ("unused", "y")])).unwrap();
        assert_eq!(out, "x");
    }

    #[test]
    fn missing_template_file_errors() {
        let err = render_prompt(Path::new("/does/not/exist.md"), &vars(&[])).unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(_)));
    }
}
