use crate::env;
use regex::Regex;
use std::sync::LazyLock;

/// `#r "..."` and `#load "..."` at the start of a line
static DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(#r|#load)\s+"([^"]*)""#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// Load an external assembly
    Reference,
    /// Load another script file
    Load,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub value: String,
    /// Zero-based line of the directive
    pub line: usize,
}

/// Scan script text for directives in source order.
pub fn scan_directives(text: &str) -> Vec<Directive> {
    text.lines()
        .enumerate()
        .filter_map(|(line, content)| {
            let caps = DIRECTIVE_RE.captures(content)?;
            let kind = match caps.get(1)?.as_str() {
                env::session::REFERENCE_DIRECTIVE => DirectiveKind::Reference,
                env::session::LOAD_DIRECTIVE => DirectiveKind::Load,
                _ => return None,
            };
            Some(Directive {
                kind,
                value: caps.get(2)?.as_str().to_string(),
                line,
            })
        })
        .collect()
}
