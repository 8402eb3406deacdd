//! Precompiled HTML/template-injection detection patterns (§4.6).
//!
//! A static table of named patterns is compiled once into a
//! [`regex::RegexSet`] for a fast first pass, with individual [`Regex`]es
//! kept around only when the matched pattern id needs to be reported back
//! to the caller.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};

/// A single named injection pattern.
#[derive(Debug, Clone, Copy)]
pub struct InjectionPattern {
    pub id: &'static str,
    pub description: &'static str,
    pub regex_str: &'static str,
}

macro_rules! pat {
    ($id:expr, $desc:expr, $re:expr) => {
        InjectionPattern {
            id: $id,
            description: $desc,
            regex_str: $re,
        }
    };
}

/// Regex-based HTML/script injection patterns: `<script|iframe|object|embed|applet>`,
/// `javascript:` URIs, and `on*=` event-handler attributes.
fn builtin_regex_patterns() -> Vec<InjectionPattern> {
    vec![
        pat!(
            "html-001",
            "script/iframe/object/embed/applet tag",
            r"(?i)<\s*(script|iframe|object|embed|applet)\b"
        ),
        pat!("html-002", "javascript: URI", r"(?i)javascript:"),
        pat!(
            "html-003",
            "inline event-handler attribute",
            r"(?i)\bon[a-z]+\s*="
        ),
    ]
}

/// Plain substring patterns for template-injection syntax across common
/// templating engines: `{{ }}`, `${`, `<% %>`, `#{`, `${{`.
pub const TEMPLATE_SUBSTRINGS: &[&str] = &["{{", "}}", "${", "<%", "%>", "#{", "${{"];

struct CompiledPatterns {
    set: RegexSet,
    individual: Vec<Regex>,
    entries: Vec<InjectionPattern>,
}

static COMPILED: LazyLock<CompiledPatterns> = LazyLock::new(|| {
    let entries = builtin_regex_patterns();
    let regex_strs: Vec<&str> = entries.iter().map(|p| p.regex_str).collect();
    let set = RegexSet::new(&regex_strs).expect("builtin injection patterns must compile");
    let individual = regex_strs
        .iter()
        .map(|s| Regex::new(s).expect("builtin injection patterns must compile"))
        .collect();
    CompiledPatterns {
        set,
        individual,
        entries,
    }
});

/// A detected injection attempt: which named pattern matched, and the
/// offending substring (capped for reporting).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub id: &'static str,
    pub description: &'static str,
    pub matched_text: String,
}

/// Scan `text` for HTML/script-tag, `javascript:`, inline event-handler, and
/// template-injection patterns. Returns every match found (not just the
/// first), so validators can report all violations at once per the §9
/// "collect all prohibited-field violations" design note.
pub fn scan(text: &str) -> Vec<PatternMatch> {
    let mut matches = Vec::new();

    for idx in COMPILED.set.matches(text) {
        let entry = COMPILED.entries[idx];
        if let Some(m) = COMPILED.individual[idx].find(text) {
            matches.push(PatternMatch {
                id: entry.id,
                description: entry.description,
                matched_text: m.as_str().chars().take(80).collect(),
            });
        }
    }

    for needle in TEMPLATE_SUBSTRINGS {
        if text.contains(needle) {
            matches.push(PatternMatch {
                id: "tmpl-substring",
                description: "template-injection syntax",
                matched_text: (*needle).to_string(),
            });
        }
    }

    matches
}

/// `true` if any pattern in [`scan`] matches.
pub fn is_suspicious(text: &str) -> bool {
    COMPILED.set.is_match(text) || TEMPLATE_SUBSTRINGS.iter().any(|n| text.contains(n))
}
