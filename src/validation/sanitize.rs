//! Response-message sanitization: control-character stripping, length
//! capping, and stack-trace-marker truncation (§4.6, §7).

const MAX_MESSAGE_LEN: usize = 1000;
const TRUNCATION_SUFFIX: &str = "...";

const STACK_TRACE_MARKERS: &[&str] = &["--- STACK_TRACE_START ---", "Stack trace:\n", "goroutine"];

/// Replace the named whitespace control characters with a space, strip any
/// other control character outright, truncate at the first stack-trace
/// marker, then cap the result to 1000 characters with a `"..."` suffix.
pub fn sanitize_message(input: &str) -> String {
    let truncated_at_marker = truncate_at_stack_trace(input);
    let replaced = replace_whitespace_controls(truncated_at_marker);
    let stripped = strip_other_control_chars(&replaced);
    cap_length(&stripped)
}

fn truncate_at_stack_trace(input: &str) -> &str {
    let mut earliest: Option<usize> = None;
    for marker in STACK_TRACE_MARKERS {
        if let Some(idx) = input.find(marker) {
            earliest = Some(earliest.map_or(idx, |e| e.min(idx)));
        }
    }
    match earliest {
        Some(idx) => &input[..idx],
        None => input,
    }
}

fn replace_whitespace_controls(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' | '\u{7}' | '\u{8}' | '\u{c}' | '\u{b}' => ' ',
            other => other,
        })
        .collect()
}

fn strip_other_control_chars(input: &str) -> String {
    input.chars().filter(|c| !c.is_control()).collect()
}

fn cap_length(input: &str) -> String {
    if input.chars().count() <= MAX_MESSAGE_LEN {
        return input.to_string();
    }
    let budget = MAX_MESSAGE_LEN - TRUNCATION_SUFFIX.len();
    let truncated: String = input.chars().take(budget).collect();
    format!("{truncated}{TRUNCATION_SUFFIX}")
}
