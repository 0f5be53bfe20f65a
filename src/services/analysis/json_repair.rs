// JSON salvage for model replies
// Stages: fragment assembly -> delimiter stripping -> repair.
// Every function here is total: bad input comes back as a string, never an error.

use serde::de::IgnoredAny;

const FENCE: &str = "```";
const TRAILING_COMMA_PASSES: usize = 3;

/// Which repair attempt produced a parseable string.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RepairStrategy {
    AsIs,
    TruncateToLastBrace,
    TrailingCommas,
    BalanceBraces,
}

impl RepairStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairStrategy::AsIs => "as_is",
            RepairStrategy::TruncateToLastBrace => "truncate_to_last_brace",
            RepairStrategy::TrailingCommas => "trailing_commas",
            RepairStrategy::BalanceBraces => "balance_braces",
        }
    }
}

/// Result of a single repair attempt. `Unresolved` carries the text the next
/// attempt starts from.
enum Attempt {
    Parsed(String),
    Unresolved(String),
}

type RepairStep = fn(String) -> Attempt;

const REPAIR_STEPS: [(RepairStrategy, RepairStep); 4] = [
    (RepairStrategy::AsIs, try_as_is),
    (RepairStrategy::TruncateToLastBrace, try_truncate_to_last_brace),
    (RepairStrategy::TrailingCommas, try_strip_trailing_commas),
    (RepairStrategy::BalanceBraces, try_balance_braces),
];

/// Join streamed fragments in arrival order. Empty fragments are kept (they add nothing).
pub fn assemble_fragments<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments.into_iter().fold(String::new(), |mut acc, fragment| {
        acc.push_str(fragment.as_ref());
        acc
    })
}

/// Remove code fences, an optional language tag, and anything before the first `{`.
///
/// Content after the final `}` is left alone; `repair_json` deals with it.
pub fn strip_to_json(text: &str) -> String {
    let mut t = text.trim();
    if t.is_empty() {
        return String::new();
    }

    if t.starts_with(FENCE) {
        t = strip_language_tag(t.trim_start_matches('`').trim_start());
    }
    if let Some(rest) = t.strip_suffix(FENCE) {
        t = rest;
    }
    if let Some(first) = t.find('{') {
        t = &t[first..];
    }

    t.trim().to_string()
}

fn strip_language_tag(t: &str) -> &str {
    let tag_len = t
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(t.len());
    if tag_len == 0 {
        t
    } else {
        t[tag_len..].trim_start()
    }
}

pub fn is_valid_json(s: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(s).is_ok()
}

/// Best-effort repair. Returns a parseable string, or `text` unchanged when
/// every attempt fails.
pub fn repair_json(text: &str) -> String {
    repair_json_with_strategy(text).0
}

/// Like [`repair_json`] but also reports which attempt succeeded (`None` on failure).
pub fn repair_json_with_strategy(text: &str) -> (String, Option<RepairStrategy>) {
    if text.is_empty() {
        return (String::new(), None);
    }

    let mut current = text.trim().to_string();
    for (strategy, step) in REPAIR_STEPS {
        match step(current) {
            Attempt::Parsed(repaired) => return (repaired, Some(strategy)),
            Attempt::Unresolved(next) => current = next,
        }
    }

    (text.to_string(), None)
}

fn try_as_is(s: String) -> Attempt {
    if is_valid_json(&s) {
        Attempt::Parsed(s)
    } else {
        Attempt::Unresolved(s)
    }
}

fn try_truncate_to_last_brace(s: String) -> Attempt {
    let Some(last) = s.rfind('}') else {
        return Attempt::Unresolved(s);
    };
    let candidate = s[..=last].to_string();
    if is_valid_json(&candidate) {
        Attempt::Parsed(candidate)
    } else {
        Attempt::Unresolved(candidate)
    }
}

fn try_strip_trailing_commas(mut s: String) -> Attempt {
    for _ in 0..TRAILING_COMMA_PASSES {
        let replaced = s
            .replace(", }", "}")
            .replace(", ]", "]")
            .replace(",\n}", "}");
        if replaced == s {
            break;
        }
        s = replaced;
        if is_valid_json(&s) {
            return Attempt::Parsed(s);
        }
    }
    Attempt::Unresolved(s)
}

// Only `}` is balanced. Missing `]` or an unterminated string stays broken.
fn try_balance_braces(s: String) -> Attempt {
    let opens = s.matches('{').count();
    let closes = s.matches('}').count();
    if opens <= closes {
        return Attempt::Unresolved(s);
    }

    let mut balanced = s;
    balanced.push_str(&"}".repeat(opens - closes));
    if is_valid_json(&balanced) {
        Attempt::Parsed(balanced)
    } else {
        Attempt::Unresolved(balanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_keeps_order_and_empty_fragments() {
        let joined = assemble_fragments(["{\"a\":", "", " 1", "}"]);
        assert_eq!(joined, "{\"a\": 1}");
        assert_eq!(assemble_fragments(Vec::<String>::new()), "");
    }

    #[test]
    fn test_strip_fenced_block() {
        let inner = "{\"summary\": {\"title\": \"근로계약서\"}}";
        let wrapped = format!("```json\n{}\n```", inner);
        assert_eq!(strip_to_json(&wrapped), inner);

        let upper = format!("```JSON {}```", inner);
        assert_eq!(strip_to_json(&upper), inner);

        let bare = format!("```\n{}\n```", inner);
        assert_eq!(strip_to_json(&bare), inner);
    }

    #[test]
    fn test_strip_leading_prose() {
        assert_eq!(strip_to_json("Here is the result: {\"a\": 1}"), "{\"a\": 1}");
        // trailing noise is kept for the repair stage
        assert_eq!(strip_to_json("{\"a\": 1} thanks"), "{\"a\": 1} thanks");
    }

    #[test]
    fn test_strip_without_brace() {
        assert_eq!(strip_to_json("not json"), "not json");
        assert_eq!(strip_to_json("   "), "");
        assert_eq!(strip_to_json("```"), "");
    }

    #[test]
    fn test_repair_valid_is_untouched() {
        let (out, strategy) = repair_json_with_strategy("{\"a\": [1, 2]}");
        assert_eq!(out, "{\"a\": [1, 2]}");
        assert_eq!(strategy, Some(RepairStrategy::AsIs));
    }

    #[test]
    fn test_repair_trailing_comma() {
        let (out, strategy) = repair_json_with_strategy("{\"a\": 1, }");
        assert_eq!(out, "{\"a\": 1}");
        assert_eq!(strategy, Some(RepairStrategy::TrailingCommas));

        let out = repair_json("{\"a\": [1, 2, ], \"b\": 3,\n}");
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["b"], 3);
    }

    #[test]
    fn test_repair_trailing_garbage() {
        let (out, strategy) = repair_json_with_strategy("{\"a\": 1, \"b\": 2} trailing garbage");
        assert_eq!(out, "{\"a\": 1, \"b\": 2}");
        assert_eq!(strategy, Some(RepairStrategy::TruncateToLastBrace));
    }

    #[test]
    fn test_repair_missing_closing_brace() {
        let (out, strategy) = repair_json_with_strategy("{\"a\": {\"b\": 1}");
        assert_eq!(out, "{\"a\": {\"b\": 1}}");
        assert_eq!(strategy, Some(RepairStrategy::BalanceBraces));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["a"]["b"], 1);
    }

    #[test]
    fn test_repair_gives_up_on_open_array() {
        let truncated = "{\"clauses\": [{\"clause_id\": \"제1조\"}";
        let (out, strategy) = repair_json_with_strategy(truncated);
        assert_eq!(out, truncated);
        assert!(strategy.is_none());
    }

    #[test]
    fn test_repair_gives_up_on_prose() {
        assert_eq!(repair_json("not json"), "not json");
        assert_eq!(repair_json(""), "");
    }

    #[test]
    fn test_repair_is_idempotent() {
        let samples = [
            "{\"a\": 1}",
            "{\"a\": 1, }",
            "{\"a\": 1} noise",
            "{\"a\": {\"b\": 1}",
            "{\"a\": [1,",
            "not json",
            "  {\"a\": 1}  ",
        ];
        for sample in samples {
            let once = repair_json(sample);
            assert_eq!(repair_json(&once), once, "sample: {:?}", sample);
        }
    }
}
