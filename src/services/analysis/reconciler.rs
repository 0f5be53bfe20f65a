// Response Reconciler
// Turns the model's raw reply into an AnalysisResult. Never fails: anything that
// cannot be decoded becomes the labelled fallback result.

use crate::models::{
    AnalysisHints, AnalysisResult, CausalRelationship, ClauseCausality, ClauseResult, ClauseTags,
    DocumentMeta, DocumentSummary, RiskProfile, TermDefinition, AUTO_DOCUMENT_ID, DEFAULT_LANGUAGE,
    DEFAULT_RISK_LEVEL, DEFAULT_SCORE, DEFAULT_TERM_SOURCE, FALLBACK_DOCUMENT_ID,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::json_repair::{
    assemble_fragments, repair_json_with_strategy, strip_to_json, RepairStrategy,
};
use super::risk_level::canonicalize_risk_level;

const FALLBACK_TITLE: &str = "AI 분석 오류";
const FALLBACK_OVERALL_SUMMARY: &str = "LLM 응답을 JSON으로 해석하지 못해 분석 결과를 만들 수 없습니다.";
const FALLBACK_ONE_LINE_SUMMARY: &str = "응답 파싱 실패";
const FALLBACK_RISK_COMMENT: &str = "LLM 응답 파싱에 실패하여 기본 위험도를 표시합니다.";

/// Reconcile a streamed reply. Fragments must be complete and in arrival order.
pub fn reconcile_fragments<I, S>(fragments: I, hints: &AnalysisHints) -> AnalysisResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    reconcile(&assemble_fragments(fragments), hints)
}

/// Reconcile a complete reply.
pub fn reconcile(raw: &str, hints: &AnalysisHints) -> AnalysisResult {
    let stripped = strip_to_json(raw);
    let (repaired, strategy) = repair_json_with_strategy(&stripped);

    match strategy {
        Some(RepairStrategy::AsIs) => {}
        Some(strategy) => info!(
            strategy = strategy.as_str(),
            raw_chars = raw.chars().count(),
            "[RECONCILER] model reply repaired"
        ),
        None => warn!(
            raw_chars = raw.chars().count(),
            "[RECONCILER] no repair strategy produced valid JSON"
        ),
    }

    match decode_object(&repaired) {
        Some(data) => {
            let result = materialize(&data);
            debug!(
                clauses = result.clauses.len(),
                causal = result.causal_graph.len(),
                terms = result.terms.len(),
                "[RECONCILER] reply materialized"
            );
            result
        }
        None => {
            warn!(
                language = %hints.language,
                preview = %preview(raw, 120),
                "[RECONCILER] reply is not a JSON object, returning fallback result"
            );
            fallback_result(hints)
        }
    }
}

/// Decode a JSON object, retrying once on the text up to the last `}`.
pub fn decode_object(text: &str) -> Option<Map<String, Value>> {
    if let Some(obj) = parse_object(text) {
        return Some(obj);
    }
    let last = text.rfind('}')?;
    parse_object(&text[..=last])
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

/// Result returned when the reply cannot be decoded at all.
pub fn fallback_result(hints: &AnalysisHints) -> AnalysisResult {
    AnalysisResult {
        document_id: FALLBACK_DOCUMENT_ID.to_string(),
        meta: DocumentMeta {
            language: hints.language.clone(),
            domain_tags: hints.domain_tags.clone(),
            parties: hints.parties.clone(),
            governing_law: None,
        },
        summary: DocumentSummary {
            title: Some(FALLBACK_TITLE.to_string()),
            overall_summary: FALLBACK_OVERALL_SUMMARY.to_string(),
            one_line_summary: FALLBACK_ONE_LINE_SUMMARY.to_string(),
            ..Default::default()
        },
        risk_profile: RiskProfile {
            overall_risk_level: DEFAULT_RISK_LEVEL.to_string(),
            overall_risk_score: DEFAULT_SCORE,
            risk_dimensions: BTreeMap::new(),
            comments: FALLBACK_RISK_COMMENT.to_string(),
        },
        clauses: Vec::new(),
        causal_graph: Vec::new(),
        terms: Vec::new(),
        stored_id: None,
    }
}

/// Build a fully shaped result from a decoded object, defaulting every missing field.
pub fn materialize(data: &Map<String, Value>) -> AnalysisResult {
    let root = Fields(Some(data));

    let meta_raw = root.object("meta");
    let meta = DocumentMeta {
        language: meta_raw.text_or("language", DEFAULT_LANGUAGE),
        domain_tags: meta_raw.list("domain_tags"),
        parties: meta_raw.list("parties"),
        governing_law: meta_raw.opt_text("governing_law"),
    };

    let summary_raw = root.object("summary");
    let summary = DocumentSummary {
        title: summary_raw.opt_text("title"),
        overall_summary: summary_raw.text("overall_summary"),
        one_line_summary: summary_raw.text("one_line_summary"),
        key_points: summary_raw.list("key_points"),
        main_risks: summary_raw.list("main_risks"),
        main_protections: summary_raw.list("main_protections"),
        recommended_actions: summary_raw.list("recommended_actions"),
    };

    let risk_raw = root.object("risk_profile");
    let risk_profile = RiskProfile {
        overall_risk_level: risk_raw.risk_level("overall_risk_level"),
        overall_risk_score: risk_raw.score("overall_risk_score"),
        risk_dimensions: risk_raw.score_map("risk_dimensions"),
        comments: risk_raw.text("comments"),
    };

    let clauses = root.objects("clauses").map(materialize_clause).collect();
    let causal_graph = root.objects("causal_graph").map(materialize_causality).collect();
    let terms = root.objects("terms").map(materialize_term).collect();

    AnalysisResult {
        document_id: root.text_or("document_id", AUTO_DOCUMENT_ID),
        meta,
        summary,
        risk_profile,
        clauses,
        causal_graph,
        terms,
        stored_id: None,
    }
}

fn materialize_clause(raw: Fields<'_>) -> ClauseResult {
    let tags = raw.object("tags");
    ClauseResult {
        clause_id: raw.text_or("clause_id", "unknown"),
        title: raw.opt_text("title"),
        raw_text: raw.text("raw_text"),
        summary: raw.text("summary"),
        risk_level: raw.risk_level("risk_level"),
        risk_score: raw.score("risk_score"),
        risk_factors: raw.list("risk_factors"),
        protections: raw.list("protections"),
        red_flags: raw.list("red_flags"),
        action_guides: raw.list("action_guides"),
        key_points: raw.list("key_points"),
        tags: ClauseTags {
            domain: tags.list("domain"),
            risk: tags.list("risk"),
            parties: tags.list("parties"),
        },
    }
}

fn materialize_causality(raw: Fields<'_>) -> ClauseCausality {
    let relationship = raw
        .opt_text("relationship")
        .and_then(|label| CausalRelationship::parse(&label))
        .unwrap_or_default();
    ClauseCausality {
        from_clause_id: raw.text("from_clause_id"),
        to_clause_id: raw.text("to_clause_id"),
        relationship,
        description: raw.text("description"),
    }
}

fn materialize_term(raw: Fields<'_>) -> TermDefinition {
    TermDefinition {
        term: raw.text("term"),
        korean: raw.text("korean"),
        english: raw.opt_text("english"),
        source: raw.text_or("source", DEFAULT_TERM_SOURCE),
    }
}

/// Numeric coercion for model-supplied scores: integers, floats (truncated)
/// and numeric strings. Everything else is `DEFAULT_SCORE`.
pub fn coerce_score(value: &Value) -> i64 {
    let parsed = match value {
        Value::Number(n) => n.as_i64().map(|i| i as f64).or_else(|| n.as_f64()),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => f.trunc() as i64,
        _ => DEFAULT_SCORE,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read-only view over an optional JSON object. Missing objects behave like `{}`.
#[derive(Clone, Copy)]
struct Fields<'a>(Option<&'a Map<String, Value>>);

impl<'a> Fields<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.and_then(|obj| obj.get(key))
    }

    fn object(&self, key: &str) -> Fields<'a> {
        Fields(self.get(key).and_then(Value::as_object))
    }

    fn objects(&self, key: &str) -> impl Iterator<Item = Fields<'a>> + 'a {
        self.get(key)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|item| item.as_object().map(|obj| Fields(Some(obj))))
    }

    fn opt_text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_text)
    }

    fn text(&self, key: &str) -> String {
        self.opt_text(key).unwrap_or_default()
    }

    fn text_or(&self, key: &str, default: &str) -> String {
        self.opt_text(key).unwrap_or_else(|| default.to_string())
    }

    fn list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    fn score(&self, key: &str) -> i64 {
        self.get(key).map(coerce_score).unwrap_or(DEFAULT_SCORE)
    }

    fn score_map(&self, key: &str) -> BTreeMap<String, i64> {
        self.get(key)
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .map(|(name, value)| (name.clone(), coerce_score(value)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Absent keys get the default level; any present label goes through the mapping.
    fn risk_level(&self, key: &str) -> String {
        match self.opt_text(key) {
            Some(label) => canonicalize_risk_level(&label),
            None => DEFAULT_RISK_LEVEL.to_string(),
        }
    }
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hints() -> AnalysisHints {
        AnalysisHints {
            language: "vi".to_string(),
            domain_tags: vec!["노동".to_string()],
            parties: vec!["근로자".to_string(), "사용자".to_string()],
        }
    }

    #[test]
    fn test_fallback_on_prose() {
        let result = reconcile("not json", &hints());
        assert!(result.is_fallback());
        assert_eq!(result.document_id, FALLBACK_DOCUMENT_ID);
        assert!(result.clauses.is_empty());
        assert!(result.causal_graph.is_empty());
        assert!(result.terms.is_empty());
        assert_eq!(result.meta.language, "vi");
        assert_eq!(result.meta.parties, vec!["근로자", "사용자"]);
        assert_eq!(result.summary.title.as_deref(), Some(FALLBACK_TITLE));
        assert_eq!(result.risk_profile.overall_risk_score, DEFAULT_SCORE);
        assert_eq!(result.risk_profile.overall_risk_level, DEFAULT_RISK_LEVEL);
        assert!(!result.risk_profile.comments.is_empty());
    }

    #[test]
    fn test_fallback_on_truncated_array() {
        let result = reconcile("{\"clauses\": [{\"clause_id\": \"제1조\"}", &hints());
        assert!(result.is_fallback());
    }

    #[test]
    fn test_fallback_on_non_object_json() {
        assert!(reconcile("[1, 2, 3]", &hints()).is_fallback());
        assert!(reconcile("", &hints()).is_fallback());
    }

    #[test]
    fn test_default_filling() {
        let result = reconcile("{\"summary\": {}}", &AnalysisHints::default());
        assert!(!result.is_fallback());
        assert_eq!(result.document_id, AUTO_DOCUMENT_ID);
        assert_eq!(result.meta.language, DEFAULT_LANGUAGE);
        assert!(result.meta.domain_tags.is_empty());
        assert!(result.meta.parties.is_empty());
        assert!(result.summary.key_points.is_empty());
        assert!(result.summary.main_risks.is_empty());
        assert!(result.summary.main_protections.is_empty());
        assert!(result.summary.recommended_actions.is_empty());
        assert!(result.risk_profile.risk_dimensions.is_empty());
        assert_eq!(result.risk_profile.overall_risk_score, 50);
        assert_eq!(result.risk_profile.overall_risk_level, DEFAULT_RISK_LEVEL);
        assert!(result.clauses.is_empty());
        assert!(result.causal_graph.is_empty());
        assert!(result.terms.is_empty());
    }

    #[test]
    fn test_clause_defaults() {
        let result = reconcile("{\"clauses\": [{}]}", &AnalysisHints::default());
        let clause = &result.clauses[0];
        assert_eq!(clause.clause_id, "unknown");
        assert_eq!(clause.risk_score, 50);
        assert_eq!(clause.risk_level, DEFAULT_RISK_LEVEL);
        assert!(clause.red_flags.is_empty());
        assert!(clause.tags.parties.is_empty());
    }

    #[test]
    fn test_risk_level_mapping_everywhere() {
        let raw = json!({
            "risk_profile": {"overall_risk_level": "high"},
            "clauses": [
                {"clause_id": "제1조", "risk_level": "Critical"},
                {"clause_id": "제2조", "risk_level": "urgent"}
            ]
        })
        .to_string();
        let result = reconcile(&raw, &AnalysisHints::default());
        assert_eq!(result.risk_profile.overall_risk_level, "높음");
        assert_eq!(result.clauses[0].risk_level, "치명적");
        assert_eq!(result.clauses[1].risk_level, "urgent");
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(coerce_score(&json!(72)), 72);
        assert_eq!(coerce_score(&json!(72.9)), 72);
        assert_eq!(coerce_score(&json!(" 64 ")), 64);
        assert_eq!(coerce_score(&json!("81.5")), 81);
        assert_eq!(coerce_score(&json!("높음")), 50);
        assert_eq!(coerce_score(&json!("NaN")), 50);
        assert_eq!(coerce_score(&json!(null)), 50);
        assert_eq!(coerce_score(&json!([1])), 50);

        let raw = json!({
            "risk_profile": {
                "overall_risk_score": "70",
                "risk_dimensions": {"지급/대금": 80, "해지/갱신": "n/a"}
            }
        })
        .to_string();
        let result = reconcile(&raw, &AnalysisHints::default());
        assert_eq!(result.risk_profile.overall_risk_score, 70);
        assert_eq!(result.risk_profile.risk_dimensions["지급/대금"], 80);
        assert_eq!(result.risk_profile.risk_dimensions["해지/갱신"], 50);
    }

    #[test]
    fn test_fragment_order() {
        let streamed = reconcile_fragments(["{\"a\":", " 1}"], &AnalysisHints::default());
        let whole = reconcile("{\"a\": 1}", &AnalysisHints::default());
        assert_eq!(streamed, whole);
        assert!(!streamed.is_fallback());
    }

    #[test]
    fn test_decode_second_chance() {
        let obj = decode_object("{\"a\": 1} trailing").unwrap();
        assert_eq!(obj["a"], 1);
        assert!(decode_object("no braces").is_none());
    }

    #[test]
    fn test_full_reply_in_fence() {
        let body = json!({
            "document_id": "contract_1",
            "meta": {
                "language": "ko",
                "domain_tags": ["노동"],
                "parties": ["근로자", "사용자"],
                "governing_law": "대한민국 법"
            },
            "summary": {
                "title": "근로계약서",
                "overall_summary": "표준 근로계약입니다.",
                "one_line_summary": "근로조건을 정한 계약",
                "key_points": ["월급 지급일"],
                "main_risks": "수습기간 해지",
                "recommended_actions": ["연장근로 수당 확인", 3]
            },
            "risk_profile": {
                "overall_risk_level": "moderate",
                "overall_risk_score": 55.0,
                "risk_dimensions": {"책임/면책": 40},
                "comments": "보통 수준"
            },
            "clauses": [
                {
                    "clause_id": "제1조",
                    "title": "목적",
                    "raw_text": "이 계약은...",
                    "summary": "계약의 목적",
                    "risk_level": "low",
                    "risk_score": "20",
                    "tags": {"domain": ["노동"], "parties": ["근로자"]}
                },
                "not an object"
            ],
            "causal_graph": [
                {"from_clause_id": "제1조", "to_clause_id": "제2조", "relationship": "triggers"},
                {"from_clause_id": "제2조", "to_clause_id": "제3조", "relationship": "causes"}
            ],
            "terms": [
                {"term": "임금", "korean": "근로의 대가", "english": "wages"}
            ]
        });
        let raw = format!("```json\n{}\n```", serde_json::to_string_pretty(&body).unwrap());
        let result = reconcile(&raw, &hints());

        assert_eq!(result.document_id, "contract_1");
        assert_eq!(result.meta.governing_law.as_deref(), Some("대한민국 법"));
        assert_eq!(result.summary.main_risks, vec!["수습기간 해지"]);
        assert_eq!(result.summary.recommended_actions, vec!["연장근로 수당 확인", "3"]);
        assert!(result.summary.main_protections.is_empty());
        assert_eq!(result.risk_profile.overall_risk_level, "중간");
        assert_eq!(result.risk_profile.overall_risk_score, 55);
        assert_eq!(result.clauses.len(), 1);
        assert_eq!(result.clauses[0].risk_level, "낮음");
        assert_eq!(result.clauses[0].risk_score, 20);
        assert_eq!(result.clauses[0].tags.domain, vec!["노동"]);
        assert!(result.clauses[0].tags.risk.is_empty());
        assert_eq!(result.causal_graph[0].relationship, CausalRelationship::Triggers);
        assert_eq!(result.causal_graph[1].relationship, CausalRelationship::DependsOn);
        assert_eq!(result.causal_graph[1].description, "");
        assert_eq!(result.terms[0].english.as_deref(), Some("wages"));
        assert_eq!(result.terms[0].source, DEFAULT_TERM_SOURCE);
    }

    #[test]
    fn test_empty_risk_label_kept() {
        let raw = json!({
            "risk_profile": {"overall_risk_level": ""},
            "clauses": [{"risk_level": ""}, {"risk_level": "  "}, {"risk_level": null}]
        })
        .to_string();
        let result = reconcile(&raw, &AnalysisHints::default());
        assert_eq!(result.risk_profile.overall_risk_level, "");
        assert_eq!(result.clauses[0].risk_level, "");
        assert_eq!(result.clauses[1].risk_level, "  ");
        assert_eq!(result.clauses[2].risk_level, DEFAULT_RISK_LEVEL);
    }

    #[test]
    fn test_trailing_comma_reply_decodes() {
        let result = reconcile("{\"document_id\": \"d1\", }", &AnalysisHints::default());
        assert_eq!(result.document_id, "d1");
    }
}
