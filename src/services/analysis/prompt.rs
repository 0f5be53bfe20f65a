// Contract analysis prompt
// The model gets the pre-analysis as JSON, a schema description, and strict output rules.

use crate::models::{PreAnalysis, TermDefinition};
use crate::services::config_store::AnalysisConfig;
use serde_json::json;

use super::risk_level::CANONICAL_RISK_LEVELS;

/// How much of the document and pre-analysis goes into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    pub max_clauses: usize,
    pub clause_excerpt_chars: usize,
    pub max_terms: usize,
    pub document_excerpt_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_clauses: 10,
            clause_excerpt_chars: 500,
            max_terms: 30,
            document_excerpt_chars: 4000,
        }
    }
}

impl From<&AnalysisConfig> for PromptLimits {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_clauses: config.max_prompt_clauses,
            clause_excerpt_chars: config.clause_excerpt_chars,
            max_terms: config.max_prompt_terms,
            document_excerpt_chars: config.document_excerpt_chars,
        }
    }
}

/// Value-language instruction. Unknown codes fall back to Korean.
pub fn language_instruction(output_language: &str) -> &'static str {
    match output_language {
        "en" => "Write every JSON value in English. Never translate or rename JSON keys.",
        "vi" => "Viết mọi giá trị JSON bằng tiếng Việt. Không dịch hoặc đổi tên các key JSON.",
        _ => "모든 JSON 값은 한국어로 작성하십시오. JSON 키는 번역하거나 바꾸지 마십시오.",
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn schema_description() -> serde_json::Value {
    json!({
        "document_id": "string, e.g. 'auto_generated_1'",
        "meta": {
            "language": "ko | en | vi | mixed",
            "domain_tags": ["main domain tags of the document"],
            "parties": ["근로자, 사용자, 임대인, 임차인, 매도인, 매수인 ..."],
            "governing_law": "e.g. '대한민국 법'"
        },
        "summary": {
            "title": "document title or short name",
            "overall_summary": "3-5 sentences, at most 200 characters",
            "one_line_summary": "one sentence, at most 80 characters",
            "key_points": ["at most 2 items"],
            "main_risks": ["at most 2 items"],
            "main_protections": ["at most 2 items"],
            "recommended_actions": ["at most 2 items"]
        },
        "risk_profile": {
            "overall_risk_level": CANONICAL_RISK_LEVELS.join("/"),
            "overall_risk_score": "integer 0-100",
            "risk_dimensions": {
                "지급/대금": "integer 0-100",
                "해지/갱신": "integer 0-100",
                "위약금/손해배상": "integer 0-100",
                "책임/면책": "integer 0-100"
            },
            "comments": "overall risk comment, at most 200 characters"
        },
        "clauses": [{
            "clause_id": "clause id from the pre-analysis",
            "title": "clause title if any",
            "raw_text": "clause text",
            "summary": "1-2 sentences, at most 150 characters",
            "risk_level": CANONICAL_RISK_LEVELS.join("/"),
            "risk_score": "integer 0-100",
            "risk_factors": ["at most 2 items"],
            "protections": ["at most 2 items"],
            "red_flags": ["at most 2 items"],
            "action_guides": ["at most 2 items"],
            "key_points": ["at most 2 items"],
            "tags": {
                "domain": ["at most 2 items"],
                "risk": ["at most 2 items"],
                "parties": ["at most 3 items"]
            }
        }],
        "causal_graph": [{
            "from_clause_id": "cause clause id",
            "to_clause_id": "effect clause id",
            "relationship": "triggers/depends_on/conflicts_with/clarifies/overrides",
            "description": "one sentence, at most 100 characters"
        }],
        "terms": [{
            "term": "term",
            "korean": "plain explanation, at most 150 characters",
            "english": "English term if known",
            "source": "source"
        }]
    })
}

/// Build the single prompt string sent to the model for a contract analysis.
pub fn build_contract_analysis_prompt(
    original_text: &str,
    pre_analysis: &PreAnalysis,
    terms: &[TermDefinition],
    output_language: &str,
    limits: &PromptLimits,
) -> String {
    let clauses_payload: Vec<_> = pre_analysis
        .clauses
        .iter()
        .take(limits.max_clauses)
        .map(|c| {
            json!({
                "clause_id": c.clause_id,
                "title": c.title,
                "raw_text": truncate_chars(&c.raw_text, limits.clause_excerpt_chars),
            })
        })
        .collect();

    let terms_payload: Vec<_> = terms
        .iter()
        .take(limits.max_terms)
        .map(|t| {
            json!({
                "term": t.term,
                "korean": t.korean,
                "english": t.english,
                "source": t.source,
            })
        })
        .collect();

    let pre = json!({
        "language": pre_analysis.language,
        "domain_tags_hint": pre_analysis.domain_tags,
        "parties_hint": pre_analysis.parties,
        "clauses": clauses_payload,
        "terms": terms_payload,
    });

    let pre_json = serde_json::to_string_pretty(&pre).unwrap_or_else(|_| pre.to_string());
    let schema = schema_description();
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string());
    let excerpt = truncate_chars(original_text.trim(), limits.document_excerpt_chars);
    let risk_levels = CANONICAL_RISK_LEVELS
        .iter()
        .map(|l| format!("\"{}\"", l))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"당신은 계약서와 법률 문서를 검토하는 시니어 변호사입니다.
아래 사전 분석 정보와 문서 원문을 참고하여, 주어진 스키마에 맞는 JSON 객체 하나만 출력하십시오.

{lang}

Output rules:
- Output exactly one JSON object. It must start with {{ and end with }}.
- No prose, no markdown, no code fences (```), no comments before or after the JSON.
- Output language for summary, clauses and terms: {output_language}.
- risk_level and overall_risk_level values must ALWAYS be one of: {risk_levels}.
  Never use "low", "medium", "high", "critical".
- Keep every string field under 200 characters and every list to at most 2 items.
- At most 10 clauses. Keep the whole JSON short so it is never cut off.
- If a field cannot be filled, use "" or [] instead of omitting it.

[Pre-analysis (JSON)]
{pre_json}

[Response schema]
{schema_json}

[Document]
{excerpt}
"#,
        lang = language_instruction(output_language),
        output_language = output_language,
        risk_levels = risk_levels,
        pre_json = pre_json,
        schema_json = schema_json,
        excerpt = excerpt,
    )
}
