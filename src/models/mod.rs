// Legal Analyzer Data Models
// Field names follow the JSON schema the model is asked to emit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `document_id` of the record returned when the model reply cannot be decoded.
pub const FALLBACK_DOCUMENT_ID: &str = "fallback";
/// `document_id` used when the model omits one.
pub const AUTO_DOCUMENT_ID: &str = "auto_generated";
/// Score used for any numeric field that is missing or unparsable.
pub const DEFAULT_SCORE: i64 = 50;
/// Neutral level of the canonical risk vocabulary.
pub const DEFAULT_RISK_LEVEL: &str = "중간";
pub const DEFAULT_LANGUAGE: &str = "ko";
pub const DEFAULT_TERM_SOURCE: &str = "MOLEG/LLM";

// ============ Analysis Result ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub document_id: String,
    pub meta: DocumentMeta,
    pub summary: DocumentSummary,
    pub risk_profile: RiskProfile,
    #[serde(default)]
    pub clauses: Vec<ClauseResult>,
    #[serde(default)]
    pub causal_graph: Vec<ClauseCausality>,
    #[serde(default)]
    pub terms: Vec<TermDefinition>,
    /// Row id attached by a persistence layer after the result is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_id: Option<i64>,
}

impl AnalysisResult {
    pub fn is_fallback(&self) -> bool {
        self.document_id == FALLBACK_DOCUMENT_ID
    }

    pub fn with_stored_id(mut self, id: i64) -> Self {
        self.stored_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub language: String,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    #[serde(default)]
    pub parties: Vec<String>,
    #[serde(default)]
    pub governing_law: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentSummary {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overall_summary: String,
    #[serde(default)]
    pub one_line_summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub main_risks: Vec<String>,
    #[serde(default)]
    pub main_protections: Vec<String>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub overall_risk_level: String,
    /// 0-100
    pub overall_risk_score: i64,
    #[serde(default)]
    pub risk_dimensions: BTreeMap<String, i64>,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseResult {
    pub clause_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub summary: String,
    pub risk_level: String,
    pub risk_score: i64,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub protections: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub action_guides: Vec<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tags: ClauseTags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClauseTags {
    #[serde(default)]
    pub domain: Vec<String>,
    #[serde(default)]
    pub risk: Vec<String>,
    #[serde(default)]
    pub parties: Vec<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CausalRelationship {
    Triggers,
    #[default]
    DependsOn,
    ConflictsWith,
    Clarifies,
    Overrides,
}

impl CausalRelationship {
    pub const ALL: [CausalRelationship; 5] = [
        Self::Triggers,
        Self::DependsOn,
        Self::ConflictsWith,
        Self::Clarifies,
        Self::Overrides,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triggers => "triggers",
            Self::DependsOn => "depends_on",
            Self::ConflictsWith => "conflicts_with",
            Self::Clarifies => "clarifies",
            Self::Overrides => "overrides",
        }
    }

    /// Lenient parse used on model output. Accepts `depends-on`, `Depends On`, etc.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        Self::ALL.into_iter().find(|r| r.as_str() == normalized)
    }
}

/// Directed relation `from_clause_id -> to_clause_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseCausality {
    pub from_clause_id: String,
    pub to_clause_id: String,
    #[serde(default)]
    pub relationship: CausalRelationship,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermDefinition {
    pub term: String,
    /// Plain-language definition in the analysis language (Korean by default).
    #[serde(default)]
    pub korean: String,
    #[serde(default)]
    pub english: Option<String>,
    #[serde(default = "default_term_source")]
    pub source: String,
}

fn default_term_source() -> String {
    DEFAULT_TERM_SOURCE.to_string()
}

// ============ Pre-analysis ============

/// Clause located in the source text before the model is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseCandidate {
    pub clause_id: String,
    pub title: Option<String>,
    pub raw_text: String,
}

/// Heuristic facts about a document gathered without the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PreAnalysis {
    pub language: String,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    #[serde(default)]
    pub parties: Vec<String>,
    #[serde(default)]
    pub clauses: Vec<ClauseCandidate>,
    #[serde(default)]
    pub candidate_terms: Vec<String>,
}

impl PreAnalysis {
    pub fn hints(&self) -> AnalysisHints {
        AnalysisHints {
            language: self.language.clone(),
            domain_tags: self.domain_tags.clone(),
            parties: self.parties.clone(),
        }
    }
}

/// What the reconciler knows about the document when the model reply is unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisHints {
    pub language: String,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    #[serde(default)]
    pub parties: Vec<String>,
}

impl AnalysisHints {
    pub fn for_language(language: &str) -> Self {
        Self {
            language: language.to_string(),
            domain_tags: Vec::new(),
            parties: Vec::new(),
        }
    }
}

impl Default for AnalysisHints {
    fn default() -> Self {
        Self::for_language(DEFAULT_LANGUAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_parse() {
        assert_eq!(CausalRelationship::parse("triggers"), Some(CausalRelationship::Triggers));
        assert_eq!(
            CausalRelationship::parse(" Conflicts-With "),
            Some(CausalRelationship::ConflictsWith)
        );
        assert_eq!(CausalRelationship::parse("depends on"), Some(CausalRelationship::DependsOn));
        assert_eq!(CausalRelationship::parse("causes"), None);
    }

    #[test]
    fn test_relationship_serde() {
        let json = serde_json::to_string(&CausalRelationship::ConflictsWith).unwrap();
        assert_eq!(json, "\"conflicts_with\"");
        let back: CausalRelationship = serde_json::from_str("\"overrides\"").unwrap();
        assert_eq!(back, CausalRelationship::Overrides);
    }

    #[test]
    fn test_term_source_default() {
        let term: TermDefinition = serde_json::from_str(r#"{"term": "임금"}"#).unwrap();
        assert_eq!(term.source, DEFAULT_TERM_SOURCE);
        assert!(term.english.is_none());
    }

    #[test]
    fn test_hints_from_pre_analysis() {
        let hints = PreAnalysis {
            language: "ko".to_string(),
            parties: vec!["근로자".to_string()],
            ..Default::default()
        }
        .hints();
        assert_eq!(hints.parties, vec!["근로자".to_string()]);
    }
}
