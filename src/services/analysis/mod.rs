// Contract Analysis Module
// Prompting, model reply reconciliation, result caching and persistence

pub mod analyzer;
pub mod cache;
pub mod json_repair;
pub mod prompt;
pub mod reconciler;
pub mod risk_level;
pub mod store;

pub use analyzer::ContractAnalyzer;
pub use cache::{fingerprint, AnalysisCache, MemoryAnalysisCache, NoopAnalysisCache};
pub use json_repair::{assemble_fragments, is_valid_json, repair_json, strip_to_json, RepairStrategy};
pub use prompt::{build_contract_analysis_prompt, language_instruction, PromptLimits};
pub use reconciler::{coerce_score, fallback_result, materialize, reconcile, reconcile_fragments};
pub use risk_level::{canonicalize_risk_level, CANONICAL_RISK_LEVELS};
pub use store::{AnalysisStore, MemoryAnalysisStore, StoreError};
