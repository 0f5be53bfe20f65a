// Legal Analyzer Core Services

pub mod analysis;
pub mod config_store;
pub mod law_terms;
pub mod legal_qa;
pub mod providers;
pub mod text_processor;

pub use analysis::{
    build_contract_analysis_prompt,
    canonicalize_risk_level,
    fallback_result,
    fingerprint,
    reconcile,
    reconcile_fragments,
    AnalysisCache,
    AnalysisStore,
    ContractAnalyzer,
    MemoryAnalysisCache,
    MemoryAnalysisStore,
    NoopAnalysisCache,
    PromptLimits,
    StoreError,
};
pub use config_store::*;
pub use law_terms::{clean_definition, parse_term_service, LawTermClient};
pub use legal_qa::{answer_question, build_qa_prompt, AnswerLanguage};
pub use providers::*;
pub use text_processor::*;
