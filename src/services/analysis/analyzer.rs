// Contract Analyzer
// cache lookup -> prompt -> streamed completion -> reconcile -> cache store

use crate::models::{AnalysisResult, PreAnalysis, TermDefinition};
use crate::services::config_store::AppConfig;
use crate::services::providers::{CompletionSource, GenerationOptions, ProviderError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::cache::{fingerprint, AnalysisCache};
use super::prompt::{build_contract_analysis_prompt, PromptLimits};
use super::reconciler::reconcile_fragments;

pub struct ContractAnalyzer<S, C> {
    source: S,
    cache: C,
    options: GenerationOptions,
    limits: PromptLimits,
    timeout: Duration,
}

impl<S, C> ContractAnalyzer<S, C>
where
    S: CompletionSource,
    C: AnalysisCache,
{
    pub fn new(source: S, cache: C, config: &AppConfig) -> Self {
        Self {
            source,
            cache,
            options: GenerationOptions::contract_analysis(&config.gemini),
            limits: PromptLimits::from(&config.analysis),
            timeout: Duration::from_secs(config.analysis.request_timeout_secs),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Analyze one contract.
    ///
    /// Errors only when the model call itself fails or times out. A reply that
    /// cannot be decoded produces the fallback result, which is not cached.
    pub async fn analyze(
        &self,
        original_text: &str,
        pre_analysis: &PreAnalysis,
        terms: &[TermDefinition],
        output_language: &str,
    ) -> Result<AnalysisResult, ProviderError> {
        let started = Instant::now();
        let cache_key = fingerprint(original_text, &pre_analysis.language);
        if let Some(cached) = self.cache.get(&cache_key) {
            info!(key = %&cache_key[..12], "[ANALYZER] cache hit");
            return Ok(cached);
        }

        let prompt = build_contract_analysis_prompt(
            original_text,
            pre_analysis,
            terms,
            output_language,
            &self.limits,
        );
        info!(
            prompt_chars = prompt.chars().count(),
            clauses = pre_analysis.clauses.len(),
            terms = terms.len(),
            output_language,
            "[ANALYZER] requesting analysis"
        );

        let fragments = tokio::time::timeout(
            self.timeout,
            self.source.stream_completion(&prompt, &self.options),
        )
        .await
        .map_err(|_| {
            warn!(timeout_secs = self.timeout.as_secs(), "[ANALYZER] model call timed out");
            ProviderError::Timeout(self.timeout.as_secs())
        })??;

        let result = reconcile_fragments(&fragments, &pre_analysis.hints());
        if result.is_fallback() {
            warn!(
                fragments = fragments.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "[ANALYZER] model reply unusable, fallback returned"
            );
        } else {
            self.cache.set(&cache_key, result.clone());
            info!(
                clauses = result.clauses.len(),
                risk_score = result.risk_profile.overall_risk_score,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "[ANALYZER] analysis complete"
            );
        }

        Ok(result)
    }
}
