// Legal Term Dictionary Service
// Looks up statutory term definitions in the government legal-terminology API (lstrm)

use crate::models::TermDefinition;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::config_store::{AppConfig, LawApiConfig};
use super::providers::{get_api_key, ProviderError};

const LAW_API_DEFAULT_URL: &str = "http://www.law.go.kr/DRF/lawService.do";
const ENGLISH_DICTIONARY_CODE: &str = "법령한영사전";
pub const LAW_TERM_SOURCE: &str = "MOLEG";

#[derive(Clone)]
pub struct LawTermClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    max_concurrency: usize,
}

impl LawTermClient {
    pub fn new(api_key: impl Into<String>, config: &LawApiConfig) -> Self {
        let base_url = env::var("MOLEG_API_URL")
            .ok()
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| LAW_API_DEFAULT_URL.to_string());

        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let api_key = get_api_key("moleg").ok_or_else(|| ProviderError::MissingApiKey("moleg".to_string()))?;
        Ok(Self::new(api_key, &config.law_api))
    }

    /// Look up one term. `Ok(None)` when the dictionary has no usable entry.
    pub async fn lookup(&self, term: &str) -> Result<Option<TermDefinition>, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("OC", self.api_key.as_str()),
                ("target", "lstrm"),
                ("query", term),
                ("type", "JSON"),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: format!("term lookup failed for {}", term),
            });
        }

        // content type is unreliable (often text/html)
        let body = response.text().await?;
        let data: Value = serde_json::from_str(&body).map_err(|e| ProviderError::JsonError(e.to_string()))?;
        Ok(parse_term_service(term, &data))
    }

    /// Look up every distinct term concurrently. Failed or empty lookups are skipped.
    pub async fn fetch_terms(&self, terms: &[String]) -> BTreeMap<String, TermDefinition> {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set: JoinSet<(String, Result<Option<TermDefinition>, ProviderError>)> = JoinSet::new();

        let mut unique: Vec<&String> = terms.iter().filter(|t| !t.trim().is_empty()).collect();
        unique.sort();
        unique.dedup();

        for term in unique {
            let client = self.clone();
            let semaphore = semaphore.clone();
            let term = term.clone();
            join_set.spawn(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => client.lookup(&term).await,
                    Err(_) => Err(ProviderError::JsonError("semaphore closed".to_string())),
                };
                (term, result)
            });
        }

        let mut found = BTreeMap::new();
        let mut failed = 0usize;
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((term, Ok(Some(definition)))) => {
                    found.insert(term, definition);
                }
                Ok((term, Ok(None))) => debug!("[LAW_TERMS] no entry for {}", term),
                Ok((term, Err(e))) => {
                    failed += 1;
                    warn!("[LAW_TERMS] lookup failed for {}: {}", term, e);
                }
                Err(e) => {
                    failed += 1;
                    warn!("[LAW_TERMS] lookup task failed: {}", e);
                }
            }
        }

        info!(
            "[LAW_TERMS] term lookup done: requested={}, found={}, failed={}, elapsed_ms={}",
            terms.len(),
            found.len(),
            failed,
            started.elapsed().as_millis()
        );
        found
    }
}

/// The API returns a bare string for one result and a list for several.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn definition_noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>|&[a-zA-Z0-9#]+;|[a-zA-Z]|\([\x{4e00}-\x{9fa5}\s]+\)").unwrap())
}

/// Drop HTML tags, entities, Latin letters and parenthesised Hanja; collapse whitespace.
pub fn clean_definition(text: &str) -> String {
    let stripped = definition_noise_re().replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse one `LsTrmService` response into a term definition.
pub fn parse_term_service(term: &str, data: &Value) -> Option<TermDefinition> {
    let service = data.get("LsTrmService")?;

    let codes = string_list(service.get("법령용어코드명"));
    if codes.is_empty() {
        return None;
    }
    let mut definitions = string_list(service.get("법령용어정의"));
    let mut examples = string_list(service.get("용례"));
    definitions.resize(codes.len().max(definitions.len()), String::new());
    examples.resize(codes.len().max(examples.len()), String::new());

    let mut korean: Option<&str> = None;
    let mut english: Option<&str> = None;
    for (i, code) in codes.iter().enumerate() {
        let definition = definitions[i].trim();
        if code == ENGLISH_DICTIONARY_CODE {
            english = Some(definition);
        } else if korean.is_none() {
            let candidate = if definition.is_empty() { examples[i].trim() } else { definition };
            if !candidate.is_empty() {
                korean = Some(candidate);
            }
        }
    }

    let korean = clean_definition(korean?);
    if korean.is_empty() {
        return None;
    }

    Some(TermDefinition {
        term: term.to_string(),
        korean,
        english: english.filter(|e| !e.is_empty()).map(str::to_string),
        source: LAW_TERM_SOURCE.to_string(),
    })
}
