use anyhow::{Context, Result};
use legal_analyzer_lib::models::{AnalysisResult, PreAnalysis, TermDefinition};
use legal_analyzer_lib::services::{
    answer_question, build_pre_analysis, reconcile, AnalysisCache, AppConfig, ConfigStore, ContractAnalyzer,
    GeminiClient, LawTermClient, MemoryAnalysisCache, NoopAnalysisCache,
};
use tracing::warn;

const USAGE: &str = "Usage:
  analyze_contract <contract.txt> [--language ko|en|vi] [--raw <llm_output.txt>] [--terms] [--out <json_path>]
  analyze_contract --ask \"<question>\" [--language ko|en|vi]

Notes:
  - `--raw` reconciles a saved model reply offline; no API key needed.
  - `--terms` looks up candidate terms in the legal-terminology dictionary (MOLEG_API_KEY).
  - Otherwise GEMINI_API_KEY (or the config file key) is required.";

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

const VALUE_FLAGS: [&str; 4] = ["--language", "--raw", "--out", "--ask"];

/// First argument that is neither a flag nor the value of one.
fn positional_arg(args: &[String]) -> Option<String> {
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            rest.next();
        } else if !arg.starts_with("--") {
            return Some(arg.clone());
        }
    }
    None
}

fn load_config() -> Result<AppConfig> {
    match ConfigStore::open_default() {
        Some(store) => store.load().map_err(anyhow::Error::msg),
        None => Ok(AppConfig::default()),
    }
}

async fn analyze_with<C: AnalysisCache>(
    cache: C,
    config: &AppConfig,
    text: &str,
    pre: &PreAnalysis,
    terms: &[TermDefinition],
    output_language: &str,
) -> Result<AnalysisResult> {
    let client = GeminiClient::from_config(config)?;
    let analyzer = ContractAnalyzer::new(client, cache, config);
    let result = analyzer
        .analyze(text, pre, terms, output_language)
        .await
        .context("contract analysis failed")?;
    Ok(result)
}

async fn lookup_terms(config: &AppConfig, pre: &PreAnalysis) -> Vec<TermDefinition> {
    match LawTermClient::from_config(config) {
        Ok(client) => client.fetch_terms(&pre.candidate_terms).await.into_values().collect(),
        Err(e) => {
            warn!("[CLI] skipping term lookup: {}", e);
            Vec::new()
        }
    }
}

fn print_report(path: &str, pre: &PreAnalysis, result: &AnalysisResult) {
    println!("File: {}", path);
    println!("Language: {}", pre.language);
    println!("Clauses (pre-analysis): {}", pre.clauses.len());
    println!("Parties: {}", pre.parties.join(", "));
    println!("Domains: {}", pre.domain_tags.join(", "));
    println!();

    if result.is_fallback() {
        println!("!! Model reply could not be decoded; showing fallback result.");
    }
    println!("Document: {}", result.document_id);
    if let Some(title) = &result.summary.title {
        println!("Title: {}", title);
    }
    println!("Summary: {}", preview(&result.summary.one_line_summary, 120));
    println!(
        "Overall risk: {} ({})",
        result.risk_profile.overall_risk_level, result.risk_profile.overall_risk_score
    );
    for (dimension, score) in &result.risk_profile.risk_dimensions {
        println!("  - {}: {}", dimension, score);
    }
    println!();

    println!("Clauses: {}", result.clauses.len());
    for clause in &result.clauses {
        println!(
            "[{}] {} ({})  {}",
            clause.clause_id,
            clause.risk_level,
            clause.risk_score,
            preview(&clause.summary, 100)
        );
    }
    if !result.causal_graph.is_empty() {
        println!();
        println!("Causal links: {}", result.causal_graph.len());
        for link in &result.causal_graph {
            println!(
                "  {} -[{}]-> {}",
                link.from_clause_id,
                link.relationship.as_str(),
                link.to_clause_id
            );
        }
    }
    if !result.terms.is_empty() {
        println!();
        println!("Terms: {}", result.terms.len());
        for term in &result.terms {
            println!("  {}: {}", term.term, preview(&term.korean, 80));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || has_flag(&args, "--help") {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    legal_analyzer_lib::init_logging();
    let config = load_config()?;
    let language = parse_arg_value(&args, "--language");
    let output_language = language
        .clone()
        .unwrap_or_else(|| config.analysis.default_language.clone());

    if let Some(question) = parse_arg_value(&args, "--ask") {
        let client = GeminiClient::from_config(&config)?;
        println!("{}", answer_question(&client, &question, &output_language).await);
        return Ok(());
    }

    let Some(path) = positional_arg(&args) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let raw_path = parse_arg_value(&args, "--raw");
    let out_path = parse_arg_value(&args, "--out");

    let text = std::fs::read_to_string(&path).with_context(|| format!("read contract failed: {}", path))?;
    let pre = build_pre_analysis(&text, language.as_deref());

    let result = match raw_path {
        Some(raw_path) => {
            let raw = std::fs::read_to_string(&raw_path)
                .with_context(|| format!("read model reply failed: {}", raw_path))?;
            reconcile(&raw, &pre.hints())
        }
        None => {
            let terms = if has_flag(&args, "--terms") {
                lookup_terms(&config, &pre).await
            } else {
                Vec::new()
            };
            if config.analysis.cache_enabled {
                analyze_with(MemoryAnalysisCache::new(), &config, &text, &pre, &terms, &output_language).await?
            } else {
                analyze_with(NoopAnalysisCache, &config, &text, &pre, &terms, &output_language).await?
            }
        }
    };

    print_report(&path, &pre, &result);

    if let Some(out_path) = out_path {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&out_path, json).with_context(|| format!("write out failed: {}", out_path))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_positional_arg_after_flags() {
        let a = args(&["analyze_contract", "--language", "en", "--terms", "contract.txt", "--out", "o.json"]);
        assert_eq!(positional_arg(&a).as_deref(), Some("contract.txt"));
        assert_eq!(parse_arg_value(&a, "--language").as_deref(), Some("en"));
    }

    #[test]
    fn test_positional_arg_missing() {
        assert_eq!(positional_arg(&args(&["analyze_contract", "--raw", "reply.txt"])), None);
        assert_eq!(
            positional_arg(&args(&["analyze_contract", "contract.txt", "--raw", "reply.txt"])).as_deref(),
            Some("contract.txt")
        );
    }
}
