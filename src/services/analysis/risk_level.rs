// Risk-level vocabulary
// All stored risk levels use the Korean four-step scale, whatever language the
// rest of the analysis is written in.

pub const RISK_LOW: &str = "낮음";
pub const RISK_MEDIUM: &str = "중간";
pub const RISK_HIGH: &str = "높음";
pub const RISK_CRITICAL: &str = "치명적";

pub const CANONICAL_RISK_LEVELS: [&str; 4] = [RISK_LOW, RISK_MEDIUM, RISK_HIGH, RISK_CRITICAL];

const RISK_LEVEL_MAP: &[(&str, &str)] = &[
    ("low", RISK_LOW),
    ("medium", RISK_MEDIUM),
    ("moderate", RISK_MEDIUM),
    ("high", RISK_HIGH),
    ("critical", RISK_CRITICAL),
    ("severe", RISK_CRITICAL),
    // Vietnamese
    ("thấp", RISK_LOW),
    ("trung bình", RISK_MEDIUM),
    ("cao", RISK_HIGH),
    ("nghiêm trọng", RISK_CRITICAL),
];

/// Map a model-supplied label onto the canonical vocabulary.
///
/// Lookup is case-insensitive on the trimmed label. Labels that are not in the
/// table come back exactly as given.
pub fn canonicalize_risk_level(label: &str) -> String {
    let key = label.trim().to_lowercase();
    RISK_LEVEL_MAP
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| label.to_string())
}
