// Text Processing Service
// Model-free pre-analysis of a contract: language, clauses, parties, domain and term candidates

use crate::models::{ClauseCandidate, PreAnalysis, DEFAULT_LANGUAGE};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const SUPPORTED_LANGUAGES: [&str; 3] = ["ko", "en", "vi"];

/// Domain tag and the keywords that suggest it. English keywords are lowercase.
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("노동", &["근로", "임금", "근무", "퇴직", "employment", "employee", "salary", "wage"]),
    ("부동산", &["임대차", "임대인", "임차인", "보증금", "차임", "월세", "lease", "landlord", "tenant", "premises"]),
    ("매매", &["매매", "매도인", "매수인", "purchase", "seller", "buyer"]),
    ("용역", &["용역", "도급", "수급인", "service agreement", "contractor", "deliverable"]),
    ("금융", &["대출", "이자", "채무", "채권자", "연대보증", "loan", "interest", "debtor", "creditor"]),
    ("비밀유지", &["비밀유지", "영업비밀", "기밀", "confidential", "non-disclosure"]),
];

const PARTY_NOUNS: &[&str] = &[
    "근로자", "사용자", "임대인", "임차인", "매도인", "매수인", "도급인", "수급인", "채권자", "채무자",
    "보증인", "위탁자", "수탁자", "Employer", "Employee", "Landlord", "Tenant", "Lessor", "Lessee",
    "Seller", "Buyer", "Contractor", "Client",
];

const STOPWORDS: &[&str] = &[
    "제", "조", "항", "호", "것", "수", "때", "년", "월", "일", "시", "분", "초", "개", "원", "명",
    "부분", "문제", "상황", "방식", "이유", "방법", "관련", "사실", "정의", "절차", "이상", "이하",
    "다음", "해당", "대해", "위해", "대한", "그", "이", "및", "등", "우리", "저희", "당신", "하나",
    "둘", "셋", "첫째", "둘째", "기타",
];

// longest first
const TRAILING_PARTICLES: &[&str] = &[
    "으로부터", "하여야", "에게서", "으로서", "으로써", "에서는", "에게는", "으로는", "에서", "에게",
    "으로", "부터", "까지", "보다", "처럼", "하여", "한다", "하는", "하고", "하며", "된다", "되는",
    "은", "는", "이", "가", "을", "를", "의", "에", "와", "과", "도", "로", "만", "할", "한", "된", "함",
];

fn korean_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*제[ \t]*(\d+)[ \t]*조(?:[ \t]*의[ \t]*(\d+))?[ \t]*(?:\(([^)\n]*)\))?").unwrap()
    })
}

fn article_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^[ \t]*article[ \t]+(\d+)(?:-(\d+))?\b[.:]?[ \t]*(?:\(([^)\n]*)\))?").unwrap()
    })
}

fn hangul_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[가-힣]{2,}").unwrap())
}

fn quoted_party_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["'“”‘’(]\s*(갑|을|병)\s*["'“”‘’)]"#).unwrap())
}

/// Normalize quotes, spaces and line endings
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{ff08}', "(")
        .replace('\u{ff09}', ")")
        .replace(['\u{3000}', '\u{00a0}'], " ");

    s = s.replace("\r\n", "\n").replace('\r', "\n");

    // Collapse horizontal whitespace
    let ws_re = Regex::new(r"[ \t\x0C\x0B]+").unwrap();
    s = ws_re.replace_all(&s, " ").to_string();

    s.lines().map(|ln| ln.trim()).collect::<Vec<_>>().join("\n").trim().to_string()
}

fn is_hangul(c: char) -> bool {
    ('\u{ac00}'..='\u{d7a3}').contains(&c) || ('\u{1100}'..='\u{11ff}').contains(&c) || ('\u{3130}'..='\u{318f}').contains(&c)
}

fn is_vietnamese_letter(c: char) -> bool {
    matches!(
        c,
        'ă' | 'â' | 'đ' | 'ê' | 'ô' | 'ơ' | 'ư' | 'Ă' | 'Â' | 'Đ' | 'Ê' | 'Ô' | 'Ơ' | 'Ư'
    ) || ('\u{1ea0}'..='\u{1ef9}').contains(&c)
}

/// Guess the document language from its letters.
pub fn detect_language(text: &str) -> &'static str {
    let mut letters = 0usize;
    let mut hangul = 0usize;
    let mut vietnamese = 0usize;

    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if is_hangul(c) {
            hangul += 1;
        } else if is_vietnamese_letter(c) {
            vietnamese += 1;
        }
    }

    if letters == 0 {
        return DEFAULT_LANGUAGE;
    }
    if hangul as f64 / letters as f64 > 0.3 {
        return "ko";
    }
    if vietnamese as f64 / letters as f64 > 0.05 {
        return "vi";
    }
    "en"
}

/// Split on `제N조(제목)` headings, then `Article N (Title)` headings, then blank lines.
/// Text before the first heading is not a clause.
pub fn split_clauses(text: &str) -> Vec<ClauseCandidate> {
    let korean = split_on_headings(text, korean_heading_re(), |n, sub| match sub {
        Some(sub) => format!("제{}조의{}", n, sub),
        None => format!("제{}조", n),
    });
    if !korean.is_empty() {
        return korean;
    }

    let articles = split_on_headings(text, article_heading_re(), |n, sub| match sub {
        Some(sub) => format!("Article {}-{}", n, sub),
        None => format!("Article {}", n),
    });
    if !articles.is_empty() {
        return articles;
    }

    split_paragraphs(text)
}

fn split_on_headings<F>(text: &str, re: &Regex, make_id: F) -> Vec<ClauseCandidate>
where
    F: Fn(&str, Option<&str>) -> String,
{
    let headings: Vec<_> = re.captures_iter(text).collect();
    let mut clauses = Vec::with_capacity(headings.len());

    for (i, caps) in headings.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());

        let number = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let sub = caps.get(2).map(|m| m.as_str());
        let title = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty());

        clauses.push(ClauseCandidate {
            clause_id: make_id(number, sub),
            title,
            raw_text: text[whole.start()..end].trim().to_string(),
        });
    }

    clauses
}

fn split_paragraphs(text: &str) -> Vec<ClauseCandidate> {
    let para_re = Regex::new(r"\n\s*\n").unwrap();
    para_re
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(i, p)| ClauseCandidate {
            clause_id: format!("clause_{}", i + 1),
            title: None,
            raw_text: p.to_string(),
        })
        .collect()
}

/// Domain tags whose keywords occur in the text, in table order.
pub fn detect_domain_tags(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    DOMAIN_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Party names in order of first appearance.
pub fn detect_parties(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = PARTY_NOUNS
        .iter()
        .filter_map(|p| text.find(p).map(|pos| (pos, p.to_string())))
        .collect();

    for caps in quoted_party_re().captures_iter(text) {
        if let Some(m) = caps.get(1) {
            if !found.iter().any(|(_, name)| name == m.as_str()) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, name)| name).collect()
}

fn trim_particle(word: &str) -> &str {
    for particle in TRAILING_PARTICLES {
        if let Some(stem) = word.strip_suffix(particle) {
            if stem.chars().count() >= 2 {
                return stem;
            }
        }
    }
    word
}

/// Hangul words of two or more syllables, particles trimmed, stopwords removed.
/// Sorted and deduplicated.
pub fn extract_candidate_terms(text: &str) -> Vec<String> {
    let terms: BTreeSet<String> = hangul_word_re()
        .find_iter(text)
        .map(|m| trim_particle(m.as_str()))
        .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect();
    terms.into_iter().collect()
}

/// Build the pre-analysis for a document. A supported `language_hint` wins over detection.
pub fn build_pre_analysis(text: &str, language_hint: Option<&str>) -> PreAnalysis {
    let normalized = normalize_punctuation(text);
    let language = language_hint
        .map(|h| h.trim().to_lowercase())
        .filter(|h| SUPPORTED_LANGUAGES.contains(&h.as_str()))
        .unwrap_or_else(|| detect_language(&normalized).to_string());

    PreAnalysis {
        language,
        domain_tags: detect_domain_tags(&normalized),
        parties: detect_parties(&normalized),
        clauses: split_clauses(&normalized),
        candidate_terms: extract_candidate_terms(&normalized),
    }
}
