// Legal Q&A Service
// Free-form legal questions answered as sectioned markdown in ko/en/vi

use tracing::{error, info};

use super::providers::{CompletionSource, GenerationOptions};

/// Persona line and section headings for one answer language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerLanguage {
    pub code: &'static str,
    pub system: &'static str,
    pub summary: &'static str,
    pub explanation: &'static str,
    pub key_points: &'static str,
    pub risks: &'static str,
    pub protections: &'static str,
    pub actions: &'static str,
    pub terms: &'static str,
    pub laws: &'static str,
    error_prefix: &'static str,
}

const KOREAN: AnswerLanguage = AnswerLanguage {
    code: "ko",
    system: "당신은 한국 법률 전문가입니다.",
    summary: "한줄 요약",
    explanation: "쉬운말 설명",
    key_points: "핵심 포인트",
    risks: "위험 요소",
    protections: "보호 장치",
    actions: "권장 행동",
    terms: "법령 용어 정의",
    laws: "관련 법령",
    error_prefix: "답변 생성 중 오류",
};

const ENGLISH: AnswerLanguage = AnswerLanguage {
    code: "en",
    system: "You are a legal expert.",
    summary: "Summary",
    explanation: "Simple Explanation",
    key_points: "Key Points",
    risks: "Risk Factors",
    protections: "Legal Protections",
    actions: "Recommended Actions",
    terms: "Legal Terms",
    laws: "Related Laws",
    error_prefix: "Error generating answer",
};

const VIETNAMESE: AnswerLanguage = AnswerLanguage {
    code: "vi",
    system: "Bạn là chuyên gia pháp lý.",
    summary: "Tóm tắt",
    explanation: "Giải thích đơn giản",
    key_points: "Điểm chính",
    risks: "Yếu tố rủi ro",
    protections: "Bảo vệ pháp lý",
    actions: "Hành động được đề xuất",
    terms: "Thuật ngữ pháp lý",
    laws: "Luật liên quan",
    error_prefix: "Lỗi khi tạo câu trả lời",
};

impl AnswerLanguage {
    /// Unknown codes answer in Korean.
    pub fn for_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "en" => ENGLISH,
            "vi" => VIETNAMESE,
            _ => KOREAN,
        }
    }

    pub fn error_message(&self, detail: &str) -> String {
        format!("{}: {}", self.error_prefix, detail)
    }
}

pub fn build_qa_prompt(question: &str, lang: &AnswerLanguage) -> String {
    format!(
        r#"{system} Answer the question below in {code}.

Question: {question}

## {summary}
[One sentence summary]

## {explanation}
[Easy explanation]

## {key_points}
- [Point 1]
- [Point 2]
- [Point 3]

## {risks}
[Risk factors]

## {protections}
[Protections]

## {actions}
1. [Action 1]
2. [Action 2]
3. [Action 3]

## {terms}
- Term1: definition
- Term2: definition

## {laws}
- [Law name]
"#,
        system = lang.system,
        code = lang.code.to_uppercase(),
        question = question.trim(),
        summary = lang.summary,
        explanation = lang.explanation,
        key_points = lang.key_points,
        risks = lang.risks,
        protections = lang.protections,
        actions = lang.actions,
        terms = lang.terms,
        laws = lang.laws,
    )
}

/// Answer a legal question. Never fails: provider errors come back as a
/// localized error line in place of the answer.
pub async fn answer_question<S>(source: &S, question: &str, language: &str) -> String
where
    S: CompletionSource + ?Sized,
{
    let lang = AnswerLanguage::for_code(language);
    let prompt = build_qa_prompt(question, &lang);

    match source.complete(&prompt, &GenerationOptions::legal_answer()).await {
        Ok(answer) => {
            info!(language = lang.code, answer_chars = answer.chars().count(), "[LEGAL_QA] answer generated");
            answer
        }
        Err(e) => {
            error!("[LEGAL_QA] answer generation failed: {}", e);
            lang.error_message(&e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::ProviderError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoSource {
        fail: bool,
        last_prompt: Mutex<String>,
    }

    #[async_trait]
    impl CompletionSource for EchoSource {
        async fn stream_completion(
            &self,
            prompt: &str,
            options: &GenerationOptions,
        ) -> Result<Vec<String>, ProviderError> {
            self.complete(prompt, options).await.map(|s| vec![s])
        }

        async fn complete(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ProviderError> {
            assert!(!options.json_response);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            if self.fail {
                return Err(ProviderError::MissingContent);
            }
            Ok("## 한줄 요약\n보증금은 돌려받을 수 있습니다.".to_string())
        }
    }

    #[test]
    fn test_unknown_language_uses_korean() {
        assert_eq!(AnswerLanguage::for_code("fr"), KOREAN);
        assert_eq!(AnswerLanguage::for_code(" VI "), VIETNAMESE);
    }

    #[test]
    fn test_prompt_sections() {
        let prompt = build_qa_prompt("Can my landlord keep the deposit?", &ENGLISH);
        assert!(prompt.starts_with("You are a legal expert. Answer the question below in EN."));
        assert!(prompt.contains("## Risk Factors"));
        assert!(prompt.contains("Question: Can my landlord keep the deposit?"));
    }

    #[tokio::test]
    async fn test_answer_question() {
        let source = EchoSource { fail: false, last_prompt: Mutex::new(String::new()) };
        let answer = answer_question(&source, "보증금을 돌려받을 수 있나요?", "ko").await;
        assert!(answer.contains("보증금은 돌려받을 수 있습니다"));
        assert!(source.last_prompt.lock().unwrap().contains("## 관련 법령"));
    }

    #[tokio::test]
    async fn test_answer_question_localized_error() {
        let source = EchoSource { fail: true, last_prompt: Mutex::new(String::new()) };
        assert_eq!(
            answer_question(&source, "q", "vi").await,
            "Lỗi khi tạo câu trả lời: Missing content in response"
        );
        assert_eq!(
            answer_question(&source, "q", "en").await,
            "Error generating answer: Missing content in response"
        );
        assert!(answer_question(&source, "q", "xx").await.starts_with("답변 생성 중 오류: "));
    }
}
