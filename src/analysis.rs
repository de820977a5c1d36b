use serde::{Deserialize, Serialize};

/// Verdict produced by either scanner path.
///
/// Immutable once it leaves the pipeline: results from the remote scanner pass
/// through [`crate::reconcile::reconcile`] first, the local scanner enforces
/// the same consistency itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_phishing: bool,
    /// 0..=100. The local scanner caps this at 90.
    pub confidence: u32,
    /// Human-readable findings, in detection order. Empty means clean.
    pub indicators: Vec<String>,
    pub recommendation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_verdict_field() {
        let result = AnalysisResult {
            is_phishing: true,
            confidence: 80,
            indicators: vec!["Suspicious keyword: \"urgent\"".to_string()],
            recommendation: "Do not click links.".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isPhishing"], true);
        assert_eq!(json["confidence"], 80);
    }
}
