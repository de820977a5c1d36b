use crate::analysis::AnalysisResult;

/// Minimum confidence implied by the presence of indicators.
const INDICATOR_FLOOR: u32 = 50;

/// Enforce verdict/confidence/indicator consistency on a scan result.
///
/// Applied to every remote result before it leaves the pipeline; the local
/// scanner maintains these invariants itself. Idempotent: reapplying with the
/// same threshold yields the identical result.
pub fn reconcile(mut result: AnalysisResult, threshold: u32) -> AnalysisResult {
    if !result.indicators.is_empty() {
        if !result.is_phishing {
            log::debug!(
                "reconcile: {} indicator(s) present, forcing phishing verdict",
                result.indicators.len()
            );
        }
        result.is_phishing = true;
        result.confidence = result.confidence.max(INDICATOR_FLOOR);
    }

    if result.confidence >= threshold && !result.is_phishing {
        result.is_phishing = true;
        result.recommendation = format!(
            "Confidence {} meets the configured threshold of {}; treating as phishing. {}",
            result.confidence, threshold, result.recommendation
        );
    }

    result
}
