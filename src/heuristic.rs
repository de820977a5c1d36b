use crate::analysis::AnalysisResult;
use crate::email::EmailData;
use url::Url;

/// Phrases that add to the confidence accumulator when found in the subject or
/// body. Each hit is worth [`KEYWORD_SCORE`]; hits accumulate without a sub-cap.
const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "urgent",
    "account suspended",
    "verify account",
    "click here to update",
    "password expired",
    "payment failed",
    "unauthorized access",
    "invoice attached",
];

const KEYWORD_SCORE: u32 = 15;
const LINKS_PRESENT_SCORE: u32 = 10;
const LINK_MISMATCH_SCORE: u32 = 30;

/// Fixed decision cutoff for the local path, independent of the user-configured
/// remote threshold.
pub const LOCAL_THRESHOLD: u32 = 45;

/// A heuristic scan never claims full certainty.
pub const LOCAL_MAX_CONFIDENCE: u32 = 90;

/// Prefixed to the recommendation when this scan ran because the remote scan
/// failed.
pub const FALLBACK_NOTICE: &str =
    "Note: remote analysis was unavailable, so this verdict comes from the local heuristic scan.";

/// Keyword/link scanner. Deterministic, synchronous, no I/O; results are never
/// persisted.
#[derive(Debug, Default)]
pub struct LocalScanner;

impl LocalScanner {
    pub fn new() -> Self {
        Self
    }

    /// Score an email against the fixed keyword and link heuristics. With
    /// `fallback` set the recommendation discloses that the remote scan failed.
    pub fn scan(&self, email: &EmailData, fallback: bool) -> AnalysisResult {
        let text = email.normalized_text();
        let mut confidence: u32 = 0;
        let mut indicators = Vec::new();

        for keyword in SUSPICIOUS_KEYWORDS {
            if text.contains(keyword) {
                indicators.push(format!("Suspicious keyword: \"{keyword}\""));
                confidence += KEYWORD_SCORE;
            }
        }

        if !email.links.is_empty() && confidence < LOCAL_THRESHOLD {
            indicators.push("Email contains links".to_string());
            confidence += LINKS_PRESENT_SCORE;
        }

        if !email.links.is_empty() && self.has_mismatched_link(email, &text) {
            indicators
                .push("Link host does not match the email text (possible spoofed link)".to_string());
            confidence += LINK_MISMATCH_SCORE;
        }

        let confidence = confidence.min(LOCAL_MAX_CONFIDENCE);
        let is_phishing = confidence >= LOCAL_THRESHOLD;
        log::debug!(
            "local scan: confidence {confidence}, {} indicator(s), phishing={is_phishing}",
            indicators.len()
        );

        let mut recommendation = if is_phishing {
            "This email shows signs of phishing. Do not click links or share credentials."
                .to_string()
        } else if confidence > 0 {
            "This email appears safe, but minor indicators were found. Treat links with care."
                .to_string()
        } else {
            "No phishing indicators found. This email appears safe.".to_string()
        };
        if fallback {
            recommendation = format!("{FALLBACK_NOTICE} {recommendation}");
        }

        AnalysisResult {
            is_phishing,
            confidence,
            indicators,
            recommendation,
        }
    }

    /// A link mismatches when its host appears nowhere in the subject or body
    /// text. A link that does not parse as a URL counts as mismatched.
    fn has_mismatched_link(&self, email: &EmailData, normalized_text: &str) -> bool {
        email.links.iter().any(|link| match Url::parse(link) {
            Ok(url) => match url.host_str() {
                Some(host) => !normalized_text.contains(&host.to_lowercase()),
                None => true,
            },
            Err(_) => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(subject: &str, body: &str, links: &[&str]) -> EmailData {
        EmailData {
            from: "sender@example.com".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            links: links.iter().map(|s| s.to_string()).collect(),
            email_id: None,
        }
    }

    #[test]
    fn clean_email_scores_zero() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(&email("Lunch tomorrow?", "See you at noon.", &[]), false);
        assert_eq!(result.confidence, 0);
        assert!(!result.is_phishing);
        assert!(result.indicators.is_empty());
        assert!(result.recommendation.contains("No phishing indicators"));
    }

    #[test]
    fn single_keyword_stays_below_threshold() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(&email("Urgent: please read", "Nothing else here.", &[]), false);
        assert_eq!(result.confidence, 15);
        assert!(!result.is_phishing);
        assert_eq!(result.indicators.len(), 1);
        assert!(result.recommendation.contains("minor indicators"));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(&email("ACCOUNT SUSPENDED", "", &[]), false);
        assert_eq!(result.confidence, 15);
    }

    #[test]
    fn three_keywords_and_mismatched_link_flag_phishing() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(
            &email(
                "Urgent: account suspended",
                "Your password expired. Act now.",
                &["https://evil.example.net/login"],
            ),
            false,
        );
        // 3 keywords (45) + mismatched link (30); "links found" is skipped at >= 45.
        assert_eq!(result.confidence, 75);
        assert!(result.is_phishing);
        assert!(result
            .indicators
            .iter()
            .any(|i| i.contains("does not match")));
    }

    #[test]
    fn confidence_is_clamped_to_ninety() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(
            &email(
                "Urgent: account suspended, password expired",
                "Verify account now. Payment failed. Unauthorized access detected. Invoice attached.",
                &["not a url"],
            ),
            false,
        );
        assert_eq!(result.confidence, LOCAL_MAX_CONFIDENCE);
        assert!(result.is_phishing);
    }

    #[test]
    fn links_found_indicator_only_applies_below_threshold() {
        let scanner = LocalScanner::new();
        // One keyword (15) keeps the accumulator below 45, so links add 10.
        let result = scanner.scan(
            &email("Urgent", "Read this at example.com", &["https://example.com/a"]),
            false,
        );
        assert_eq!(result.confidence, 25);
        assert!(result.indicators.iter().any(|i| i.contains("contains links")));
    }

    #[test]
    fn matching_link_host_is_not_a_mismatch() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(
            &email("News", "Read more at news.example.com today.", &["https://news.example.com/x"]),
            false,
        );
        assert!(!result.indicators.iter().any(|i| i.contains("does not match")));
    }

    #[test]
    fn unparseable_link_counts_as_mismatched() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(&email("Hello", "Plain text.", &["::not-a-url::"]), false);
        assert!(result.indicators.iter().any(|i| i.contains("does not match")));
        // links present (10) + mismatch (30).
        assert_eq!(result.confidence, 40);
    }

    #[test]
    fn fallback_flag_prefixes_the_notice() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(&email("Hello", "Plain text.", &[]), true);
        assert!(result.recommendation.starts_with(FALLBACK_NOTICE));
    }

    #[test]
    fn empty_email_is_handled_without_error() {
        let scanner = LocalScanner::new();
        let result = scanner.scan(&EmailData::default(), false);
        assert_eq!(result.confidence, 0);
        assert!(!result.is_phishing);
    }
}
