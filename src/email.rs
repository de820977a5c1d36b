use serde::{Deserialize, Serialize};

/// One email as captured by the extraction side of the message channel.
///
/// Every field is optional on the wire; missing fields deserialize to their
/// empty form so the scanners never have to special-case absent input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailData {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    /// URLs in document order. May be empty.
    #[serde(default)]
    pub links: Vec<String>,
    /// Stable identifier of the message, when the mail page exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
}

impl EmailData {
    /// Lowercased subject and body joined for case-insensitive matching.
    pub fn normalized_text(&self) -> String {
        format!("{} {}", self.subject, self.body).to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_to_empty() {
        let email: EmailData = serde_json::from_str("{}").unwrap();
        assert!(email.from.is_empty());
        assert!(email.subject.is_empty());
        assert!(email.body.is_empty());
        assert!(email.links.is_empty());
        assert!(email.email_id.is_none());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let email: EmailData = serde_json::from_str(
            r#"{"from":"a@b.com","subject":"Hi","body":"text","links":["https://b.com"],"emailId":"msg-1"}"#,
        )
        .unwrap();
        assert_eq!(email.email_id.as_deref(), Some("msg-1"));
        assert_eq!(email.links, vec!["https://b.com"]);
    }

    #[test]
    fn normalized_text_lowercases_subject_and_body() {
        let email = EmailData {
            subject: "URGENT Notice".to_string(),
            body: "Verify NOW".to_string(),
            ..Default::default()
        };
        assert_eq!(email.normalized_text(), "urgent notice verify now");
    }
}
