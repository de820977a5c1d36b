use crate::analysis::AnalysisResult;
use crate::email::EmailData;
use crate::router::AnalysisRouter;
use serde::{Deserialize, Serialize};

/// Inbound message from the extraction/UI side of the channel.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    AnalyzeEmail { email_data: EmailData },
    ShowNotification { title: String, message: String },
}

/// Reply envelope: `{success: true, result}` or `{success: false, error}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(result: AnalysisResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Sink for `showNotification` requests. The host logs them; an embedding
/// application can substitute a real user-facing surface.
pub trait Notifier {
    fn notify(&self, title: &str, message: &str);
}

#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        log::info!("notification: {title}: {message}");
    }
}

/// Dispatch one request. `showNotification` has no reply contract, hence the
/// `None` arm.
pub async fn handle_request(
    router: &AnalysisRouter,
    notifier: &dyn Notifier,
    request: Request,
) -> Option<Response> {
    match request {
        Request::AnalyzeEmail { email_data } => Some(match router.analyze(&email_data).await {
            Ok(outcome) => Response::ok(outcome.into_result()),
            Err(err) => {
                log::error!("analysis failed: {err:#}");
                Response::err(err.to_string())
            }
        }),
        Request::ShowNotification { title, message } => {
            notifier.notify(&title, &message);
            None
        }
    }
}

/// Transport adapter for the newline-delimited JSON host: parse a line, run
/// the request, serialize the reply. Unparseable input is the one caller-visible
/// failure.
pub async fn handle_line(
    router: &AnalysisRouter,
    notifier: &dyn Notifier,
    line: &str,
) -> Option<String> {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            log::warn!("rejecting malformed request: {err}");
            return Some(
                serde_json::to_string(&Response::err(format!("invalid request: {err}")))
                    .unwrap_or_else(|_| r#"{"success":false,"error":"invalid request"}"#.to_string()),
            );
        }
    };
    let response = handle_request(router, notifier, request).await?;
    match serde_json::to_string(&response) {
        Ok(json) => Some(json),
        Err(err) => {
            log::error!("failed to serialize response: {err}");
            Some(r#"{"success":false,"error":"internal serialization failure"}"#.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteScanner;
    use crate::settings::SettingsProvider;
    use crate::store::{KvStore, ResultStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn router() -> (tempfile::TempDir, AnalysisRouter) {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvStore::open(dir.path().join("store.json")).unwrap();
        let router = AnalysisRouter::new(
            SettingsProvider::new(kv.clone()),
            RemoteScanner::new().unwrap(),
            ResultStore::new(kv),
        );
        (dir, router)
    }

    #[derive(Default)]
    struct CountingNotifier(AtomicUsize);

    impl Notifier for CountingNotifier {
        fn notify(&self, _title: &str, _message: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn analyze_request_deserializes_from_wire_shape() {
        let request: Request = serde_json::from_str(
            r#"{"action":"analyzeEmail","emailData":{"from":"a@b.com","subject":"Hi","body":"x","links":[]}}"#,
        )
        .unwrap();
        assert!(matches!(request, Request::AnalyzeEmail { .. }));
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"action":"selfDestruct"}"#).is_err());
    }

    #[tokio::test]
    async fn analyze_line_returns_success_envelope() {
        let (_dir, router) = router();
        let reply = handle_line(
            &router,
            &LogNotifier,
            r#"{"action":"analyzeEmail","emailData":{"from":"a@b.com","subject":"Lunch","body":"Noon?","links":[]}}"#,
        )
        .await
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["result"]["isPhishing"], false);
        assert!(value.get("error").is_none());
    }

    #[tokio::test]
    async fn malformed_line_returns_error_envelope() {
        let (_dir, router) = router();
        let reply = handle_line(&router, &LogNotifier, "not json").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().unwrap().contains("invalid request"));
    }

    #[tokio::test]
    async fn notification_produces_no_reply() {
        let (_dir, router) = router();
        let notifier = CountingNotifier::default();
        let reply = handle_line(
            &router,
            &notifier,
            r#"{"action":"showNotification","title":"Scan done","message":"All clear"}"#,
        )
        .await;
        assert!(reply.is_none());
        assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
    }
}
