use crate::analysis::AnalysisResult;
use crate::email::EmailData;
use crate::heuristic::LocalScanner;
use crate::reconcile::reconcile;
use crate::remote::{RemoteScanner, ScanErrorKind};
use crate::settings::SettingsProvider;
use crate::store::{analysis_key, ResultStore, StoredAnalysis};
use anyhow::Result;

/// Which path produced a result. The message protocol flattens this to the
/// plain [`AnalysisResult`]; the tag exists so fallbacks stay observable in
/// logs instead of being silently swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Remote scan succeeded; result is reconciled and persisted.
    Remote(AnalysisResult),
    /// No credential configured; local heuristics answered directly.
    Local(AnalysisResult),
    /// Remote scan failed; local heuristics answered with a disclosure notice.
    LocalFallback {
        result: AnalysisResult,
        cause: ScanErrorKind,
    },
}

impl AnalysisOutcome {
    pub fn into_result(self) -> AnalysisResult {
        match self {
            AnalysisOutcome::Remote(result)
            | AnalysisOutcome::Local(result)
            | AnalysisOutcome::LocalFallback { result, .. } => result,
        }
    }
}

/// Routes each analysis between the remote and local scanners and owns the
/// persistence of remote-path results.
pub struct AnalysisRouter {
    settings: SettingsProvider,
    remote: RemoteScanner,
    local: LocalScanner,
    results: ResultStore,
}

impl AnalysisRouter {
    pub fn new(
        settings: SettingsProvider,
        remote: RemoteScanner,
        results: ResultStore,
    ) -> Self {
        Self {
            settings,
            remote,
            local: LocalScanner::new(),
            results,
        }
    }

    /// Analyze one email. Remote failures never propagate: they degrade to the
    /// local heuristic path. The only error out of here is a storage failure
    /// while persisting a successful remote result.
    pub async fn analyze(&self, email: &EmailData) -> Result<AnalysisOutcome> {
        let settings = self.settings.resolve().await;

        if settings.api_key.is_none() {
            log::debug!("no API credential configured, using local heuristics");
            return Ok(AnalysisOutcome::Local(self.local.scan(email, false)));
        }

        match self.remote.scan(email, &settings).await {
            Ok(raw) => {
                let result = reconcile(raw, settings.threshold);
                let key = analysis_key(email.email_id.as_deref());
                let record = StoredAnalysis::new(&result, email, &settings);
                self.results.put(&key, &record).await?;
                Ok(AnalysisOutcome::Remote(result))
            }
            Err(err) => {
                log::warn!("remote scan failed ({:?}), falling back to local heuristics: {err}", err.kind());
                Ok(AnalysisOutcome::LocalFallback {
                    result: self.local.scan(email, true),
                    cause: err.kind(),
                })
            }
        }
    }
}
