use crate::store::KvStore;
use anyhow::{bail, Result};

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.2-3b-instruct:free";
pub const DEFAULT_THRESHOLD: u32 = 70;

/// Credential format required at write time. Values already in storage are
/// trusted as-is (migrated data may predate the check).
pub const API_KEY_PREFIX: &str = "sk-or-";

const KEY_API_KEY: &str = "or_api_key";
const KEY_ENDPOINT: &str = "or_endpoint";
const KEY_MODEL: &str = "or_model";
const KEY_THRESHOLD: &str = "user_threshold";

/// Resolved configuration, threaded explicitly through every call. There is no
/// ambient global; the provider resolves a fresh value once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Absent means "not configured" and routes analysis to the local scanner.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    /// Confidence cutoff for the remote path, 1..=100.
    pub threshold: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingsProvider {
    kv: KvStore,
}

impl SettingsProvider {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Read the active settings, substituting documented defaults for every
    /// missing field except the credential, whose absence is meaningful.
    pub async fn resolve(&self) -> Settings {
        let api_key = self
            .kv
            .get(KEY_API_KEY)
            .await
            .and_then(|v| v.as_str().map(str::to_string));
        let endpoint = self
            .kv
            .get(KEY_ENDPOINT)
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let model = self
            .kv
            .get(KEY_MODEL)
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let threshold = self
            .kv
            .get(KEY_THRESHOLD)
            .await
            .and_then(|v| v.as_u64())
            .map(|t| t as u32)
            .unwrap_or(DEFAULT_THRESHOLD);

        Settings {
            api_key,
            endpoint,
            model,
            threshold,
        }
    }

    pub async fn set_api_key(&self, key: &str) -> Result<()> {
        if !key.starts_with(API_KEY_PREFIX) {
            bail!("API key must start with \"{API_KEY_PREFIX}\"");
        }
        self.kv.set(KEY_API_KEY, key.into()).await
    }

    /// Removes the credential only; stored analysis records are untouched.
    pub async fn clear_api_key(&self) -> Result<()> {
        self.kv.remove(KEY_API_KEY).await
    }

    pub async fn set_endpoint(&self, endpoint: &str) -> Result<()> {
        self.kv.set(KEY_ENDPOINT, endpoint.into()).await
    }

    pub async fn set_model(&self, model: &str) -> Result<()> {
        self.kv.set(KEY_MODEL, model.into()).await
    }

    pub async fn set_threshold(&self, threshold: u32) -> Result<()> {
        if !(1..=100).contains(&threshold) {
            bail!("threshold must be between 1 and 100, got {threshold}");
        }
        self.kv.set(KEY_THRESHOLD, threshold.into()).await
    }
}
