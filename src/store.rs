use crate::analysis::AnalysisResult;
use crate::email::EmailData;
use crate::settings::Settings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Namespace prefix for persisted analysis records.
pub const ANALYSIS_PREFIX: &str = "analysis_";

/// Default retention limit applied at host startup.
pub const RETENTION_LIMIT: usize = 10;

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Storage key for an analysis record. Falls back to the current time when the
/// message has no stable identity.
pub fn analysis_key(email_id: Option<&str>) -> String {
    match email_id {
        Some(id) => format!("{ANALYSIS_PREFIX}{id}"),
        None => format!("{ANALYSIS_PREFIX}{}", epoch_millis()),
    }
}

/// JSON-file-backed key-value store with atomic single-key read/write and
/// prefix enumeration. No multi-key transactions; concurrent writers to the
/// same key are last-writer-wins.
#[derive(Debug, Clone)]
pub struct KvStore {
    path: PathBuf,
    map: Arc<RwLock<HashMap<String, Value>>>,
}

impl KvStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let map = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read store file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("store file {} is not valid JSON", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            map: Arc::new(RwLock::new(map)),
        })
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.map.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.map.write().await;
        map.insert(key.to_string(), value);
        self.persist(&map)
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.map.write().await;
        if map.remove(key).is_some() {
            self.persist(&map)?;
        }
        Ok(())
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.map
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    // Called with the write lock held so the file matches the map.
    fn persist(&self, map: &HashMap<String, Value>) -> Result<()> {
        let content = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write store file {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailSummary {
    pub from: String,
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub model: String,
    pub threshold: u32,
}

/// A completed analysis as persisted. Never mutated after creation; removed
/// only by retention eviction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    #[serde(flatten)]
    pub result: AnalysisResult,
    /// Epoch milliseconds at persist time. Recency ordering uses this field,
    /// not the storage key.
    pub timestamp: u64,
    pub email_summary: EmailSummary,
    pub settings_snapshot: SettingsSnapshot,
}

impl StoredAnalysis {
    pub fn new(result: &AnalysisResult, email: &EmailData, settings: &Settings) -> Self {
        Self {
            result: result.clone(),
            timestamp: epoch_millis(),
            email_summary: EmailSummary {
                from: email.from.clone(),
                subject: email.subject.clone(),
            },
            settings_snapshot: SettingsSnapshot {
                model: settings.model.clone(),
                threshold: settings.threshold,
            },
        }
    }
}

/// Sole owner of the persisted analysis records.
#[derive(Debug, Clone)]
pub struct ResultStore {
    kv: KvStore,
}

impl ResultStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub async fn put(&self, key: &str, record: &StoredAnalysis) -> Result<()> {
        log::debug!("storing analysis record under {key}");
        self.kv.set(key, serde_json::to_value(record)?).await
    }

    /// The most recent record, by timestamp. Key order breaks ties so repeated
    /// lookups are deterministic.
    pub async fn latest(&self) -> Result<Option<StoredAnalysis>> {
        Ok(self
            .records()
            .await?
            .into_iter()
            .max_by(|(ka, a), (kb, b)| a.timestamp.cmp(&b.timestamp).then(ka.cmp(kb)))
            .map(|(_, record)| record))
    }

    /// Bounded-count retention: keep the `limit` most recent records, drop the
    /// rest. Returns the number of evicted records.
    pub async fn evict_excess(&self, limit: usize) -> Result<usize> {
        let mut records = self.records().await?;
        if records.len() <= limit {
            return Ok(0);
        }
        records.sort_by(|(ka, a), (kb, b)| b.timestamp.cmp(&a.timestamp).then(kb.cmp(ka)));
        let excess: Vec<String> = records.split_off(limit).into_iter().map(|(k, _)| k).collect();
        for key in &excess {
            self.kv.remove(key).await?;
        }
        log::info!("evicted {} stored analyses beyond the {limit} most recent", excess.len());
        Ok(excess.len())
    }

    async fn records(&self) -> Result<Vec<(String, StoredAnalysis)>> {
        let mut records = Vec::new();
        for key in self.kv.keys_with_prefix(ANALYSIS_PREFIX).await {
            match self.kv.get(&key).await {
                Some(value) => match serde_json::from_value(value) {
                    Ok(record) => records.push((key, record)),
                    Err(err) => log::warn!("skipping unreadable analysis record {key}: {err}"),
                },
                None => continue,
            }
        }
        Ok(records)
    }
}
