use crate::analyzer::AnalysisResult;
use crate::types::Dataset;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// An uploaded dataset together with its analysis snapshot.
#[derive(Debug)]
pub struct StoredAnalysis {
    pub result: AnalysisResult,
    pub dataset: Dataset,
    pub upload_path: Option<PathBuf>,
}

fn remove_upload(analysis_id: &str, path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!(analysis_id, path = %path.display(), "removed stored upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(analysis_id, path = %path.display(), error = %e, "failed to remove stored upload"),
    }
}

/// Bounded in-memory store of uploaded analyses, keyed by analysis id.
///
/// Entries are dropped once the capacity is exceeded or after the time-to-live
/// elapses, and the stored upload file goes with them. Nothing survives a
/// restart.
#[derive(Clone)]
pub struct AnalysisStore {
    cache: Cache<String, Arc<StoredAnalysis>>,
}

impl AnalysisStore {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_listener(|id: Arc<String>, value: Arc<StoredAnalysis>, cause| {
                // A replacement under the same id reuses the same upload file.
                if cause == RemovalCause::Replaced {
                    return;
                }
                if cause != RemovalCause::Explicit {
                    info!(analysis_id = %id, ?cause, "analysis evicted");
                }
                if let Some(path) = &value.upload_path {
                    remove_upload(&id, path);
                }
            })
            .build();
        Self { cache }
    }

    pub fn insert(&self, analysis: StoredAnalysis) -> Arc<StoredAnalysis> {
        let entry = Arc::new(analysis);
        self.cache.insert(entry.result.analysis_id.clone(), Arc::clone(&entry));
        entry
    }

    pub fn get(&self, analysis_id: &str) -> Option<Arc<StoredAnalysis>> {
        self.cache.get(analysis_id)
    }

    pub fn contains(&self, analysis_id: &str) -> bool {
        self.cache.contains_key(analysis_id)
    }

    /// Number of live entries, after applying pending evictions.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
