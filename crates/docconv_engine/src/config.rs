use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::fetch::FetchSettings;

/// Produces the `retrieved_at` stamp (RFC3339) for each converted page.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct ConverterSettings {
    pub fetch: FetchSettings,
    /// Upper bound on URLs processed at once. Zero is treated as one.
    pub max_concurrency: usize,
    /// Parent of the per-job output directories in job mode.
    pub downloads_root: PathBuf,
    pub retrieved_at: Clock,
}

impl ConverterSettings {
    pub(crate) fn effective_concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

impl Default for ConverterSettings {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            fetch: FetchSettings::default(),
            max_concurrency: cores * 4,
            downloads_root: PathBuf::from("tmp").join("downloads"),
            retrieved_at: Arc::new(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl fmt::Debug for ConverterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterSettings")
            .field("fetch", &self.fetch)
            .field("max_concurrency", &self.max_concurrency)
            .field("downloads_root", &self.downloads_root)
            .finish_non_exhaustive()
    }
}
