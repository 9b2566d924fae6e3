use serde::{Deserialize, Serialize};

use crate::config::ConverterSettings;
use crate::converter::{ConversionRun, Converter};
use crate::SetupError;

/// A queued conversion request as it travels between submitter and worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionJob {
    pub urls: Vec<String>,
    pub selector: String,
    pub download_id: String,
}

impl ConversionJob {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Build a job-mode converter for this job and start the run.
    pub fn start(&self, settings: ConverterSettings) -> Result<ConversionRun, SetupError> {
        let converter = Converter::for_job(&self.download_id, settings)?;
        Ok(converter.convert(self.urls.iter().cloned(), &self.selector))
    }
}
