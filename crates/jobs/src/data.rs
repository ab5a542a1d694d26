//! Descriptors for data stored on behalf of jobs.

use std::fmt;

use serde::{Deserialize, Serialize};

use depot_storage::ByteSink;

/// Transfer encoding of a stored artifact. Recorded for consumers; the engine
/// never transcodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobDataEncoding {
    #[default]
    None,
    Gzip,
}

/// Metadata for one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    /// Storage key of the artifact.
    pub guid: String,
    /// Owning job for generated data; `None` for supplied data.
    pub job_guid: Option<String>,
    /// What the artifact is for (e.g. `"download"`).
    pub use_code: String,
    pub media_type_code: String,
    pub encoding: JobDataEncoding,
}

/// A freshly allocated artifact and the sink to write it through.
///
/// The sink is released (and the blob committed) when this value, or the
/// sink taken out of it, is dropped.
pub struct JobDataWithByteSink {
    pub data: JobData,
    pub sink: ByteSink,
}

impl JobDataWithByteSink {
    pub fn guid(&self) -> &str {
        &self.data.guid
    }

    pub fn into_parts(self) -> (JobData, ByteSink) {
        (self.data, self.sink)
    }
}

impl fmt::Debug for JobDataWithByteSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDataWithByteSink")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
