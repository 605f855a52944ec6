use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque blob identifier shared by every backend.
///
/// Keys embed the job id and, where relevant, the language and chunk index,
/// so one key never names two different payloads within a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn source(job_id: &Uuid, filename: &str) -> Self {
        Self(format!("jobs/{}/source/{}", job_id, sanitize(filename)))
    }

    pub fn output(job_id: &Uuid, stem: &str, language: &str) -> Self {
        Self(format!("jobs/{}/output/{}_{}.mp4", job_id, sanitize(stem), language))
    }

    pub fn chunk(job_id: &Uuid, language: &str, index: usize, extension: &str) -> Self {
        Self(format!("jobs/{}/{}/chunks/chunk_{:03}.{}", job_id, language, index, extension))
    }

    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(sanitize(&key.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Forward slashes only, no empty, `.` or `..` segments
fn sanitize(name: &str) -> String {
    name.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("/")
}
