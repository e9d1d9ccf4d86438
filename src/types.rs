use serde::Deserialize;
use std::fmt;

/// A single request served by the chart repository, as written into its access log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestRecord {
    pub path: String,
    pub comment: String,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    pub method: String,
    #[serde(rename = "statusCode")]
    pub status_code: i64,
    pub latency: String,
    #[serde(rename = "reqID")]
    pub req_id: String,
}

/// Whole-line JSON access log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StructuredEntry {
    pub request: RequestRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartReference {
    pub name: String,
    pub version: String,
}

impl fmt::Display for ChartReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// The pod container a tailer is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TailTarget {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
}

impl fmt::Display for TailTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.namespace, self.pod_name, self.container_name
        )
    }
}

#[derive(Debug, Clone)]
pub struct LogMessage {
    pub line: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl LogMessage {
    pub fn new(line: String) -> Self {
        Self {
            line,
            timestamp: chrono::Utc::now(),
        }
    }
}
