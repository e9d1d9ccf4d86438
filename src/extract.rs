use crate::types::{RequestRecord, StructuredEntry};
use clap::ValueEnum;

/// Marker chartmuseum writes on every served-request line.
pub const REQUEST_MARKER: &str = "Request served";

/// Shape of the access log lines emitted by the chart repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Free text containing `Request served` and an embedded `{...}` record.
    Fragment,
    /// Whole line is a JSON entry with the record under `request`.
    Structured,
}

#[derive(Debug, thiserror::Error)]
pub enum NoMatch {
    #[error("line does not contain \"Request served\"")]
    MissingMarker,
    #[error("no JSON object in line")]
    MissingFragment,
    #[error("failed to decode request record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LogFormat {
    pub fn extract(&self, line: &str) -> Result<RequestRecord, NoMatch> {
        match self {
            LogFormat::Fragment => {
                if !line.contains(REQUEST_MARKER) {
                    return Err(NoMatch::MissingMarker);
                }
                let fragment = json_fragment(line).ok_or(NoMatch::MissingFragment)?;
                Ok(serde_json::from_str(fragment)?)
            }
            LogFormat::Structured => {
                let entry: StructuredEntry = serde_json::from_str(line)?;
                Ok(entry.request)
            }
        }
    }
}

/// Text between the first `{` and the first `}` of the line, braces included.
/// Nested objects are cut at the first closing brace.
fn json_fragment(line: &str) -> Option<&str> {
    let start = line.find('{')?;
    let end = line.find('}')?;
    if end < start {
        return None;
    }
    Some(&line[start..=end])
}
