use crate::types::{ChartReference, RequestRecord};

pub const CHARTS_PREFIX: &str = "/charts/";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("not a chart package path: {0}")]
pub struct InvalidChartPath(pub String);

/// A successful download of a chart package or its provenance file.
pub fn is_install_event(record: &RequestRecord) -> bool {
    record.path.starts_with(CHARTS_PREFIX) && record.status_code == 200
}

/// Parse `/charts/<name>-<version>.tgz[.prov]` into its chart name and version.
///
/// The name is the filename's first `-` segment and the version its second,
/// so a hyphen inside either one loses the rest: `my-chart-1.0.0.tgz` gives
/// `my`/`chart`, `nginx-1.0.0-rc1.tgz` gives `nginx`/`1.0.0`.
pub fn parse_chart(path: &str) -> Result<ChartReference, InvalidChartPath> {
    let invalid = || InvalidChartPath(path.to_string());

    let file = path
        .split('/')
        .nth(2)
        .filter(|f| !f.is_empty())
        .ok_or_else(invalid)?;
    let mut parts = file.split('-');
    let name = parts.next().ok_or_else(invalid)?;
    let segment = parts.next().ok_or_else(invalid)?;
    let version = segment
        .strip_suffix(".tgz.prov")
        .or_else(|| segment.strip_suffix(".tgz"))
        .unwrap_or(segment);

    if name.is_empty() || version.is_empty() {
        return Err(invalid());
    }

    Ok(ChartReference {
        name: name.to_string(),
        version: version.to_string(),
    })
}
