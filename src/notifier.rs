use crate::types::ChartReference;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives every detected chart download.
pub trait InstallCounter: Send + Sync + 'static {
    fn count_install(&self, chart: &ChartReference) -> impl Future<Output = NotifyOutcome> + Send;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CountResponse {
    pub code: i64,
    pub msg: String,
    pub bean: VersionDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VersionDetail {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Counted,
    Rejected {
        code: i64,
        msg: String,
        version: String,
    },
    Failed(String),
}

impl NotifyOutcome {
    /// Interpret the counting API's answer for `chart`.
    pub fn from_response(chart: &ChartReference, resp: CountResponse) -> Self {
        if resp.code == 200 && resp.bean.version == chart.version {
            NotifyOutcome::Counted
        } else {
            NotifyOutcome::Rejected {
                code: resp.code,
                msg: resp.msg,
                version: resp.bean.version,
            }
        }
    }
}

/// Client for the app store's install counting endpoint.
pub struct StoreNotifier {
    http: reqwest::Client,
    store_domain: String,
    market_id: String,
}

impl StoreNotifier {
    pub fn new(store_domain: &str, market_id: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, store_domain, market_id))
    }

    pub fn with_client(http: reqwest::Client, store_domain: &str, market_id: &str) -> Self {
        Self {
            http,
            store_domain: store_domain.to_string(),
            market_id: market_id.to_string(),
        }
    }

    pub fn count_url(&self, chart: &ChartReference) -> String {
        format!(
            "{}/app-server/markets/{}/chart/{}/versions/{}/count?forInstall=true",
            self.store_domain, self.market_id, chart.name, chart.version
        )
    }

    async fn request(&self, url: &str) -> reqwest::Result<CountResponse> {
        // The body is decoded whatever the HTTP status; `code` carries the verdict.
        self.http.get(url).send().await?.json().await
    }
}

impl InstallCounter for StoreNotifier {
    async fn count_install(&self, chart: &ChartReference) -> NotifyOutcome {
        let url = self.count_url(chart);
        debug!("Counting install of {} via {}", chart, url);

        let outcome = match self.request(&url).await {
            Ok(resp) => NotifyOutcome::from_response(chart, resp),
            Err(e) => NotifyOutcome::Failed(e.to_string()),
        };

        match &outcome {
            NotifyOutcome::Counted => {
                info!("Successfully counted installation of {}", chart)
            }
            NotifyOutcome::Rejected { code, msg, version } => warn!(
                "Install count for {} rejected: code={} msg={:?} version={:?}",
                chart, code, msg, version
            ),
            NotifyOutcome::Failed(reason) => {
                warn!("Install count request for {} failed: {}", chart, reason)
            }
        }
        outcome
    }
}
