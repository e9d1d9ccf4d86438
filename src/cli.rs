use crate::extract::LogFormat;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Resolve the target pods once and tail them for a bounded time
    Once,
    /// Watch the namespace and tail every matching pod as it appears
    Watch,
}

#[derive(Parser)]
#[command(name = "chart-install-counter")]
#[command(about = "Count chart installs by tailing chart repository access logs")]
pub struct Cli {
    /// Namespace the chart repository runs in
    #[arg(short = 'n', long, env = "NAMESPACE", default_value = "helm")]
    pub namespace: String,

    /// Exact pod name to tail (used when it contains the pod match)
    #[arg(long, env = "POD_NAME")]
    pub pod_name: Option<String>,

    /// Base URL of the app store API
    #[arg(long, env = "STORE_DOMAIN")]
    pub store_domain: String,

    /// Market the counted charts belong to
    #[arg(long, env = "MARKET_ID")]
    pub market_id: String,

    /// Kubeconfig to use when not running in-cluster
    #[arg(long, env = "KUBECONFIG_PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Pod discovery mode
    #[arg(long, env = "TAIL_MODE", value_enum, default_value = "once")]
    pub mode: Mode,

    /// Access log line format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "fragment")]
    pub log_format: LogFormat,

    /// Substring identifying chart repository pods and containers
    #[arg(long, env = "POD_MATCH", default_value = "chartmuseum")]
    pub pod_match: String,

    /// Tail every matching pod instead of the first one (once mode)
    #[arg(long, env = "ALL_PODS")]
    pub all_pods: bool,

    /// How long a once-mode run lasts
    #[arg(long, env = "RUN_DURATION_SECS", default_value_t = 86400)]
    pub duration_secs: u64,

    /// Delay before reopening a closed log stream (watch mode)
    #[arg(long, env = "RETRY_DELAY_SECS", default_value_t = 5)]
    pub retry_delay_secs: u64,

    /// Timeout of a single install count request
    #[arg(long, env = "NOTIFY_TIMEOUT_SECS", default_value_t = 10)]
    pub notify_timeout_secs: u64,

    /// Only echo log lines matching this regex
    #[arg(long)]
    pub grep: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}
