use crate::extract::{LogFormat, NoMatch};
use crate::filter::{is_install_event, parse_chart};
use crate::notifier::{InstallCounter, NotifyOutcome};
use crate::types::{LogMessage, TailTarget};
use crate::utils::get_color;
use crossterm::style::Stylize;
use futures::io::{AsyncBufRead, AsyncBufReadExt};
use regex::Regex;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Lines buffered between a stream reader and the processing of its lines.
const LINE_BUFFER: usize = 256;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("pod not found")]
    NotFound,
    #[error("failed to open log stream: {0}")]
    Open(#[source] BoxError),
    #[error("failed to read log stream: {0}")]
    Read(#[from] io::Error),
}

/// Something that can open a follow-mode log stream for a target.
pub trait LogSource: Send + Sync + 'static {
    /// Open one stream and send every complete line to `lines` in order.
    /// Returns once the stream ends; the stream is closed on return.
    fn follow(
        &self,
        target: &TailTarget,
        lines: mpsc::Sender<LogMessage>,
    ) -> impl Future<Output = Result<(), TailError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// A single stream; its end ends the tailer.
    Once,
    /// Reopen after `delay` whenever the stream ends or fails to open.
    Follow { delay: Duration },
}

/// Read newline-terminated lines from `reader` into `lines`.
///
/// A trailing line without a newline is dropped when the stream ends.
pub async fn forward_lines<R>(mut reader: R, lines: &mpsc::Sender<LogMessage>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 || buf.last() != Some(&b'\n') {
            return Ok(());
        }
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf).into_owned();
        if lines.send(LogMessage::new(line)).await.is_err() {
            return Ok(());
        }
    }
}

/// Echo of raw log lines to stdout.
pub struct Echo {
    grep: Option<Regex>,
    color: bool,
}

impl Echo {
    pub fn new(grep: Option<Regex>, color: bool) -> Self {
        Self { grep, color }
    }

    pub fn print(&self, target: &TailTarget, line: &str) {
        if let Some(ref regex) = self.grep
            && !regex.is_match(line)
        {
            return;
        }
        let prefix = format!("[{}]", target);
        if self.color {
            println!("{} {}", prefix.with(get_color(&target.pod_name)), line);
        } else {
            println!("{} {}", prefix, line);
        }
    }
}

/// Turns raw log lines into install notifications.
pub struct Pipeline<C> {
    format: LogFormat,
    counter: C,
    echo: Echo,
}

impl<C: InstallCounter> Pipeline<C> {
    pub fn new(format: LogFormat, counter: C, echo: Echo) -> Self {
        Self {
            format,
            counter,
            echo,
        }
    }

    /// Handle one line; returns the notification outcome if the line was a chart download.
    pub async fn handle_line(&self, target: &TailTarget, msg: &LogMessage) -> Option<NotifyOutcome> {
        self.echo.print(target, &msg.line);

        let record = match self.format.extract(&msg.line) {
            Ok(record) => record,
            Err(NoMatch::MissingMarker) => {
                trace!("[{}] No request record in line", target);
                return None;
            }
            Err(e) => {
                debug!("[{}] Skipping line: {}", target, e);
                return None;
            }
        };
        if !is_install_event(&record) {
            trace!(
                "[{}] {} {} -> {} ({}) is not a chart download",
                target, record.method, record.path, record.status_code, record.comment
            );
            return None;
        }

        let chart = match parse_chart(&record.path) {
            Ok(chart) => chart,
            Err(e) => {
                warn!("[{}] {}", target, e);
                return None;
            }
        };
        info!(
            "[{}] Chart {} downloaded by {} (request {}, latency {}, received {})",
            target,
            chart,
            record.client_ip,
            record.req_id,
            record.latency,
            msg.timestamp.to_rfc3339()
        );
        Some(self.counter.count_install(&chart).await)
    }

    async fn process(&self, target: &TailTarget, mut lines: mpsc::Receiver<LogMessage>) {
        while let Some(msg) = lines.recv().await {
            self.handle_line(target, &msg).await;
        }
    }
}

/// Tail `target` until its stream ends (once), it disappears, or `token` is cancelled.
///
/// Each attempt reads the stream and processes its lines concurrently; the
/// stream is dropped before the next attempt starts.
pub async fn tail<S, C>(
    source: &S,
    pipeline: &Pipeline<C>,
    target: &TailTarget,
    policy: ReconnectPolicy,
    token: &CancellationToken,
) -> Result<(), TailError>
where
    S: LogSource,
    C: InstallCounter,
{
    info!("Starting to tail logs for {}", target);
    loop {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let attempt = async {
            let (result, ()) = tokio::join!(source.follow(target, tx), pipeline.process(target, rx));
            result
        };
        let result = tokio::select! {
            _ = token.cancelled() => {
                debug!("Stopped tailing {}", target);
                return Ok(());
            }
            result = attempt => result,
        };

        let delay = match policy {
            ReconnectPolicy::Once => {
                return match result {
                    Ok(()) => {
                        info!("Log stream ended for {}", target);
                        Ok(())
                    }
                    Err(TailError::Read(e)) => {
                        warn!("Error reading log stream for {}: {}", target, e);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
            }
            ReconnectPolicy::Follow { delay } => delay,
        };

        match result {
            Ok(()) => info!(
                "Log stream ended for {}, retrying in {:?}",
                target, delay
            ),
            Err(TailError::NotFound) => {
                warn!("Pod {} not found (404), stopping tail", target);
                return Err(TailError::NotFound);
            }
            Err(e) => warn!("{} for {}, retrying in {:?}", e, target, delay),
        }

        tokio::select! {
            _ = token.cancelled() => {
                debug!("Stopped tailing {}", target);
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
