use crate::kubernetes::TargetEvent;
use crate::notifier::InstallCounter;
use crate::tailer::{LogSource, Pipeline, ReconnectPolicy, TailError, tail};
use crate::types::TailTarget;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Reported by every tailer task when it stops.
#[derive(Debug)]
pub struct TailerExit {
    pub target: TailTarget,
    pub result: Result<(), TailError>,
}

/// Owns the tailer tasks of a run.
pub struct Supervisor<S, C> {
    source: Arc<S>,
    pipeline: Arc<Pipeline<C>>,
    policy: ReconnectPolicy,
    token: CancellationToken,
}

impl<S, C> Supervisor<S, C>
where
    S: LogSource,
    C: InstallCounter,
{
    pub fn new(source: S, pipeline: Pipeline<C>, policy: ReconnectPolicy) -> Self {
        Self {
            source: Arc::new(source),
            pipeline: Arc::new(pipeline),
            policy,
            token: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the run and every tailer in it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn spawn_tailer(
        &self,
        target: TailTarget,
        exits: mpsc::Sender<TailerExit>,
    ) -> CancellationToken {
        let token = self.token.child_token();
        let source = self.source.clone();
        let pipeline = self.pipeline.clone();
        let policy = self.policy;
        let task_token = token.clone();

        tokio::spawn(async move {
            let result = tail(&*source, &*pipeline, &target, policy, &task_token).await;
            let _ = exits.send(TailerExit { target, result }).await;
        });

        token
    }

    /// Tail a fixed set of targets until `duration` elapses, every tailer
    /// has finished, or one of them fails.
    pub async fn run_once(&self, targets: Vec<TailTarget>, duration: Duration) -> anyhow::Result<()> {
        if targets.is_empty() {
            anyhow::bail!("No pods to tail");
        }

        match chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| chrono::Utc::now().checked_add_signed(d))
        {
            Some(deadline) => info!(
                "Tailing {} pod(s) until {}",
                targets.len(),
                deadline.to_rfc3339()
            ),
            None => info!("Tailing {} pod(s)", targets.len()),
        }

        let (exit_tx, mut exit_rx) = mpsc::channel(targets.len());
        let mut remaining = targets.len();
        for target in targets {
            self.spawn_tailer(target, exit_tx.clone());
        }
        drop(exit_tx);

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        let result = loop {
            tokio::select! {
                _ = self.token.cancelled() => break Ok(()),
                _ = &mut sleep => {
                    info!("Log monitoring duration reached. Exiting.");
                    break Ok(());
                }
                exit = exit_rx.recv() => match exit {
                    Some(TailerExit { target, result: Ok(()) }) => {
                        info!("Stopped tailing {}", target);
                        remaining -= 1;
                        if remaining == 0 {
                            info!("All log streams ended. Exiting.");
                            break Ok(());
                        }
                    }
                    Some(TailerExit { target, result: Err(e) }) => {
                        error!("Log monitoring stopped due to an error on {}: {}", target, e);
                        break Err(anyhow::anyhow!("Failed to tail {}: {}", target, e));
                    }
                    None => break Ok(()),
                },
            }
        };

        self.token.cancel();
        result
    }

    /// Tail every target the stream yields until the run is cancelled or
    /// the stream ends.
    pub async fn run_watch<T>(&self, targets: T) -> anyhow::Result<()>
    where
        T: Stream<Item = TargetEvent>,
    {
        let mut targets = std::pin::pin!(targets);
        let mut tailers: HashMap<String, CancellationToken> = HashMap::new();
        let (exit_tx, mut exit_rx) = mpsc::channel::<TailerExit>(16);

        let result = loop {
            tokio::select! {
                _ = self.token.cancelled() => break Ok(()),
                event = targets.next() => match event {
                    Some(TargetEvent::Added(target)) => {
                        let pod_name = target.pod_name.clone();
                        let token = self.spawn_tailer(target, exit_tx.clone());
                        if let Some(old) = tailers.insert(pod_name, token) {
                            old.cancel();
                        }
                    }
                    Some(TargetEvent::Removed(pod_name)) => {
                        if let Some(token) = tailers.remove(&pod_name) {
                            token.cancel();
                        }
                    }
                    None => {
                        warn!("Pod watch ended");
                        break Ok(());
                    }
                },
                Some(exit) = exit_rx.recv() => match exit.result {
                    Ok(()) => info!("Stopped tailing {}", exit.target),
                    Err(e) => warn!("Tailer for {} stopped: {}", exit.target, e),
                },
            }
        };

        self.token.cancel();
        result
    }
}
