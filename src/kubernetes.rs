use crate::tailer::{LogSource, TailError, forward_lines};
use crate::types::{LogMessage, TailTarget};
use crate::utils::{first_container, pod_base_name, select_container};
use anyhow::Context;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{Config as WatcherConfig, Event, watcher};
use kube::{Api, Client, Config, ResourceExt};
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Build the cluster client: in-cluster config first, then the given kubeconfig,
/// then the usual kubeconfig inference.
pub async fn initialize_client(kubeconfig: Option<&Path>) -> anyhow::Result<Client> {
    let config = match Config::incluster() {
        Ok(config) => {
            info!("Using in-cluster configuration");
            config
        }
        Err(e) => {
            debug!("In-cluster configuration unavailable: {}", e);
            match kubeconfig {
                Some(path) => {
                    let kc = Kubeconfig::read_from(path)
                        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                    info!("Using kubeconfig {}", path.display());
                    Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                        .await
                        .context("Failed to build config from kubeconfig")?
                }
                None => Config::infer()
                    .await
                    .context("Failed to infer cluster configuration")?,
            }
        }
    };
    Client::try_from(config).context("Failed to create client")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    First,
    All,
}

/// Resolve the pods to tail once, at startup.
///
/// A hint that itself matches `pattern` names the pod directly; otherwise the
/// namespace is listed and pod names are matched against `pattern`. API
/// failures are logged and yield no targets.
pub async fn resolve_targets(
    client: &Client,
    namespace: &str,
    pod_hint: Option<&str>,
    pattern: &str,
    selection: Selection,
) -> Vec<TailTarget> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);

    let pods = match pod_hint.filter(|hint| hint.contains(pattern)) {
        Some(name) => match api.get(name).await {
            Ok(pod) => vec![pod],
            Err(e) => {
                error!("Failed to get pod {} in namespace {}: {}", name, namespace, e);
                return vec![];
            }
        },
        None => match api.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(e) => {
                error!("Failed to list pods in namespace {}: {}", namespace, e);
                return vec![];
            }
        },
    };

    let explicit = pod_hint.is_some_and(|hint| hint.contains(pattern));
    select_targets(pods, namespace, pattern, explicit, selection)
}

/// Pick tail targets out of fetched pods.
///
/// `explicit` pods were fetched by name and are taken as-is; listed pods must
/// contain `pattern` in their name.
pub fn select_targets(
    pods: Vec<Pod>,
    namespace: &str,
    pattern: &str,
    explicit: bool,
    selection: Selection,
) -> Vec<TailTarget> {
    let mut targets = Vec::new();
    for pod in pods {
        let name = pod.name_any();
        if !explicit && !name.contains(pattern) {
            continue;
        }
        let Some(container) = select_container(&pod, pattern) else {
            warn!("Pod {} has no containers, skipping", name);
            continue;
        };
        targets.push(TailTarget {
            namespace: namespace.to_string(),
            pod_name: name,
            container_name: container,
        });
        if selection == Selection::First {
            break;
        }
    }
    targets
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent {
    Added(TailTarget),
    Removed(String),
}

/// Turns pod watch events into tail target changes.
///
/// Every (re-)list is reconciled at `InitDone`: pods that were known but not
/// listed again are dropped, since their deletion may have been missed.
pub struct TargetTracker {
    namespace: String,
    pattern: String,
    known: HashSet<String>,
    listed: HashSet<String>,
}

impl TargetTracker {
    pub fn new(namespace: &str, pattern: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            pattern: pattern.to_string(),
            known: HashSet::new(),
            listed: HashSet::new(),
        }
    }

    pub fn apply(&mut self, event: Event<Pod>) -> Vec<TargetEvent> {
        match event {
            Event::Apply(pod) => self.add(&pod).into_iter().collect(),
            Event::InitApply(pod) => {
                self.listed.insert(pod.name_any());
                self.add(&pod).into_iter().collect()
            }
            Event::Delete(pod) => {
                let name = pod.name_any();
                if self.known.remove(&name) {
                    info!("POD DELETED: {}", name);
                    vec![TargetEvent::Removed(name)]
                } else {
                    vec![]
                }
            }
            Event::Init => {
                info!("Initializing pod watcher for namespace: {}", self.namespace);
                self.listed.clear();
                vec![]
            }
            Event::InitDone => {
                info!(
                    "Pod watcher initialization complete for namespace: {}",
                    self.namespace
                );
                let listed = std::mem::take(&mut self.listed);
                let mut gone: Vec<String> = self
                    .known
                    .iter()
                    .filter(|name| !listed.contains(*name))
                    .cloned()
                    .collect();
                gone.sort();
                gone.into_iter()
                    .map(|name| {
                        info!("POD GONE: {}", name);
                        self.known.remove(&name);
                        TargetEvent::Removed(name)
                    })
                    .collect()
            }
        }
    }

    fn add(&mut self, pod: &Pod) -> Option<TargetEvent> {
        let name = pod.name_any();
        if self.known.contains(&name) || !pod_base_name(&name).contains(&self.pattern) {
            return None;
        }
        let Some(container) = first_container(pod) else {
            warn!("Pod {} has no containers, skipping", name);
            return None;
        };
        info!("NEW POD: {} in namespace {}", name, self.namespace);
        self.known.insert(name.clone());
        Some(TargetEvent::Added(TailTarget {
            namespace: self.namespace.clone(),
            pod_name: name,
            container_name: container,
        }))
    }
}

/// Continuously resolve tail targets from a watch on the namespace's pods.
///
/// Watch errors are logged and the watch is re-established with backoff.
pub fn watch_targets(
    client: &Client,
    namespace: &str,
    pattern: &str,
) -> impl Stream<Item = TargetEvent> + Send + 'static {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let mut tracker = TargetTracker::new(namespace, pattern);
    watcher(api, WatcherConfig::default())
        .default_backoff()
        .flat_map(move |event| {
            let changes = match event {
                Ok(event) => tracker.apply(event),
                Err(e) => {
                    warn!("Pod watcher error: {}", e);
                    vec![]
                }
            };
            futures::stream::iter(changes)
        })
}

/// Follow-mode pod logs from the Kubernetes API.
#[derive(Clone)]
pub struct KubeLogSource {
    client: Client,
}

impl KubeLogSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl LogSource for KubeLogSource {
    async fn follow(
        &self,
        target: &TailTarget,
        lines: mpsc::Sender<LogMessage>,
    ) -> Result<(), TailError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let lp = LogParams {
            follow: true,
            container: Some(target.container_name.clone()),
            ..Default::default()
        };
        let reader = match api.log_stream(&target.pod_name, &lp).await {
            Ok(reader) => reader,
            Err(kube::Error::Api(err)) if err.code == 404 => return Err(TailError::NotFound),
            Err(e) => return Err(TailError::Open(Box::new(e))),
        };
        debug!("Opened log stream for {}", target);
        forward_lines(reader, &lines).await?;
        Ok(())
    }
}
