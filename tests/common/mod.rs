#![allow(dead_code)]

use async_trait::async_trait;
use clusterwatch::k8s::cache::{DeploymentRecord, PodRecord, Snapshot, SnapshotSource};
use clusterwatch::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub fn pods(n: usize) -> Vec<PodRecord> {
    (0..n)
        .map(|i| PodRecord {
            name: format!("pod-{i}"),
            namespace: "default".to_string(),
            status: "Running".to_string(),
            creation_timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        })
        .collect()
}

pub fn deployments(n: usize) -> Vec<DeploymentRecord> {
    (0..n)
        .map(|i| DeploymentRecord {
            name: format!("deploy-{i}"),
            namespace: "default".to_string(),
            replicas: Some(2),
            ready_replicas: Some(1),
            creation_timestamp: None,
        })
        .collect()
}

pub fn snapshot(pod_count: usize, deployment_count: usize) -> Snapshot {
    Snapshot::new(pods(pod_count), deployments(deployment_count))
}

/// What a `ScriptedSource` does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Pods(usize),
    Fail,
    Hang,
}

/// Snapshot source that plays back a script, then repeats `fallback`
pub struct ScriptedSource {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Step>, fallback: Step) -> Arc<Self> {
        Self::with_delay(script, fallback, Duration::ZERO)
    }

    pub fn always(pod_count: usize) -> Arc<Self> {
        Self::new(vec![], Step::Pods(pod_count))
    }

    pub fn with_delay(script: Vec<Step>, fallback: Step, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match step {
            Step::Pods(n) => Ok(snapshot(n, 1)),
            Step::Fail => Err(Error::Custom("api server unreachable".to_string())),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(snapshot(0, 0))
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Poll `condition` until it holds or `within` elapses
pub async fn eventually(within: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
