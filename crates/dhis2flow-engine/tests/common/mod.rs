//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use dhis2flow_engine::client::{Client, ClientError, FetchRequest, Page, PushAck, PushRequest};
use dhis2flow_engine::events::{EventSink, RunEvent};
use dhis2flow_engine::pipeline::StepConfig;
use dhis2flow_engine::schema::RemoteVersion;
use dhis2flow_engine::table::Table;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock client
// ============================================================================

/// Scripted client keyed on the analytics `dx` dimension.
///
/// Every fetch sleeps for `delay` (tokio time, so paused-clock tests stay
/// fast) and records how many fetches were in flight at once.
#[derive(Default)]
pub struct MockClient {
    pub delay: Duration,
    /// `dx` values whose fetches always return HTTP 503
    pub failing: HashSet<String>,
    /// `dx` values whose fetches panic
    pub panicking: HashSet<String>,
    pub version: Option<RemoteVersion>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, dx: &str) -> Self {
        self.failing.insert(dx.to_string());
        self
    }

    pub fn panicking(mut self, dx: &str) -> Self {
        self.panicking.insert(dx.to_string());
        self
    }

    pub fn with_version(mut self, version: RemoteVersion) -> Self {
        self.version = Some(version);
        self
    }

    /// Fetches seen for one `dx` value
    pub fn calls(&self, dx: &str) -> usize {
        self.calls.lock().unwrap().get(dx).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Highest number of fetches running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn dx_of(request: &FetchRequest) -> String {
    request
        .params
        .iter()
        .filter(|(k, _)| k == "dimension")
        .find_map(|(_, v)| v.strip_prefix("dx:"))
        .unwrap_or_default()
        .to_string()
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Client for MockClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<Page, ClientError> {
        let dx = dx_of(request);
        *self.calls.lock().unwrap().entry(dx.clone()).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panicking.contains(&dx) {
            panic!("mock client blew up on {dx}");
        }
        if self.failing.contains(&dx) {
            return Err(ClientError::Http {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        Ok(Page::single(analytics_table(&dx)))
    }

    async fn push(&self, request: &PushRequest) -> Result<PushAck, ClientError> {
        Ok(PushAck {
            status: "SUCCESS".into(),
            imported: request.records.len() as u64,
            ..PushAck::default()
        })
    }

    async fn version(&self) -> Result<RemoteVersion, ClientError> {
        self.version.ok_or(ClientError::Offline)
    }
}

pub fn analytics_table(dx: &str) -> Table {
    Table::from_rows(
        ["dx", "pe", "ou", "value"],
        vec![
            vec![json!(dx), json!("2023"), json!("o1"), json!("12")],
            vec![json!(dx), json!("2023"), json!("o2"), json!(null)],
        ],
    )
}

/// Analytics step config pulling `dx`
pub fn analytics(name: &str, dx: &str) -> StepConfig {
    StepConfig::new("analytics", name)
        .with_param("dx", dx)
        .with_param("ou", "o1")
        .with_param("pe", "2023")
}

// ============================================================================
// Recording sink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Retry delays scheduled for one step, in order
    pub fn retry_delays(&self, step: &str) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::RetryScheduled { step: s, delay, .. } if s == step => Some(delay),
                _ => None,
            })
            .collect()
    }

    /// Steps in the order they reported a terminal state
    pub fn finished(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::StepFinished { step, .. } => Some(step),
                _ => None,
            })
            .collect()
    }

    /// Rate gate waits as (limit, waited) pairs
    pub fn rate_waits(&self) -> Vec<(f64, Duration)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::RateLimitWait { limit_rps, waited } => Some((limit_rps, waited)),
                _ => None,
            })
            .collect()
    }

    /// Steps in the order they started
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::StepStarted { step, .. } => Some(step),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &RunEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
