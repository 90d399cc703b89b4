//! Structured run events
//!
//! The executor and rate gate report progress through an injectable
//! [`EventSink`]. [`NoopSink`] is the default; [`TracingSink`] forwards to
//! `tracing`. Sinks are called synchronously from the scheduling loop and
//! step tasks, so implementations should return quickly.

use crate::executor::{PipelineStatus, StepStatus};
use dhis2flow_common::logging::{log_rate_limit, log_retry};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        pipeline: String,
        steps: usize,
    },
    StepReady {
        step: String,
    },
    StepStarted {
        step: String,
        step_type: String,
    },
    AttemptStarted {
        step: String,
        attempt: u32,
        max_attempts: u32,
    },
    RetryScheduled {
        step: String,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
        error: String,
    },
    StepFinished {
        step: String,
        status: StepStatus,
        attempts: u32,
        duration: Duration,
        reason: Option<String>,
    },
    RateLimitWait {
        limit_rps: f64,
        waited: Duration,
    },
    RunFinished {
        run_id: Uuid,
        pipeline: String,
        status: PipelineStatus,
        duration: Duration,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RunEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &RunEvent) {}
}

/// Forwards events to `tracing` with structured fields
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                run_id,
                pipeline,
                steps,
            } => info!(%run_id, pipeline = %pipeline, steps, "Pipeline run started"),
            RunEvent::StepReady { step } => debug!(step = %step, "Step ready"),
            RunEvent::StepStarted { step, step_type } => {
                info!(step = %step, step_type = %step_type, "Step started")
            },
            RunEvent::AttemptStarted {
                step,
                attempt,
                max_attempts,
            } => debug!(step = %step, attempt, max_attempts, "Attempt started"),
            RunEvent::RetryScheduled {
                step,
                attempt,
                max_attempts,
                delay,
                error,
            } => log_retry(step, *attempt, *max_attempts, *delay, error),
            RunEvent::StepFinished {
                step,
                status,
                attempts,
                duration,
                reason,
            } => match status {
                StepStatus::Failed => warn!(
                    step = %step,
                    attempts,
                    duration_ms = duration.as_millis() as u64,
                    reason = reason.as_deref().unwrap_or(""),
                    "Step failed"
                ),
                StepStatus::Skipped => info!(
                    step = %step,
                    reason = reason.as_deref().unwrap_or(""),
                    "Step skipped"
                ),
                _ => info!(
                    step = %step,
                    status = %status,
                    attempts,
                    duration_ms = duration.as_millis() as u64,
                    "Step finished"
                ),
            },
            RunEvent::RateLimitWait { limit_rps, waited } => {
                log_rate_limit("pipeline", *limit_rps, *waited)
            },
            RunEvent::RunFinished {
                run_id,
                pipeline,
                status,
                duration,
            } => info!(
                %run_id,
                pipeline = %pipeline,
                status = %status,
                duration_ms = duration.as_millis() as u64,
                "Pipeline run finished"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks_accept_every_event() {
        let events = vec![
            RunEvent::StepReady { step: "a".into() },
            RunEvent::RetryScheduled {
                step: "a".into(),
                attempt: 1,
                max_attempts: 3,
                delay: Duration::from_millis(10),
                error: "boom".into(),
            },
            RunEvent::StepFinished {
                step: "a".into(),
                status: StepStatus::Failed,
                attempts: 3,
                duration: Duration::from_millis(30),
                reason: Some("boom".into()),
            },
            RunEvent::RateLimitWait {
                limit_rps: 8.0,
                waited: Duration::from_millis(125),
            },
        ];
        for event in &events {
            NoopSink.emit(event);
            TracingSink.emit(event);
        }
    }
}
