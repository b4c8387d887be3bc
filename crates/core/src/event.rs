// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events fanned out by the orchestrator's event bus, and the
//! `EventSink` boundary it emits through without owning subscribers.

use serde::{Deserialize, Serialize};

/// Agent health as derived by the heartbeat monitor (spec.md §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentHealth {
    Idle,
    Alive,
    Stuck,
    Dead,
}

crate::display_as! {
    AgentHealth {
        Idle => "idle",
        Alive => "alive",
        Stuck => "stuck",
        Dead => "dead",
    }
}

/// A single state-transition event, broadcast to subscribers.
///
/// Mirrors spec.md §4.E's "lifecycle callbacks": sweep started/completed,
/// repo skipped, worker status, remediation events, plus the heartbeat's
/// health transitions and the paused-trigger-ignored signal (§4.E "Pause").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SweepEvent {
    SweepStarted { scan_job_count: u32 },
    SweepCompleted { succeeded: u32, failed: u32 },
    RepoSkipped { owner: String, repo: String, reason: String },
    WorkerStatus { worker_name: String, status: String, repo: Option<String> },
    TriggerIgnored { reason: String },
    RemediationTaskProgress { campaign_id: String, scan_job_id: String, phase: String, percent: f32 },
    RemediationCampaignFinished { campaign_id: String, status: String },
    HealthChanged { health: AgentHealth, stuck_for_seconds: Option<u64> },
}

/// Consumed by the orchestrator to emit events without owning or knowing
/// about its subscriber set (broadcaster lives in `ctrlscan-engine`).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SweepEvent);
}

/// No-op sink for contexts that don't care about events (tests, one-shot
/// CLI invocations against the wire protocol).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: SweepEvent) {}
}

#[cfg(any(test, feature = "test-support"))]
pub struct RecordingEventSink {
    pub events: parking_lot::Mutex<Vec<SweepEvent>>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for RecordingEventSink {
    fn default() -> Self {
        Self { events: parking_lot::Mutex::new(Vec::new()) }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl EventSink for RecordingEventSink {
    fn emit(&self, event: SweepEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_captures_events_in_order() {
        let sink = RecordingEventSink::default();
        sink.emit(SweepEvent::SweepStarted { scan_job_count: 3 });
        sink.emit(SweepEvent::SweepCompleted { succeeded: 3, failed: 0 });
        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SweepEvent::SweepStarted { scan_job_count: 3 }));
    }
}
