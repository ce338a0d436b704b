//! Per-job progress channel, multi-subscriber (§4.G).
//!
//! Backed by `tokio::sync::broadcast`, which only delivers events sent
//! after a subscriber joins. The bus additionally retains the last event
//! per job so a late subscriber still observes at least the final state —
//! the two properties the spec requires of any implementation choice here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::JobStatus;

const CHANNEL_CAPACITY: usize = 256;

/// One progress update, published after every device completion and once
/// more, terminally, when the job finishes.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub completed: u32,
    pub total: u32,
    pub failed: u32,
    /// `"running"` while in flight; the job's terminal status otherwise.
    pub status: String,
}

impl ProgressEvent {
    pub fn running(job_id: impl Into<String>, completed: u32, total: u32, failed: u32) -> Self {
        Self {
            job_id: job_id.into(),
            completed,
            total,
            failed,
            status: "running".to_string(),
        }
    }

    pub fn terminal(
        job_id: impl Into<String>,
        completed: u32,
        total: u32,
        failed: u32,
        status: JobStatus,
    ) -> Self {
        let status = match status {
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
            JobStatus::Running => "running",
        };
        Self {
            job_id: job_id.into(),
            completed,
            total,
            failed,
            status: status.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != "running"
    }
}

struct JobChannel {
    sender: broadcast::Sender<ProgressEvent>,
    last_event: Option<ProgressEvent>,
}

/// Process-wide registry of per-job progress channels.
#[derive(Default)]
pub struct ProgressBus {
    channels: Mutex<HashMap<String, JobChannel>>,
}

/// A job's progress subscription: the channel's replayed last event (if
/// any existed before this subscriber joined) plus the live receiver.
///
/// Holds a strong reference back to its bus so that, on drop, it can
/// re-check whether it was the last subscriber of a terminal job and reap
/// the channel if so — the reap performed right after publishing the
/// terminal event only catches the case where no one is subscribed at that
/// instant; a subscriber attached at completion time must trigger the reap
/// itself when it goes away.
pub struct ProgressSubscription {
    pub replayed: Option<ProgressEvent>,
    pub receiver: broadcast::Receiver<ProgressEvent>,
    bus: Arc<ProgressBus>,
    job_id: String,
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        self.bus.reap_if_idle(&self.job_id);
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event for `job_id`, creating the channel lazily. Never
    /// blocks — safe to call from both async tasks and `spawn_blocking`
    /// worker threads after they return control to the owning async task.
    pub fn publish(&self, event: ProgressEvent) {
        let mut channels = self.channels.lock().expect("progress bus mutex poisoned");
        let entry = channels
            .entry(event.job_id.clone())
            .or_insert_with(|| JobChannel {
                sender: broadcast::channel(CHANNEL_CAPACITY).0,
                last_event: None,
            });
        entry.last_event = Some(event.clone());
        // A send error only means there are currently no subscribers; the
        // replayed last_event still covers anyone who subscribes later.
        let _ = entry.sender.send(event);
    }

    /// Subscribe to `job_id`'s progress channel, creating it lazily if the
    /// job hasn't published yet. Takes `self` as an `Arc` so the returned
    /// subscription can reap its channel on drop.
    pub fn subscribe(self: &Arc<Self>, job_id: &str) -> ProgressSubscription {
        let (replayed, receiver) = {
            let mut channels = self.channels.lock().expect("progress bus mutex poisoned");
            let entry = channels
                .entry(job_id.to_string())
                .or_insert_with(|| JobChannel {
                    sender: broadcast::channel(CHANNEL_CAPACITY).0,
                    last_event: None,
                });
            (entry.last_event.clone(), entry.sender.subscribe())
        };
        ProgressSubscription {
            replayed,
            receiver,
            bus: Arc::clone(self),
            job_id: job_id.to_string(),
        }
    }

    /// Drop a job's channel once it has reached a terminal state and no
    /// subscribers remain.
    pub fn reap_if_idle(&self, job_id: &str) {
        let mut channels = self.channels.lock().expect("progress bus mutex poisoned");
        if let Some(channel) = channels.get(job_id) {
            let terminal = channel
                .last_event
                .as_ref()
                .map(ProgressEvent::is_terminal)
                .unwrap_or(false);
            if terminal && channel.sender.receiver_count() == 0 {
                channels.remove(job_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn s7_subscriber_sees_progress_and_one_terminal_event() {
        let bus = Arc::new(ProgressBus::new());
        let mut sub = bus.subscribe("job-1").receiver;

        bus.publish(ProgressEvent::running("job-1", 1, 2, 0));
        bus.publish(ProgressEvent::running("job-1", 2, 2, 0));
        bus.publish(ProgressEvent::terminal(
            "job-1",
            2,
            2,
            0,
            JobStatus::Complete,
        ));

        let mut seen = Vec::new();
        while let Ok(event) = sub.try_recv() {
            seen.push(event);
        }

        assert_eq!(seen.len(), 3);
        assert!(seen.iter().filter(|e| !e.is_terminal()).count() >= 2);
        let terminal = seen.last().unwrap();
        assert!(terminal.is_terminal());
        assert_eq!(terminal.completed, terminal.total);
    }

    #[test]
    fn late_subscriber_replays_the_last_event() {
        let bus = Arc::new(ProgressBus::new());
        bus.publish(ProgressEvent::terminal(
            "job-2",
            3,
            3,
            1,
            JobStatus::Complete,
        ));

        let sub = bus.subscribe("job-2");
        assert!(sub.replayed.is_some());
        assert!(sub.replayed.unwrap().is_terminal());
    }

    #[test]
    fn terminal_idle_channels_are_reaped() {
        let bus = Arc::new(ProgressBus::new());
        bus.publish(ProgressEvent::terminal(
            "job-3",
            1,
            1,
            0,
            JobStatus::Complete,
        ));
        bus.reap_if_idle("job-3");
        assert_eq!(bus.channels.lock().unwrap().len(), 0);
    }

    #[test]
    fn reaps_once_the_last_subscriber_drops_after_a_terminal_event() {
        let bus = Arc::new(ProgressBus::new());
        let sub = bus.subscribe("job-4");
        bus.publish(ProgressEvent::terminal(
            "job-4",
            1,
            1,
            0,
            JobStatus::Complete,
        ));
        // A subscriber was attached when the terminal event published, so
        // the engine's immediate reap_if_idle leaves the channel in place.
        bus.reap_if_idle("job-4");
        assert_eq!(bus.channels.lock().unwrap().len(), 1);

        drop(sub);
        assert_eq!(bus.channels.lock().unwrap().len(), 0);
    }
}
