// progress.rs
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use crate::error::ConvertError;

/// Progress values reported at fixed points of a job.
pub mod checkpoint {
    pub const STARTED: f64 = 0.0;
    pub const TRANSFORMED: f64 = 0.3;
    pub const PIXELS_READY: f64 = 0.5;
    pub const ENCODED: f64 = 0.9;
    pub const PERSISTED: f64 = 1.0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded { output: PathBuf, bytes: u64 },
    Failed(ConvertError),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress(f64),
    /// Always a terminal state.
    Finished(JobState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub job: JobId,
    pub event: JobEvent,
}

/// Receives job events from whatever thread is running the job.
///
/// Implementations must not assume they are called on a UI thread.
pub trait ProgressSink: Send + Sync {
    fn report(&self, job: JobId, event: JobEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(JobId, JobEvent) + Send + Sync,
{
    fn report(&self, job: JobId, event: JobEvent) {
        self(job, event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _job: JobId, _event: JobEvent) {}
}

/// Forwards events over an mpsc channel.
pub struct ChannelSink {
    sender: Mutex<Sender<ProgressUpdate>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, job: JobId, event: JobEvent) {
        // a dropped receiver just means nobody is watching anymore
        let _ = self.sender.lock().send(ProgressUpdate { job, event });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn channel_sink_delivers_in_order() {
        let (tx, rx) = channel();
        let sink = ChannelSink::new(tx);
        sink.report(JobId(1), JobEvent::Progress(0.0));
        sink.report(JobId(1), JobEvent::Progress(0.3));
        let updates: Vec<_> = {
            drop(sink);
            rx.iter().collect()
        };
        assert_eq!(
            updates,
            vec![
                ProgressUpdate { job: JobId(1), event: JobEvent::Progress(0.0) },
                ProgressUpdate { job: JobId(1), event: JobEvent::Progress(0.3) },
            ]
        );
    }

    #[test]
    fn channel_sink_tolerates_closed_receiver() {
        let (tx, rx) = channel();
        drop(rx);
        ChannelSink::new(tx).report(JobId(0), JobEvent::Progress(1.0));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |job: JobId, event: JobEvent| seen.lock().push((job, event));
        sink.report(JobId(7), JobEvent::Progress(0.5));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Failed(ConvertError::Cancelled).is_terminal());
    }
}
