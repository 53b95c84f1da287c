use std::sync::mpsc::{channel, Receiver, Sender};

use serde::{Deserialize, Serialize};

/// progress update emitted by a long running pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub message: String,
    /// 0 to 100
    pub percent_complete: f64,
    pub error: bool,
}

/// sends [`StatusEvent`]s to whoever hosts the job. events are informational;
/// a dropped receiver does not interrupt the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<Sender<StatusEvent>>,
}

impl ProgressReporter {
    pub fn new(sender: Sender<StatusEvent>) -> ProgressReporter {
        ProgressReporter {
            sender: Some(sender),
        }
    }

    /// a reporter that only logs.
    pub fn silent() -> ProgressReporter {
        ProgressReporter { sender: None }
    }

    pub fn channel() -> (ProgressReporter, Receiver<StatusEvent>) {
        let (tx, rx) = channel();
        (ProgressReporter::new(tx), rx)
    }

    pub fn report(&self, percent_complete: f64, message: &str) {
        log::debug!("{percent_complete:.0}% {message}");
        self.send(StatusEvent {
            message: message.to_string(),
            percent_complete: percent_complete.clamp(0.0, 100.0),
            error: false,
        });
    }

    pub fn fail(&self, message: &str) {
        self.send(StatusEvent {
            message: message.to_string(),
            percent_complete: 100.0,
            error: true,
        });
    }

    fn send(&self, event: StatusEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
