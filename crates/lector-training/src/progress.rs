use crate::job::TrainingJobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { job_id: TrainingJobId },
    Message { job_id: TrainingJobId, message: String },
    Epoch { job_id: TrainingJobId, epoch: u32, total: u32, loss: f64 },
    Finished { job_id: TrainingJobId },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { job_id } => println!("[train:{job_id}] started"),
            ProgressEvent::Message { job_id, message } => println!("[train:{job_id}] {message}"),
            ProgressEvent::Epoch { job_id, epoch, total, loss } => {
                println!("[train:{job_id}] epoch {epoch}/{total} loss {loss:.4}");
            }
            ProgressEvent::Finished { job_id } => println!("[train:{job_id}] finished"),
        }
    }
}
