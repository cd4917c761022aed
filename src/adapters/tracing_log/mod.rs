// Tracing log adapter - Mirrors pipeline events into tracing

use tracing::{debug, error, info, warn};

use crate::domain::model::OperationState;
use crate::engine::observer::{EventObserver, PipelineEvent, StatusLevel};

/// Observer that writes every pipeline event to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl EventObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Status(message) => match message.level {
                StatusLevel::Info => info!(target: "clipmark::status", "{}", message.text),
                StatusLevel::Warning => warn!(target: "clipmark::status", "{}", message.text),
                StatusLevel::Error => error!(target: "clipmark::status", "{}", message.text),
            },
            PipelineEvent::SequencesChanged { sequences } => {
                let count = |state: OperationState| sequences.iter().filter(|s| s.state == state).count();
                debug!(
                    total = sequences.len(),
                    ready = count(OperationState::Ready),
                    processing = count(OperationState::Processing),
                    succeeded = count(OperationState::Succeeded),
                    failed = count(OperationState::Failed),
                    "sequences changed"
                );
            }
            PipelineEvent::VideoListChanged {
                total,
                visible,
                current,
            } => {
                debug!(
                    total,
                    visible,
                    current = current.as_deref().unwrap_or("-"),
                    "video list changed"
                );
            }
        }
    }
}
