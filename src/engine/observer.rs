//! Observable pipeline events and the observers that consume them

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::domain::model::{OperationState, SequenceSnapshot};

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusLevel::Info => "info",
            StatusLevel::Warning => "warning",
            StatusLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Human-readable one-line event description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Whole registry after a mutation
    SequencesChanged { sequences: Vec<SequenceSnapshot> },
    /// Playlist after a reindex
    VideoListChanged {
        total: usize,
        visible: usize,
        current: Option<String>,
    },
    Status(StatusMessage),
}

pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Fan-out of pipeline events to registered observers
#[derive(Clone, Default)]
pub struct EventHub {
    observers: Arc<Mutex<Vec<Arc<dyn EventObserver>>>>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.observers.lock().map(|o| o.len()).unwrap_or(0);
        f.debug_struct("EventHub").field("observers", &count).finish()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn EventObserver>) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(observer);
        }
    }

    pub fn publish(&self, event: PipelineEvent) {
        if let Ok(observers) = self.observers.lock() {
            for observer in observers.iter() {
                observer.on_event(&event);
            }
        }
    }

    pub fn status(&self, message: StatusMessage) {
        self.publish(PipelineEvent::Status(message));
    }
}

/// Plain-text output for interactive use
pub struct ConsoleObserver {
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl EventObserver for ConsoleObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Status(message) => println!("{}", message),
            PipelineEvent::SequencesChanged { sequences } if self.verbose => {
                for snapshot in sequences
                    .iter()
                    .filter(|s| s.state == OperationState::Processing)
                {
                    let sequence = snapshot.sequence();
                    println!(
                        "  {} {}",
                        sequence,
                        progress_bar(snapshot.elapsed.ms(), sequence.duration().ms())
                    );
                }
            }
            PipelineEvent::VideoListChanged {
                total,
                visible,
                current,
            } if self.verbose => {
                println!(
                    "playlist: {}/{} visible, current: {}",
                    visible,
                    total,
                    current.as_deref().unwrap_or("-")
                );
            }
            _ => {}
        }
    }
}

fn progress_bar(done: i64, total: i64) -> String {
    const WIDTH: usize = 20;
    let percent = if total > 0 {
        (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    let filled = (percent / 100.0 * WIDTH as f64) as usize;
    format!(
        "[{}{}] {:>5.1}%",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        percent
    )
}

/// One JSON object per event, for machine consumers
pub struct JsonObserver {
    progress_events: bool,
}

impl JsonObserver {
    pub fn new(progress_events: bool) -> Self {
        Self { progress_events }
    }
}

impl EventObserver for JsonObserver {
    fn on_event(&self, event: &PipelineEvent) {
        if !self.progress_events && !matches!(event, PipelineEvent::Status(_)) {
            return;
        }
        let mut value = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(_) => return,
        };
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        println!("{}", value);
    }
}

/// Keeps every event in memory
#[derive(Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<StatusMessage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::Status(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Most recent registry snapshot, if any was published
    pub fn last_snapshot(&self) -> Option<Vec<SequenceSnapshot>> {
        self.events().into_iter().rev().find_map(|event| match event {
            PipelineEvent::SequencesChanged { sequences } => Some(sequences),
            _ => None,
        })
    }
}

impl EventObserver for CollectingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

pub struct NoOpObserver;

impl EventObserver for NoOpObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}
