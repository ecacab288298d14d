//! Event notification sink.
//!
//! Notifications are fire-and-forget: publish failures are logged and never
//! fail the reconciliation that raised them.

use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use scanward_api::ScanRequest;
use tracing::warn;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

/// Sink accepting (subject, severity, reason, message) notifications.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(
        &self,
        scan: &ScanRequest,
        severity: EventSeverity,
        reason: &str,
        message: &str,
    );
}

/// Publishes cluster events attributed to this operator.
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: "scanward-operator".to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(
        &self,
        scan: &ScanRequest,
        severity: EventSeverity,
        reason: &str,
        message: &str,
    ) {
        let event = Event {
            type_: match severity {
                EventSeverity::Normal => EventType::Normal,
                EventSeverity::Warning => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        let reference = scan.object_ref(&());
        if let Err(error) = self.recorder.publish(&event, &reference).await {
            warn!(reason, error = %error, "failed to publish event");
        }
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: std::sync::Mutex<Vec<(EventSeverity, String, String)>>,
}

impl RecordingEventSink {
    /// Reasons of all published events, in order.
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.iter().map(|(_, reason, _)| reason.clone()).collect())
            .unwrap_or_default()
    }

    /// All published events, in order.
    pub fn published(&self) -> Vec<(EventSeverity, String, String)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(
        &self,
        _scan: &ScanRequest,
        severity: EventSeverity,
        reason: &str,
        message: &str,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push((severity, reason.to_string(), message.to_string()));
        }
    }
}
