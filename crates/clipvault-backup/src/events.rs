//! Coordinator notifications.
//!
//! Callers observe loading state, completion reports, failures and the
//! settings-changed signal through one broadcast channel. Receivers that fall
//! behind get `Lagged` and miss events; the operation result itself is
//! delivered by the [`OperationHandle`](crate::OperationHandle), not here.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use clipvault_core::{BackupStats, Error};

/// Which operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Backup,
    Restore,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Backup => "backup",
            Operation::Restore => "restore",
        }
    }
}

/// User-facing description of a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub title: String,
    pub message: String,
}

impl ErrorReport {
    pub fn from_error(operation: Operation, error: &Error) -> Self {
        let title = match (operation, error) {
            (_, Error::FormatUnrecognized) => "Unsupported backup file",
            (_, Error::RestoreInProgress) => "Restore already running",
            (_, Error::Cancelled) => "Cancelled",
            (Operation::Backup, _) => "Backup failed",
            (Operation::Restore, _) => "Restore failed",
        };
        Self {
            title: title.to_string(),
            message: error.to_string(),
        }
    }
}

/// Event published by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum BackupEvent {
    /// An operation started; show a loading indicator.
    LoadingStarted { operation: Operation },
    /// Emitted on every exit path, success or not.
    LoadingFinished { operation: Operation },
    Completed {
        operation: Operation,
        stats: BackupStats,
    },
    Failed {
        operation: Operation,
        report: ErrorReport,
    },
    /// A restore replaced the settings; the application must reload before
    /// they take effect.
    SettingsChanged,
}

impl BackupEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            BackupEvent::LoadingStarted { .. } => "loading_started",
            BackupEvent::LoadingFinished { .. } => "loading_finished",
            BackupEvent::Completed { .. } => "completed",
            BackupEvent::Failed { .. } => "failed",
            BackupEvent::SettingsChanged => "settings_changed",
        }
    }
}

/// Broadcast channel for [`BackupEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BackupEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: BackupEvent) {
        tracing::debug!(
            subsystem = "coordinator",
            component = "event_bus",
            event_type = event.event_type(),
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Emits [`BackupEvent::LoadingFinished`] when dropped.
pub(crate) struct LoadingGuard {
    bus: EventBus,
    operation: Operation,
}

impl LoadingGuard {
    pub(crate) fn start(bus: &EventBus, operation: Operation) -> Self {
        bus.emit(BackupEvent::LoadingStarted { operation });
        Self {
            bus: bus.clone(),
            operation,
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.bus.emit(BackupEvent::LoadingFinished {
            operation: self.operation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(BackupEvent::SettingsChanged);
    }

    #[tokio::test]
    async fn test_loading_guard_brackets_scope() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        {
            let _guard = LoadingGuard::start(&bus, Operation::Backup);
            bus.emit(BackupEvent::SettingsChanged);
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            BackupEvent::LoadingStarted {
                operation: Operation::Backup
            }
        );
        assert_eq!(rx.recv().await.unwrap(), BackupEvent::SettingsChanged);
        assert_eq!(
            rx.recv().await.unwrap(),
            BackupEvent::LoadingFinished {
                operation: Operation::Backup
            }
        );
    }

    #[test]
    fn test_error_report_titles() {
        let report = ErrorReport::from_error(Operation::Restore, &Error::FormatUnrecognized);
        assert_eq!(report.title, "Unsupported backup file");
        assert_eq!(report.message, "Backup format not recognized");

        let io = Error::Io(std::io::Error::other("disk gone"));
        let report = ErrorReport::from_error(Operation::Backup, &io);
        assert_eq!(report.title, "Backup failed");
        assert!(report.message.contains("disk gone"));
    }
}
