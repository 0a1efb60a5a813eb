//! Structured start-up events emitted by the launcher.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

use crate::config::LaunchMode;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LaunchEvent {
    Starting {
        started_at: DateTime<Utc>,
        launcher_version: String,
        interpreter: String,
        working_dir: Option<PathBuf>,
    },
    ScratchDirCreated {
        path: PathBuf,
    },
    Resolved {
        flags: Vec<String>,
        hf_token_present: bool,
    },
    Handoff {
        mode: LaunchMode,
        argv: Vec<String>,
    },
    ChildExited {
        code: i32,
    },
}

/// Sink for launcher diagnostics.
pub trait LaunchObserver {
    fn on_event(&self, event: &LaunchEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LaunchObserver for TracingObserver {
    fn on_event(&self, event: &LaunchEvent) {
        match event {
            LaunchEvent::Starting {
                started_at,
                launcher_version,
                interpreter,
                working_dir,
            } => {
                info!(
                    %started_at,
                    launcher_version = %launcher_version,
                    interpreter = %interpreter,
                    working_dir = ?working_dir,
                    "Starting PersonaPlex launcher"
                );
            }
            LaunchEvent::ScratchDirCreated { path } => {
                info!("SSL scratch directory: {:?}", path);
            }
            LaunchEvent::Resolved {
                flags,
                hf_token_present,
            } => {
                info!(?flags, hf_token_present, "Resolved server flags");
            }
            LaunchEvent::Handoff { mode, argv } => {
                info!(%mode, "Handing off: {}", argv.join(" "));
            }
            LaunchEvent::ChildExited { code } => {
                info!(code, "Server process exited");
            }
        }
    }
}

/// Keeps events in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<LaunchEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LaunchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl LaunchObserver for MemoryObserver {
    fn on_event(&self, event: &LaunchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl<T: LaunchObserver + ?Sized> LaunchObserver for &T {
    fn on_event(&self, event: &LaunchEvent) {
        (**self).on_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_observer_records_in_order() {
        let observer = MemoryObserver::new();
        observer.on_event(&LaunchEvent::ScratchDirCreated {
            path: PathBuf::from("/tmp/a"),
        });
        observer.on_event(&LaunchEvent::ChildExited { code: 0 });

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LaunchEvent::ScratchDirCreated { .. }));
        assert_eq!(events[1], LaunchEvent::ChildExited { code: 0 });
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_value(LaunchEvent::Handoff {
            mode: LaunchMode::Supervise,
            argv: vec!["python3".into(), "-m".into()],
        })
        .unwrap();
        assert_eq!(json["event"], "handoff");
        assert_eq!(json["mode"], "supervise");
        assert_eq!(json["argv"][0], "python3");
    }
}
