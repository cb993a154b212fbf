//! Lifecycle events published by the supervision engine.
//!
//! Every state change worth reporting is emitted as a [`SupervisorEvent`] on
//! the arbiter's [`EventBus`]. Subscribers are plain callbacks; the bus also
//! carries a [`StructuredEventLogger`] so each event lands in the log even
//! when nobody else listens.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::process::ProcessExit;
use crate::watcher::WatcherState;

const EVENTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::events");

/// Something observable happened inside the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupervisorEvent {
    /// A socket was bound and is listening.
    SocketBound {
        /// Socket name.
        socket: String,
        /// Resolved endpoint.
        endpoint: String,
    },
    /// A socket descriptor was closed.
    SocketClosed {
        /// Socket name.
        socket: String,
    },
    /// A worker process started.
    ProcessSpawned {
        /// Owning watcher.
        watcher: String,
        /// Slot number.
        wid: usize,
        /// New pid.
        pid: u32,
    },
    /// A worker process was reaped.
    ProcessExited {
        /// Owning watcher.
        watcher: String,
        /// Slot number.
        wid: usize,
        /// Reaped pid.
        pid: u32,
        /// Exit status.
        exit: ProcessExit,
        /// False when the process died without being asked to stop.
        expected: bool,
    },
    /// A process ignored its grace period and was force-terminated.
    ProcessKilled {
        /// Owning watcher.
        watcher: String,
        /// Slot number.
        wid: usize,
        /// Killed pid.
        pid: u32,
        /// Escalation signal name.
        signal: String,
        /// Grace period that expired.
        graceful_timeout_ms: u64,
    },
    /// A slot exhausted its immediate spawn attempts.
    SpawnFailed {
        /// Owning watcher.
        watcher: String,
        /// Slot number.
        wid: usize,
        /// Attempts made.
        attempts: u32,
        /// Last spawn error.
        message: String,
    },
    /// A slot exited too often and is paused.
    WatcherFlapping {
        /// Owning watcher.
        watcher: String,
        /// Paused slot.
        wid: usize,
        /// Exits counted inside the window.
        exits: usize,
        /// Window width.
        window_ms: u64,
    },
    /// A watcher moved between lifecycle states.
    WatcherStateChanged {
        /// Watcher name.
        watcher: String,
        /// Previous state.
        from: WatcherState,
        /// New state.
        to: WatcherState,
    },
    /// The arbiter bound its sockets and started its watchers.
    ArbiterStarted {
        /// Managed sockets.
        sockets: usize,
        /// Managed watchers.
        watchers: usize,
    },
    /// Every watcher stopped and every socket closed.
    ArbiterStopped,
    /// A new manifest was applied.
    ArbiterReloaded {
        /// Watchers created by the reload.
        added: Vec<String>,
        /// Watchers stopped and dropped.
        removed: Vec<String>,
        /// Watchers rolled onto the new definition.
        restarted: Vec<String>,
    },
}

impl SupervisorEvent {
    /// Stable snake_case name, identical to the serialised `event` tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SocketBound { .. } => "socket_bound",
            Self::SocketClosed { .. } => "socket_closed",
            Self::ProcessSpawned { .. } => "process_spawned",
            Self::ProcessExited { .. } => "process_exited",
            Self::ProcessKilled { .. } => "process_killed",
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::WatcherFlapping { .. } => "watcher_flapping",
            Self::WatcherStateChanged { .. } => "watcher_state_changed",
            Self::ArbiterStarted { .. } => "arbiter_started",
            Self::ArbiterStopped => "arbiter_stopped",
            Self::ArbiterReloaded { .. } => "arbiter_reloaded",
        }
    }
}

/// Receives supervisor events.
pub trait EventListener: Send + Sync {
    /// Invoked synchronously from the control loop for every event.
    fn on_event(&self, event: &SupervisorEvent);
}

impl<F> EventListener for F
where
    F: Fn(&SupervisorEvent) + Send + Sync,
{
    fn on_event(&self, event: &SupervisorEvent) {
        self(event);
    }
}

/// Default listener that records every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredEventLogger;

impl StructuredEventLogger {
    /// Builds a new logger.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EventListener for StructuredEventLogger {
    fn on_event(&self, event: &SupervisorEvent) {
        match event {
            SupervisorEvent::SocketBound { socket, endpoint } => tracing::info!(
                target: EVENTS_TARGET,
                event = event.name(),
                socket = %socket,
                endpoint = %endpoint,
                "socket bound"
            ),
            SupervisorEvent::SocketClosed { socket } => tracing::info!(
                target: EVENTS_TARGET,
                event = event.name(),
                socket = %socket,
                "socket closed"
            ),
            SupervisorEvent::ProcessSpawned { watcher, wid, pid } => tracing::info!(
                target: EVENTS_TARGET,
                event = event.name(),
                watcher = %watcher,
                wid,
                pid,
                "process spawned"
            ),
            SupervisorEvent::ProcessExited {
                watcher,
                wid,
                pid,
                exit,
                expected,
            } => {
                if *expected {
                    tracing::info!(
                        target: EVENTS_TARGET,
                        event = event.name(),
                        watcher = %watcher,
                        wid,
                        pid,
                        exit = %exit,
                        "process exited"
                    );
                } else {
                    tracing::warn!(
                        target: EVENTS_TARGET,
                        event = event.name(),
                        watcher = %watcher,
                        wid,
                        pid,
                        exit = %exit,
                        "process exited unexpectedly"
                    );
                }
            }
            SupervisorEvent::ProcessKilled {
                watcher,
                wid,
                pid,
                signal,
                graceful_timeout_ms,
            } => tracing::warn!(
                target: EVENTS_TARGET,
                event = event.name(),
                watcher = %watcher,
                wid,
                pid,
                signal = %signal,
                graceful_timeout_ms,
                "graceful timeout exceeded; process force-terminated"
            ),
            SupervisorEvent::SpawnFailed {
                watcher,
                wid,
                attempts,
                message,
            } => tracing::error!(
                target: EVENTS_TARGET,
                event = event.name(),
                watcher = %watcher,
                wid,
                attempts,
                message = %message,
                "spawn attempts exhausted; slot failed"
            ),
            SupervisorEvent::WatcherFlapping {
                watcher,
                wid,
                exits,
                window_ms,
            } => tracing::warn!(
                target: EVENTS_TARGET,
                event = event.name(),
                watcher = %watcher,
                wid,
                exits,
                window_ms,
                "slot flapping; respawn paused"
            ),
            SupervisorEvent::WatcherStateChanged { watcher, from, to } => tracing::info!(
                target: EVENTS_TARGET,
                event = event.name(),
                watcher = %watcher,
                from = %from,
                to = %to,
                "watcher state changed"
            ),
            SupervisorEvent::ArbiterStarted { sockets, watchers } => tracing::info!(
                target: EVENTS_TARGET,
                event = event.name(),
                sockets,
                watchers,
                "arbiter started"
            ),
            SupervisorEvent::ArbiterStopped => tracing::info!(
                target: EVENTS_TARGET,
                event = event.name(),
                "arbiter stopped"
            ),
            SupervisorEvent::ArbiterReloaded {
                added,
                removed,
                restarted,
            } => tracing::info!(
                target: EVENTS_TARGET,
                event = event.name(),
                added = ?added,
                removed = ?removed,
                restarted = ?restarted,
                "arbiter reloaded"
            ),
        }
    }
}

/// Fan-out of events to every subscribed listener.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    /// Builds a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bus that already logs through [`StructuredEventLogger`].
    #[must_use]
    pub fn with_logger() -> Self {
        let bus = Self::new();
        bus.subscribe(StructuredEventLogger::new());
        bus
    }

    /// Adds a listener; it sees every event emitted afterwards.
    pub fn subscribe(&self, listener: impl EventListener + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Delivers `event` to every listener in subscription order.
    pub fn emit(&self, event: SupervisorEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    /// Number of subscribed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn listeners_see_events_in_emission_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(move |event: &SupervisorEvent| {
            sink.lock().expect("lock").push(event.name());
        });

        bus.emit(SupervisorEvent::SocketClosed {
            socket: "web".to_owned(),
        });
        bus.emit(SupervisorEvent::ArbiterStopped);

        assert_eq!(
            *seen.lock().expect("lock"),
            ["socket_closed", "arbiter_stopped"]
        );
    }

    #[test]
    fn events_serialise_with_snake_case_tag() {
        let event = SupervisorEvent::ProcessExited {
            watcher: "web".to_owned(),
            wid: 1,
            pid: 42,
            exit: ProcessExit::Code(3),
            expected: false,
        };
        let json = serde_json::to_value(&event).expect("serialise");
        assert_eq!(json["event"], event.name());
        assert_eq!(json["exit"]["kind"], "code");
        assert_eq!(json["exit"]["value"], 3);
    }

    #[test]
    fn logger_bus_has_one_listener() {
        assert_eq!(EventBus::with_logger().listener_count(), 1);
    }
}
