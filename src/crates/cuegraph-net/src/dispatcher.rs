//! Command dispatch: resolve a [`Target`] against live connections, attach
//! a server timestamp, clamp `executeAt` skew, and hand one transport frame
//! per recipient to a host-supplied delivery callback (spec §4.10).
//!
//! The runtime itself never touches a socket; `Dispatcher` is the
//! `executeCommand` / `executeCommandForClientId` pair the spec asks the
//! host to supply, built once here so every transport (WebSocket, a test
//! harness, a CLI stub) gets the same resolution and clamping rules.

use crate::registry::ConnectionRegistry;
use cuegraph_core::command::Target;
use cuegraph_core::value::Cmd;
use std::sync::Arc;

/// Skew tolerance used when the caller doesn't specify one. `executeAt`
/// values further from `now` than this are clamped to `now` rather than
/// trusted outright — an unauthenticated client could otherwise schedule a
/// command arbitrarily far in the future.
pub const DEFAULT_MAX_CLOCK_SKEW_MS: i64 = 2_000;

/// A command resolved to a single recipient, timestamped and skew-clamped,
/// ready for the transport layer to serialize and send.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedCommand {
    pub client_id: String,
    pub action: String,
    pub payload: serde_json::Value,
    pub execute_at: Option<i64>,
    pub server_timestamp: i64,
}

pub type ExecuteCommandForClient = Arc<dyn Fn(&DispatchedCommand) + Send + Sync>;
pub type ExecuteCommand = Arc<dyn Fn(&DispatchedCommand) + Send + Sync>;

#[derive(Clone, Default)]
pub struct DispatcherCallbacks {
    /// `executeCommand(cmd)` — delivery with no registry-backed target
    /// resolution, used for a single already-known recipient.
    pub execute_command: Option<ExecuteCommand>,
    /// `executeCommandForClientId(id, cmd)` — delivery for a recipient
    /// resolved by [`Dispatcher::dispatch`] from a [`Target`].
    pub execute_command_for_client_id: Option<ExecuteCommandForClient>,
}

pub struct DispatcherOptions {
    pub max_clock_skew_ms: i64,
    pub callbacks: DispatcherCallbacks,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        DispatcherOptions { max_clock_skew_ms: DEFAULT_MAX_CLOCK_SKEW_MS, callbacks: DispatcherCallbacks::default() }
    }
}

pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    max_clock_skew_ms: i64,
    callbacks: DispatcherCallbacks,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, options: DispatcherOptions) -> Self {
        Dispatcher { registry, max_clock_skew_ms: options.max_clock_skew_ms, callbacks: options.callbacks }
    }

    fn clamp_execute_at(&self, execute_at: Option<i64>, now: i64) -> Option<i64> {
        execute_at.map(|at| if (at - now).abs() > self.max_clock_skew_ms { now } else { at })
    }

    fn resolve_recipients(&self, target: &Target) -> Vec<String> {
        match target {
            Target::All => self.registry.connected_client_ids(),
            Target::ClientIds(ids) => ids.iter().filter(|id| self.registry.is_connected(id)).cloned().collect(),
            Target::Group(group_id) => self.registry.group_members(group_id),
        }
    }

    /// Resolves `target` against connected clients and emits one frame per
    /// recipient via `executeCommandForClientId`. Returns the number of
    /// frames emitted; zero is a silent `SelectorMiss` (spec §7), not an
    /// error — a command aimed at a client who just disconnected is normal.
    pub fn dispatch(&self, target: &Target, cmd: &Cmd, now: i64) -> usize {
        let recipients = self.resolve_recipients(target);
        let Some(deliver) = &self.callbacks.execute_command_for_client_id else {
            return 0;
        };

        for client_id in &recipients {
            let dispatched = DispatchedCommand {
                client_id: client_id.clone(),
                action: cmd.action.clone(),
                payload: cmd.payload.clone(),
                execute_at: self.clamp_execute_at(cmd.execute_at, now),
                server_timestamp: now,
            };
            deliver(&dispatched);
        }
        recipients.len()
    }

    /// Delivers `cmd` to a single already-known client id, bypassing target
    /// resolution — the `executeCommand(cmd)` half of the host pair.
    pub fn dispatch_direct(&self, client_id: &str, cmd: &Cmd, now: i64) -> bool {
        if !self.registry.is_connected(client_id) {
            return false;
        }
        let Some(deliver) = &self.callbacks.execute_command else {
            return false;
        };
        deliver(&DispatchedCommand {
            client_id: client_id.to_string(),
            action: cmd.action.clone(),
            payload: cmd.payload.clone(),
            execute_at: self.clamp_execute_at(cmd.execute_at, now),
            server_timestamp: now,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionRegistry, RegisterRequest, Role};
    use parking_lot::Mutex;

    fn registry_with_clients(ids: &[&str]) -> Arc<ConnectionRegistry> {
        let registry = Arc::new(ConnectionRegistry::default());
        for id in ids {
            registry.register(RegisterRequest { socket_id: format!("sock-{id}"), role: Role::Client, device_id: Some(id.to_string()), instance_id: None }, 0);
        }
        registry
    }

    #[test]
    fn broadcast_resolves_to_every_connected_client() {
        let registry = registry_with_clients(&["A", "B"]);
        let delivered = Arc::new(Mutex::new(Vec::<String>::new()));
        let delivered_cb = Arc::clone(&delivered);
        let dispatcher = Dispatcher::new(
            registry,
            DispatcherOptions {
                callbacks: DispatcherCallbacks { execute_command_for_client_id: Some(Arc::new(move |c| delivered_cb.lock().push(c.client_id.clone()))), ..Default::default() },
                ..Default::default()
            },
        );

        let cmd = Cmd { action: "flashlight".into(), payload: serde_json::json!({}), execute_at: None };
        let count = dispatcher.dispatch(&Target::All, &cmd, 1000);
        assert_eq!(count, 2);
        assert_eq!(delivered.lock().len(), 2);
    }

    #[test]
    fn disconnected_client_id_target_is_a_silent_miss() {
        let registry = registry_with_clients(&["A"]);
        let dispatcher = Dispatcher::new(
            registry,
            DispatcherOptions { callbacks: DispatcherCallbacks { execute_command_for_client_id: Some(Arc::new(|_| {})), ..Default::default() }, ..Default::default() },
        );
        let cmd = Cmd { action: "flashlight".into(), payload: serde_json::json!({}), execute_at: None };
        let count = dispatcher.dispatch(&Target::ClientIds(vec!["ghost".into()]), &cmd, 0);
        assert_eq!(count, 0);
    }

    #[test]
    fn execute_at_beyond_skew_bound_is_clamped_to_now() {
        let registry = registry_with_clients(&["A"]);
        let received = Arc::new(Mutex::new(None));
        let received_cb = Arc::clone(&received);
        let dispatcher = Dispatcher::new(
            registry,
            DispatcherOptions {
                max_clock_skew_ms: 100,
                callbacks: DispatcherCallbacks { execute_command_for_client_id: Some(Arc::new(move |c| *received_cb.lock() = Some(c.clone()))), ..Default::default() },
            },
        );
        let cmd = Cmd { action: "showImage".into(), payload: serde_json::json!({}), execute_at: Some(100_000) };
        dispatcher.dispatch(&Target::ClientIds(vec!["A".into()]), &cmd, 0);
        assert_eq!(received.lock().as_ref().unwrap().execute_at, Some(0));
    }

    #[test]
    fn execute_at_within_skew_bound_passes_through() {
        let registry = registry_with_clients(&["A"]);
        let received = Arc::new(Mutex::new(None));
        let received_cb = Arc::clone(&received);
        let dispatcher = Dispatcher::new(
            registry,
            DispatcherOptions {
                max_clock_skew_ms: 1000,
                callbacks: DispatcherCallbacks { execute_command_for_client_id: Some(Arc::new(move |c| *received_cb.lock() = Some(c.clone()))), ..Default::default() },
            },
        );
        let cmd = Cmd { action: "showImage".into(), payload: serde_json::json!({}), execute_at: Some(500) };
        dispatcher.dispatch(&Target::ClientIds(vec!["A".into()]), &cmd, 0);
        assert_eq!(received.lock().as_ref().unwrap().execute_at, Some(500));
    }
}
