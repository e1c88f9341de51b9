//! The console transport: a stand-in for the out-of-scope WebSocket hub
//! (spec §1/§6 Non-goals). Delivery is a `tracing::info!` line per dispatched
//! command instead of a socket write — enough to drive `cuegraph-nodes`'
//! selection-category nodes and exercise the full tick loop end to end from
//! a terminal.

use cuegraph_net::dispatcher::DispatchedCommand;
use cuegraph_net::{ConnectionRegistry, DispatcherCallbacks};
use cuegraph_nodes::NodeHostCallbacks;
use std::sync::Arc;

/// `executeCommandForClientId` / `executeCommand` for the console transport:
/// logs the resolved frame. A real transport would serialize `dispatched`
/// onto the client's socket instead.
pub fn console_dispatcher_callbacks() -> DispatcherCallbacks {
    let log_frame: Arc<dyn Fn(&DispatchedCommand) + Send + Sync> = Arc::new(|dispatched| {
        tracing::info!(
            client_id = %dispatched.client_id,
            action = %dispatched.action,
            payload = %dispatched.payload,
            execute_at = ?dispatched.execute_at,
            "dispatch"
        );
    });
    DispatcherCallbacks { execute_command: Some(Arc::clone(&log_frame)), execute_command_for_client_id: Some(log_frame) }
}

/// Host callbacks for the selection-category nodes (`client-count`,
/// `client-object`, `proc-client-sensors`): client ids come from the live
/// [`ConnectionRegistry`]; sensor snapshots have no console-transport
/// equivalent (no device telemetry channel exists here), so they report
/// absent rather than fabricating data.
pub fn console_node_host(registry: Arc<ConnectionRegistry>) -> NodeHostCallbacks {
    NodeHostCallbacks {
        get_all_client_ids: Arc::new(move || registry.connected_client_ids()),
        get_sensor_for_client_id: Arc::new(|_client_id| None),
    }
}
