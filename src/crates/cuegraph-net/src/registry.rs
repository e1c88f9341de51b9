//! Connection registry: tracks live client/manager sockets, the stable
//! client ids commands are addressed to, and the grace-period bookkeeping
//! that lets a dropped device reconnect without losing its id (spec §4.9).
//!
//! Modeled after the teacher's `ConnectionPool` (`DashMap`-backed, atomics
//! for counters) but purge is driven by an explicit `purge_expired(now)`
//! call rather than a background sweep, matching the host-polls-the-clock
//! style the rest of this workspace uses (no implicit timers owned by data
//! structures).

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Whether a socket speaks as a performer's device or a control surface.
/// Managers never get takeover semantics — they always receive a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Manager,
}

/// What the transport layer supplies when a socket connects (spec §4.9).
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub socket_id: String,
    pub role: Role,
    /// Caller-supplied stable device identifier, e.g. a persisted UUID the
    /// client app keeps across reconnects. `Client` role only.
    pub device_id: Option<String>,
    /// Disambiguates multiple instances of the same device (e.g. two tabs),
    /// paired with `device_id` for takeover matching.
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub client_id: String,
    pub socket_id: String,
    pub role: Role,
    pub device_id: Option<String>,
    pub instance_id: Option<String>,
    pub connected: bool,
    pub connected_at: i64,
    pub disconnected_at: Option<i64>,
    pub last_activity: i64,
}

type ExpiredCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RegistryCallbacks {
    pub on_client_expired: Option<ExpiredCallback>,
}

pub struct ConnectionRegistryOptions {
    /// Delay between disconnect and purge, in ms. `0` purges immediately.
    pub grace_period_ms: i64,
    pub callbacks: RegistryCallbacks,
}

impl Default for ConnectionRegistryOptions {
    fn default() -> Self {
        ConnectionRegistryOptions { grace_period_ms: 5000, callbacks: RegistryCallbacks::default() }
    }
}

/// Tracks `clientId -> ConnectionEntry` and `socketId -> clientId`, plus a
/// `(deviceId, instanceId) -> clientId` index used only for takeover lookup.
pub struct ConnectionRegistry {
    by_client_id: DashMap<String, ConnectionEntry>,
    by_socket_id: DashMap<String, String>,
    by_device_instance: DashMap<(String, String), String>,
    by_group: DashMap<String, Vec<String>>,
    grace_period_ms: i64,
    callbacks: RegistryCallbacks,
    fresh_id_counter: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(options: ConnectionRegistryOptions) -> Self {
        ConnectionRegistry {
            by_client_id: DashMap::new(),
            by_socket_id: DashMap::new(),
            by_device_instance: DashMap::new(),
            by_group: DashMap::new(),
            grace_period_ms: options.grace_period_ms,
            callbacks: options.callbacks,
            fresh_id_counter: AtomicU64::new(0),
        }
    }

    pub fn with_grace_period_ms(grace_period_ms: i64) -> Self {
        Self::new(ConnectionRegistryOptions { grace_period_ms, ..Default::default() })
    }

    fn synthesize_fresh_id(&self, now: i64) -> String {
        let n = self.fresh_id_counter.fetch_add(1, Ordering::Relaxed);
        format!("client-{now}-{n}")
    }

    fn allocate_unique_id(&self, desired: &str) -> String {
        if !self.by_client_id.contains_key(desired) {
            return desired.to_string();
        }
        let mut suffix = 2u32;
        loop {
            let candidate = format!("{desired}-{suffix}");
            if !self.by_client_id.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Registers a newly connected socket, returning the client id it was
    /// assigned. See spec §4.9 for the allocation rules this implements.
    pub fn register(&self, req: RegisterRequest, now: i64) -> String {
        if req.role == Role::Client {
            if let (Some(device_id), Some(instance_id)) = (&req.device_id, &req.instance_id) {
                let key = (device_id.clone(), instance_id.clone());
                if let Some(existing_id) = self.by_device_instance.get(&key).map(|e| e.clone()) {
                    if let Some(mut entry) = self.by_client_id.get_mut(&existing_id) {
                        if entry.socket_id != req.socket_id {
                            self.by_socket_id.remove(&entry.socket_id);
                        }
                        entry.socket_id = req.socket_id.clone();
                        entry.connected = true;
                        entry.disconnected_at = None;
                        entry.last_activity = now;
                        self.by_socket_id.insert(req.socket_id, existing_id.clone());
                        return existing_id;
                    }
                }

                let desired = self.allocate_unique_id(device_id);
                self.insert_entry(desired.clone(), req, now, Some(key));
                return desired;
            }

            let desired = req.device_id.clone().unwrap_or_else(|| self.synthesize_fresh_id(now));
            let assigned = self.allocate_unique_id(&desired);
            self.insert_entry(assigned.clone(), req, now, None);
            return assigned;
        }

        let assigned = self.synthesize_fresh_id(now);
        self.insert_entry(assigned.clone(), req, now, None);
        assigned
    }

    fn insert_entry(&self, client_id: String, req: RegisterRequest, now: i64, device_instance_key: Option<(String, String)>) {
        self.by_socket_id.insert(req.socket_id.clone(), client_id.clone());
        if let Some(key) = device_instance_key {
            self.by_device_instance.insert(key, client_id.clone());
        }
        self.by_client_id.insert(
            client_id.clone(),
            ConnectionEntry {
                client_id,
                socket_id: req.socket_id,
                role: req.role,
                device_id: req.device_id,
                instance_id: req.instance_id,
                connected: true,
                connected_at: now,
                disconnected_at: None,
                last_activity: now,
            },
        );
    }

    /// Starts the grace period for a client's socket disconnecting. A
    /// `gracePeriodMs == 0` registry purges (and fires `clientExpired`)
    /// immediately instead of waiting for a later `purge_expired` call.
    pub fn disconnect(&self, client_id: &str, now: i64) -> Result<()> {
        let mut entry = self.by_client_id.get_mut(client_id).ok_or_else(|| Error::UnknownClient(client_id.to_string()))?;
        entry.connected = false;
        entry.disconnected_at = Some(now);
        self.by_socket_id.remove(&entry.socket_id);
        drop(entry);

        if self.grace_period_ms <= 0 {
            self.purge_one(client_id);
        }
        Ok(())
    }

    fn purge_one(&self, client_id: &str) {
        if let Some((_, entry)) = self.by_client_id.remove(client_id) {
            if let (Some(device_id), Some(instance_id)) = (&entry.device_id, &entry.instance_id) {
                self.by_device_instance.remove(&(device_id.clone(), instance_id.clone()));
            }
            if let Some(cb) = &self.callbacks.on_client_expired {
                cb(client_id);
            }
        }
    }

    /// Sweeps every disconnected entry whose grace period has elapsed,
    /// firing `clientExpired` for each and returning the purged ids.
    pub fn purge_expired(&self, now: i64) -> Vec<String> {
        let expired: Vec<String> = self
            .by_client_id
            .iter()
            .filter_map(|entry| {
                let disconnected_at = entry.disconnected_at?;
                if !entry.connected && now - disconnected_at >= self.grace_period_ms {
                    Some(entry.client_id.clone())
                } else {
                    None
                }
            })
            .collect();

        for id in &expired {
            self.purge_one(id);
        }
        expired
    }

    pub fn resolve_client_id_for_socket(&self, socket_id: &str) -> Option<String> {
        self.by_socket_id.get(socket_id).map(|e| e.clone())
    }

    pub fn get(&self, client_id: &str) -> Option<ConnectionEntry> {
        self.by_client_id.get(client_id).map(|e| e.clone())
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.by_client_id.get(client_id).map(|e| e.connected).unwrap_or(false)
    }

    pub fn record_activity(&self, client_id: &str, now: i64) {
        if let Some(mut entry) = self.by_client_id.get_mut(client_id) {
            entry.last_activity = now;
        }
    }

    /// Connected client ids only, sorted for determinism — selection (spec
    /// §4.7) requires a stable ordered list across calls within a tick.
    pub fn connected_client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .by_client_id
            .iter()
            .filter(|e| e.connected)
            .map(|e| e.client_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn connected_count(&self) -> usize {
        self.by_client_id.iter().filter(|e| e.connected).count()
    }

    /// Assigns a client to a named group; membership is independent of the
    /// grace-period lifecycle, so a takeover keeps its group memberships.
    pub fn add_to_group(&self, group_id: &str, client_id: &str) {
        let mut members = self.by_group.entry(group_id.to_string()).or_default();
        if !members.contains(&client_id.to_string()) {
            members.push(client_id.to_string());
        }
    }

    pub fn remove_from_group(&self, group_id: &str, client_id: &str) {
        if let Some(mut members) = self.by_group.get_mut(group_id) {
            members.retain(|id| id != client_id);
        }
    }

    /// Connected members of `group_id`, sorted for determinism.
    pub fn group_members(&self, group_id: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .by_group
            .get(group_id)
            .map(|m| m.iter().filter(|id| self.is_connected(id)).cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(ConnectionRegistryOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(socket_id: &str, device_id: &str, instance_id: &str) -> RegisterRequest {
        RegisterRequest { socket_id: socket_id.into(), role: Role::Client, device_id: Some(device_id.into()), instance_id: Some(instance_id.into()) }
    }

    #[test]
    fn scenario_s5_takeover_preserves_id_and_fires_no_expiry() {
        let expired = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let expired_cb = Arc::clone(&expired);
        let registry = ConnectionRegistry::new(ConnectionRegistryOptions {
            grace_period_ms: 5000,
            callbacks: RegistryCallbacks { on_client_expired: Some(Arc::new(move |id| expired_cb.lock().push(id.to_string()))) },
        });

        let id = registry.register(req("sock-1", "D", "T1"), 0);
        assert_eq!(id, "D");

        registry.disconnect(&id, 1000).unwrap();
        assert!(!registry.is_connected("D"));

        let rejoined = registry.register(req("sock-2", "D", "T1"), 2000);
        assert_eq!(rejoined, "D", "takeover must preserve the original client id");
        assert!(registry.is_connected("D"));
        assert!(expired.lock().is_empty(), "takeover within the grace window must not fire clientExpired");

        let purged = registry.purge_expired(7100);
        assert!(purged.is_empty(), "reconnected client must not be purged by a later sweep");
    }

    #[test]
    fn scenario_s5_expiry_after_grace_period() {
        let expired = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let expired_cb = Arc::clone(&expired);
        let registry = ConnectionRegistry::new(ConnectionRegistryOptions {
            grace_period_ms: 5000,
            callbacks: RegistryCallbacks { on_client_expired: Some(Arc::new(move |id| expired_cb.lock().push(id.to_string()))) },
        });

        let id = registry.register(req("sock-1", "D", "T1"), 0);
        registry.disconnect(&id, 1000).unwrap();

        let purged_early = registry.purge_expired(4000);
        assert!(purged_early.is_empty());

        let purged = registry.purge_expired(6001);
        assert_eq!(purged, vec!["D".to_string()]);
        assert_eq!(*expired.lock(), vec!["D".to_string()]);
        assert!(registry.get("D").is_none());
    }

    #[test]
    fn collision_on_fresh_register_gets_numeric_suffix() {
        let registry = ConnectionRegistry::default();
        let a = registry.register(RegisterRequest { socket_id: "s1".into(), role: Role::Client, device_id: Some("dev".into()), instance_id: None }, 0);
        let b = registry.register(RegisterRequest { socket_id: "s2".into(), role: Role::Client, device_id: Some("dev".into()), instance_id: None }, 0);
        assert_eq!(a, "dev");
        assert_eq!(b, "dev-2");
    }

    #[test]
    fn managers_always_get_a_fresh_synthesized_id() {
        let registry = ConnectionRegistry::default();
        let a = registry.register(RegisterRequest { socket_id: "s1".into(), role: Role::Manager, device_id: Some("ignored".into()), instance_id: None }, 10);
        let b = registry.register(RegisterRequest { socket_id: "s2".into(), role: Role::Manager, device_id: Some("ignored".into()), instance_id: None }, 10);
        assert_ne!(a, b);
        assert_ne!(a, "ignored");
    }

    #[test]
    fn zero_grace_period_purges_immediately() {
        let expired = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let expired_cb = Arc::clone(&expired);
        let registry = ConnectionRegistry::new(ConnectionRegistryOptions {
            grace_period_ms: 0,
            callbacks: RegistryCallbacks { on_client_expired: Some(Arc::new(move |id| expired_cb.lock().push(id.to_string()))) },
        });
        let id = registry.register(req("s1", "D", "T1"), 0);
        registry.disconnect(&id, 0).unwrap();
        assert!(registry.get("D").is_none());
        assert_eq!(*expired.lock(), vec!["D".to_string()]);
    }
}
