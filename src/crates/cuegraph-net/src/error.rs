//! Error taxonomy for connection registration and command dispatch.
//!
//! Registry/dispatch failures are all advisory from the runtime's point of
//! view (spec §7 `SelectorMiss` is not even an error) — nothing here halts a
//! running [`cuegraph_core::Runtime`]; callers log and move on.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("client id '{0}' is already registered to an active connection")]
    AlreadyConnected(String),
    #[error("no connection registered for client id '{0}'")]
    UnknownClient(String),
}

pub type Result<T> = std::result::Result<T, Error>;
