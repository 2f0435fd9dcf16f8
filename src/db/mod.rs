//! Session storage layer.

pub mod session;
pub mod token_store;

pub use session::{MemorySessionStore, SessionId, SessionStore, SharedSessionStore};
pub use token_store::SessionTokenStore;

/// Session keys as constants.
pub mod keys {
    /// Serialized token cache blob
    pub const TOKEN_CACHE: &str = "token_cache";
    /// Cached user details (JSON)
    pub const USER: &str = "user";
    /// Nonce bound into the pending sign-in state
    pub const SIGNIN_NONCE: &str = "signin_nonce";
}
