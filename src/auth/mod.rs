//! Identity & credentials (C1): opaque API keys, signed session tokens.

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod store;

pub use api::AuthState;
pub use jwt::JwtHandler;
pub use middleware::{auth_middleware, AuthLayerState};
pub use store::CredentialStore;
