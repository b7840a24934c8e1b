//! Authentication module
//!
//! Supports: API Key, Basic, Bearer, OAuth2 client credentials, OAuth2 refresh token
//!
//! The `AuthProvider` handles all strategies behind one acquire/refresh
//! contract and manages token caching for the strategies that need a token
//! endpoint.

mod provider;
mod types;

pub use provider::{basic_token, AuthProvider};
pub use types::{AuthConfig, ClientAuth, Credential, Location};

#[cfg(test)]
mod tests;
