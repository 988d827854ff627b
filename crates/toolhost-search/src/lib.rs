//! Web search backends for tool-hosting servers.
//!
//! One backend is chosen at startup from environment configuration
//! ([`SearchConfig::from_env`]) and used through the [`SearchProvider`] trait.

pub mod backends;
pub mod config;
pub mod errors;
pub mod provider;
pub mod types;

pub use backends::{ExaBackend, GoogleBackend, YouComBackend};
pub use config::*;
pub use errors::*;
pub use provider::*;
pub use types::*;
