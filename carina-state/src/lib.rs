//! Carina State Management
//!
//! Records which remote objects a configuration has created so they can be
//! checked later (e.g., that everything is gone after a destroy).
//!
//! # Overview
//!
//! - **StateFile**: The state structure containing all tracked resources
//! - **StateBackend**: A trait for state storage backends
//! - **LocalBackend**: JSON file on the local filesystem
//!
//! # Example
//!
//! ```ignore
//! use carina_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::local("carina.state.json"))?;
//! let state = backend.read_state().await?.unwrap_or_default();
//!
//! for resource in state.select(Some("sns.topic"), None) {
//!     println!("{} -> {:?}", resource.name, resource.identifier);
//! }
//! ```

pub mod backend;
pub mod backends;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use state::{ResourceState, StateFile};
