// # mailgun-tf-core
//
// Core library of the Mailgun infrastructure provider.
//
// ## Architecture Overview
//
// - **MailgunApi**: Trait for the remote operations against Mailgun
// - **Resource**: Typed lifecycle of a resource kind (`mailgun_domain`,
//   `mailgun_route`), bound to JSON attribute maps by `Bound`
// - **ClientHandle**: Explicit client plus timeouts and retry ceilings,
//   passed to every handler call
// - **StateStore**: Persistent per-address resource state
// - **ProviderEngine**: Chooses create/update/replace and keeps state in sync
// - **ResourceRegistry**: Resource type name to handler dispatch
//
// ## Design Principles
//
// 1. **No global client**: every remote call goes through an explicit handle
// 2. **Typed configuration**: attribute maps are decoded once at the boundary
// 3. **Bounded waiting**: the only retries are the IP propagation and destroy
//    confirmation loops, both capped by wall-clock ceilings

pub mod address;
pub mod config;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod resources;
pub mod retry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use address::ResourceAddress;
pub use config::{ProviderConfig, RetryConfig, TimeoutConfig};
pub use engine::{ApplyOutcome, ProviderEngine};
pub use error::{Error, Result};
pub use registry::ResourceRegistry;
pub use retry::{RetryError, RetryPolicy, retry};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{ClientHandle, MailgunApi, Resource, ResourceHandler, StateRecord, StateStore};
