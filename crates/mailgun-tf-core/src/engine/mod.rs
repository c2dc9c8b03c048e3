//! Provider engine
//!
//! The ProviderEngine is the local host for the resource handlers:
//! - Looking up the handler for an address via the registry
//! - Loading prior state for the address
//! - Choosing between create, update and replacement
//! - Persisting the resulting state, or discarding it on destroy
//!
//! ## Flow
//!
//! ```text
//!  apply(address, desired)
//!          │
//!          ▼
//!  ┌──────────────┐  none   ┌──────────┐
//!  │ StateStore   │────────▶│ create   │──┐
//!  │ (get)        │         └──────────┘  │
//!  └──────────────┘                       │
//!          │ some                         ▼
//!          ▼                       ┌──────────────┐
//!  requires_replacement? ── no ──▶ │ update       │──▶ StateStore (put)
//!          │ yes                   └──────────────┘
//!          ▼
//!  delete ─▶ [confirm_destroyed] ─▶ create
//! ```
//!
//! Each call performs one logical operation on one resource. Failed handler
//! calls never touch stored state, except that a replacement whose create
//! step fails leaves the address without state (the old object is gone).

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::address::ResourceAddress;
use crate::error::{Error, Result};
use crate::registry::ResourceRegistry;
use crate::traits::{ClientHandle, ResourceHandler, StateRecord, StateStore};

/// What an engine operation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new remote object was created
    Created {
        /// Remote id
        id: String,
    },
    /// The existing object was updated in place
    Updated {
        /// Remote id
        id: String,
    },
    /// The object was destroyed and created again
    Replaced {
        /// Id of the destroyed object
        previous_id: String,
        /// Id of the new object
        id: String,
        /// Immutable fields that forced the replacement
        fields: Vec<&'static str>,
    },
    /// The object was destroyed
    Deleted {
        /// Remote id
        id: String,
    },
    /// Nothing was stored under the address
    Absent,
}

/// Host-side orchestration of resource handlers and local state
pub struct ProviderEngine {
    registry: ResourceRegistry,
    client: ClientHandle,
    state_store: Box<dyn StateStore>,
    confirm_destroy: bool,
}

impl ProviderEngine {
    /// Create an engine
    pub fn new(
        registry: ResourceRegistry,
        client: ClientHandle,
        state_store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            registry,
            client,
            state_store,
            confirm_destroy: false,
        }
    }

    /// Wait for destroyed objects to disappear before reporting success
    pub fn with_confirm_destroy(mut self, confirm: bool) -> Self {
        self.confirm_destroy = confirm;
        self
    }

    /// The state store backing this engine
    pub fn state_store(&self) -> &dyn StateStore {
        self.state_store.as_ref()
    }

    /// Converge the resource at `address` towards `desired`
    pub async fn apply(&self, address: &ResourceAddress, desired: &Value) -> Result<ApplyOutcome> {
        let handler = self.registry.handler(&address.resource_type)?;
        let key = address.to_string();

        let outcome = match self.state_store.get(&key).await? {
            None => {
                info!("Creating {}", address);
                let (id, attributes) = handler.create(&self.client, desired).await?;
                self.store(&key, handler, &id, attributes).await?;
                ApplyOutcome::Created { id }
            }
            Some(prior) => {
                let fields = handler.requires_replacement(&prior.attributes, desired)?;
                if fields.is_empty() {
                    info!("Updating {} ({})", address, prior.id);
                    let (id, attributes) = handler
                        .update(&self.client, &prior.attributes, desired)
                        .await?;
                    self.store(&key, handler, &id, attributes).await?;
                    ApplyOutcome::Updated { id }
                } else {
                    info!(
                        "Replacing {} ({}), changed: {}",
                        address,
                        prior.id,
                        fields.join(", ")
                    );
                    self.destroy_remote(handler, &prior).await?;
                    self.state_store.delete(&key).await?;

                    let (id, attributes) = handler.create(&self.client, desired).await?;
                    self.store(&key, handler, &id, attributes).await?;
                    ApplyOutcome::Replaced {
                        previous_id: prior.id,
                        id,
                        fields,
                    }
                }
            }
        };

        self.state_store.flush().await?;
        Ok(outcome)
    }

    /// Re-read the resource at `address` from the remote system
    ///
    /// On failure the stored state is left as it was.
    pub async fn refresh(&self, address: &ResourceAddress) -> Result<StateRecord> {
        let handler = self.registry.handler(&address.resource_type)?;
        let key = address.to_string();

        let prior = self
            .state_store
            .get(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("no state for {}", address)))?;

        debug!("Refreshing {} ({})", address, prior.id);
        let (id, attributes) = handler
            .read(&self.client, &prior.id, Some(&prior.attributes))
            .await?;

        let record = self.store(&key, handler, &id, attributes).await?;
        self.state_store.flush().await?;
        Ok(record)
    }

    /// Destroy the resource at `address` and discard its state
    pub async fn destroy(&self, address: &ResourceAddress) -> Result<ApplyOutcome> {
        let handler = self.registry.handler(&address.resource_type)?;
        let key = address.to_string();

        let Some(prior) = self.state_store.get(&key).await? else {
            debug!("Nothing to destroy at {}", address);
            return Ok(ApplyOutcome::Absent);
        };

        info!("Destroying {} ({})", address, prior.id);
        self.destroy_remote(handler, &prior).await?;
        self.state_store.delete(&key).await?;
        self.state_store.flush().await?;

        Ok(ApplyOutcome::Deleted { id: prior.id })
    }

    /// Adopt an existing remote object under `address`
    pub async fn import(&self, address: &ResourceAddress, id: &str) -> Result<StateRecord> {
        let handler = self.registry.handler(&address.resource_type)?;
        let key = address.to_string();

        if let Some(existing) = self.state_store.get(&key).await? {
            return Err(Error::invalid_input(format!(
                "{} already manages {}",
                address, existing.id
            )));
        }

        info!("Importing {} as {}", id, address);
        let (id, attributes) = handler.read(&self.client, id, None).await?;

        let record = self.store(&key, handler, &id, attributes).await?;
        self.state_store.flush().await?;
        Ok(record)
    }

    /// Stored state of `address`, without contacting the remote system
    pub async fn show(&self, address: &ResourceAddress) -> Result<Option<StateRecord>> {
        self.registry.handler(&address.resource_type)?;
        self.state_store.get(&address.to_string()).await
    }

    async fn destroy_remote(&self, handler: &dyn ResourceHandler, prior: &StateRecord) -> Result<()> {
        handler.delete(&self.client, &prior.attributes).await?;

        if self.confirm_destroy {
            debug!("Confirming {} is gone", prior.id);
            if let Err(e) = handler.confirm_destroyed(&self.client, &prior.id).await {
                warn!("{} still readable after destroy: {}", prior.id, e);
                return Err(e);
            }
        }

        Ok(())
    }

    async fn store(
        &self,
        key: &str,
        handler: &dyn ResourceHandler,
        id: &str,
        attributes: Value,
    ) -> Result<StateRecord> {
        let record = StateRecord::new(handler.type_name(), id, attributes);
        self.state_store.put(key, &record).await?;
        Ok(record)
    }
}

impl std::fmt::Debug for ProviderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEngine")
            .field("registry", &self.registry)
            .field("client", &self.client)
            .field("confirm_destroy", &self.confirm_destroy)
            .finish_non_exhaustive()
    }
}
