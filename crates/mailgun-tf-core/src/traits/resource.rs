// # Resource Traits
//
// A resource kind is implemented once, against typed configuration and
// state records ([`Resource`]). The host only ever sees JSON attribute maps;
// [`Bound`] is the binding layer that turns those maps into the typed records
// at the boundary, so no handler logic ever looks fields up by string key.
//
// ## Usage
//
// ```rust,ignore
// use mailgun_tf_core::resources::DomainResource;
// use mailgun_tf_core::traits::{Bound, ResourceHandler};
//
// let handler: Box<dyn ResourceHandler> = Box::new(Bound(DomainResource));
// let (id, state) = handler.create(&client, &serde_json::json!({ "name": "mg.example.com" })).await?;
// ```

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ProviderConfig, RetryConfig, TimeoutConfig};
use crate::traits::MailgunApi;
use crate::{Error, Result};

/// Authenticated API client plus the settings handlers run under
///
/// Constructed once by the caller from the provider configuration and passed
/// explicitly to every handler. It holds no mutable state.
#[derive(Clone)]
pub struct ClientHandle {
    api: Arc<dyn MailgunApi>,
    timeouts: TimeoutConfig,
    retry: RetryConfig,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("api", &self.api.api_name())
            .field("timeouts", &self.timeouts)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientHandle {
    /// Wrap an API client with the settings from the provider configuration
    pub fn new(api: Arc<dyn MailgunApi>, config: &ProviderConfig) -> Self {
        Self::with_settings(api, config.timeouts.clone(), config.retry.clone())
    }

    /// Wrap an API client with explicit settings
    pub fn with_settings(
        api: Arc<dyn MailgunApi>,
        timeouts: TimeoutConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            api,
            timeouts,
            retry,
        }
    }

    /// The underlying API client
    pub fn api(&self) -> &dyn MailgunApi {
        self.api.as_ref()
    }

    /// Handler deadlines
    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Retry ceilings
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Deadline for a full domain read
    ///
    /// The IP propagation retry runs inside the read, so the deadline always
    /// extends one operation timeout past the retry ceiling. The retry then
    /// gives up and reports its last error before the read times out.
    pub fn domain_read_deadline(&self) -> Duration {
        let ip_ceiling = self.retry.ip_propagation().ceiling;
        self.timeouts
            .read()
            .max(ip_ceiling + self.timeouts.operation())
    }

    /// Run `work` under `deadline`, mapping expiry to [`Error::Timeout`]
    pub async fn with_deadline<T, F>(&self, deadline: Duration, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(deadline, work)
            .await
            .map_err(|_| Error::Timeout(deadline))?
    }
}

/// Typed lifecycle of one resource kind
///
/// Every method makes its remote calls through the given [`ClientHandle`]
/// and returns either the fresh state or a descriptive error. Handlers do not
/// retry mutating calls and do not roll back partially applied changes.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Desired configuration record
    type Config: DeserializeOwned + Send + Sync;

    /// Observed state record
    type State: Serialize + DeserializeOwned + Send + Sync;

    /// Resource type name as used in addresses (e.g. `mailgun_domain`)
    fn type_name(&self) -> &'static str;

    /// Remote identifier held by a state record
    fn id<'a>(&self, state: &'a Self::State) -> &'a str;

    /// Names of immutable fields whose desired value differs from `prior`
    ///
    /// A non-empty result means the object has to be destroyed and created
    /// again instead of updated.
    fn requires_replacement(&self, prior: &Self::State, desired: &Self::Config)
    -> Vec<&'static str>;

    /// Create the remote object and return its state
    async fn create(&self, client: &ClientHandle, config: &Self::Config) -> Result<Self::State>;

    /// Fully resynchronize state from the remote object
    ///
    /// `prior` supplies the fields the API never returns (secrets, create-time
    /// options). `None` means the object is being imported.
    async fn read(
        &self,
        client: &ClientHandle,
        id: &str,
        prior: Option<&Self::State>,
    ) -> Result<Self::State>;

    /// Apply the difference between `prior` and `desired`, then read back
    async fn update(
        &self,
        client: &ClientHandle,
        prior: &Self::State,
        desired: &Self::Config,
    ) -> Result<Self::State>;

    /// Delete the remote object
    async fn delete(&self, client: &ClientHandle, state: &Self::State) -> Result<()>;

    /// Wait until the remote object is no longer readable
    async fn confirm_destroyed(&self, client: &ClientHandle, id: &str) -> Result<()>;
}

/// Untyped, host-facing view of a resource kind
///
/// Attribute maps cross this boundary as JSON; `(id, attributes)` pairs come
/// back so the host can key its state.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    /// Immutable fields that changed between stored state and desired config
    fn requires_replacement(&self, prior: &Value, desired: &Value) -> Result<Vec<&'static str>>;

    /// Create from desired configuration
    async fn create(&self, client: &ClientHandle, desired: &Value) -> Result<(String, Value)>;

    /// Read by id, carrying non-returned fields from `prior`
    async fn read(
        &self,
        client: &ClientHandle,
        id: &str,
        prior: Option<&Value>,
    ) -> Result<(String, Value)>;

    /// Update stored state towards desired configuration
    async fn update(
        &self,
        client: &ClientHandle,
        prior: &Value,
        desired: &Value,
    ) -> Result<(String, Value)>;

    /// Delete the object described by stored state
    async fn delete(&self, client: &ClientHandle, prior: &Value) -> Result<()>;

    /// Wait until the object is gone
    async fn confirm_destroyed(&self, client: &ClientHandle, id: &str) -> Result<()>;
}

/// Binds a typed [`Resource`] to the untyped [`ResourceHandler`] boundary
#[derive(Debug, Clone, Copy, Default)]
pub struct Bound<R>(pub R);

impl<R: Resource> Bound<R> {
    fn bind<T: DeserializeOwned>(&self, what: &str, value: &Value) -> Result<T> {
        serde_json::from_value(value.clone()).map_err(|e| {
            Error::invalid_input(format!("invalid {} {}: {}", self.0.type_name(), what, e))
        })
    }

    fn emit(&self, state: &R::State) -> Result<(String, Value)> {
        Ok((self.0.id(state).to_string(), serde_json::to_value(state)?))
    }
}

#[async_trait]
impl<R: Resource> ResourceHandler for Bound<R> {
    fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    fn requires_replacement(&self, prior: &Value, desired: &Value) -> Result<Vec<&'static str>> {
        let prior: R::State = self.bind("state", prior)?;
        let desired: R::Config = self.bind("configuration", desired)?;
        Ok(self.0.requires_replacement(&prior, &desired))
    }

    async fn create(&self, client: &ClientHandle, desired: &Value) -> Result<(String, Value)> {
        let config: R::Config = self.bind("configuration", desired)?;
        let state = self.0.create(client, &config).await?;
        self.emit(&state)
    }

    async fn read(
        &self,
        client: &ClientHandle,
        id: &str,
        prior: Option<&Value>,
    ) -> Result<(String, Value)> {
        let prior: Option<R::State> = prior.map(|p| self.bind("state", p)).transpose()?;
        let state = self.0.read(client, id, prior.as_ref()).await?;
        self.emit(&state)
    }

    async fn update(
        &self,
        client: &ClientHandle,
        prior: &Value,
        desired: &Value,
    ) -> Result<(String, Value)> {
        let prior: R::State = self.bind("state", prior)?;
        let config: R::Config = self.bind("configuration", desired)?;
        let state = self.0.update(client, &prior, &config).await?;
        self.emit(&state)
    }

    async fn delete(&self, client: &ClientHandle, prior: &Value) -> Result<()> {
        let prior: R::State = self.bind("state", prior)?;
        self.0.delete(client, &prior).await
    }

    async fn confirm_destroyed(&self, client: &ClientHandle, id: &str) -> Result<()> {
        self.0.confirm_destroyed(client, id).await
    }
}
