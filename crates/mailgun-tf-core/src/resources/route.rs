//! `mailgun_route`: a priority-ordered match-and-act rule
//!
//! Routes are account-wide (not scoped to a domain). Every field is mutable,
//! so nothing ever forces replacement; an update sends the full record in a
//! single call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ResultExt;
use crate::retry::retry;
use crate::traits::{ClientHandle, Resource, Route, RouteSpec};
use crate::{Error, Result};

/// Resource type name
pub const ROUTE_TYPE: &str = "mailgun_route";

/// Desired configuration of a `mailgun_route`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Evaluation priority (lower first)
    pub priority: i32,

    /// Filter expression, e.g. `match_recipient(".*@mg.example.com")`
    pub expression: String,

    /// Free-form description
    pub description: String,

    /// Actions applied on match, in order
    pub actions: Vec<String>,
}

impl RouteConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.expression.trim().is_empty() {
            return Err(Error::invalid_input("route expression cannot be empty"));
        }
        if self.actions.is_empty() {
            return Err(Error::invalid_input("route needs at least one action"));
        }
        if self.actions.iter().any(|a| a.trim().is_empty()) {
            return Err(Error::invalid_input("route actions cannot be empty"));
        }
        Ok(())
    }

    fn spec(&self) -> RouteSpec {
        RouteSpec {
            priority: self.priority,
            description: self.description.clone(),
            expression: self.expression.clone(),
            actions: self.actions.clone(),
        }
    }
}

/// Observed state of a `mailgun_route`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteState {
    /// Remote identifier
    pub id: String,

    /// Same as `id`, kept as its own attribute
    pub route_id: String,

    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,

    /// Evaluation priority
    pub priority: i32,

    /// Filter expression
    pub expression: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Actions applied on match
    #[serde(default)]
    pub actions: Vec<String>,
}

impl RouteState {
    fn differs_from(&self, config: &RouteConfig) -> bool {
        self.priority != config.priority
            || self.expression != config.expression
            || self.description != config.description
            || self.actions != config.actions
    }
}

impl From<Route> for RouteState {
    fn from(route: Route) -> Self {
        Self {
            route_id: route.id.clone(),
            id: route.id,
            created_at: route.created_at,
            priority: route.priority,
            expression: route.expression,
            description: route.description,
            actions: route.actions,
        }
    }
}

/// The `mailgun_route` resource kind
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteResource;

#[async_trait]
impl Resource for RouteResource {
    type Config = RouteConfig;
    type State = RouteState;

    fn type_name(&self) -> &'static str {
        ROUTE_TYPE
    }

    fn id<'a>(&self, state: &'a RouteState) -> &'a str {
        &state.id
    }

    fn requires_replacement(&self, _prior: &RouteState, _desired: &RouteConfig) -> Vec<&'static str> {
        Vec::new()
    }

    async fn create(&self, client: &ClientHandle, config: &RouteConfig) -> Result<RouteState> {
        config.validate()?;

        let route = client
            .with_deadline(
                client.timeouts().operation(),
                client.api().create_route(&config.spec()),
            )
            .await
            .context("error creating mailgun route")?;

        info!("Created mailgun route: {}", route.id);
        self.read(client, &route.id, None).await
    }

    async fn read(
        &self,
        client: &ClientHandle,
        id: &str,
        _prior: Option<&RouteState>,
    ) -> Result<RouteState> {
        debug!("Reading mailgun route: {}", id);

        let route = client
            .with_deadline(client.timeouts().operation(), client.api().get_route(id))
            .await
            .context("error getting mailgun route")?;

        Ok(route.into())
    }

    async fn update(
        &self,
        client: &ClientHandle,
        prior: &RouteState,
        desired: &RouteConfig,
    ) -> Result<RouteState> {
        desired.validate()?;

        if !prior.differs_from(desired) {
            debug!("Route {} already up to date", prior.id);
            return Ok(prior.clone());
        }

        info!("Updating mailgun route: {}", prior.id);

        client
            .with_deadline(
                client.timeouts().operation(),
                client.api().update_route(&prior.id, &desired.spec()),
            )
            .await
            .context("error updating mailgun route")?;

        self.read(client, &prior.id, Some(prior)).await
    }

    async fn delete(&self, client: &ClientHandle, state: &RouteState) -> Result<()> {
        info!("Deleting mailgun route: {}", state.id);

        client
            .with_deadline(
                client.timeouts().operation(),
                client.api().delete_route(&state.id),
            )
            .await
            .context("error deleting mailgun route")
    }

    async fn confirm_destroyed(&self, client: &ClientHandle, id: &str) -> Result<()> {
        let api = client.api();

        retry(
            &client.retry().destroy_confirmation(),
            || async move {
                match api.get_route(id).await {
                    Ok(_) => Err(Error::Other(format!("route {id} still exists"))),
                    Err(_) => Ok(()),
                }
            },
            |_| true,
        )
        .await
        .map_err(|e| Error::context("mailgun route still exists after destroy", e.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RouteConfig {
        RouteConfig {
            priority: 0,
            expression: "match_recipient('.*@mg.example.com')".into(),
            description: "inbound".into(),
            actions: vec!["forward('http://example.com/api/v1/foos/')".into(), "stop()".into()],
        }
    }

    #[test]
    fn test_route_state_from_api_copies_id() {
        let state = RouteState::from(Route {
            id: "4f3bad2335335426750048c6".into(),
            priority: 1,
            description: "d".into(),
            expression: "catch_all()".into(),
            actions: vec!["stop()".into()],
            created_at: "Wed, 15 Feb 2012 13:03:31 GMT".into(),
        });

        assert_eq!(state.id, "4f3bad2335335426750048c6");
        assert_eq!(state.route_id, state.id);
    }

    #[test]
    fn test_validate_requires_actions() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());
        cfg.actions.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_action_order_is_significant() {
        let cfg = config();
        let mut state = RouteState {
            id: "r1".into(),
            route_id: "r1".into(),
            created_at: String::new(),
            priority: cfg.priority,
            expression: cfg.expression.clone(),
            description: cfg.description.clone(),
            actions: cfg.actions.clone(),
        };
        assert!(!state.differs_from(&cfg));

        state.actions.reverse();
        assert!(state.differs_from(&cfg));
    }

    #[test]
    fn test_routes_never_require_replacement() {
        let cfg = config();
        let state = RouteState {
            id: "r1".into(),
            route_id: "r1".into(),
            created_at: String::new(),
            priority: 99,
            expression: "catch_all()".into(),
            description: String::new(),
            actions: vec![],
        };
        assert!(RouteResource.requires_replacement(&state, &cfg).is_empty());
    }
}
