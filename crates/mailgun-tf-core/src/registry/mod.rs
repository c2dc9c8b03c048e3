//! Resource handler registry
//!
//! Maps resource type names (`mailgun_domain`, `mailgun_route`) to their
//! handlers, so the engine dispatches on the address type instead of a
//! hard-coded match.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mailgun_tf_core::registry::ResourceRegistry;
//!
//! let registry = ResourceRegistry::with_builtin_resources();
//! let handler = registry.handler("mailgun_domain")?;
//! ```

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::resources::{DomainResource, RouteResource};
use crate::traits::{Bound, ResourceHandler};

/// Registry of resource handlers keyed by type name
#[derive(Default)]
pub struct ResourceRegistry {
    handlers: HashMap<&'static str, Box<dyn ResourceHandler>>,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("types", &self.list())
            .finish()
    }
}

impl ResourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry serving every resource kind this crate implements
    pub fn with_builtin_resources() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Bound(DomainResource)));
        registry.register(Box::new(Bound(RouteResource)));
        registry
    }

    /// Register a handler under its own type name, replacing any previous one
    pub fn register(&mut self, handler: Box<dyn ResourceHandler>) {
        self.handlers.insert(handler.type_name(), handler);
    }

    /// Look up the handler for `resource_type`
    pub fn handler(&self, resource_type: &str) -> Result<&dyn ResourceHandler> {
        self.handlers
            .get(resource_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| Error::invalid_input(format!("Unknown resource type: {}", resource_type)))
    }

    /// Check if a resource type is registered
    pub fn has(&self, resource_type: &str) -> bool {
        self.handlers.contains_key(resource_type)
    }

    /// Registered type names, sorted
    pub fn list(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}
