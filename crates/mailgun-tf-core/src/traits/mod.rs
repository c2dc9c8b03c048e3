//! Core traits for the Mailgun provider
//!
//! - [`MailgunApi`]: Remote operations against the Mailgun API
//! - [`Resource`]: Typed lifecycle of one resource kind
//! - [`ResourceHandler`]: Untyped host-facing view of a [`Resource`]
//! - [`StateStore`]: Persistent resource state for the local host

pub mod mailgun_api;
pub mod resource;
pub mod state_store;

pub use mailgun_api::{
    CreateDomainOptions, Credential, DnsRecord, Domain, DomainConnection, DomainResponse,
    DomainTracking, MailgunApi, Route, RouteSpec, SpamAction, TrackingToggle,
    UnsubscribeTracking, UpdateDomainOptions,
};
pub use resource::{Bound, ClientHandle, Resource, ResourceHandler};
pub use state_store::{StateRecord, StateStore};
