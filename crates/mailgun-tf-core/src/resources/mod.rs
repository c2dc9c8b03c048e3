//! Resource kinds served by the provider

pub mod domain;
pub mod route;

pub use domain::{DOMAIN_TYPE, DomainConfig, DomainResource, DomainState, TrackingSettings};
pub use route::{ROUTE_TYPE, RouteConfig, RouteResource, RouteState};
