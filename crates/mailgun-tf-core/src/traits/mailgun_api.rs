// # Mailgun API Trait
//
// Defines the remote operations the resource handlers are allowed to make.
//
// ## Implementations
//
// - HTTP: `mailgun-tf-http` crate (reqwest against api.mailgun.net/v3)
// - Tests: recording in-memory fakes
//
// Every call that touches a domain-scoped object takes the domain name
// explicitly; a client is never re-pointed at another domain between calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Spam filtering mode of a domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamAction {
    /// No spam filtering
    #[default]
    Disabled,
    /// Tag suspected spam with a header
    Tag,
    /// Reject suspected spam
    Block,
}

impl SpamAction {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Tag => "tag",
            Self::Block => "block",
        }
    }
}

impl std::fmt::Display for SpamAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain record as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Creation timestamp (RFC 2822, as sent by Mailgun)
    #[serde(default)]
    pub created_at: String,
    /// Default SMTP login
    #[serde(default)]
    pub smtp_login: String,
    /// Domain name
    pub name: String,
    /// Default SMTP password
    #[serde(default)]
    pub smtp_password: String,
    /// Whether subdomains are accepted
    #[serde(default)]
    pub wildcard: bool,
    /// Spam filtering mode
    #[serde(default)]
    pub spam_action: SpamAction,
    /// Verification state (`unverified`, `active`, ...)
    #[serde(default)]
    pub state: String,
}

/// DNS record the operator must provision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record name
    #[serde(default)]
    pub name: String,
    /// MX priority (empty for other record types)
    #[serde(default)]
    pub priority: String,
    /// Record type (`TXT`, `MX`, `CNAME`)
    #[serde(default)]
    pub record_type: String,
    /// Mailgun's validity verdict
    #[serde(default)]
    pub valid: String,
    /// Expected record value
    #[serde(default)]
    pub value: String,
}

/// Response to get/create domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainResponse {
    /// The domain itself
    pub domain: Domain,
    /// Records for inbound mail
    #[serde(default)]
    pub receiving_dns_records: Vec<DnsRecord>,
    /// Records for outbound mail
    #[serde(default)]
    pub sending_dns_records: Vec<DnsRecord>,
}

/// Options for domain creation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDomainOptions {
    /// Default SMTP password
    pub smtp_password: Option<String>,
    /// Spam filtering mode
    pub spam_action: SpamAction,
    /// Accept subdomains
    pub wildcard: bool,
    /// Make the domain its own DKIM authority
    pub force_dkim_authority: bool,
    /// DKIM key length in bits
    pub dkim_key_size: u32,
    /// Dedicated IPs to assign
    pub ips: Vec<String>,
}

/// Mutable top-level domain settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateDomainOptions {
    /// New spam filtering mode, if changing
    pub spam_action: Option<SpamAction>,
    /// New wildcard flag, if changing
    pub wildcard: Option<bool>,
}

impl UpdateDomainOptions {
    /// Whether any setting is present
    pub fn is_empty(&self) -> bool {
        self.spam_action.is_none() && self.wildcard.is_none()
    }
}

/// SMTP credential as listed by the API (passwords are never returned)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,
    /// Full login (`user@domain`)
    pub login: String,
}

/// Connection policy of a domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConnection {
    /// Refuse to deliver without TLS
    #[serde(default)]
    pub require_tls: bool,
    /// Skip certificate verification
    #[serde(default)]
    pub skip_verification: bool,
}

/// A simple on/off tracking toggle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingToggle {
    /// Whether tracking is enabled
    #[serde(default)]
    pub active: bool,
}

/// Unsubscribe tracking, with the footers Mailgun inserts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeTracking {
    /// Whether unsubscribe links are inserted
    #[serde(default)]
    pub active: bool,
    /// HTML footer
    #[serde(default)]
    pub html_footer: String,
    /// Plain-text footer
    #[serde(default)]
    pub text_footer: String,
}

/// Tracking settings of a domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTracking {
    /// Click tracking
    #[serde(default)]
    pub click: TrackingToggle,
    /// Open tracking
    #[serde(default)]
    pub open: TrackingToggle,
    /// Unsubscribe tracking
    #[serde(default)]
    pub unsubscribe: UnsubscribeTracking,
}

/// A route as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Route identifier
    pub id: String,
    /// Evaluation priority (lower first)
    #[serde(default)]
    pub priority: i32,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Filter expression
    #[serde(default)]
    pub expression: String,
    /// Actions applied on match
    #[serde(default)]
    pub actions: Vec<String>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,
}

/// Fields sent when creating or updating a route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSpec {
    /// Evaluation priority
    pub priority: i32,
    /// Free-form description
    pub description: String,
    /// Filter expression
    pub expression: String,
    /// Actions applied on match
    pub actions: Vec<String>,
}

/// Remote operations against the Mailgun API
///
/// Implementations perform exactly one logical API operation per call and
/// return errors untouched: retry, timeouts around whole handlers and error
/// wrapping belong to the callers.
#[async_trait]
pub trait MailgunApi: Send + Sync {
    /// Create a domain
    async fn create_domain(
        &self,
        name: &str,
        options: &CreateDomainOptions,
    ) -> Result<DomainResponse>;

    /// Fetch a domain with its DNS records
    async fn get_domain(&self, name: &str) -> Result<DomainResponse>;

    /// Change top-level domain settings
    async fn update_domain(&self, name: &str, options: &UpdateDomainOptions) -> Result<()>;

    /// Delete a domain
    async fn delete_domain(&self, name: &str) -> Result<()>;

    /// List every SMTP credential of a domain (all pages)
    async fn list_credentials(&self, domain: &str) -> Result<Vec<Credential>>;

    /// Create an SMTP credential
    async fn create_credential(&self, domain: &str, login: &str, password: &str) -> Result<()>;

    /// Change the password of an SMTP credential
    async fn change_credential_password(
        &self,
        domain: &str,
        login: &str,
        password: &str,
    ) -> Result<()>;

    /// Delete an SMTP credential
    async fn delete_credential(&self, domain: &str, login: &str) -> Result<()>;

    /// Fetch the connection policy
    async fn get_domain_connection(&self, domain: &str) -> Result<DomainConnection>;

    /// Replace the connection policy
    async fn update_domain_connection(
        &self,
        domain: &str,
        connection: &DomainConnection,
    ) -> Result<()>;

    /// Fetch open/click/unsubscribe tracking settings
    async fn get_domain_tracking(&self, domain: &str) -> Result<DomainTracking>;

    /// Toggle open tracking
    async fn update_open_tracking(&self, domain: &str, active: bool) -> Result<()>;

    /// Toggle click tracking
    async fn update_click_tracking(&self, domain: &str, active: bool) -> Result<()>;

    /// Update unsubscribe tracking and its footers
    async fn update_unsubscribe_tracking(
        &self,
        domain: &str,
        settings: &UnsubscribeTracking,
    ) -> Result<()>;

    /// List the IP addresses assigned to a domain
    async fn list_domain_ips(&self, domain: &str) -> Result<Vec<String>>;

    /// Create a route
    async fn create_route(&self, route: &RouteSpec) -> Result<Route>;

    /// Fetch a route
    async fn get_route(&self, id: &str) -> Result<Route>;

    /// Replace a route's fields
    async fn update_route(&self, id: &str, route: &RouteSpec) -> Result<Route>;

    /// Delete a route
    async fn delete_route(&self, id: &str) -> Result<()>;

    /// Implementation name (for logging)
    fn api_name(&self) -> &'static str;
}
