//! Test doubles and common utilities for integration tests
//!
//! [`RecordingApi`] is an in-memory Mailgun that records every call and can
//! be told to fail specific operations, fail IP listing a number of times,
//! or keep a deleted domain readable for a while.

#![allow(dead_code)]

use async_trait::async_trait;
use mailgun_tf_core::config::{RetryConfig, TimeoutConfig};
use mailgun_tf_core::resources::domain::{
    DEFAULT_UNSUBSCRIBE_HTML_FOOTER, DEFAULT_UNSUBSCRIBE_TEXT_FOOTER,
};
use mailgun_tf_core::traits::{
    ClientHandle, CreateDomainOptions, Credential, DnsRecord, Domain, DomainConnection,
    DomainResponse, DomainTracking, MailgunApi, Route, RouteSpec, UnsubscribeTracking,
    UpdateDomainOptions,
};
use mailgun_tf_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateDomain(String),
    GetDomain(String),
    UpdateDomain(String),
    DeleteDomain(String),
    ListCredentials(String),
    CreateCredential { domain: String, login: String },
    ChangeCredentialPassword { domain: String, login: String },
    DeleteCredential { domain: String, login: String },
    GetConnection(String),
    UpdateConnection(String),
    GetTracking(String),
    UpdateOpenTracking(String),
    UpdateClickTracking(String),
    UpdateUnsubscribeTracking(String),
    ListIps(String),
    CreateRoute,
    GetRoute(String),
    UpdateRoute(String),
    DeleteRoute(String),
}

impl Call {
    /// Operation name, as used by [`RecordingApi::fail_on`]
    pub fn name(&self) -> &'static str {
        match self {
            Call::CreateDomain(_) => "create_domain",
            Call::GetDomain(_) => "get_domain",
            Call::UpdateDomain(_) => "update_domain",
            Call::DeleteDomain(_) => "delete_domain",
            Call::ListCredentials(_) => "list_credentials",
            Call::CreateCredential { .. } => "create_credential",
            Call::ChangeCredentialPassword { .. } => "change_credential_password",
            Call::DeleteCredential { .. } => "delete_credential",
            Call::GetConnection(_) => "get_domain_connection",
            Call::UpdateConnection(_) => "update_domain_connection",
            Call::GetTracking(_) => "get_domain_tracking",
            Call::UpdateOpenTracking(_) => "update_open_tracking",
            Call::UpdateClickTracking(_) => "update_click_tracking",
            Call::UpdateUnsubscribeTracking(_) => "update_unsubscribe_tracking",
            Call::ListIps(_) => "list_domain_ips",
            Call::CreateRoute => "create_route",
            Call::GetRoute(_) => "get_route",
            Call::UpdateRoute(_) => "update_route",
            Call::DeleteRoute(_) => "delete_route",
        }
    }

    /// Whether the call changes remote state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Call::GetDomain(_)
                | Call::ListCredentials(_)
                | Call::GetConnection(_)
                | Call::GetTracking(_)
                | Call::ListIps(_)
                | Call::GetRoute(_)
        )
    }
}

#[derive(Debug, Clone)]
struct FakeDomain {
    response: DomainResponse,
    credentials: Vec<(Credential, String)>,
    connection: DomainConnection,
    tracking: DomainTracking,
    ips: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    domains: HashMap<String, FakeDomain>,
    ghosts: HashMap<String, (DomainResponse, usize)>,
    routes: HashMap<String, Route>,
    next_route: usize,
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
    ip_failures: usize,
    linger_reads: usize,
    sparse_route_echo: bool,
    domain_latency: Duration,
}

/// In-memory, call-recording Mailgun
#[derive(Debug, Default)]
pub struct RecordingApi {
    inner: Mutex<Inner>,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call named `operation` fail with a provider error
    pub fn fail_on(&self, operation: &'static str) {
        self.inner.lock().unwrap().failing.insert(operation);
    }

    /// Stop failing `operation`
    pub fn recover(&self, operation: &'static str) {
        self.inner.lock().unwrap().failing.remove(operation);
    }

    /// Fail the next `n` IP listings
    pub fn fail_ip_listing(&self, n: usize) {
        self.inner.lock().unwrap().ip_failures = n;
    }

    /// Keep domains readable for `n` fetches after deletion
    pub fn linger_after_delete(&self, n: usize) {
        self.inner.lock().unwrap().linger_reads = n;
    }

    /// Make every domain lookup take `latency` of (tokio) time
    pub fn slow_domain_lookups(&self, latency: Duration) {
        self.inner.lock().unwrap().domain_latency = latency;
    }

    /// Answer route updates with only the route id, as a terse PUT response would
    pub fn sparse_route_echo(&self) {
        self.inner.lock().unwrap().sparse_route_echo = true;
    }

    /// Every recorded call, in order
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Recorded calls that change remote state
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    /// Number of recorded calls named `operation`
    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.name() == operation).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn has_domain(&self, name: &str) -> bool {
        self.inner.lock().unwrap().domains.contains_key(name)
    }

    pub fn has_route(&self, id: &str) -> bool {
        self.inner.lock().unwrap().routes.contains_key(id)
    }

    /// Logins and passwords currently held by a domain
    pub fn credentials_of(&self, domain: &str) -> Vec<(String, String)> {
        self.inner
            .lock()
            .unwrap()
            .domains
            .get(domain)
            .map(|d| {
                d.credentials
                    .iter()
                    .map(|(c, p)| (c.login.clone(), p.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Add a domain directly, bypassing the call log
    pub fn seed_domain(&self, name: &str, logins: &[(&str, &str)]) {
        let mut inner = self.inner.lock().unwrap();
        let mut domain = new_domain(name, &CreateDomainOptions {
            dkim_key_size: 1024,
            ..Default::default()
        });
        domain.credentials = logins
            .iter()
            .map(|(login, password)| (credential(login), password.to_string()))
            .collect();
        inner.domains.insert(name.to_string(), domain);
    }

    fn record(&self, call: Call) -> Result<std::sync::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock().unwrap();
        let name = call.name();
        inner.calls.push(call);
        if inner.failing.contains(name) {
            return Err(Error::provider("recording", format!("{} failed", name)));
        }
        Ok(inner)
    }
}

fn credential(login: &str) -> Credential {
    Credential {
        created_at: "Tue, 27 Sep 2011 20:24:22 GMT".to_string(),
        login: login.to_string(),
    }
}

fn new_domain(name: &str, options: &CreateDomainOptions) -> FakeDomain {
    FakeDomain {
        response: DomainResponse {
            domain: Domain {
                created_at: "Thu, 13 Oct 2011 18:02:00 GMT".to_string(),
                smtp_login: format!("postmaster@{}", name),
                name: name.to_string(),
                smtp_password: options.smtp_password.clone().unwrap_or_default(),
                wildcard: options.wildcard,
                spam_action: options.spam_action,
                state: "unverified".to_string(),
            },
            receiving_dns_records: vec![DnsRecord {
                name: String::new(),
                priority: "10".to_string(),
                record_type: "MX".to_string(),
                valid: "unknown".to_string(),
                value: "mxa.mailgun.org".to_string(),
            }],
            sending_dns_records: vec![DnsRecord {
                name: name.to_string(),
                priority: String::new(),
                record_type: "TXT".to_string(),
                valid: "unknown".to_string(),
                value: "v=spf1 include:mailgun.org ~all".to_string(),
            }],
        },
        credentials: Vec::new(),
        connection: DomainConnection::default(),
        tracking: DomainTracking {
            unsubscribe: UnsubscribeTracking {
                active: false,
                html_footer: DEFAULT_UNSUBSCRIBE_HTML_FOOTER.to_string(),
                text_footer: DEFAULT_UNSUBSCRIBE_TEXT_FOOTER.to_string(),
            },
            ..Default::default()
        },
        ips: if options.ips.is_empty() {
            vec!["10.0.0.1".to_string()]
        } else {
            options.ips.clone()
        },
    }
}

fn missing(what: &str, id: &str) -> Error {
    Error::not_found(format!("{} {}", what, id))
}

fn domain_mut<'a>(inner: &'a mut Inner, name: &str) -> Result<&'a mut FakeDomain> {
    inner
        .domains
        .get_mut(name)
        .ok_or_else(|| missing("domain", name))
}

#[async_trait]
impl MailgunApi for RecordingApi {
    async fn create_domain(
        &self,
        name: &str,
        options: &CreateDomainOptions,
    ) -> Result<DomainResponse> {
        let mut inner = self.record(Call::CreateDomain(name.to_string()))?;
        if inner.domains.contains_key(name) {
            return Err(Error::provider("recording", "domain already exists"));
        }
        let domain = new_domain(name, options);
        let response = domain.response.clone();
        inner.domains.insert(name.to_string(), domain);
        Ok(response)
    }

    async fn get_domain(&self, name: &str) -> Result<DomainResponse> {
        let latency = self.inner.lock().unwrap().domain_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.record(Call::GetDomain(name.to_string()))?;
        if let Some(domain) = inner.domains.get(name) {
            return Ok(domain.response.clone());
        }
        if let Some((response, remaining)) = inner.ghosts.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(response.clone());
            }
        }
        Err(missing("domain", name))
    }

    async fn update_domain(&self, name: &str, options: &UpdateDomainOptions) -> Result<()> {
        let mut inner = self.record(Call::UpdateDomain(name.to_string()))?;
        let domain = domain_mut(&mut inner, name)?;
        if let Some(spam_action) = options.spam_action {
            domain.response.domain.spam_action = spam_action;
        }
        if let Some(wildcard) = options.wildcard {
            domain.response.domain.wildcard = wildcard;
        }
        Ok(())
    }

    async fn delete_domain(&self, name: &str) -> Result<()> {
        let mut inner = self.record(Call::DeleteDomain(name.to_string()))?;
        let domain = inner
            .domains
            .remove(name)
            .ok_or_else(|| missing("domain", name))?;
        let linger = inner.linger_reads;
        if linger > 0 {
            inner.ghosts.insert(name.to_string(), (domain.response, linger));
        }
        Ok(())
    }

    async fn list_credentials(&self, domain: &str) -> Result<Vec<Credential>> {
        let mut inner = self.record(Call::ListCredentials(domain.to_string()))?;
        let domain = domain_mut(&mut inner, domain)?;
        Ok(domain.credentials.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn create_credential(&self, domain: &str, login: &str, password: &str) -> Result<()> {
        let mut inner = self.record(Call::CreateCredential {
            domain: domain.to_string(),
            login: login.to_string(),
        })?;
        let domain = domain_mut(&mut inner, domain)?;
        if domain.credentials.iter().any(|(c, _)| c.login == login) {
            return Err(Error::provider("recording", "credential already exists"));
        }
        domain
            .credentials
            .push((credential(login), password.to_string()));
        Ok(())
    }

    async fn change_credential_password(
        &self,
        domain: &str,
        login: &str,
        password: &str,
    ) -> Result<()> {
        let mut inner = self.record(Call::ChangeCredentialPassword {
            domain: domain.to_string(),
            login: login.to_string(),
        })?;
        let domain = domain_mut(&mut inner, domain)?;
        let (_, stored) = domain
            .credentials
            .iter_mut()
            .find(|(c, _)| c.login == login)
            .ok_or_else(|| missing("credential", login))?;
        *stored = password.to_string();
        Ok(())
    }

    async fn delete_credential(&self, domain: &str, login: &str) -> Result<()> {
        let mut inner = self.record(Call::DeleteCredential {
            domain: domain.to_string(),
            login: login.to_string(),
        })?;
        let domain = domain_mut(&mut inner, domain)?;
        let before = domain.credentials.len();
        domain.credentials.retain(|(c, _)| c.login != login);
        if domain.credentials.len() == before {
            return Err(missing("credential", login));
        }
        Ok(())
    }

    async fn get_domain_connection(&self, domain: &str) -> Result<DomainConnection> {
        let mut inner = self.record(Call::GetConnection(domain.to_string()))?;
        Ok(domain_mut(&mut inner, domain)?.connection)
    }

    async fn update_domain_connection(
        &self,
        domain: &str,
        connection: &DomainConnection,
    ) -> Result<()> {
        let mut inner = self.record(Call::UpdateConnection(domain.to_string()))?;
        domain_mut(&mut inner, domain)?.connection = *connection;
        Ok(())
    }

    async fn get_domain_tracking(&self, domain: &str) -> Result<DomainTracking> {
        let mut inner = self.record(Call::GetTracking(domain.to_string()))?;
        Ok(domain_mut(&mut inner, domain)?.tracking.clone())
    }

    async fn update_open_tracking(&self, domain: &str, active: bool) -> Result<()> {
        let mut inner = self.record(Call::UpdateOpenTracking(domain.to_string()))?;
        domain_mut(&mut inner, domain)?.tracking.open.active = active;
        Ok(())
    }

    async fn update_click_tracking(&self, domain: &str, active: bool) -> Result<()> {
        let mut inner = self.record(Call::UpdateClickTracking(domain.to_string()))?;
        domain_mut(&mut inner, domain)?.tracking.click.active = active;
        Ok(())
    }

    async fn update_unsubscribe_tracking(
        &self,
        domain: &str,
        settings: &UnsubscribeTracking,
    ) -> Result<()> {
        let mut inner = self.record(Call::UpdateUnsubscribeTracking(domain.to_string()))?;
        domain_mut(&mut inner, domain)?.tracking.unsubscribe = settings.clone();
        Ok(())
    }

    async fn list_domain_ips(&self, domain: &str) -> Result<Vec<String>> {
        let mut inner = self.record(Call::ListIps(domain.to_string()))?;
        if inner.ip_failures > 0 {
            inner.ip_failures -= 1;
            return Err(Error::not_found(format!("ips for {} not ready", domain)));
        }
        Ok(domain_mut(&mut inner, domain)?.ips.clone())
    }

    async fn create_route(&self, route: &RouteSpec) -> Result<Route> {
        let mut inner = self.record(Call::CreateRoute)?;
        inner.next_route += 1;
        let created = Route {
            id: format!("route{:04}", inner.next_route),
            priority: route.priority,
            description: route.description.clone(),
            expression: route.expression.clone(),
            actions: route.actions.clone(),
            created_at: "Wed, 15 Feb 2012 13:03:31 GMT".to_string(),
        };
        inner.routes.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_route(&self, id: &str) -> Result<Route> {
        let inner = self.record(Call::GetRoute(id.to_string()))?;
        inner.routes.get(id).cloned().ok_or_else(|| missing("route", id))
    }

    async fn update_route(&self, id: &str, route: &RouteSpec) -> Result<Route> {
        let mut inner = self.record(Call::UpdateRoute(id.to_string()))?;
        let inner = &mut *inner;
        let stored = inner.routes.get_mut(id).ok_or_else(|| missing("route", id))?;
        stored.priority = route.priority;
        stored.description = route.description.clone();
        stored.expression = route.expression.clone();
        stored.actions = route.actions.clone();
        if inner.sparse_route_echo {
            return Ok(Route {
                id: id.to_string(),
                ..Route::default()
            });
        }
        Ok(stored.clone())
    }

    async fn delete_route(&self, id: &str) -> Result<()> {
        let mut inner = self.record(Call::DeleteRoute(id.to_string()))?;
        inner
            .routes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| missing("route", id))
    }

    fn api_name(&self) -> &'static str {
        "recording"
    }
}

/// Client handle over `api` with default deadlines and retry ceilings
pub fn client(api: &Arc<RecordingApi>) -> ClientHandle {
    ClientHandle::with_settings(
        api.clone(),
        TimeoutConfig::default(),
        RetryConfig::default(),
    )
}
