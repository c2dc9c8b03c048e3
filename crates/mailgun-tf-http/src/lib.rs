// # Mailgun HTTP Client
//
// `MailgunApi` implementation over the Mailgun v3 REST API.
//
// ## Behaviour
//
// - One HTTP request per trait call, except credential listing which follows
//   pagination until every page is read
// - No retry, backoff or caching: the resource handlers own those decisions
// - 30 second per-request timeout on the underlying client
// - Status codes map onto the core error taxonomy (401/403, 404, 429, 5xx)
//
// ## Security
//
// - Basic auth as `api:<key>`; the key never appears in logs or `Debug`
// - Construction fails fast on an empty key
//
// ## API Reference
//
// - Domains: `/domains`, `/domains/{domain}`
// - Credentials: `/domains/{domain}/credentials[/{login}]`
// - Connection: `/domains/{domain}/connection`
// - Tracking: `/domains/{domain}/tracking[/open|click|unsubscribe]`
// - IPs: `/domains/{domain}/ips`
// - Routes: `/routes`, `/routes/{id}`

use async_trait::async_trait;
use mailgun_tf_core::config::ProviderConfig;
use mailgun_tf_core::traits::{
    ClientHandle, CreateDomainOptions, Credential, DomainConnection, DomainResponse,
    DomainTracking, MailgunApi, Route, RouteSpec, TrackingToggle, UnsubscribeTracking,
    UpdateDomainOptions,
};
use mailgun_tf_core::{Error, Result};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size used when listing credentials
const CREDENTIALS_PAGE_SIZE: usize = 100;

const PROVIDER: &str = "mailgun";

/// Mailgun v3 API client
pub struct MailgunClient {
    /// API key, never logged
    api_key: String,

    /// API base URL without trailing slash
    base_url: String,

    client: reqwest::Client,
}

impl std::fmt::Debug for MailgunClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailgunClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl MailgunClient {
    /// Create a client for `base_url` (e.g. `https://api.mailgun.net/v3`)
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("Mailgun API key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a client from validated provider configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(config.api_key.clone(), config.api_base.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.post(self.url(path)))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.put(self.url(path)))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.delete(self.url(path)))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth("api", Some(&self.api_key))
    }

    /// Send a request and map non-success statuses to errors
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(DEFAULT_HTTP_TIMEOUT)
            } else {
                Error::http(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["message"].as_str().map(str::to_string))
            .unwrap_or(body);

        Err(match status.as_u16() {
            401 | 403 => Error::auth(format!(
                "Invalid API key or insufficient permissions. Status: {}",
                status
            )),
            404 => Error::not_found(format!("{}: {}", what, message)),
            429 => Error::rate_limited(format!(
                "Rate limit exceeded. Please retry later. Status: {}",
                status
            )),
            500..=599 => Error::provider(
                PROVIDER,
                format!("Mailgun server error (transient): {} - {}", status, message),
            ),
            _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", what, status, message)),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.send(request, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))
    }

    async fn send_unit(&self, request: RequestBuilder, what: &str) -> Result<()> {
        self.send(request, what).await.map(|_| ())
    }
}

#[derive(Deserialize)]
struct CredentialsPage {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    items: Vec<Credential>,
}

#[derive(Deserialize)]
struct ConnectionEnvelope {
    connection: DomainConnection,
}

#[derive(Deserialize)]
struct TrackingEnvelope {
    tracking: WireTracking,
}

#[derive(Deserialize)]
struct WireTracking {
    #[serde(default)]
    click: WireToggle,
    #[serde(default)]
    open: WireToggle,
    #[serde(default)]
    unsubscribe: WireUnsubscribe,
}

#[derive(Default, Deserialize)]
struct WireToggle {
    #[serde(default)]
    active: Value,
}

#[derive(Default, Deserialize)]
struct WireUnsubscribe {
    #[serde(default)]
    active: Value,
    #[serde(default)]
    html_footer: String,
    #[serde(default)]
    text_footer: String,
}

/// Tracking flags come back as booleans or strings (`"htmlonly"`, `"yes"`)
fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !matches!(s.as_str(), "" | "false" | "no"),
        _ => false,
    }
}

impl From<WireTracking> for DomainTracking {
    fn from(wire: WireTracking) -> Self {
        Self {
            click: TrackingToggle {
                active: flag(&wire.click.active),
            },
            open: TrackingToggle {
                active: flag(&wire.open.active),
            },
            unsubscribe: UnsubscribeTracking {
                active: flag(&wire.unsubscribe.active),
                html_footer: wire.unsubscribe.html_footer,
                text_footer: wire.unsubscribe.text_footer,
            },
        }
    }
}

#[derive(Deserialize)]
struct IpsResponse {
    #[serde(default)]
    items: Vec<String>,
}

#[derive(Deserialize)]
struct RouteEnvelope {
    route: Route,
}

fn route_form(route: &RouteSpec) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("priority", route.priority.to_string()),
        ("description", route.description.clone()),
        ("expression", route.expression.clone()),
    ];
    form.extend(route.actions.iter().map(|a| ("action", a.clone())));
    form
}

#[async_trait]
impl MailgunApi for MailgunClient {
    async fn create_domain(
        &self,
        name: &str,
        options: &CreateDomainOptions,
    ) -> Result<DomainResponse> {
        debug!("POST /domains ({})", name);

        let mut form = vec![
            ("name", name.to_string()),
            ("spam_action", options.spam_action.to_string()),
            ("wildcard", options.wildcard.to_string()),
            ("force_dkim_authority", options.force_dkim_authority.to_string()),
            ("dkim_key_size", options.dkim_key_size.to_string()),
        ];
        if let Some(password) = &options.smtp_password {
            form.push(("smtp_password", password.clone()));
        }
        if !options.ips.is_empty() {
            form.push(("ips", options.ips.join(",")));
        }

        let response: DomainResponse = self
            .send_json(self.post("/domains").form(&form), "create domain")
            .await?;
        info!("Mailgun accepted domain {}", response.domain.name);
        Ok(response)
    }

    async fn get_domain(&self, name: &str) -> Result<DomainResponse> {
        debug!("GET /domains/{}", name);
        self.send_json(self.get(&format!("/domains/{}", name)), "get domain")
            .await
    }

    async fn update_domain(&self, name: &str, options: &UpdateDomainOptions) -> Result<()> {
        debug!("PUT /domains/{}", name);

        let mut form = Vec::new();
        if let Some(spam_action) = options.spam_action {
            form.push(("spam_action", spam_action.to_string()));
        }
        if let Some(wildcard) = options.wildcard {
            form.push(("wildcard", wildcard.to_string()));
        }

        self.send_unit(
            self.put(&format!("/domains/{}", name)).form(&form),
            "update domain",
        )
        .await
    }

    async fn delete_domain(&self, name: &str) -> Result<()> {
        debug!("DELETE /domains/{}", name);
        self.send_unit(self.delete(&format!("/domains/{}", name)), "delete domain")
            .await
    }

    async fn list_credentials(&self, domain: &str) -> Result<Vec<Credential>> {
        let path = format!("/domains/{}/credentials", domain);
        let mut credentials = Vec::new();

        loop {
            let skip = credentials.len();
            debug!("GET {} (skip {})", path, skip);

            let page: CredentialsPage = self
                .send_json(
                    self.get(&path).query(&[
                        ("limit", CREDENTIALS_PAGE_SIZE.to_string()),
                        ("skip", skip.to_string()),
                    ]),
                    "list credentials",
                )
                .await?;

            let received = page.items.len();
            credentials.extend(page.items);

            if received < CREDENTIALS_PAGE_SIZE || credentials.len() >= page.total_count {
                break;
            }
        }

        Ok(credentials)
    }

    async fn create_credential(&self, domain: &str, login: &str, password: &str) -> Result<()> {
        debug!("POST /domains/{}/credentials ({})", domain, login);
        self.send_unit(
            self.post(&format!("/domains/{}/credentials", domain))
                .form(&[("login", login), ("password", password)]),
            "create credential",
        )
        .await
    }

    async fn change_credential_password(
        &self,
        domain: &str,
        login: &str,
        password: &str,
    ) -> Result<()> {
        debug!("PUT /domains/{}/credentials/{}", domain, login);
        self.send_unit(
            self.put(&format!("/domains/{}/credentials/{}", domain, login))
                .form(&[("password", password)]),
            "change credential password",
        )
        .await
    }

    async fn delete_credential(&self, domain: &str, login: &str) -> Result<()> {
        debug!("DELETE /domains/{}/credentials/{}", domain, login);
        self.send_unit(
            self.delete(&format!("/domains/{}/credentials/{}", domain, login)),
            "delete credential",
        )
        .await
    }

    async fn get_domain_connection(&self, domain: &str) -> Result<DomainConnection> {
        debug!("GET /domains/{}/connection", domain);
        let envelope: ConnectionEnvelope = self
            .send_json(
                self.get(&format!("/domains/{}/connection", domain)),
                "get connection settings",
            )
            .await?;
        Ok(envelope.connection)
    }

    async fn update_domain_connection(
        &self,
        domain: &str,
        connection: &DomainConnection,
    ) -> Result<()> {
        debug!("PUT /domains/{}/connection", domain);
        self.send_unit(
            self.put(&format!("/domains/{}/connection", domain)).form(&[
                ("require_tls", connection.require_tls.to_string()),
                ("skip_verification", connection.skip_verification.to_string()),
            ]),
            "update connection settings",
        )
        .await
    }

    async fn get_domain_tracking(&self, domain: &str) -> Result<DomainTracking> {
        debug!("GET /domains/{}/tracking", domain);
        let envelope: TrackingEnvelope = self
            .send_json(
                self.get(&format!("/domains/{}/tracking", domain)),
                "get tracking settings",
            )
            .await?;
        Ok(envelope.tracking.into())
    }

    async fn update_open_tracking(&self, domain: &str, active: bool) -> Result<()> {
        debug!("PUT /domains/{}/tracking/open", domain);
        self.send_unit(
            self.put(&format!("/domains/{}/tracking/open", domain))
                .form(&[("active", active.to_string())]),
            "update open tracking",
        )
        .await
    }

    async fn update_click_tracking(&self, domain: &str, active: bool) -> Result<()> {
        debug!("PUT /domains/{}/tracking/click", domain);
        self.send_unit(
            self.put(&format!("/domains/{}/tracking/click", domain))
                .form(&[("active", active.to_string())]),
            "update click tracking",
        )
        .await
    }

    async fn update_unsubscribe_tracking(
        &self,
        domain: &str,
        settings: &UnsubscribeTracking,
    ) -> Result<()> {
        debug!("PUT /domains/{}/tracking/unsubscribe", domain);
        self.send_unit(
            self.put(&format!("/domains/{}/tracking/unsubscribe", domain))
                .form(&[
                    ("active", settings.active.to_string()),
                    ("html_footer", settings.html_footer.clone()),
                    ("text_footer", settings.text_footer.clone()),
                ]),
            "update unsubscribe tracking",
        )
        .await
    }

    async fn list_domain_ips(&self, domain: &str) -> Result<Vec<String>> {
        debug!("GET /domains/{}/ips", domain);
        let response: IpsResponse = self
            .send_json(self.get(&format!("/domains/{}/ips", domain)), "list domain ips")
            .await?;
        Ok(response.items)
    }

    async fn create_route(&self, route: &RouteSpec) -> Result<Route> {
        debug!("POST /routes");
        let envelope: RouteEnvelope = self
            .send_json(self.post("/routes").form(&route_form(route)), "create route")
            .await?;
        info!("Mailgun accepted route {}", envelope.route.id);
        Ok(envelope.route)
    }

    async fn get_route(&self, id: &str) -> Result<Route> {
        debug!("GET /routes/{}", id);
        let envelope: RouteEnvelope = self
            .send_json(self.get(&format!("/routes/{}", id)), "get route")
            .await?;
        Ok(envelope.route)
    }

    async fn update_route(&self, id: &str, route: &RouteSpec) -> Result<Route> {
        debug!("PUT /routes/{}", id);
        // The update response carries the route fields at the top level
        self.send_json(
            self.put(&format!("/routes/{}", id)).form(&route_form(route)),
            "update route",
        )
        .await
    }

    async fn delete_route(&self, id: &str) -> Result<()> {
        debug!("DELETE /routes/{}", id);
        self.send_unit(self.delete(&format!("/routes/{}", id)), "delete route")
            .await
    }

    fn api_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Build the client handle the resource handlers run with
///
/// Validates the configuration (after environment fallback has been applied
/// by the caller) and wraps an HTTP client with its timeouts and retry
/// ceilings.
pub fn configure(config: &ProviderConfig) -> Result<ClientHandle> {
    config.validate()?;
    let client = MailgunClient::from_config(config)?;
    info!("Configured Mailgun client for {} ({})", config.domain, config.api_base);
    Ok(ClientHandle::new(Arc::new(client), config))
}
