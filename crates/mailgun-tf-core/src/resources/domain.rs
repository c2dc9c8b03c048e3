// # mailgun_domain
//
// Sending domain with SMTP credentials, tracking toggles, connection policy
// and the DNS records Mailgun expects the operator to publish.
//
// ## Lifecycle
//
// - Create: create-domain, one create per credential, unsubscribe/open/click
//   tracking, connection policy, then a full read
// - Read: domain + DNS records, connection, tracking, IPs (retried while the
//   new domain propagates), credentials
// - Update: one call per changed concern only, then a full read
// - Delete: a single delete-domain call
//
// ## Known limitation
//
// Creation is not transactional. If a step after create-domain fails, the
// remote domain exists but is only partially configured and nothing is
// rolled back; the error names the failing step and a later apply has to
// reconcile the domain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ResultExt;
use crate::reconcile::{
    CredentialEntry, Secret, apply_credential_changes, credentials_changed,
    plan_credential_changes,
};
use crate::retry::retry;
use crate::traits::{
    ClientHandle, CreateDomainOptions, DnsRecord, DomainConnection, DomainTracking, MailgunApi,
    Resource, SpamAction, UnsubscribeTracking, UpdateDomainOptions,
};
use crate::{Error, Result};

/// Resource type name
pub const DOMAIN_TYPE: &str = "mailgun_domain";

/// DKIM key size used when none is configured (and on import)
pub const DEFAULT_DKIM_KEY_SIZE: u32 = 1024;

/// Default HTML unsubscribe footer
pub const DEFAULT_UNSUBSCRIBE_HTML_FOOTER: &str =
    "\n<br>\n<p><a href=\"%unsubscribe_url%\">unsubscribe</a></p>\n";

/// Default plain-text unsubscribe footer
pub const DEFAULT_UNSUBSCRIBE_TEXT_FOOTER: &str = "\n\nTo unsubscribe click: <%unsubscribe_url%>\n\n";

fn default_dkim_key_size() -> u32 {
    DEFAULT_DKIM_KEY_SIZE
}

fn default_html_footer() -> String {
    DEFAULT_UNSUBSCRIBE_HTML_FOOTER.to_string()
}

fn default_text_footer() -> String {
    DEFAULT_UNSUBSCRIBE_TEXT_FOOTER.to_string()
}

/// Open/click/unsubscribe tracking as flat attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Insert an open-tracking pixel
    #[serde(default)]
    pub open_tracking_settings_active: bool,

    /// Rewrite links for click tracking
    #[serde(default)]
    pub click_tracking_settings_active: bool,

    /// Insert unsubscribe links
    #[serde(default)]
    pub unsubscribe_tracking_settings_active: bool,

    /// HTML unsubscribe footer
    #[serde(default = "default_html_footer")]
    pub unsubscribe_tracking_settings_html_footer: String,

    /// Plain-text unsubscribe footer
    #[serde(default = "default_text_footer")]
    pub unsubscribe_tracking_settings_text_footer: String,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            open_tracking_settings_active: false,
            click_tracking_settings_active: false,
            unsubscribe_tracking_settings_active: false,
            unsubscribe_tracking_settings_html_footer: default_html_footer(),
            unsubscribe_tracking_settings_text_footer: default_text_footer(),
        }
    }
}

impl TrackingSettings {
    /// Unsubscribe settings in API form
    pub fn unsubscribe(&self) -> UnsubscribeTracking {
        UnsubscribeTracking {
            active: self.unsubscribe_tracking_settings_active,
            html_footer: self.unsubscribe_tracking_settings_html_footer.clone(),
            text_footer: self.unsubscribe_tracking_settings_text_footer.clone(),
        }
    }

    fn from_remote(tracking: &DomainTracking) -> Self {
        Self {
            open_tracking_settings_active: tracking.open.active,
            click_tracking_settings_active: tracking.click.active,
            unsubscribe_tracking_settings_active: tracking.unsubscribe.active,
            unsubscribe_tracking_settings_html_footer: tracking.unsubscribe.html_footer.clone(),
            unsubscribe_tracking_settings_text_footer: tracking.unsubscribe.text_footer.clone(),
        }
    }
}

/// Desired configuration of a `mailgun_domain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name (identity, immutable)
    pub name: String,

    /// Spam filtering mode
    #[serde(default)]
    pub spam_action: SpamAction,

    /// Default SMTP password, only used at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_password: Option<Secret>,

    /// Accept mail for subdomains
    #[serde(default)]
    pub wildcard: bool,

    /// Make the domain its own DKIM authority (immutable)
    #[serde(default)]
    pub force_dkim_authority: bool,

    /// DKIM key size in bits (immutable)
    #[serde(default = "default_dkim_key_size")]
    pub dkim_key_size: u32,

    /// Dedicated IPs requested at creation; empty lets Mailgun assign them
    #[serde(default)]
    pub ips: Vec<String>,

    /// SMTP credentials
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,

    /// Tracking toggles
    #[serde(flatten)]
    pub tracking: TrackingSettings,

    /// Connection policy
    #[serde(flatten)]
    pub connection: DomainConnection,
}

impl DomainConfig {
    /// A configuration with every optional field at its default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spam_action: SpamAction::default(),
            smtp_password: None,
            wildcard: false,
            force_dkim_authority: false,
            dkim_key_size: DEFAULT_DKIM_KEY_SIZE,
            ips: Vec::new(),
            credentials: Vec::new(),
            tracking: TrackingSettings::default(),
            connection: DomainConnection::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_input("domain name cannot be empty"));
        }

        if !matches!(self.dkim_key_size, 1024 | 2048) {
            return Err(Error::invalid_input(format!(
                "dkim_key_size must be 1024 or 2048. Got: {}",
                self.dkim_key_size
            )));
        }

        for (i, credential) in self.credentials.iter().enumerate() {
            if credential.login.trim().is_empty() {
                return Err(Error::invalid_input("credential login cannot be empty"));
            }
            if self.credentials[..i]
                .iter()
                .any(|c| c.login == credential.login)
            {
                return Err(Error::invalid_input(format!(
                    "duplicate credential login: {}",
                    credential.login
                )));
            }
        }

        Ok(())
    }

    fn create_options(&self) -> CreateDomainOptions {
        CreateDomainOptions {
            smtp_password: self
                .smtp_password
                .as_ref()
                .filter(|p| !p.is_empty())
                .map(|p| p.expose().to_string()),
            spam_action: self.spam_action,
            wildcard: self.wildcard,
            force_dkim_authority: self.force_dkim_authority,
            dkim_key_size: self.dkim_key_size,
            ips: self.ips.clone(),
        }
    }
}

/// Observed state of a `mailgun_domain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainState {
    /// Remote identifier (the domain name)
    pub id: String,

    /// Domain name
    pub name: String,

    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,

    /// Default SMTP login
    #[serde(default)]
    pub smtp_login: String,

    /// Default SMTP password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_password: Option<Secret>,

    /// Spam filtering mode
    #[serde(default)]
    pub spam_action: SpamAction,

    /// Accept mail for subdomains
    #[serde(default)]
    pub wildcard: bool,

    /// Verification state
    #[serde(default)]
    pub state: String,

    /// DKIM authority flag (not returned by the API)
    #[serde(default)]
    pub force_dkim_authority: bool,

    /// DKIM key size (not returned by the API)
    #[serde(default = "default_dkim_key_size")]
    pub dkim_key_size: u32,

    /// Assigned IP addresses
    #[serde(default)]
    pub ips: Vec<String>,

    /// SMTP credentials present remotely
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,

    /// Tracking toggles
    #[serde(flatten)]
    pub tracking: TrackingSettings,

    /// Connection policy
    #[serde(flatten)]
    pub connection: DomainConnection,

    /// Records for inbound mail
    #[serde(default)]
    pub receiving_records: Vec<DnsRecord>,

    /// Records for outbound mail
    #[serde(default)]
    pub sending_records: Vec<DnsRecord>,
}

/// Fields a read cannot get from the API and has to carry over
struct Carried<'a> {
    credentials: &'a [CredentialEntry],
    smtp_password: Option<&'a Secret>,
    force_dkim_authority: bool,
    dkim_key_size: u32,
}

impl<'a> Carried<'a> {
    fn from_config(config: &'a DomainConfig) -> Self {
        Self {
            credentials: &config.credentials,
            smtp_password: config.smtp_password.as_ref(),
            force_dkim_authority: config.force_dkim_authority,
            dkim_key_size: config.dkim_key_size,
        }
    }

    fn from_state(state: Option<&'a DomainState>) -> Self {
        match state {
            Some(s) => Self {
                credentials: &s.credentials,
                smtp_password: s.smtp_password.as_ref(),
                force_dkim_authority: s.force_dkim_authority,
                dkim_key_size: s.dkim_key_size,
            },
            None => Self {
                credentials: &[],
                smtp_password: None,
                force_dkim_authority: false,
                dkim_key_size: DEFAULT_DKIM_KEY_SIZE,
            },
        }
    }
}

/// The `mailgun_domain` resource kind
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainResource;

#[async_trait]
impl Resource for DomainResource {
    type Config = DomainConfig;
    type State = DomainState;

    fn type_name(&self) -> &'static str {
        DOMAIN_TYPE
    }

    fn id<'a>(&self, state: &'a DomainState) -> &'a str {
        &state.id
    }

    fn requires_replacement(&self, prior: &DomainState, desired: &DomainConfig) -> Vec<&'static str> {
        let mut fields = Vec::new();

        if prior.name != desired.name {
            fields.push("name");
        }
        if prior.force_dkim_authority != desired.force_dkim_authority {
            fields.push("force_dkim_authority");
        }
        if prior.dkim_key_size != desired.dkim_key_size {
            fields.push("dkim_key_size");
        }
        if let Some(password) = desired.smtp_password.as_ref().filter(|p| !p.is_empty()) {
            if prior.smtp_password.as_ref() != Some(password) {
                fields.push("smtp_password");
            }
        }
        if !desired.ips.is_empty() && !same_members(&prior.ips, &desired.ips) {
            fields.push("ips");
        }

        fields
    }

    async fn create(&self, client: &ClientHandle, config: &DomainConfig) -> Result<DomainState> {
        config.validate()?;
        let api = client.api();

        info!("Creating mailgun domain: {}", config.name);

        let domain_name = client
            .with_deadline(client.timeouts().operation(), async {
                let response = api
                    .create_domain(&config.name, &config.create_options())
                    .await
                    .context("error creating mailgun domain")?;

                let domain_name = if response.domain.name.is_empty() {
                    config.name.clone()
                } else {
                    response.domain.name
                };

                if let Err(e) = configure_new_domain(api, &domain_name, config).await {
                    warn!(
                        "Domain {} exists but is only partially configured: {}",
                        domain_name, e
                    );
                    return Err(e);
                }

                Ok(domain_name)
            })
            .await?;

        info!("Created mailgun domain: {}", domain_name);
        read_domain(client, &domain_name, Carried::from_config(config)).await
    }

    async fn read(
        &self,
        client: &ClientHandle,
        id: &str,
        prior: Option<&DomainState>,
    ) -> Result<DomainState> {
        read_domain(client, id, Carried::from_state(prior)).await
    }

    async fn update(
        &self,
        client: &ClientHandle,
        prior: &DomainState,
        desired: &DomainConfig,
    ) -> Result<DomainState> {
        desired.validate()?;

        let replace = self.requires_replacement(prior, desired);
        if !replace.is_empty() {
            return Err(Error::invalid_input(format!(
                "cannot update {} in place, changed immutable fields: {}",
                prior.id,
                replace.join(", ")
            )));
        }

        info!("Updating mailgun domain: {}", prior.id);

        client
            .with_deadline(
                client.timeouts().operation(),
                apply_domain_changes(client.api(), &prior.id, prior, desired),
            )
            .await?;

        read_domain(client, &prior.id, Carried::from_config(desired)).await
    }

    async fn delete(&self, client: &ClientHandle, state: &DomainState) -> Result<()> {
        info!("Deleting mailgun domain: {}", state.id);

        client
            .with_deadline(
                client.timeouts().operation(),
                client.api().delete_domain(&state.id),
            )
            .await
            .context("error deleting mailgun domain")
    }

    async fn confirm_destroyed(&self, client: &ClientHandle, id: &str) -> Result<()> {
        let api = client.api();
        debug!("Waiting for destroyed domain {} to disappear", id);

        retry(
            &client.retry().destroy_confirmation(),
            || async move {
                match api.get_domain(id).await {
                    Ok(_) => {
                        debug!("Destroyed domain {} is still readable", id);
                        Err(Error::Other(format!("domain {id} still exists")))
                    }
                    Err(e) => {
                        debug!("Destroyed domain {} is gone: {}", id, e);
                        Ok(())
                    }
                }
            },
            |_| true,
        )
        .await
        .map_err(|e| Error::context("mailgun domain still exists after destroy", e.into_inner()))
    }
}

async fn configure_new_domain(
    api: &dyn MailgunApi,
    domain: &str,
    config: &DomainConfig,
) -> Result<()> {
    for credential in &config.credentials {
        api.create_credential(domain, &credential.login, credential.password.expose())
            .await
            .context("error creating mailgun credential")?;
    }

    api.update_unsubscribe_tracking(domain, &config.tracking.unsubscribe())
        .await
        .context("error updating mailgun unsubscribe tracking settings")?;

    api.update_open_tracking(domain, config.tracking.open_tracking_settings_active)
        .await
        .context("error updating mailgun open tracking settings")?;

    api.update_click_tracking(domain, config.tracking.click_tracking_settings_active)
        .await
        .context("error updating mailgun click tracking settings")?;

    api.update_domain_connection(domain, &config.connection)
        .await
        .context("error updating mailgun connection settings")?;

    Ok(())
}

async fn apply_domain_changes(
    api: &dyn MailgunApi,
    domain: &str,
    prior: &DomainState,
    desired: &DomainConfig,
) -> Result<()> {
    let old = &prior.tracking;
    let new = &desired.tracking;

    if old.unsubscribe() != new.unsubscribe() {
        api.update_unsubscribe_tracking(domain, &new.unsubscribe())
            .await
            .context("error updating mailgun unsubscribe tracking settings")?;
    }

    if old.open_tracking_settings_active != new.open_tracking_settings_active {
        api.update_open_tracking(domain, new.open_tracking_settings_active)
            .await
            .context("error updating mailgun open tracking settings")?;
    }

    if old.click_tracking_settings_active != new.click_tracking_settings_active {
        api.update_click_tracking(domain, new.click_tracking_settings_active)
            .await
            .context("error updating mailgun click tracking settings")?;
    }

    if prior.connection != desired.connection {
        api.update_domain_connection(domain, &desired.connection)
            .await
            .context("error updating mailgun connection settings")?;
    }

    let options = UpdateDomainOptions {
        spam_action: (prior.spam_action != desired.spam_action).then_some(desired.spam_action),
        wildcard: (prior.wildcard != desired.wildcard).then_some(desired.wildcard),
    };
    if !options.is_empty() {
        api.update_domain(domain, &options)
            .await
            .context("error updating mailgun domain")?;
    }

    if credentials_changed(&prior.credentials, &desired.credentials) {
        let plan = plan_credential_changes(&prior.credentials, &desired.credentials);
        debug!("Credential changes for {}: {} call(s)", domain, plan.len());
        apply_credential_changes(api, domain, &plan).await?;
    }

    Ok(())
}

async fn read_domain(client: &ClientHandle, id: &str, carried: Carried<'_>) -> Result<DomainState> {
    client
        .with_deadline(client.domain_read_deadline(), async {
            let api = client.api();
            debug!("Reading mailgun domain: {}", id);

            let response = api
                .get_domain(id)
                .await
                .context("error getting mailgun domain details")?;

            let connection = api
                .get_domain_connection(id)
                .await
                .context("error getting mailgun domain connection details")?;

            let tracking = api
                .get_domain_tracking(id)
                .await
                .context("error getting mailgun domain tracking details")?;

            let ips = fetch_domain_ips(client, id)
                .await
                .context("error getting mailgun domain ips")?;

            let credentials = api
                .list_credentials(id)
                .await
                .context("error getting mailgun credentials")?
                .into_iter()
                .map(|remote| {
                    let password = carried
                        .credentials
                        .iter()
                        .find(|c| c.login == remote.login)
                        .map(|c| c.password.clone())
                        .unwrap_or_default();
                    CredentialEntry {
                        login: remote.login,
                        password,
                        created_at: Some(remote.created_at),
                    }
                })
                .collect();

            let domain = response.domain;
            Ok(DomainState {
                id: id.to_string(),
                name: domain.name,
                created_at: domain.created_at,
                smtp_login: domain.smtp_login,
                smtp_password: Some(domain.smtp_password)
                    .filter(|p| !p.is_empty())
                    .map(Secret::new)
                    .or_else(|| carried.smtp_password.filter(|p| !p.is_empty()).cloned()),
                spam_action: domain.spam_action,
                wildcard: domain.wildcard,
                state: domain.state,
                force_dkim_authority: carried.force_dkim_authority,
                dkim_key_size: carried.dkim_key_size,
                ips,
                credentials,
                tracking: TrackingSettings::from_remote(&tracking),
                connection,
                receiving_records: response.receiving_dns_records,
                sending_records: response.sending_dns_records,
            })
        })
        .await
}

/// List a domain's IPs, retrying every error until the propagation ceiling
///
/// Right after creation the IP list is often not readable yet; any failure
/// inside the window is treated as transient and the last one is returned
/// once the ceiling has elapsed.
pub async fn fetch_domain_ips(client: &ClientHandle, domain: &str) -> Result<Vec<String>> {
    let api = client.api();
    debug!("Fetching ips for {}", domain);

    let ips = retry(
        &client.retry().ip_propagation(),
        || api.list_domain_ips(domain),
        |_| true,
    )
    .await?;

    debug!("Fetched {} ip(s) for {}", ips.len(), domain);
    Ok(ips)
}

fn same_members(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}
