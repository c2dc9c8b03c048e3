//! Credential list reconciliation
//!
//! Turns an (old, new) pair of SMTP credential lists into the smallest set
//! of remote calls that makes the domain's logins equal the new list:
//!
//! 1. every old login missing from the new list is deleted, and every old
//!    login still present gets a password change when the new password is
//!    non-empty and differs;
//! 2. every new login missing from the old list is created.
//!
//! All operations on old entries come before any create, so a delete never
//! races a create for the same login. An empty new password always means
//! "leave the password alone".

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResultExt;
use crate::traits::MailgunApi;
use crate::Result;

/// A string that must never show up in logs or `Debug` output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty (meaning "not set")
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("<REDACTED>")
        }
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One SMTP credential of a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// Login, unique within the domain
    pub login: String,

    /// Password; empty means "not managed"
    #[serde(default)]
    pub password: Secret,

    /// Creation timestamp, only known after a read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl CredentialEntry {
    /// A credential as written in configuration
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: Secret::new(password),
            created_at: None,
        }
    }
}

/// A single remote credential call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOp {
    /// Change the password of an existing login
    ChangePassword {
        /// Login to change
        login: String,
        /// New password
        password: Secret,
    },
    /// Delete a login
    Delete {
        /// Login to delete
        login: String,
    },
    /// Create a login
    Create {
        /// Login to create
        login: String,
        /// Initial password
        password: Secret,
    },
}

/// Whether the managed part (login, password) of two lists differs
pub fn credentials_changed(old: &[CredentialEntry], new: &[CredentialEntry]) -> bool {
    old.len() != new.len()
        || old
            .iter()
            .zip(new)
            .any(|(o, n)| o.login != n.login || o.password != n.password)
}

/// Compute the calls needed to move from `old` to `new`
pub fn plan_credential_changes(
    old: &[CredentialEntry],
    new: &[CredentialEntry],
) -> Vec<CredentialOp> {
    let mut plan = Vec::new();

    for previous in old {
        match new.iter().find(|c| c.login == previous.login) {
            Some(wanted) => {
                if wanted.password != previous.password && !wanted.password.is_empty() {
                    plan.push(CredentialOp::ChangePassword {
                        login: previous.login.clone(),
                        password: wanted.password.clone(),
                    });
                }
            }
            None => plan.push(CredentialOp::Delete {
                login: previous.login.clone(),
            }),
        }
    }

    for wanted in new {
        if !old.iter().any(|c| c.login == wanted.login) {
            plan.push(CredentialOp::Create {
                login: wanted.login.clone(),
                password: wanted.password.clone(),
            });
        }
    }

    plan
}

/// Execute a plan in order, stopping at the first failure
pub async fn apply_credential_changes(
    api: &dyn MailgunApi,
    domain: &str,
    plan: &[CredentialOp],
) -> Result<()> {
    for op in plan {
        match op {
            CredentialOp::ChangePassword { login, password } => {
                debug!("Changing password of credential {} on {}", login, domain);
                api.change_credential_password(domain, login, password.expose())
                    .await
                    .context("error updating mailgun credential password")?;
            }
            CredentialOp::Delete { login } => {
                debug!("Deleting credential {} on {}", login, domain);
                api.delete_credential(domain, login)
                    .await
                    .context("error deleting mailgun credential")?;
            }
            CredentialOp::Create { login, password } => {
                debug!("Creating credential {} on {}", login, domain);
                api.create_credential(domain, login, password.expose())
                    .await
                    .context("error creating mailgun credential")?;
            }
        }
    }

    Ok(())
}
