//! Resource addresses (`<type>.<name>`)

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Local address of a managed resource, e.g. `mailgun_domain.main`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    /// Resource type name
    pub resource_type: String,
    /// Local name, unique per type
    pub name: String,
}

impl ResourceAddress {
    /// Build an address from its parts
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl FromStr for ResourceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource_type, name) = s.split_once('.').ok_or_else(|| {
            Error::invalid_input(format!("resource address must be <type>.<name>, got {s:?}"))
        })?;

        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };
        if !valid(resource_type) || !valid(name) {
            return Err(Error::invalid_input(format!("invalid resource address {s:?}")));
        }

        Ok(Self::new(resource_type, name))
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let address: ResourceAddress = "mailgun_domain.example".parse().unwrap();
        assert_eq!(address.resource_type, "mailgun_domain");
        assert_eq!(address.name, "example");
        assert_eq!(address.to_string(), "mailgun_domain.example");
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        for bad in ["mailgun_domain", ".x", "mailgun_domain.", "a.b.c", "a.b c"] {
            assert!(bad.parse::<ResourceAddress>().is_err(), "{bad} should be rejected");
        }
    }
}
