//! Identity and SSO connection resources.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const SSO_CONNECTION_TYPE: &str = "sso_connection";

/// A human identity known to the tenant's SSO connection.
///
/// `email` and `username` are independently optional. Absence is kept
/// distinct from an empty string all the way through matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IdentityResource", into = "IdentityResource")]
pub struct Identity {
    /// Opaque, immutable primary key.
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub active: Option<bool>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            username: None,
            display_name: None,
            active: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Best human-readable label for log lines.
    pub fn label(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "username: {}, email: {}",
            self.username.as_deref().unwrap_or("-"),
            self.email.as_deref().unwrap_or("-")
        )
    }
}

/// JSON:API document of a user as served by the SSO connection listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityResource {
    id: String,
    #[serde(rename = "type", default = "user_type")]
    resource_type: String,
    #[serde(default)]
    attributes: Option<IdentityAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IdentityAttributes {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    active: Option<bool>,
}

fn user_type() -> String {
    super::USER_TYPE.to_string()
}

impl From<IdentityResource> for Identity {
    fn from(resource: IdentityResource) -> Self {
        let attributes = resource.attributes.unwrap_or_default();
        Self {
            id: resource.id,
            email: attributes.email,
            username: attributes.username,
            display_name: attributes.name,
            active: attributes.active,
        }
    }
}

impl From<Identity> for IdentityResource {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            resource_type: user_type(),
            attributes: Some(IdentityAttributes {
                name: identity.display_name,
                email: identity.email,
                username: identity.username,
                active: identity.active,
            }),
        }
    }
}

/// The tenant's single-sign-on connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SsoConnectionResource", into = "SsoConnectionResource")]
pub struct SsoConnection {
    pub id: String,
    pub name: Option<String>,
}

impl SsoConnection {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SsoConnectionResource {
    id: String,
    #[serde(rename = "type", default)]
    resource_type: Option<String>,
    #[serde(default)]
    attributes: Option<SsoConnectionAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SsoConnectionAttributes {
    #[serde(default)]
    name: Option<String>,
}

impl From<SsoConnectionResource> for SsoConnection {
    fn from(resource: SsoConnectionResource) -> Self {
        Self {
            id: resource.id,
            name: resource.attributes.and_then(|attributes| attributes.name),
        }
    }
}

impl From<SsoConnection> for SsoConnectionResource {
    fn from(connection: SsoConnection) -> Self {
        Self {
            id: connection.id,
            resource_type: Some(SSO_CONNECTION_TYPE.to_string()),
            attributes: Some(SsoConnectionAttributes {
                name: connection.name,
            }),
        }
    }
}
