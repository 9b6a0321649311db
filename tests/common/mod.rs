//! Shared fixtures for the integration suites.
//!
//! Every suite drives a seeded [`InMemoryDirectory`] tenant unless it is
//! testing the HTTP transport itself.

#![allow(dead_code)]

use sso_membership::config::{MatchingPolicy, ReconcileConfig};
use sso_membership::model::{Identity, Ref, SsoConnection};
use sso_membership::transport::InMemoryDirectory;

pub const GROUP_ID: &str = "3f2b1c9e-8a7d-4e6f-9b0a-1c2d3e4f5a6b";
pub const CONNECTION_ID: &str = "c0ffee00-0000-4000-8000-000000000001";
pub const SOURCE_DOMAIN: &str = "example.com";
pub const SSO_DOMAIN: &str = "sso.example.com";

pub fn admin() -> Ref {
    Ref::new("role-admin", "group_role").named("admin")
}

pub fn viewer() -> Ref {
    Ref::new("role-viewer", "group_role").named("viewer")
}

pub fn collaborator() -> Ref {
    Ref::new("role-collaborator", "org_role").named("collaborator")
}

pub fn org_admin() -> Ref {
    Ref::new("role-org-admin", "org_role").named("org admin")
}

pub fn org(id: &str) -> Ref {
    Ref::new(id, "org").named(format!("Org {id}"))
}

pub fn group() -> Ref {
    Ref::new(GROUP_ID, "group").named("Acme")
}

/// Pre-migration identity whose username is its email.
pub fn source_identity(id: &str, email: &str) -> Identity {
    Identity::new(id)
        .with_email(email)
        .with_username(email)
        .with_active(true)
}

/// SSO-provisioned identity keyed by email.
pub fn provisioned_identity(id: &str, email: &str) -> Identity {
    Identity::new(id).with_email(email).with_active(true)
}

pub fn email_policy() -> ReconcileConfig {
    ReconcileConfig::new(SOURCE_DOMAIN, SSO_DOMAIN, MatchingPolicy::default())
}

/// A tenant group with one SSO connection and no identities.
pub async fn tenant() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    directory.add_group(GROUP_ID, "Acme").await;
    directory
        .add_sso_connection(
            GROUP_ID,
            SsoConnection {
                id: CONNECTION_ID.to_string(),
                name: Some("Okta".to_string()),
            },
        )
        .await;
    directory
}

/// Sorted org ids and role ids of a user's org memberships.
pub async fn org_grants(directory: &InMemoryDirectory, user_id: &str) -> Vec<(String, String)> {
    let mut grants: Vec<(String, String)> = directory
        .org_memberships_of(GROUP_ID, user_id)
        .await
        .into_iter()
        .map(|m| (m.org.id, m.role.id))
        .collect();
    grants.sort();
    grants
}
