//! Per-identity working state of one reconciliation run.

use std::collections::BTreeMap;

use crate::model::{GroupMembership, Identity, OrgMembership};

/// Records keyed by the source identity's matching key.
///
/// Ordered, so the apply phase visits identities in ascending key order.
pub type CorrespondenceMap = BTreeMap<String, CorrespondenceRecord>;

/// A source identity, its membership snapshot and, once found, its
/// provisioned counterpart.
///
/// Created by the scan phase, completed by the match phase and only read by
/// the apply phase. Nothing outlives the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrespondenceRecord {
    /// Username or email, per matching policy.
    pub source_key: String,
    pub source_id: String,
    pub source_name: Option<String>,
    /// The authoritative group membership (first one listed), if any.
    pub group_membership: Option<GroupMembership>,
    pub org_memberships: Vec<OrgMembership>,
    pub counterpart: Option<ProvisionedCounterpart>,
}

impl CorrespondenceRecord {
    pub fn new(
        source_key: impl Into<String>,
        source: &Identity,
        group_membership: Option<GroupMembership>,
        org_memberships: Vec<OrgMembership>,
    ) -> Self {
        Self {
            source_key: source_key.into(),
            source_id: source.id.clone(),
            source_name: source.display_name.clone(),
            group_membership,
            org_memberships,
            counterpart: None,
        }
    }

    /// Only matched records are ever acted upon.
    pub fn is_matched(&self) -> bool {
        self.counterpart.is_some()
    }
}

/// The provisioned identity a source identity was matched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedCounterpart {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Existing group membership, decides update versus create.
    pub group_membership_id: Option<String>,
    /// How many identities matched; the first one was taken.
    pub candidates: usize,
}

impl ProvisionedCounterpart {
    pub fn new(identity: &Identity, group_membership_id: Option<String>, candidates: usize) -> Self {
        Self {
            id: identity.id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            group_membership_id,
            candidates,
        }
    }

    pub fn label(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.id)
    }
}
