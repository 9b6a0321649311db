//! Three-phase membership reconciliation.
//!
//! 1. **Scan** collects every source-domain identity with its group and org
//!    membership snapshot. Any fetch failure here is fatal.
//! 2. **Match** looks up each source identity's provisioned counterpart and
//!    that counterpart's existing group membership.
//! 3. **Apply** aligns the counterpart's group role with the source's, then
//!    replaces all of its org memberships with copies of the source's.
//!
//! Phases run strictly one after the other and requests are issued one at a
//! time. Apply failures are logged and counted per sub-step; the run always
//! completes. A `409` answer means the target state already holds and is
//! never logged as an error.

use log::{debug, error, info, warn};

use super::record::{CorrespondenceMap, CorrespondenceRecord, ProvisionedCounterpart};
use super::summary::ReconcileSummary;
use crate::config::ReconcileConfig;
use crate::directory::{DirectoryClient, WriteOutcome};
use crate::error::{FetchError, ReconcileError};
use crate::matching::{counterpart_identifier, find_counterpart, is_source_identity, matching_key};
use crate::model::Identity;
use crate::transport::DirectoryTransport;

/// Reconciles memberships of one tenant group.
#[derive(Debug)]
pub struct MembershipReconciler<'a, T> {
    client: &'a DirectoryClient<T>,
    config: &'a ReconcileConfig,
}

impl<'a, T: DirectoryTransport> MembershipReconciler<'a, T> {
    pub fn new(client: &'a DirectoryClient<T>, config: &'a ReconcileConfig) -> Self {
        Self { client, config }
    }

    /// Fetch the tenant's identities and reconcile all of them.
    pub async fn run_for_group(&self, group_id: &str) -> Result<ReconcileSummary, FetchError> {
        let identities = self
            .client
            .fetch_identities(group_id)
            .await
            .map_err(|source| FetchError::Identities {
                group_id: group_id.to_string(),
                source,
            })?;
        self.run(group_id, &identities).await
    }

    /// Reconcile memberships across `identities`.
    ///
    /// `identities` is both the pool of source identities and the pool
    /// counterparts are searched in.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] only if the scan phase cannot read a source
    /// identity's memberships. Nothing has been written at that point.
    pub async fn run(
        &self,
        group_id: &str,
        identities: &[Identity],
    ) -> Result<ReconcileSummary, FetchError> {
        let mut records = self.scan(group_id, identities).await?;
        self.match_counterparts(group_id, identities, &mut records)
            .await;

        let mut summary = ReconcileSummary::from_records(&records);
        info!("Found {} Users to synchronize", summary.matched);

        self.apply(group_id, &records, &mut summary).await;

        info!("End synchronization of memberships");
        if summary.has_failures() {
            warn!("{}", summary);
        } else {
            info!("{}", summary);
        }
        Ok(summary)
    }

    /// Collect source-domain identities with their membership snapshots.
    pub async fn scan(
        &self,
        group_id: &str,
        identities: &[Identity],
    ) -> Result<CorrespondenceMap, FetchError> {
        let policy = self.config.policy;
        let mut records = CorrespondenceMap::new();

        for identity in identities {
            if !is_source_identity(identity, &self.config.source_domain, policy.match_by_username) {
                continue;
            }
            let Some(key) = matching_key(identity, policy) else {
                continue;
            };
            if records.contains_key(key) {
                warn!(
                    "Duplicate source user {} (id {}), keeping the first one",
                    key, identity.id
                );
                continue;
            }

            let group_membership = self
                .client
                .group_memberships(group_id, &identity.id)
                .await
                .map_err(|source| FetchError::GroupMemberships {
                    user: key.to_string(),
                    source,
                })?
                .into_iter()
                .next();
            if group_membership.is_none() {
                warn!("No existent Group membership found for user: {}", key);
            }

            let org_memberships = self
                .client
                .org_memberships(group_id, &identity.id)
                .await
                .map_err(|source| FetchError::OrgMemberships {
                    user: key.to_string(),
                    source,
                })?;

            records.insert(
                key.to_string(),
                CorrespondenceRecord::new(key, identity, group_membership, org_memberships),
            );
        }

        info!(
            "Found {} users on domain {}",
            records.len(),
            self.config.source_domain
        );
        Ok(records)
    }

    /// Resolve the provisioned counterpart of every record.
    ///
    /// Re-running over the same identities yields the same records: every
    /// record's counterpart is recomputed from scratch.
    pub async fn match_counterparts(
        &self,
        group_id: &str,
        identities: &[Identity],
        records: &mut CorrespondenceMap,
    ) {
        for (key, record) in records.iter_mut() {
            record.counterpart = None;

            let source_id = Some(record.source_id.as_str());
            let Some(found) = find_counterpart(key, source_id, identities, self.config) else {
                let identifier = counterpart_identifier(key, self.config);
                warn!(
                    "User {} not found in SSO with a corresponding User: {}",
                    key,
                    identifier.as_deref().unwrap_or("<none>")
                );
                continue;
            };

            let provisioned = found.identity;
            if found.is_ambiguous() {
                warn!(
                    "User {} matches {} provisioned users, using the first one (id {})",
                    key, found.candidates, provisioned.id
                );
            }

            let group_membership_id =
                match self.client.group_memberships(group_id, &provisioned.id).await {
                    Ok(memberships) => memberships.into_iter().next().map(|m| m.id),
                    Err(err) => {
                        warn!(
                            "No existent Group membership found for user {}: {}",
                            provisioned.label(),
                            err
                        );
                        None
                    }
                };

            info!("User: {} -> {}", key, provisioned.label());
            record.counterpart = Some(ProvisionedCounterpart::new(
                provisioned,
                group_membership_id,
                found.candidates,
            ));
        }
    }

    /// Apply group and org membership changes for every matched record.
    pub async fn apply(
        &self,
        group_id: &str,
        records: &CorrespondenceMap,
        summary: &mut ReconcileSummary,
    ) {
        let total = records.values().filter(|r| r.is_matched()).count();
        let matched = records
            .values()
            .filter_map(|record| record.counterpart.as_ref().map(|c| (record, c)));

        for (index, (record, counterpart)) in matched.enumerate() {
            info!(
                "Start synchronization of memberships {}/{} User: {}",
                index + 1,
                total,
                counterpart.label()
            );
            self.sync_group_membership(group_id, record, counterpart, summary)
                .await;
            self.sync_org_memberships(group_id, record, counterpart, summary)
                .await;
        }
    }

    async fn sync_group_membership(
        &self,
        group_id: &str,
        record: &CorrespondenceRecord,
        counterpart: &ProvisionedCounterpart,
        summary: &mut ReconcileSummary,
    ) {
        let Some(source) = &record.group_membership else {
            debug!(
                "User {} has no group membership to copy",
                record.source_key
            );
            return;
        };
        let user = counterpart.label();

        let result = match &counterpart.group_membership_id {
            Some(membership_id) => self
                .client
                .update_group_membership_role(group_id, membership_id, &source.role)
                .await
                .map_err(|err| ReconcileError::GroupRoleUpdate {
                    user: user.to_string(),
                    group: source.group.label().to_string(),
                    source: err,
                }),
            None => self
                .client
                .create_group_membership(&source.group, &source.role, &counterpart.id)
                .await
                .map_err(|err| ReconcileError::GroupMembershipCreate {
                    user: user.to_string(),
                    group: source.group.label().to_string(),
                    source: err,
                }),
        };

        match result {
            Ok(WriteOutcome::Applied) => {
                if counterpart.group_membership_id.is_some() {
                    info!("Updated Group membership of user {} to role {}", user, source.role);
                    summary.group_updated += 1;
                } else {
                    info!("Created Group membership of user {} with role {}", user, source.role);
                    summary.group_created += 1;
                }
            }
            Ok(WriteOutcome::Conflict) => {
                debug!("User {} already has role {}", user, source.role);
                summary.conflicts_suppressed += 1;
            }
            Err(err) => {
                error!("{}", err);
                summary.failures += 1;
            }
        }
    }

    async fn sync_org_memberships(
        &self,
        group_id: &str,
        record: &CorrespondenceRecord,
        counterpart: &ProvisionedCounterpart,
        summary: &mut ReconcileSummary,
    ) {
        let user = counterpart.label();

        // Fresh listing: default memberships may have been provisioned since the scan.
        match self.client.org_memberships(group_id, &counterpart.id).await {
            Ok(current) => {
                for membership in current {
                    match self
                        .client
                        .delete_org_membership(&membership.org.id, &membership.id)
                        .await
                    {
                        Ok(()) => {
                            debug!("Deleted Org membership of user {} in org {}", user, membership.org);
                            summary.org_deleted += 1;
                        }
                        Err(err) => {
                            let err = ReconcileError::OrgMembershipDelete {
                                user: user.to_string(),
                                org: membership.org.label().to_string(),
                                source: err,
                            };
                            error!("{}", err);
                            summary.failures += 1;
                        }
                    }
                }
            }
            Err(err) => {
                let err = ReconcileError::OrgSnapshot {
                    user: user.to_string(),
                    source: err,
                };
                error!("{}", err);
                summary.failures += 1;
            }
        }

        for membership in &record.org_memberships {
            match self
                .client
                .create_org_membership(&membership.org, &membership.role, &counterpart.id)
                .await
            {
                Ok(WriteOutcome::Applied) => {
                    info!(
                        "Created Org membership of user {} in org {} with role {}",
                        user, membership.org, membership.role
                    );
                    summary.org_created += 1;
                }
                Ok(WriteOutcome::Conflict) => {
                    debug!("User {} is already a member of org {}", user, membership.org);
                    summary.conflicts_suppressed += 1;
                }
                Err(err) => {
                    let err = ReconcileError::OrgMembershipCreate {
                        user: user.to_string(),
                        org: membership.org.label().to_string(),
                        source: err,
                    };
                    error!("{}", err);
                    summary.failures += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingPolicy;
    use crate::model::{Ref, SsoConnection};
    use crate::transport::InMemoryDirectory;
    use reqwest::Method;

    fn config() -> ReconcileConfig {
        ReconcileConfig::new("example.com", "sso.example.com", MatchingPolicy::default())
    }

    async fn directory() -> InMemoryDirectory {
        let directory = InMemoryDirectory::new();
        directory.add_group("g1", "Acme").await;
        directory
            .add_sso_connection(
                "g1",
                SsoConnection {
                    id: "c1".to_string(),
                    name: None,
                },
            )
            .await;
        directory
    }

    fn source(id: &str, email: &str) -> Identity {
        Identity::new(id).with_email(email).with_username(email)
    }

    #[tokio::test]
    async fn test_scan_collects_only_source_identities() {
        let directory = directory().await;
        let identities = vec![
            source("u1", "alice@example.com"),
            source("u2", "alice@sso.example.com"),
            Identity::new("u3"),
        ];
        let client = DirectoryClient::new(directory);
        let config = config();
        let reconciler = MembershipReconciler::new(&client, &config);

        let records = reconciler.scan("g1", &identities).await.unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["alice@example.com"]);
        assert!(records["alice@example.com"].group_membership.is_none());
    }

    #[tokio::test]
    async fn test_scan_keeps_first_duplicate_key() {
        let directory = directory().await;
        let identities = vec![
            source("first", "dup@example.com"),
            source("second", "dup@example.com"),
        ];
        let client = DirectoryClient::new(directory);
        let config = config();
        let reconciler = MembershipReconciler::new(&client, &config);

        let records = reconciler.scan("g1", &identities).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records["dup@example.com"].source_id, "first");
    }

    #[tokio::test]
    async fn test_scan_failure_is_fatal() {
        let directory = directory().await;
        directory
            .fail_requests(Method::GET, "/org_memberships", 503)
            .await;
        let identities = vec![source("u1", "alice@example.com")];
        let client = DirectoryClient::new(directory);
        let config = config();
        let reconciler = MembershipReconciler::new(&client, &config);

        let err = reconciler.run("g1", &identities).await.unwrap_err();
        assert!(matches!(err, FetchError::OrgMemberships { ref user, .. } if user == "alice@example.com"));
    }

    #[tokio::test]
    async fn test_match_records_existing_group_membership() {
        let directory = directory().await;
        let existing = directory
            .add_group_membership("g1", "p1", Ref::new("r-viewer", "group_role"))
            .await;
        let identities = vec![
            source("u1", "alice@example.com"),
            Identity::new("p1").with_email("alice@sso.example.com"),
        ];
        let client = DirectoryClient::new(directory);
        let config = config();
        let reconciler = MembershipReconciler::new(&client, &config);

        let mut records = reconciler.scan("g1", &identities).await.unwrap();
        reconciler.match_counterparts("g1", &identities, &mut records).await;

        let counterpart = records["alice@example.com"].counterpart.clone().unwrap();
        assert_eq!(counterpart.id, "p1");
        assert_eq!(counterpart.group_membership_id, Some(existing));
    }

    #[tokio::test]
    async fn test_group_membership_lookup_failure_falls_back_to_create() {
        let directory = directory().await;
        let admin = Ref::new("r-admin", "group_role").named("admin");
        directory.add_group_membership("g1", "u1", admin).await;
        directory
            .fail_requests(Method::GET, "memberships?limit=100&user_id=p1", 500)
            .await;
        let identities = vec![
            source("u1", "alice@example.com"),
            Identity::new("p1").with_email("alice@sso.example.com"),
        ];
        let client = DirectoryClient::new(directory);
        let config = config();
        let reconciler = MembershipReconciler::new(&client, &config);

        let summary = reconciler.run("g1", &identities).await.unwrap();
        assert_eq!(summary.group_created, 1);
        // Fresh org listing of p1 fails too, recreation still runs.
        assert_eq!(summary.failures, 1);
        assert_eq!(
            client.transport().group_memberships_of("g1", "p1").await[0].role.id,
            "r-admin"
        );
    }
}
