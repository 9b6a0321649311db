//! Typed client for the directory API.
//!
//! `DirectoryClient` knows the resource paths and request documents and turns
//! raw [`ApiResponse`](crate::transport::ApiResponse)s into domain types. It is
//! generic over the [`DirectoryTransport`] so the same client drives the live
//! API and the in-memory simulation.
//!
//! Write calls never fail on `409 Conflict`: the directory already holds the
//! requested state, which is reported as [`WriteOutcome::Conflict`].

use log::{debug, info};
use reqwest::Method;
use serde::Serialize;

use crate::error::{DirectoryError, DirectoryResult, TransportError};
use crate::model::{
    GroupMembership, Identity, MembershipDocument, OrgMembership, Page, Ref,
    RoleUpdateDocument, SsoConnection,
};
use crate::pagination::{decode, fetch_all};
use crate::transport::{ApiResponse, DirectoryTransport};

/// Page size requested for membership listings.
pub const MEMBERSHIP_PAGE_LIMIT: usize = 100;

/// Result of a write that tolerates pre-existing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The directory applied the change.
    Applied,
    /// The directory answered `409`: the target state already holds.
    Conflict,
}

impl WriteOutcome {
    pub fn is_conflict(self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Directory operations scoped to the resources the reconciliation touches.
#[derive(Debug, Clone)]
pub struct DirectoryClient<T> {
    transport: T,
}

impl<T: DirectoryTransport> DirectoryClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The tenant's SSO connection.
    ///
    /// A tenant has at most one self-service connection, so the first one
    /// listed is used.
    pub async fn sso_connection(&self, group_id: &str) -> DirectoryResult<SsoConnection> {
        let path = format!("/rest/groups/{group_id}/sso_connections");
        let response = self.transport.send(Method::GET, &path, None).await?;
        let page: Page<SsoConnection> = decode(&path, &response.body)?;
        page.data
            .into_iter()
            .next()
            .ok_or_else(|| DirectoryError::NoSsoConnection {
                group_id: group_id.to_string(),
            })
    }

    /// Every identity known to the tenant's SSO connection.
    pub async fn fetch_identities(&self, group_id: &str) -> DirectoryResult<Vec<Identity>> {
        let connection = self.sso_connection(group_id).await?;
        let path = format!(
            "/rest/groups/{group_id}/sso_connections/{}/users",
            connection.id
        );
        let identities: Vec<Identity> = fetch_all(&self.transport, &path).await?;
        info!(
            "Fetched {} users from SSO connection {}",
            identities.len(),
            connection.label()
        );
        Ok(identities)
    }

    /// Remove an identity from the tenant's SSO connection.
    pub async fn delete_identity(
        &self,
        group_id: &str,
        connection_id: &str,
        user_id: &str,
    ) -> DirectoryResult<()> {
        let path = format!("/rest/groups/{group_id}/sso_connections/{connection_id}/users/{user_id}");
        self.transport.send(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Group memberships of one identity (0 or 1 in practice).
    pub async fn group_memberships(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> DirectoryResult<Vec<GroupMembership>> {
        let path = format!(
            "/rest/groups/{group_id}/memberships?limit={MEMBERSHIP_PAGE_LIMIT}&user_id={user_id}"
        );
        fetch_all(&self.transport, &path).await
    }

    /// Org memberships of one identity across the tenant.
    pub async fn org_memberships(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> DirectoryResult<Vec<OrgMembership>> {
        let path = format!(
            "/rest/groups/{group_id}/org_memberships?limit={MEMBERSHIP_PAGE_LIMIT}&user_id={user_id}"
        );
        fetch_all(&self.transport, &path).await
    }

    /// Change the role of an existing group membership.
    pub async fn update_group_membership_role(
        &self,
        group_id: &str,
        membership_id: &str,
        role: &Ref,
    ) -> DirectoryResult<WriteOutcome> {
        let path = format!("/rest/groups/{group_id}/memberships/{membership_id}");
        let document = RoleUpdateDocument::new(membership_id, role);
        self.write(Method::PATCH, &path, &document).await
    }

    /// Grant `user_id` membership of the group with `role`.
    pub async fn create_group_membership(
        &self,
        group: &Ref,
        role: &Ref,
        user_id: &str,
    ) -> DirectoryResult<WriteOutcome> {
        let path = format!("/rest/groups/{}/memberships", group.id);
        let document = MembershipDocument::group(group, role, user_id);
        self.write(Method::POST, &path, &document).await
    }

    /// Grant `user_id` membership of the org with `role`.
    pub async fn create_org_membership(
        &self,
        org: &Ref,
        role: &Ref,
        user_id: &str,
    ) -> DirectoryResult<WriteOutcome> {
        let path = format!("/rest/orgs/{}/memberships", org.id);
        let document = MembershipDocument::org(org, role, user_id);
        self.write(Method::POST, &path, &document).await
    }

    pub async fn delete_org_membership(
        &self,
        org_id: &str,
        membership_id: &str,
    ) -> DirectoryResult<()> {
        let path = format!("/rest/orgs/{org_id}/memberships/{membership_id}");
        self.transport.send(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn write<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        document: &B,
    ) -> DirectoryResult<WriteOutcome> {
        let body = serde_json::to_vec(document).map_err(DirectoryError::Encode)?;
        let result: Result<ApiResponse, TransportError> =
            self.transport.send(method, path, Some(body)).await;
        match result {
            Ok(_) => Ok(WriteOutcome::Applied),
            Err(err) if err.is_conflict() => {
                debug!("{} already in requested state", path);
                Ok(WriteOutcome::Conflict)
            }
            Err(err) => Err(err.into()),
        }
    }
}
