//! Simulated directory API served from memory.
//!
//! `InMemoryDirectory` answers the same paths as the live directory with the
//! same JSON:API documents, so the typed client, the paginated fetcher and the
//! reconciliation engine can be exercised end to end without a network.
//!
//! # Behavior
//!
//! - Collections are paginated with `page_size` items per page. `next` links
//!   are relative to the API root (no `/rest` prefix) and carry a
//!   `starting_after` cursor, as the live API does.
//! - Creating a membership that already exists, or patching a membership to the
//!   role it already has, answers `409 Conflict`.
//! - New resources get random UUID ids.
//! - Every request is recorded, and failures can be injected per method and
//!   path fragment.
//!
//! ```rust
//! use sso_membership::model::{Identity, Ref, SsoConnection};
//! use sso_membership::transport::InMemoryDirectory;
//!
//! # tokio_test::block_on(async {
//! let directory = InMemoryDirectory::new().with_page_size(2);
//! directory
//!     .add_sso_connection("g1", SsoConnection { id: "c1".into(), name: Some("Okta".into()) })
//!     .await;
//! directory
//!     .add_identity("g1", Identity::new("u1").with_email("alice@example.com"))
//!     .await;
//! directory
//!     .add_group_membership("g1", "u1", Ref::new("r-admin", "group_role").named("admin"))
//!     .await;
//!
//! assert_eq!(directory.identities("g1").await.len(), 1);
//! # });
//! ```

use log::debug;
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ApiResponse, DirectoryTransport, REST_API_ROOT};
use crate::error::TransportError;
use crate::model::{
    GroupMembership, Identity, MembershipDocument, OrgMembership, Ref, RoleUpdateDocument,
    SsoConnection,
};

const DEFAULT_PAGE_SIZE: usize = 100;
const SIMULATED_ORIGIN: &str = "http://directory.local";

/// A request as it reached the simulated directory.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
struct FailureRule {
    method: Method,
    fragment: String,
    status: u16,
}

#[derive(Debug, Default)]
struct GroupState {
    name: Option<String>,
    connections: Vec<SsoConnection>,
    identities: Vec<Identity>,
    memberships: Vec<GroupMembership>,
}

#[derive(Debug, Clone)]
struct OrgEntry {
    group_id: String,
    reference: Ref,
}

#[derive(Debug, Default)]
struct DirectoryState {
    groups: HashMap<String, GroupState>,
    orgs: HashMap<String, OrgEntry>,
    org_memberships: Vec<OrgMembership>,
    roles: HashMap<String, Ref>,
    failures: Vec<FailureRule>,
    requests: Vec<RecordedRequest>,
}

impl DirectoryState {
    fn group_ref(&self, group_id: &str) -> Ref {
        let reference = Ref::new(group_id, "group");
        match self.groups.get(group_id).and_then(|g| g.name.clone()) {
            Some(name) => reference.named(name),
            None => reference,
        }
    }

    fn user_ref(&self, group_id: &str, user_id: &str) -> Ref {
        let name = self
            .groups
            .get(group_id)
            .and_then(|g| g.identities.iter().find(|i| i.id == user_id))
            .and_then(|i| i.display_name.clone());
        match name {
            Some(name) => Ref::user(user_id).named(name),
            None => Ref::user(user_id),
        }
    }

    /// Role as seeded, so created memberships keep its display name.
    fn role_ref(&self, id: &str, role_type: &str) -> Ref {
        self.roles
            .get(id)
            .cloned()
            .unwrap_or_else(|| Ref::new(id, role_type))
    }

    fn org_group(&self, org_id: &str) -> Option<&str> {
        self.orgs.get(org_id).map(|entry| entry.group_id.as_str())
    }
}

/// In-memory stand-in for the remote directory API.
#[derive(Debug, Clone)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
    page_size: usize,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(DirectoryState::default())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Items per page for every paginated collection (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    // ── Seeding ───────────────────────────────────────────────────────

    pub async fn add_group(&self, group_id: &str, name: &str) {
        let mut state = self.state.write().await;
        state.groups.entry(group_id.to_string()).or_default().name = Some(name.to_string());
    }

    pub async fn add_sso_connection(&self, group_id: &str, connection: SsoConnection) {
        let mut state = self.state.write().await;
        state
            .groups
            .entry(group_id.to_string())
            .or_default()
            .connections
            .push(connection);
    }

    pub async fn add_identity(&self, group_id: &str, identity: Identity) {
        let mut state = self.state.write().await;
        state
            .groups
            .entry(group_id.to_string())
            .or_default()
            .identities
            .push(identity);
    }

    /// Seed a group membership and return its id.
    pub async fn add_group_membership(&self, group_id: &str, user_id: &str, role: Ref) -> String {
        let mut state = self.state.write().await;
        state.roles.insert(role.id.clone(), role.clone());
        let membership = GroupMembership {
            id: Uuid::new_v4().to_string(),
            group: state.group_ref(group_id),
            role,
            user: state.user_ref(group_id, user_id),
        };
        let id = membership.id.clone();
        state
            .groups
            .entry(group_id.to_string())
            .or_default()
            .memberships
            .push(membership);
        id
    }

    /// Register an org under a group without any memberships.
    pub async fn add_org(&self, group_id: &str, org: Ref) {
        let mut state = self.state.write().await;
        state.orgs.insert(
            org.id.clone(),
            OrgEntry {
                group_id: group_id.to_string(),
                reference: org,
            },
        );
    }

    /// Seed an org membership (registering the org if needed) and return its id.
    pub async fn add_org_membership(
        &self,
        group_id: &str,
        org: Ref,
        role: Ref,
        user_id: &str,
    ) -> String {
        let mut state = self.state.write().await;
        state.roles.insert(role.id.clone(), role.clone());
        state.orgs.entry(org.id.clone()).or_insert_with(|| OrgEntry {
            group_id: group_id.to_string(),
            reference: org.clone(),
        });
        let membership = OrgMembership {
            id: Uuid::new_v4().to_string(),
            org,
            role,
            user: state.user_ref(group_id, user_id),
        };
        let id = membership.id.clone();
        state.org_memberships.push(membership);
        id
    }

    /// Answer every `method` request whose path contains `fragment` with `status`.
    pub async fn fail_requests(&self, method: Method, fragment: &str, status: u16) {
        let mut state = self.state.write().await;
        state.failures.push(FailureRule {
            method,
            fragment: fragment.to_string(),
            status,
        });
    }

    // ── Inspection ────────────────────────────────────────────────────

    pub async fn identities(&self, group_id: &str) -> Vec<Identity> {
        let state = self.state.read().await;
        state
            .groups
            .get(group_id)
            .map(|g| g.identities.clone())
            .unwrap_or_default()
    }

    pub async fn group_memberships_of(&self, group_id: &str, user_id: &str) -> Vec<GroupMembership> {
        let state = self.state.read().await;
        state
            .groups
            .get(group_id)
            .map(|g| {
                g.memberships
                    .iter()
                    .filter(|m| m.user.id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn org_memberships_of(&self, group_id: &str, user_id: &str) -> Vec<OrgMembership> {
        let state = self.state.read().await;
        state
            .org_memberships
            .iter()
            .filter(|m| m.user.id == user_id && state.org_group(&m.org.id) == Some(group_id))
            .cloned()
            .collect()
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.read().await.requests.clone()
    }

    /// Recorded requests with the given method.
    pub async fn requests_with(&self, method: Method) -> Vec<RecordedRequest> {
        let state = self.state.read().await;
        state
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub async fn clear_requests(&self) {
        self.state.write().await.requests.clear();
    }
}

impl DirectoryTransport for InMemoryDirectory {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.write().await;
        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.to_string(),
            body: body
                .as_deref()
                .and_then(|bytes| serde_json::from_slice(bytes).ok()),
        });

        let injected = state
            .failures
            .iter()
            .find(|rule| rule.method == method && path.contains(&rule.fragment))
            .map(|rule| rule.status);

        let outcome = match injected {
            Some(status) => Err(status),
            None => match Url::parse(&format!("{SIMULATED_ORIGIN}{path}")) {
                Ok(url) => route(&mut state, self.page_size, &method, &url, body.as_deref()),
                Err(_) => Err(400),
            },
        };

        match outcome {
            Ok(response) => {
                debug!("{} response: {}: {}", response.status, method, path);
                Ok(response)
            }
            Err(status) => {
                debug!("{} response: {}: {}", status, method, path);
                Err(TransportError::Remote {
                    status,
                    method: method.to_string(),
                    path: path.to_string(),
                })
            }
        }
    }
}

// ── Routing ───────────────────────────────────────────────────────────

type RouteResult = Result<ApiResponse, u16>;

fn route(
    state: &mut DirectoryState,
    page_size: usize,
    method: &Method,
    url: &Url,
    body: Option<&[u8]>,
) -> RouteResult {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["rest", "groups", group_id, "sso_connections"]) => {
            let group = state.groups.get(*group_id).ok_or(404u16)?;
            page(&group.connections, url, page_size)
        }
        ("GET", ["rest", "groups", group_id, "sso_connections", connection_id, "users"]) => {
            let group = connection_scope(state, group_id, connection_id)?;
            page(&group.identities, url, page_size)
        }
        (
            "DELETE",
            ["rest", "groups", group_id, "sso_connections", connection_id, "users", user_id],
        ) => {
            let group = connection_scope_mut(state, group_id, connection_id)?;
            let before = group.identities.len();
            group.identities.retain(|identity| identity.id != *user_id);
            if group.identities.len() == before {
                return Err(404);
            }
            Ok(ApiResponse::empty(204))
        }
        ("GET", ["rest", "groups", group_id, "memberships"]) => {
            let group = state.groups.get(*group_id).ok_or(404u16)?;
            let user_id = query(url, "user_id");
            let memberships: Vec<&GroupMembership> = group
                .memberships
                .iter()
                .filter(|m| user_id.as_deref().is_none_or(|id| m.user.id == id))
                .collect();
            page(&memberships, url, page_size)
        }
        ("POST", ["rest", "groups", group_id, "memberships"]) => {
            create_group_membership(state, group_id, body)
        }
        ("PATCH", ["rest", "groups", group_id, "memberships", membership_id]) => {
            update_group_membership(state, group_id, membership_id, body)
        }
        ("GET", ["rest", "groups", group_id, "org_memberships"]) => {
            if !state.groups.contains_key(*group_id) {
                return Err(404);
            }
            let user_id = query(url, "user_id");
            let memberships: Vec<&OrgMembership> = state
                .org_memberships
                .iter()
                .filter(|m| state.org_group(&m.org.id) == Some(*group_id))
                .filter(|m| user_id.as_deref().is_none_or(|id| m.user.id == id))
                .collect();
            page(&memberships, url, page_size)
        }
        ("POST", ["rest", "orgs", org_id, "memberships"]) => {
            create_org_membership(state, org_id, body)
        }
        ("DELETE", ["rest", "orgs", org_id, "memberships", membership_id]) => {
            let before = state.org_memberships.len();
            state
                .org_memberships
                .retain(|m| !(m.id == *membership_id && m.org.id == *org_id));
            if state.org_memberships.len() == before {
                return Err(404);
            }
            Ok(ApiResponse::empty(204))
        }
        _ => Err(404),
    }
}

fn connection_scope<'a>(
    state: &'a DirectoryState,
    group_id: &str,
    connection_id: &str,
) -> Result<&'a GroupState, u16> {
    let group = state.groups.get(group_id).ok_or(404u16)?;
    if !group.connections.iter().any(|c| c.id == connection_id) {
        return Err(404);
    }
    Ok(group)
}

fn connection_scope_mut<'a>(
    state: &'a mut DirectoryState,
    group_id: &str,
    connection_id: &str,
) -> Result<&'a mut GroupState, u16> {
    let group = state.groups.get_mut(group_id).ok_or(404u16)?;
    if !group.connections.iter().any(|c| c.id == connection_id) {
        return Err(404);
    }
    Ok(group)
}

fn create_group_membership(
    state: &mut DirectoryState,
    group_id: &str,
    body: Option<&[u8]>,
) -> RouteResult {
    let document: MembershipDocument = decode(body)?;
    let relationships = document.data.relationships;
    let user_id = relationships.user.data.id;

    let group = state.groups.get(group_id).ok_or(404u16)?;
    if group.memberships.iter().any(|m| m.user.id == user_id) {
        return Err(409);
    }

    let membership = GroupMembership {
        id: Uuid::new_v4().to_string(),
        group: state.group_ref(group_id),
        role: state.role_ref(&relationships.role.data.id, &relationships.role.data.ref_type),
        user: state.user_ref(group_id, &user_id),
    };
    let response = resource(201, &membership);
    if let Some(group) = state.groups.get_mut(group_id) {
        group.memberships.push(membership);
    }
    response
}

fn update_group_membership(
    state: &mut DirectoryState,
    group_id: &str,
    membership_id: &str,
    body: Option<&[u8]>,
) -> RouteResult {
    let document: RoleUpdateDocument = decode(body)?;
    let role_data = document.data.relationships.role.data;
    let role = state.role_ref(&role_data.id, &role_data.ref_type);

    let group = state.groups.get_mut(group_id).ok_or(404u16)?;
    let membership = group
        .memberships
        .iter_mut()
        .find(|m| m.id == membership_id)
        .ok_or(404u16)?;
    if membership.role.id == role.id {
        return Err(409);
    }
    membership.role = role;
    resource(200, &*membership)
}

fn create_org_membership(state: &mut DirectoryState, org_id: &str, body: Option<&[u8]>) -> RouteResult {
    let document: MembershipDocument = decode(body)?;
    let relationships = document.data.relationships;
    let user_id = relationships.user.data.id;

    let entry = state.orgs.get(org_id).cloned().ok_or(404u16)?;
    if state
        .org_memberships
        .iter()
        .any(|m| m.org.id == org_id && m.user.id == user_id)
    {
        return Err(409);
    }

    let membership = OrgMembership {
        id: Uuid::new_v4().to_string(),
        org: entry.reference,
        role: state.role_ref(&relationships.role.data.id, &relationships.role.data.ref_type),
        user: state.user_ref(&entry.group_id, &user_id),
    };
    let response = resource(201, &membership);
    state.org_memberships.push(membership);
    response
}

// ── Documents ─────────────────────────────────────────────────────────

fn decode<T: serde::de::DeserializeOwned>(body: Option<&[u8]>) -> Result<T, u16> {
    body.and_then(|bytes| serde_json::from_slice(bytes).ok())
        .ok_or(400)
}

fn query(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn json_response(status: u16, value: &serde_json::Value) -> RouteResult {
    serde_json::to_vec(value)
        .map(|body| ApiResponse::new(status, body))
        .map_err(|_| 500)
}

fn resource<T: Serialize>(status: u16, item: &T) -> RouteResult {
    json_response(status, &json!({ "data": item }))
}

fn page<T: Serialize>(items: &[T], url: &Url, page_size: usize) -> RouteResult {
    let offset = query(url, "starting_after")
        .and_then(|cursor| cursor.parse::<usize>().ok())
        .unwrap_or(0);
    let end = offset.saturating_add(page_size).min(items.len());
    let data = items.get(offset..end).unwrap_or(&[]);
    let next = (end < items.len()).then(|| next_link(url, end));

    json_response(200, &json!({ "data": data, "links": { "next": next } }))
}

/// Link to the page starting at `cursor`, relative to the API root.
fn next_link(url: &Url, cursor: usize) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "starting_after")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut next = url.clone();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("starting_after", &cursor.to_string());

    let path = next.path().strip_prefix(REST_API_ROOT).unwrap_or(next.path());
    match next.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn json(response: &ApiResponse) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    async fn seeded() -> InMemoryDirectory {
        let directory = InMemoryDirectory::new().with_page_size(2);
        directory.add_group("g1", "Acme").await;
        directory
            .add_sso_connection(
                "g1",
                SsoConnection {
                    id: "c1".to_string(),
                    name: Some("Okta".to_string()),
                },
            )
            .await;
        for n in 0..5 {
            directory
                .add_identity("g1", Identity::new(format!("u{n}")).with_email(format!("user{n}@example.com")))
                .await;
        }
        directory
    }

    #[tokio::test]
    async fn test_users_are_paginated_with_relative_next_links() {
        let directory = seeded().await;
        let first = directory
            .send(Method::GET, "/rest/groups/g1/sso_connections/c1/users", None)
            .await
            .unwrap();
        let body = json(&first);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["links"]["next"],
            "/groups/g1/sso_connections/c1/users?starting_after=2"
        );

        let last = directory
            .send(
                Method::GET,
                "/rest/groups/g1/sso_connections/c1/users?starting_after=4",
                None,
            )
            .await
            .unwrap();
        let body = json(&last);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert!(body["links"]["next"].is_null());
    }

    #[tokio::test]
    async fn test_duplicate_org_membership_conflicts() {
        let directory = seeded().await;
        let org = Ref::new("o1", "org").named("Org One");
        let role = Ref::new("r1", "org_role").named("collaborator");
        directory.add_org_membership("g1", org.clone(), role.clone(), "u1").await;

        let body = serde_json::to_vec(&MembershipDocument::org(&org, &role, "u1")).unwrap();
        let err = directory
            .send(Method::POST, "/rest/orgs/o1/memberships", Some(body))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let body = serde_json::to_vec(&MembershipDocument::org(&org, &role, "u2")).unwrap();
        let created = directory
            .send(Method::POST, "/rest/orgs/o1/memberships", Some(body))
            .await
            .unwrap();
        assert_eq!(created.status, 201);
        assert_eq!(json(&created)["data"]["relationships"]["role"]["data"]["attributes"]["name"], "collaborator");
        assert_eq!(directory.org_memberships_of("g1", "u2").await.len(), 1);
    }

    #[tokio::test]
    async fn test_patch_to_same_role_conflicts() {
        let directory = seeded().await;
        let admin = Ref::new("r-admin", "group_role").named("admin");
        let id = directory.add_group_membership("g1", "u1", admin.clone()).await;

        let body = serde_json::to_vec(&RoleUpdateDocument::new(&id, &admin)).unwrap();
        let err = directory
            .send(Method::PATCH, &format!("/rest/groups/g1/memberships/{id}"), Some(body))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));

        let viewer = Ref::new("r-viewer", "group_role");
        let body = serde_json::to_vec(&RoleUpdateDocument::new(&id, &viewer)).unwrap();
        directory
            .send(Method::PATCH, &format!("/rest/groups/g1/memberships/{id}"), Some(body))
            .await
            .unwrap();
        assert_eq!(directory.group_memberships_of("g1", "u1").await[0].role.id, "r-viewer");
    }

    #[tokio::test]
    async fn test_delete_identity_and_unknown_paths() {
        let directory = seeded().await;
        let response = directory
            .send(Method::DELETE, "/rest/groups/g1/sso_connections/c1/users/u0", None)
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert!(response.is_empty());
        assert_eq!(directory.identities("g1").await.len(), 4);

        let err = directory
            .send(Method::DELETE, "/rest/groups/g1/sso_connections/c1/users/u0", None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));

        let err = directory.send(Method::GET, "/rest/nowhere", None).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_injected_failures_and_request_log() {
        let directory = seeded().await;
        directory.fail_requests(Method::GET, "/memberships", 500).await;

        let err = directory
            .send(Method::GET, "/rest/groups/g1/memberships?user_id=u1", None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));

        let requests = directory.requests_with(Method::GET).await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/rest/groups/g1/memberships?user_id=u1");
    }
}
