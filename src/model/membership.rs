//! Group and org membership resources and their request documents.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const GROUP_MEMBERSHIP_TYPE: &str = "group_membership";
pub const ORG_MEMBERSHIP_TYPE: &str = "org_membership";
pub const USER_TYPE: &str = "user";

/// Typed pointer into another resource collection.
///
/// `display_name` is denormalized by the directory for convenience. It is used
/// for log lines only and never for identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ref {
    pub id: String,
    pub ref_type: String,
    pub display_name: Option<String>,
}

impl Ref {
    pub fn new(id: impl Into<String>, ref_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ref_type: ref_type.into(),
            display_name: None,
        }
    }

    pub fn named(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Pointer to a user resource.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, USER_TYPE)
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    /// Two refs point at the same resource; display names are ignored.
    pub fn same_target(&self, other: &Ref) -> bool {
        self.id == other.id && self.ref_type == other.ref_type
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An identity's role within the tenant group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MembershipResource", into = "MembershipResource")]
pub struct GroupMembership {
    pub id: String,
    pub group: Ref,
    pub role: Ref,
    pub user: Ref,
}

/// An identity's role within one organization of the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MembershipResource", into = "MembershipResource")]
pub struct OrgMembership {
    pub id: String,
    pub org: Ref,
    pub role: Ref,
    pub user: Ref,
}

// ── Wire shapes ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MembershipResource {
    id: String,
    #[serde(rename = "type", default)]
    resource_type: Option<String>,
    #[serde(default)]
    relationships: Option<ResourceRelationships>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ResourceRelationships {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<Relationship<RefData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    org: Option<Relationship<RefData>>,
    #[serde(default)]
    user: Option<Relationship<RefData>>,
    #[serde(default)]
    role: Option<Relationship<RefData>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship<D> {
    pub data: D,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RefData {
    id: String,
    #[serde(rename = "type")]
    ref_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<RefAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RefAttributes {
    #[serde(default)]
    name: Option<String>,
}

impl From<RefData> for Ref {
    fn from(data: RefData) -> Self {
        Self {
            id: data.id,
            ref_type: data.ref_type,
            display_name: data.attributes.and_then(|attributes| attributes.name),
        }
    }
}

impl From<Ref> for RefData {
    fn from(reference: Ref) -> Self {
        Self {
            id: reference.id,
            ref_type: reference.ref_type,
            attributes: reference
                .display_name
                .map(|name| RefAttributes { name: Some(name) }),
        }
    }
}

fn required(
    relationship: Option<Relationship<RefData>>,
    membership_id: &str,
    name: &str,
) -> Result<Ref, String> {
    relationship
        .map(|relationship| relationship.data.into())
        .ok_or_else(|| format!("membership {membership_id} is missing its {name} relationship"))
}

impl TryFrom<MembershipResource> for GroupMembership {
    type Error = String;

    fn try_from(resource: MembershipResource) -> Result<Self, Self::Error> {
        let relationships = resource.relationships.unwrap_or_default();
        Ok(Self {
            group: required(relationships.group, &resource.id, "group")?,
            role: required(relationships.role, &resource.id, "role")?,
            user: required(relationships.user, &resource.id, "user")?,
            id: resource.id,
        })
    }
}

impl From<GroupMembership> for MembershipResource {
    fn from(membership: GroupMembership) -> Self {
        Self {
            id: membership.id,
            resource_type: Some(GROUP_MEMBERSHIP_TYPE.to_string()),
            relationships: Some(ResourceRelationships {
                group: Some(Relationship {
                    data: membership.group.into(),
                }),
                org: None,
                user: Some(Relationship {
                    data: membership.user.into(),
                }),
                role: Some(Relationship {
                    data: membership.role.into(),
                }),
            }),
        }
    }
}

impl TryFrom<MembershipResource> for OrgMembership {
    type Error = String;

    fn try_from(resource: MembershipResource) -> Result<Self, Self::Error> {
        let relationships = resource.relationships.unwrap_or_default();
        Ok(Self {
            org: required(relationships.org, &resource.id, "org")?,
            role: required(relationships.role, &resource.id, "role")?,
            user: required(relationships.user, &resource.id, "user")?,
            id: resource.id,
        })
    }
}

impl From<OrgMembership> for MembershipResource {
    fn from(membership: OrgMembership) -> Self {
        Self {
            id: membership.id,
            resource_type: Some(ORG_MEMBERSHIP_TYPE.to_string()),
            relationships: Some(ResourceRelationships {
                group: None,
                org: Some(Relationship {
                    data: membership.org.into(),
                }),
                user: Some(Relationship {
                    data: membership.user.into(),
                }),
                role: Some(Relationship {
                    data: membership.role.into(),
                }),
            }),
        }
    }
}

// ── Request documents ─────────────────────────────────────────────────

/// Identifier carried in request relationships: `id` and `type` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIdentifier {
    pub id: String,
    #[serde(rename = "type")]
    pub ref_type: String,
}

impl From<&Ref> for TypeIdentifier {
    fn from(reference: &Ref) -> Self {
        Self {
            id: reference.id.clone(),
            ref_type: reference.ref_type.clone(),
        }
    }
}

/// Body of a membership creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipDocument {
    pub data: MembershipData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipData {
    pub relationships: MembershipRelationships,
    #[serde(rename = "type")]
    pub membership_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRelationships {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Relationship<TypeIdentifier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Relationship<TypeIdentifier>>,
    pub role: Relationship<TypeIdentifier>,
    pub user: Relationship<TypeIdentifier>,
}

impl MembershipDocument {
    /// Group membership for `user_id` with the given role.
    pub fn group(group: &Ref, role: &Ref, user_id: &str) -> Self {
        Self {
            data: MembershipData {
                relationships: MembershipRelationships {
                    group: Some(Relationship { data: group.into() }),
                    org: None,
                    role: Relationship { data: role.into() },
                    user: Relationship {
                        data: (&Ref::user(user_id)).into(),
                    },
                },
                membership_type: GROUP_MEMBERSHIP_TYPE.to_string(),
            },
        }
    }

    /// Org membership for `user_id` with the given role.
    pub fn org(org: &Ref, role: &Ref, user_id: &str) -> Self {
        Self {
            data: MembershipData {
                relationships: MembershipRelationships {
                    group: None,
                    org: Some(Relationship { data: org.into() }),
                    role: Relationship { data: role.into() },
                    user: Relationship {
                        data: (&Ref::user(user_id)).into(),
                    },
                },
                membership_type: ORG_MEMBERSHIP_TYPE.to_string(),
            },
        }
    }
}

/// Body of a group membership role change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdateDocument {
    pub data: RoleUpdateData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdateData {
    pub id: String,
    pub relationships: RoleRelationship,
    #[serde(rename = "type")]
    pub membership_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRelationship {
    pub role: Relationship<TypeIdentifier>,
}

impl RoleUpdateDocument {
    pub fn new(membership_id: &str, role: &Ref) -> Self {
        Self {
            data: RoleUpdateData {
                id: membership_id.to_string(),
                relationships: RoleRelationship {
                    role: Relationship { data: role.into() },
                },
                membership_type: GROUP_MEMBERSHIP_TYPE.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rel(id: &str, ty: &str, name: &str) -> serde_json::Value {
        json!({"data": {"id": id, "type": ty, "attributes": {"name": name}}})
    }

    #[test]
    fn test_decode_group_membership() {
        let membership: GroupMembership = serde_json::from_value(json!({
            "id": "gm1",
            "type": "group_membership",
            "relationships": {
                "group": rel("g1", "group", "Acme"),
                "role": rel("r-admin", "group_role", "admin"),
                "user": rel("u1", "user", "Alice")
            }
        }))
        .unwrap();

        assert_eq!(membership.group.label(), "Acme");
        assert_eq!(membership.role.id, "r-admin");
        assert_eq!(membership.user, Ref::user("u1").named("Alice"));
    }

    #[test]
    fn test_decode_rejects_missing_role() {
        let result: Result<OrgMembership, _> = serde_json::from_value(json!({
            "id": "om1",
            "relationships": {
                "org": rel("o1", "org", "Org One"),
                "user": rel("u1", "user", "Alice")
            }
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("missing its role relationship"), "{err}");
    }

    #[test]
    fn test_create_document_shape() {
        let org = Ref::new("o1", "org").named("Org One");
        let role = Ref::new("r1", "org_role").named("collaborator");
        let body = serde_json::to_value(MembershipDocument::org(&org, &role, "u9")).unwrap();

        assert_eq!(
            body,
            json!({
                "data": {
                    "relationships": {
                        "org": {"data": {"id": "o1", "type": "org"}},
                        "role": {"data": {"id": "r1", "type": "org_role"}},
                        "user": {"data": {"id": "u9", "type": "user"}}
                    },
                    "type": "org_membership"
                }
            })
        );
    }

    #[test]
    fn test_role_update_document_shape() {
        let role = Ref::new("r-admin", "group_role");
        let body = serde_json::to_value(RoleUpdateDocument::new("gm7", &role)).unwrap();
        assert_eq!(body["data"]["id"], "gm7");
        assert_eq!(body["data"]["type"], "group_membership");
        assert_eq!(body["data"]["relationships"]["role"]["data"]["id"], "r-admin");
    }
}
