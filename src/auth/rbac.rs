/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Built-in roles for the marketplace back-office. A user's effective
 * permissions are the role's permissions merged with any custom grants.
 */

use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use super::permissions::{permission_matches, WILDCARD};

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub permissions: Vec<String>,
}

fn role(name: &str, permissions: &[&str]) -> Role {
    Role {
        name: name.to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
}

lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        let roles = [
            role("admin", &[WILDCARD]),
            role(
                // content moderation and coupon oversight
                "moderator",
                &[
                    "coupons:read",
                    "coupons:update",
                    "recipes:*",
                    "categories:read",
                    "audit-logs:read",
                ],
            ),
            role(
                // shop owner managing their own catalogue and vouchers
                "seller",
                &[
                    "coupons:read",
                    "coupons:create",
                    "coupons:update",
                    "products:*",
                    "orders:read",
                ],
            ),
            role(
                "user",
                &["recipes:read", "recipes:create", "orders:create", "orders:read"],
            ),
        ];
        roles.into_iter().map(|r| (r.name.clone(), r)).collect()
    };
}

/// RBAC service for looking up roles and resolving permissions
#[derive(Clone, Debug, Default)]
pub struct RbacService;

impl RbacService {
    pub fn new() -> Self {
        Self
    }

    pub fn get_role_permissions(&self, role_name: &str) -> Vec<String> {
        match ROLES.get(role_name) {
            Some(role) => role.permissions.clone(),
            None => {
                warn!("Role not found: {}", role_name);
                vec![]
            }
        }
    }

    /// Role permissions ∪ custom permissions.
    ///
    /// A `*` on either side collapses the result to exactly `{"*"}`.
    pub fn effective_permissions(&self, role_name: &str, custom: &[String]) -> BTreeSet<String> {
        let merged: BTreeSet<String> = self
            .get_role_permissions(role_name)
            .into_iter()
            .chain(custom.iter().map(|p| p.trim().to_string()))
            .filter(|p| !p.is_empty())
            .collect();

        if merged.contains(WILDCARD) {
            return BTreeSet::from([WILDCARD.to_string()]);
        }
        merged
    }

    pub fn check_permission(&self, granted: &BTreeSet<String>, required: &str) -> bool {
        granted.iter().any(|p| permission_matches(p, required))
    }
}
