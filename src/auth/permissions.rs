/*!
 * # Permissions Module
 *
 * Permission strings are `resource:action`. `resource:*` grants every action
 * on a resource and a bare `*` grants everything.
 */

pub const WILDCARD: &str = "*";

/// Permission string constants used for route gating
pub mod consts {
    pub const COUPONS_READ: &str = "coupons:read";
    pub const COUPONS_CREATE: &str = "coupons:create";
    pub const COUPONS_UPDATE: &str = "coupons:update";
}

/// Whether a single granted permission covers the required one.
pub fn permission_matches(granted: &str, required: &str) -> bool {
    if granted == WILDCARD || granted == required {
        return true;
    }
    match (granted.split_once(':'), required.split_once(':')) {
        (Some((resource, WILDCARD)), Some((required_resource, _))) => {
            resource == required_resource
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard_matches() {
        assert!(permission_matches("coupons:read", "coupons:read"));
        assert!(permission_matches("coupons:*", "coupons:update"));
        assert!(permission_matches("*", "users:delete"));
        assert!(!permission_matches("coupons:read", "coupons:update"));
    }

    #[test]
    fn resource_wildcard_does_not_leak_by_prefix() {
        assert!(!permission_matches("coupon:*", "coupons:read"));
        assert!(!permission_matches("coupons:*", "coupons-admin:read"));
    }
}
