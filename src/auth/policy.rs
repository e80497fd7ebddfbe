//! Role-based access decisions, kept as pure functions so handlers and
//! services can share one policy and tests can cover it directly.

use crate::auth::AuthUser;
use crate::entities::user::UserRole;

/// Who may view a given order:
/// admins see everything, clients see their own orders, sellers see
/// orders that contain at least one of their products.
pub fn can_view_order(caller: &AuthUser, order_user_id: &str, contains_caller_product: bool) -> bool {
    match caller.role {
        UserRole::Admin => true,
        UserRole::Client => caller.user_id == order_user_id,
        UserRole::Seller => caller.user_id == order_user_id || contains_caller_product,
    }
}

/// Order status transitions are an admin concern; sellers are admitted
/// only when the deployment opts in, and then only for orders carrying
/// one of their products.
pub fn can_update_order_status(
    caller: &AuthUser,
    contains_caller_product: bool,
    allow_seller_status_updates: bool,
) -> bool {
    match caller.role {
        UserRole::Admin => true,
        UserRole::Seller => allow_seller_status_updates && contains_caller_product,
        UserRole::Client => false,
    }
}

/// Cancellation is restricted to the order's owner or an admin.
pub fn can_cancel_order(caller: &AuthUser, order_user_id: &str) -> bool {
    caller.is_admin() || caller.user_id == order_user_id
}

/// Product mutation is restricted to the owning seller or an admin.
pub fn can_modify_product(caller: &AuthUser, product_seller_id: &str) -> bool {
    caller.is_admin() || (caller.is_seller() && caller.user_id == product_seller_id)
}

/// Account data is visible to its owner and to admins.
pub fn can_view_user(caller: &AuthUser, target_user_id: &str) -> bool {
    caller.is_admin() || caller.user_id == target_user_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: &str, role: UserRole) -> AuthUser {
        AuthUser {
            user_id: id.to_string(),
            email: format!("{id}@example.com"),
            role,
        }
    }

    #[test]
    fn order_visibility_by_role() {
        let admin = caller("admin_1", UserRole::Admin);
        let client = caller("client_1", UserRole::Client);
        let seller = caller("seller_1", UserRole::Seller);

        assert!(can_view_order(&admin, "someone_else", false));
        assert!(can_view_order(&client, "client_1", false));
        assert!(!can_view_order(&client, "someone_else", false));
        assert!(can_view_order(&seller, "someone_else", true));
        assert!(!can_view_order(&seller, "someone_else", false));
    }

    #[test]
    fn status_updates_gated_by_policy() {
        let seller = caller("seller_1", UserRole::Seller);
        let client = caller("client_1", UserRole::Client);

        assert!(can_update_order_status(
            &caller("admin_1", UserRole::Admin),
            false,
            false
        ));
        assert!(!can_update_order_status(&seller, true, false));
        assert!(can_update_order_status(&seller, true, true));
        assert!(!can_update_order_status(&seller, false, true));
        assert!(!can_update_order_status(&client, true, true));
    }

    #[test]
    fn only_owner_or_admin_cancels() {
        assert!(can_cancel_order(&caller("admin_1", UserRole::Admin), "x"));
        assert!(can_cancel_order(&caller("client_1", UserRole::Client), "client_1"));
        assert!(!can_cancel_order(&caller("client_1", UserRole::Client), "client_2"));
    }

    #[test]
    fn product_ownership() {
        assert!(can_modify_product(&caller("seller_1", UserRole::Seller), "seller_1"));
        assert!(!can_modify_product(&caller("seller_1", UserRole::Seller), "seller_2"));
        assert!(!can_modify_product(&caller("client_1", UserRole::Client), "client_1"));
        assert!(can_modify_product(&caller("admin_1", UserRole::Admin), "seller_2"));
    }
}
