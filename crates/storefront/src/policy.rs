//! Role capability table.
//!
//! One table mapping each role to its permitted actions, evaluated once per
//! request, instead of scattered per-call boolean predicates.

use crate::models::user::Role;

/// Actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// See inactive products/variants and unredacted stock.
    ViewInactiveInventory,
    /// Edit variant price, stock, and active flags.
    EditInventory,
    /// Change order status.
    ManageOrders,
}

/// The actions permitted to each role.
#[must_use]
pub const fn allowed_actions(role: Role) -> &'static [Action] {
    match role {
        Role::Customer => &[],
        Role::Staff => &[Action::ViewInactiveInventory, Action::ManageOrders],
        Role::Admin => &[
            Action::ViewInactiveInventory,
            Action::EditInventory,
            Action::ManageOrders,
        ],
    }
}

/// Whether `role` may perform `action`.
#[must_use]
pub fn permits(role: Role, action: Action) -> bool {
    allowed_actions(role).contains(&action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customers_never_see_inactive_inventory() {
        assert!(!permits(Role::Customer, Action::ViewInactiveInventory));
        assert!(!permits(Role::Customer, Action::EditInventory));
        assert!(!permits(Role::Customer, Action::ManageOrders));
    }

    #[test]
    fn staff_view_but_do_not_edit() {
        assert!(permits(Role::Staff, Action::ViewInactiveInventory));
        assert!(!permits(Role::Staff, Action::EditInventory));
        assert!(permits(Role::Staff, Action::ManageOrders));
    }

    #[test]
    fn admins_hold_every_action() {
        for action in [
            Action::ViewInactiveInventory,
            Action::EditInventory,
            Action::ManageOrders,
        ] {
            assert!(permits(Role::Admin, action));
        }
    }
}
