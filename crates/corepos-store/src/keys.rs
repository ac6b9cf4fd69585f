//! Well-known local storage keys.
//!
//! These names are shared with the front end and must not change.

/// Serialized cart snapshot of the active register window.
pub const CURRENT_CART_STATE: &str = "current-cart-state";

/// Cached list of hold invoices.
pub const HOLD_INVOICES: &str = "core_pos_hold_invoices";

/// Last projected kitchen/bar boards.
pub const KITCHEN_ORDERS: &str = "kitchen_orders";

/// Hold → invoice conversion history.
pub const ORDER_HISTORY: &str = "core_pos_order_history";

pub const SELECTED_CUSTOMER: &str = "selectedCustomer";
pub const SELECTED_STORE: &str = "selectedStore";
pub const SELECTED_CASHIER: &str = "selectedCashier";

/// Bearer token.
pub const TOKEN: &str = "token";

/// Value of the `company` request header.
pub const COMPANY_ID: &str = "companyId";

/// Hold deletions that failed after the invoice was created.
pub const PENDING_RECONCILIATIONS: &str = "core_pos_pending_reconciliations";

/// Prefix for event bus keys (`pos-event:<name>`).
pub const EVENT_PREFIX: &str = "pos-event:";

/// Keys wiped on logout.
pub const SESSION_KEYS: &[&str] = &[
    CURRENT_CART_STATE,
    HOLD_INVOICES,
    KITCHEN_ORDERS,
    SELECTED_CUSTOMER,
    SELECTED_STORE,
    SELECTED_CASHIER,
    TOKEN,
    COMPANY_ID,
];

/// Full storage key for an event bus event.
pub fn event_key(event: &str) -> String {
    format!("{EVENT_PREFIX}{event}")
}

/// Event name for an event bus key, or `None` for any other key.
pub fn event_name(key: &str) -> Option<&str> {
    key.strip_prefix(EVENT_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_keys() {
        assert_eq!(event_key("order-completed"), "pos-event:order-completed");
        assert_eq!(event_name("pos-event:order-completed"), Some("order-completed"));
        assert_eq!(event_name(CURRENT_CART_STATE), None);
    }
}
