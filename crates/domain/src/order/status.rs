//! Order status transition guard.
//!
//! Any status may follow any other; only the name is validated.

use common::OrderStatus;

use crate::error::CheckoutError;

/// Parses an administrator-supplied status name, case-insensitively, into
/// its canonical form.
pub fn parse_status(input: &str) -> Result<OrderStatus, CheckoutError> {
    input
        .parse::<OrderStatus>()
        .map_err(|unknown| CheckoutError::InvalidStatus(unknown.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_casing() {
        assert_eq!(parse_status("shipped").unwrap(), OrderStatus::Shipped);
        assert_eq!(parse_status("Delivered").unwrap(), OrderStatus::Delivered);
        assert_eq!(parse_status("PENDING").unwrap(), OrderStatus::Pending);
    }

    #[test]
    fn rejects_unknown_status() {
        let err = parse_status("banana").unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidStatus(ref s) if s == "banana"));
        assert!(err.to_string().contains("Allowed values are Pending, Shipped, Delivered"));
    }
}
