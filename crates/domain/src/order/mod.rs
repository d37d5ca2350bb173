//! Order projection and status rules.

mod projection;
mod status;

pub use projection::{OrderItemView, OrderView};
pub use status::parse_status;
