//! Cart snapshot reading and checkout planning.

mod cart;
mod plan;
mod retry;

pub use cart::CartSnapshot;
pub use plan::plan_checkout;
pub use retry::RetryPolicy;
