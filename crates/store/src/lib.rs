pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{BookId, Money, OrderId, OrderStatus, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Book, CartItem, CartLine, CheckoutCommit, ConsumedCartItem, NewBook, NewOrder, NewOrderItem,
    OrderItemRecord, OrderRecord, StockUpdate,
};
pub use postgres::PostgresStore;
pub use store::{BookstoreStore, CommitValidationError, validate_commit};
