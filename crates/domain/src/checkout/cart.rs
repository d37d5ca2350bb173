//! Cart snapshot reader.

use common::UserId;
use store::{BookstoreStore, CartLine, StoreError};

/// A user's cart as read at one instant, each line joined with the live
/// title, price, stock and version of its book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    user_id: UserId,
    lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Reads the current cart of `user_id`. Has no side effects.
    pub async fn load<S>(store: &S, user_id: UserId) -> Result<Self, StoreError>
    where
        S: BookstoreStore + ?Sized,
    {
        let lines = store.load_cart(user_id).await?;
        Ok(Self { user_id, lines })
    }

    /// Builds a snapshot from lines that were already read.
    pub fn from_lines(user_id: UserId, lines: Vec<CartLine>) -> Self {
        Self { user_id, lines }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the cart lines, ordered by book id.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
