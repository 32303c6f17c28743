use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub name: String,
    pub director: String,
    pub year: Option<i32>,
    pub rating: Option<u8>,
    pub user_id: u64,
}

/// A stored entity together with the id it is stored under.
///
/// Serializes flat (`{"id": 1, "name": ...}`) so templates can use
/// `user.id` and `user.name` side by side. Never written to the database.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: u64,
    #[serde(flatten)]
    pub value: T,
}

impl<T> std::ops::Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
