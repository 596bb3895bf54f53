// src/db/handler.rs

use async_trait::async_trait;

use super::contact::{Contact, NewContact};
use super::contact_store::ContactStore;
use super::error::StoreResult;

/// Узкий интерфейс, через который экраны работают с контактами.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn list_all(&self) -> StoreResult<Vec<Contact>>;
    async fn list_favorites(&self) -> StoreResult<Vec<Contact>>;
    async fn add(&self, contact: NewContact) -> StoreResult<i64>;
    async fn update(&self, contact: Contact) -> StoreResult<()>;
    async fn delete(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
impl ContactRepository for ContactStore {
    async fn list_all(&self) -> StoreResult<Vec<Contact>> {
        ContactStore::list_all(self).await
    }

    async fn list_favorites(&self) -> StoreResult<Vec<Contact>> {
        ContactStore::list_favorites(self).await
    }

    async fn add(&self, contact: NewContact) -> StoreResult<i64> {
        ContactStore::add(self, contact).await
    }

    async fn update(&self, contact: Contact) -> StoreResult<()> {
        ContactStore::update(self, contact).await
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        ContactStore::delete(self, id).await
    }
}
