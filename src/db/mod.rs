// src/db/mod.rs
//
// Слой хранения контактов:
// - contact        модель и кодирование isFavorite
// - schema         DDL и SQL
// - migrations     CREATE IF NOT EXISTS + user_version
// - contact_store  ContactStore (CRUD поверх tokio_rusqlite)
// - handler        трейт ContactRepository для экранов
// - cache          LRU для get(id)
// - monitor        лента изменений (update_hook + commit/rollback hooks)
// - monitoring     prometheus-метрики

pub mod cache;
pub mod config;
pub mod contact;
pub mod contact_store;
pub mod error;
pub mod handler;
pub mod migrations;
pub mod monitor;
pub mod monitoring;
pub mod schema;

pub use config::{StoreConfig, DATABASE_NAME};
pub use contact::{Contact, NewContact};
pub use contact_store::ContactStore;
pub use error::{StoreError, StoreResult};
pub use handler::ContactRepository;
pub use monitor::{ChangeKind, ContactEvent};
pub use monitoring::gather_metrics;
