// src/db/cache.rs

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::contact::Contact;

/// Тип кэша для записей контактов, ключ - id строки
pub type ContactCache = LruCache<i64, Contact>;

/// Кэш чтения для `get(id)`.
///
/// Меняется только внутри `Connection::call`, то есть на потоке соединения
/// и после успешного оператора, поэтому порядок записей в кэш совпадает
/// с порядком коммитов.
#[derive(Clone)]
pub struct CacheHandler {
    contact_cache: Option<Arc<Mutex<ContactCache>>>,
}

impl CacheHandler {
    /// Ёмкость 0 - кэш выключен.
    pub fn new(capacity: usize) -> Self {
        Self {
            contact_cache: NonZeroUsize::new(capacity)
                .map(|cap| Arc::new(Mutex::new(LruCache::new(cap)))),
        }
    }

    fn lock(cache: &Mutex<ContactCache>) -> MutexGuard<'_, ContactCache> {
        cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_contact(&self, id: i64) -> Option<Contact> {
        let cache = self.contact_cache.as_ref()?;
        Self::lock(cache).get(&id).cloned()
    }

    /// Добавляет или обновляет запись контакта в кэше
    pub fn put_contact(&self, contact: Contact) {
        if let Some(cache) = &self.contact_cache {
            Self::lock(cache).put(contact.id, contact);
        }
    }

    pub fn remove_contact(&self, id: i64) {
        if let Some(cache) = &self.contact_cache {
            Self::lock(cache).pop(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.contact_cache
            .as_ref()
            .map_or(0, |cache| Self::lock(cache).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
