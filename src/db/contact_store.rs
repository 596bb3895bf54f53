// src/db/contact_store.rs

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rusqlite::{params, OpenFlags, OptionalExtension};
use tokio::sync::broadcast;
use tokio_rusqlite::Connection;

use super::cache::CacheHandler;
use super::config::StoreConfig;
use super::contact::{decode_favorite, encode_favorite, Contact, NewContact};
use super::error::{StoreError, StoreResult};
use super::migrations::setup_schema;
use super::monitor::{ChangeFeed, ContactEvent};
use super::monitoring::measure_db_operation;
use super::schema::{
    DELETE_CONTACT, INSERT_CONTACT, SELECT_ALL_CONTACTS, SELECT_CONTACTS_BY_FAVORITE,
    SELECT_CONTACT_BY_ID, SELECT_FAVORITE_FLAG, UPDATE_CONTACT, UPDATE_FAVORITE_FLAG,
};

/// Хранилище контактов поверх одного файла SQLite.
///
/// Создаётся один раз на старте и раздаётся всем через `Arc<ContactStore>`.
/// Вся работа с базой идёт на потоке соединения `tokio_rusqlite`, который
/// выполняет замыкания по одному: операции одного вызывающего видны в порядке
/// вызова, параллельные вызывающие сериализуются.
pub struct ContactStore {
    conn: Connection,
    cache: CacheHandler,
    feed: ChangeFeed,
    open: AtomicBool,
    label: String,
}

impl ContactStore {
    /// Открывает (или создаёт) файл базы и гарантирует наличие таблицы.
    ///
    /// Ошибка здесь фатальна для экземпляра: соединение закрывается,
    /// полуоткрытое хранилище наружу не отдаётся.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .await
        .map_err(StoreError::Initialization)?;

        Self::prepare(conn, config).await
    }

    pub async fn open_in_memory() -> StoreResult<Self> {
        Self::open(StoreConfig::in_memory()).await
    }

    async fn prepare(conn: Connection, config: StoreConfig) -> StoreResult<Self> {
        let feed = ChangeFeed::new(config.event_capacity);
        let hook_feed = feed.clone();
        let key = config.key.clone();
        let busy_timeout = config.busy_timeout;

        let setup = conn
            .call(move |conn| {
                apply_key(conn, key.as_deref())?;
                conn.busy_timeout(busy_timeout)?;
                setup_schema(conn)?;
                hook_feed.register(conn);
                Ok(())
            })
            .await;

        if let Err(e) = setup {
            if let Err(close_err) = conn.close().await {
                warn!("failed to close connection after init error: {close_err}");
            }
            return Err(StoreError::Initialization(e));
        }

        let label = config.path.display().to_string();
        info!("contact store opened: {label}");

        Ok(Self {
            conn,
            cache: CacheHandler::new(config.cache_capacity),
            feed,
            open: AtomicBool::new(true),
            label,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::NotOpen)
        }
    }

    /// Все контакты в порядке id. Пустая таблица - пустой вектор.
    pub async fn list_all(&self) -> StoreResult<Vec<Contact>> {
        measure_db_operation("list_all", async {
            self.ensure_open()?;
            self.conn
                .call(|conn| {
                    let mut stmt = conn.prepare_cached(SELECT_ALL_CONTACTS)?;
                    let contacts = stmt
                        .query_map([], Contact::from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(contacts)
                })
                .await
                .map_err(StoreError::query)
        })
        .await
    }

    /// То же, что `list_all`, но только `isFavorite = 1`.
    pub async fn list_favorites(&self) -> StoreResult<Vec<Contact>> {
        measure_db_operation("list_favorites", async {
            self.ensure_open()?;
            self.conn
                .call(|conn| {
                    let mut stmt = conn.prepare_cached(SELECT_CONTACTS_BY_FAVORITE)?;
                    let contacts = stmt
                        .query_map(params![encode_favorite(true)], Contact::from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(contacts)
                })
                .await
                .map_err(StoreError::query)
        })
        .await
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<Contact>> {
        measure_db_operation("get", async {
            self.ensure_open()?;
            let cache = self.cache.clone();
            self.conn
                .call(move |conn| {
                    if let Some(hit) = cache.get_contact(id) {
                        return Ok(Some(hit));
                    }
                    let contact = conn
                        .query_row(SELECT_CONTACT_BY_ID, params![id], Contact::from_row)
                        .optional()?;
                    if let Some(contact) = &contact {
                        cache.put_contact(contact.clone());
                    }
                    Ok(contact)
                })
                .await
                .map_err(StoreError::query)
        })
        .await
    }

    /// Вставляет контакт и возвращает id, назначенный базой.
    ///
    /// id берётся из `RETURNING` и проверяется чтением строки в той же
    /// транзакции; без успешной проверки транзакция откатывается.
    pub async fn add(&self, contact: NewContact) -> StoreResult<i64> {
        measure_db_operation("add", async {
            self.ensure_open()?;
            let cache = self.cache.clone();
            let id = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let id: i64 = tx.query_row(
                        INSERT_CONTACT,
                        params![
                            contact.first_name,
                            contact.last_name,
                            contact.phone_number,
                            contact.email,
                            contact.photo_url,
                            encode_favorite(contact.is_favorite),
                        ],
                        |row| row.get(0),
                    )?;

                    let stored = tx
                        .query_row(SELECT_CONTACT_BY_ID, params![id], Contact::from_row)
                        .optional()?;
                    let Some(stored) = stored else {
                        return Err(tokio_rusqlite::Error::Other(
                            format!("inserted contact id={id} is not readable").into(),
                        ));
                    };

                    tx.commit()?;
                    cache.put_contact(stored);
                    Ok(id)
                })
                .await
                .map_err(StoreError::write)?;

            debug!("contact added id={id}");
            Ok::<_, StoreError>(id)
        })
        .await
    }

    /// Полная перезапись строки по `contact.id`.
    ///
    /// Отсутствующий id - `NotFound`, таблица при этом не меняется.
    pub async fn update(&self, contact: Contact) -> StoreResult<()> {
        measure_db_operation("update", async {
            self.ensure_open()?;
            let id = contact.id;
            let cache = self.cache.clone();
            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        UPDATE_CONTACT,
                        params![
                            contact.first_name,
                            contact.last_name,
                            contact.phone_number,
                            contact.email,
                            contact.photo_url,
                            encode_favorite(contact.is_favorite),
                            contact.id,
                        ],
                    )?;
                    if changed > 0 {
                        cache.put_contact(contact);
                    }
                    Ok(changed)
                })
                .await
                .map_err(StoreError::write)?;

            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            debug!("contact updated id={id}");
            Ok::<_, StoreError>(())
        })
        .await
    }

    /// Удаление идемпотентно: отсутствующий id - не ошибка.
    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        measure_db_operation("delete", async {
            self.ensure_open()?;
            let cache = self.cache.clone();
            let deleted = self
                .conn
                .call(move |conn| {
                    let deleted = conn.execute(DELETE_CONTACT, params![id])?;
                    cache.remove_contact(id);
                    Ok(deleted)
                })
                .await
                .map_err(StoreError::write)?;

            if deleted > 0 {
                debug!("contact deleted id={id}");
            } else {
                debug!("contact {id} not found for deletion");
            }
            Ok::<_, StoreError>(())
        })
        .await
    }

    /// Переключает избранное и возвращает новое значение.
    pub async fn toggle_favorite(&self, id: i64) -> StoreResult<bool> {
        measure_db_operation("toggle_favorite", async {
            self.ensure_open()?;
            let cache = self.cache.clone();
            let toggled = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let current = tx
                        .query_row(SELECT_FAVORITE_FLAG, params![id], |row| {
                            Ok(decode_favorite(row.get_ref(0)?))
                        })
                        .optional()?;
                    let Some(current) = current else {
                        return Ok(None);
                    };

                    let next = !current;
                    tx.execute(UPDATE_FAVORITE_FLAG, params![encode_favorite(next), id])?;
                    tx.commit()?;
                    cache.remove_contact(id);
                    Ok(Some(next))
                })
                .await
                .map_err(StoreError::write)?;

            toggled.ok_or(StoreError::NotFound(id))
        })
        .await
    }

    /// Поиск как на экране поиска. Пустой запрос - пустой результат.
    pub async fn search(&self, query: &str) -> StoreResult<Vec<Contact>> {
        if query.is_empty() {
            self.ensure_open()?;
            return Ok(Vec::new());
        }
        let contacts = self.list_all().await?;
        Ok(contacts
            .into_iter()
            .filter(|contact| contact.matches_query(query))
            .collect())
    }

    /// Подписка на изменения таблицы.
    pub fn subscribe(&self) -> broadcast::Receiver<ContactEvent> {
        self.feed.subscribe()
    }

    /// Закрывает соединение. Повторный вызов - no-op.
    /// После закрытия все операции возвращают `NotOpen`.
    pub async fn close(&self) -> StoreResult<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        match self.conn.clone().close().await {
            Ok(()) => {
                info!("contact store closed: {}", self.label);
                Ok(())
            }
            Err(e) => {
                // соединение осталось живым
                self.open.store(true, Ordering::Release);
                Err(StoreError::Close(e))
            }
        }
    }
}

#[cfg(feature = "encryption")]
fn apply_key(conn: &rusqlite::Connection, key: Option<&str>) -> tokio_rusqlite::Result<()> {
    if let Some(key) = key {
        conn.pragma_update(None, "key", key)?;
    }
    Ok(())
}

#[cfg(not(feature = "encryption"))]
fn apply_key(_conn: &rusqlite::Connection, key: Option<&str>) -> tokio_rusqlite::Result<()> {
    if key.is_some() {
        return Err(tokio_rusqlite::Error::Other(
            "encryption key given but the `encryption` feature is disabled".into(),
        ));
    }
    Ok(())
}
