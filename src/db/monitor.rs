// src/db/monitor.rs
//
// Лента изменений таблицы contacts.
//
// 1) update_hook SQLite ловит INSERT/UPDATE/DELETE на потоке соединения
//    и складывает события в буфер транзакции,
// 2) commit_hook отправляет буфер в tokio broadcast, rollback_hook его
//    выбрасывает: откаченные строки подписчики не видят,
// 3) экраны (или C-мост) подписываются и перечитывают данные.
//
// commit_hook вызывается прямо перед фиксацией, так что событие -
// подсказка "перечитай", а не гарантия того, что строка уже видна.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::trace;
use rusqlite::hooks::Action;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::schema::CONTACTS_TABLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Событие изменения строки contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub operation: ChangeKind,
    pub id: i64,
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ContactEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContactEvent> {
        self.sender.subscribe()
    }

    /// Регистрируем update/commit/rollback hooks на соединении rusqlite.
    pub fn register(&self, conn: &Connection) {
        let pending: Arc<Mutex<Vec<ContactEvent>>> = Arc::default();

        let buffer = Arc::clone(&pending);
        conn.update_hook(Some(
            move |action: Action, _db: &str, table: &str, rowid: i64| {
                if table != CONTACTS_TABLE {
                    return;
                }
                let operation = match action {
                    Action::SQLITE_INSERT => ChangeKind::Insert,
                    Action::SQLITE_UPDATE => ChangeKind::Update,
                    Action::SQLITE_DELETE => ChangeKind::Delete,
                    _ => return,
                };
                lock(&buffer).push(ContactEvent { operation, id: rowid });
            },
        ));

        let buffer = Arc::clone(&pending);
        let sender = self.sender.clone();
        conn.commit_hook(Some(move || {
            for event in mem::take(&mut *lock(&buffer)) {
                // Нет подписчиков - не ошибка
                if let Err(broadcast::error::SendError(event)) = sender.send(event) {
                    trace!("no subscribers for {:?} id={}", event.operation, event.id);
                }
            }
            // false - коммит не отменяем
            false
        }));

        conn.rollback_hook(Some(move || {
            let dropped = mem::take(&mut *lock(&pending));
            if !dropped.is_empty() {
                trace!("rollback: {} change events dropped", dropped.len());
            }
        }));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
