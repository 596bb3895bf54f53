// src/db/migrations.rs

use log::{debug, info, warn};
use rusqlite::{Connection, Result};

use crate::db::schema::{CREATE_CONTACTS_TABLE, LATEST_SCHEMA_VERSION, NORMALIZE_FAVORITES_V1};

/// Создаёт таблицу (если её нет) и доводит схему до LATEST_SCHEMA_VERSION.
///
/// Безопасно вызывать на каждом открытии: всё выполняется в одной транзакции,
/// при ошибке транзакция откатывается при drop.
pub fn setup_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    // Узнаём текущую версию схемы
    let ver: i32 = tx.query_row("PRAGMA user_version;", [], |r| r.get(0))?;

    tx.execute_batch(CREATE_CONTACTS_TABLE)?;

    // 0 -> файл новый или остался от старого приложения
    if ver < 1 {
        let normalized = tx.execute(NORMALIZE_FAVORITES_V1, [])?;
        if normalized > 0 {
            info!("normalized favorite flag in {normalized} legacy rows");
        }
        tx.pragma_update(None, "user_version", LATEST_SCHEMA_VERSION)?;
    } else if ver > LATEST_SCHEMA_VERSION {
        warn!("schema version {ver} is newer than supported {LATEST_SCHEMA_VERSION}, opening as-is");
    }

    tx.commit()?;
    debug!("schema ready (user_version was {ver})");
    Ok(())
}
