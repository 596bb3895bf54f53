// src/db/schema.rs

/// Имя таблицы контактов (фильтр для update_hook тоже по нему).
pub const CONTACTS_TABLE: &str = "contacts";

/// Текущая версия схемы, хранится в PRAGMA user_version.
pub const LATEST_SCHEMA_VERSION: i32 = 1;

// Contacts:
// Имена колонок совпадают с тем, что писало старое приложение,
// поэтому существующие файлы открываются без переноса данных.
pub const CREATE_CONTACTS_TABLE: &str = r#"
CREATE TABLE
    IF NOT EXISTS contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        firstName TEXT,
        lastName TEXT,
        phoneNumber TEXT,
        email TEXT,
        photoUrl TEXT,
        isFavorite INTEGER
    );
"#;

// Старая версия при вставке писала "нативный" boolean, при обновлении 0/1.
// Приводим всё к 0/1 один раз, при переходе на версию 1.
pub const NORMALIZE_FAVORITES_V1: &str = r#"
UPDATE contacts
SET
    isFavorite = CASE
        WHEN isFavorite = 1
        OR lower(CAST(isFavorite AS TEXT)) = 'true' THEN 1
        ELSE 0
    END
WHERE
    isFavorite IS NULL
    OR isFavorite NOT IN (0, 1);
"#;

pub const SELECT_ALL_CONTACTS: &str = r#"
SELECT id, firstName, lastName, phoneNumber, email, photoUrl, isFavorite
FROM contacts
ORDER BY id
"#;

pub const SELECT_CONTACTS_BY_FAVORITE: &str = r#"
SELECT id, firstName, lastName, phoneNumber, email, photoUrl, isFavorite
FROM contacts
WHERE isFavorite = ?1
ORDER BY id
"#;

pub const SELECT_CONTACT_BY_ID: &str = r#"
SELECT id, firstName, lastName, phoneNumber, email, photoUrl, isFavorite
FROM contacts
WHERE id = ?1
"#;

pub const SELECT_FAVORITE_FLAG: &str = "SELECT isFavorite FROM contacts WHERE id = ?1";

// RETURNING отдаёт id в том же операторе, без угадывания через last_insert_rowid.
pub const INSERT_CONTACT: &str = r#"
INSERT INTO contacts (firstName, lastName, phoneNumber, email, photoUrl, isFavorite)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
RETURNING id
"#;

pub const UPDATE_CONTACT: &str = r#"
UPDATE contacts
SET firstName = ?1,
    lastName = ?2,
    phoneNumber = ?3,
    email = ?4,
    photoUrl = ?5,
    isFavorite = ?6
WHERE id = ?7
"#;

pub const UPDATE_FAVORITE_FLAG: &str = "UPDATE contacts SET isFavorite = ?1 WHERE id = ?2";

pub const DELETE_CONTACT: &str = "DELETE FROM contacts WHERE id = ?1";
