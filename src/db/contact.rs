// src/db/contact.rs

use rusqlite::types::ValueRef;
use rusqlite::{Result, Row};
use serde::{Deserialize, Serialize};

/// Значения колонки isFavorite. Кодирование живёт только здесь.
pub const FAVORITE_TRUE: i64 = 1;
pub const FAVORITE_FALSE: i64 = 0;

/// Запись контакта в том виде, в каком её видят вызывающие.
///
/// Это снимок: после `update`/`delete` его нужно перечитать.
/// JSON-поля совпадают с именами колонок (`firstName`, `photoUrl`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    /// Непрозрачный URI фото, хранится как есть.
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Данные для вставки: id назначает хранилище, поэтому его здесь нет.
/// `id` во входном JSON просто игнорируется.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub is_favorite: bool,
}

impl NewContact {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    pub fn with_phone(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = phone_number.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_photo(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }

    pub fn favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    /// Собирает полную запись после того, как хранилище выдало id.
    pub fn into_contact(self, id: i64) -> Contact {
        Contact {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            email: self.email,
            photo_url: self.photo_url,
            is_favorite: self.is_favorite,
        }
    }
}

impl Contact {
    /// Строка → Contact. Колонки в порядке SELECT из schema.rs.
    /// NULL в текстовых полях (старые строки) читается как пустая строка.
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            last_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            phone_number: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            email: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            photo_url: row.get(5)?,
            is_favorite: decode_favorite(row.get_ref(6)?),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Совпадение для экрана поиска: имя/фамилия/полное имя в обе стороны
    /// без учёта регистра, телефон - как есть.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        let first = self.first_name.to_lowercase();
        let last = self.last_name.to_lowercase();

        first.contains(&needle)
            || last.contains(&needle)
            || self.phone_number.contains(query)
            || self.full_name().to_lowercase().contains(&needle)
            || format!("{last} {first}").contains(&needle)
    }
}

pub fn encode_favorite(is_favorite: bool) -> i64 {
    if is_favorite {
        FAVORITE_TRUE
    } else {
        FAVORITE_FALSE
    }
}

/// Читает флаг терпимо к тому, что могло остаться от старых версий
/// (NULL, 'true', 1.0). Всё неизвестное - false.
pub fn decode_favorite(value: ValueRef<'_>) -> bool {
    match value {
        ValueRef::Integer(i) => i != FAVORITE_FALSE,
        ValueRef::Real(r) => r != 0.0,
        ValueRef::Text(t) => t.eq_ignore_ascii_case(b"true") || t == b"1",
        ValueRef::Null | ValueRef::Blob(_) => false,
    }
}
