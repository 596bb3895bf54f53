// src/db/error.rs

use thiserror::Error;

/// Ошибки хранилища контактов.
///
/// Пустая таблица и удаление отсутствующего id ошибками не являются.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Файл не открылся или схема не создалась. Экземпляр непригоден.
    #[error("failed to initialize contact store: {0}")]
    Initialization(#[source] tokio_rusqlite::Error),

    #[error("failed to query contacts: {0}")]
    Query(#[source] tokio_rusqlite::Error),

    #[error("failed to write contact: {0}")]
    Write(#[source] tokio_rusqlite::Error),

    #[error("no contact with id={0}")]
    NotFound(i64),

    #[error("contact store is not open")]
    NotOpen,

    #[error("failed to close contact store: {0}")]
    Close(#[source] tokio_rusqlite::Error),
}

impl StoreError {
    pub(crate) fn query(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::ConnectionClosed => StoreError::NotOpen,
            other => StoreError::Query(other),
        }
    }

    pub(crate) fn write(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::ConnectionClosed => StoreError::NotOpen,
            other => StoreError::Write(other),
        }
    }

    /// Стабильный код для C-моста.
    pub fn code(&self) -> i32 {
        match self {
            StoreError::Initialization(_) => 1,
            StoreError::Query(_) => 2,
            StoreError::Write(_) => 3,
            StoreError::NotFound(_) => 4,
            StoreError::NotOpen => 5,
            StoreError::Close(_) => 6,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
