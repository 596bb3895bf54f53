use contacts_store::{ContactStore, NewContact, StoreConfig, StoreError};

fn grace() -> NewContact {
    NewContact::new("Grace", "Hopper")
        .with_phone("555-0142")
        .with_email("grace@navy.mil")
        .with_photo("content://media/external/images/media/42")
}

#[tokio::test]
async fn test_contacts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::in_directory(dir.path());

    // Первый экземпляр: два контакта, последний удаляем
    let (kept, dropped) = {
        let store = ContactStore::open(config.clone()).await.unwrap();
        let kept = store.add(grace().favorite(true)).await.unwrap();
        let dropped = store.add(NewContact::new("Temp", "")).await.unwrap();
        store.delete(dropped).await.unwrap();
        store.close().await.unwrap();
        (kept, dropped)
    };

    assert!(dir.path().join("Contacts.db").exists());

    // Второй экземпляр: схема уже есть, данные на месте
    let store = ContactStore::open(config).await.unwrap();
    let all = store.list_all().await.unwrap();
    assert_eq!(all, vec![grace().favorite(true).into_contact(kept)]);
    assert_eq!(store.list_favorites().await.unwrap().len(), 1);

    // AUTOINCREMENT не выдаёт удалённый id повторно
    let next = store.add(NewContact::new("Next", "")).await.unwrap();
    assert!(next > dropped, "id {next} reused after {dropped}");
}

#[tokio::test]
async fn test_repeated_open_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::in_directory(dir.path());

    for round in 0..3 {
        let store = ContactStore::open(config.clone()).await.unwrap();
        store
            .add(NewContact::new(format!("Round {round}"), ""))
            .await
            .unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), round + 1);
        store.close().await.unwrap();
    }
}

#[tokio::test]
async fn test_legacy_database_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::in_directory(dir.path());

    // Файл от старого приложения: флаг записан текстом
    {
        let conn = rusqlite::Connection::open(&config.path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS contacts (id INTEGER PRIMARY KEY AUTOINCREMENT, firstName TEXT, lastName TEXT, phoneNumber TEXT, email TEXT, photoUrl TEXT, isFavorite INTEGER);
            INSERT INTO contacts (firstName, lastName, phoneNumber, email, photoUrl, isFavorite)
                VALUES ('Ada', 'Lovelace', '555', 'a@x.com', NULL, 'true');
            INSERT INTO contacts (firstName, lastName, phoneNumber, email, photoUrl, isFavorite)
                VALUES ('Charles', NULL, NULL, NULL, 'file:///photo.jpg', 'false');
            "#,
        )
        .unwrap();
    }

    let store = ContactStore::open(config).await.unwrap();

    let favorites = store.list_favorites().await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].first_name, "Ada");

    let all = store.list_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].last_name, "");
    assert_eq!(all[1].photo_url.as_deref(), Some("file:///photo.jpg"));
    assert!(!all[1].is_favorite);
}

#[tokio::test]
async fn test_unopenable_path_is_initialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("missing").join("nested").join("Contacts.db"));

    let result = ContactStore::open(config).await;
    assert!(matches!(result, Err(StoreError::Initialization(_))));
}

#[tokio::test]
async fn test_corrupt_file_is_initialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::in_directory(dir.path());
    std::fs::write(&config.path, vec![0x42u8; 4096]).unwrap();

    let result = ContactStore::open(config).await;
    assert!(matches!(result, Err(StoreError::Initialization(_))));
}

#[tokio::test]
async fn test_broken_table_reports_query_and_write_errors() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::in_directory(dir.path());

    let store = ContactStore::open(config.clone()).await.unwrap();
    store.add(grace()).await.unwrap();

    // Таблицу сносит кто-то снаружи, пока хранилище открыто
    {
        let conn = rusqlite::Connection::open(&config.path).unwrap();
        conn.execute_batch("DROP TABLE contacts;").unwrap();
    }

    let read = store.list_all().await;
    assert!(matches!(read, Err(StoreError::Query(_))), "got {read:?}");

    let write = store.add(NewContact::new("Late", "")).await;
    assert!(matches!(write, Err(StoreError::Write(_))), "got {write:?}");

    // Хранилище при этом остаётся открытым
    assert!(store.is_open());
}
