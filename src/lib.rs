// src/lib.rs
//
// Корень крейта + C ABI для мобильного хоста.
// Хост (Swift/Kotlin) вызывает contacts_* функции; всё, кроме init/close/ready,
// возвращает JSON-конверт {"ok": ...} или {"error": {"code": n, "message": "..."}}.
// Строки, отданные наружу, освобождаются через contacts_free_string.

use std::ffi::{CStr, CString};
use std::future::Future;
use std::os::raw::c_char;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use anyhow::{anyhow, Context};
use log::{error, info, warn};
use once_cell::sync::{Lazy, OnceCell};
use serde::Serialize;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::broadcast::error::RecvError;

pub mod db;

pub use db::{
    gather_metrics, ChangeKind, Contact, ContactEvent, ContactRepository, ContactStore,
    NewContact, StoreConfig, StoreError, StoreResult, DATABASE_NAME,
};

/// Код для ошибок самого моста (битый JSON, не-UTF-8, рантайм).
pub const BRIDGE_ERROR_CODE: i32 = 100;

// ---------------------- Глобальные объекты ----------------------

/// Одно хранилище на процесс. Второй хэндл на тот же файл не открываем.
static GLOBAL_STORE: Lazy<Mutex<Option<Arc<ContactStore>>>> = Lazy::new(|| Mutex::new(None));

/// Рантайм для блокирующих вызовов из хоста.
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Callback хоста для ленты изменений.
static CHANGE_CALLBACK: Lazy<Mutex<Option<extern "C" fn(*const c_char)>>> =
    Lazy::new(|| Mutex::new(None));

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn runtime() -> anyhow::Result<&'static Runtime> {
    RUNTIME
        .get_or_try_init(|| {
            Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("contacts-bridge")
                .enable_all()
                .build()
        })
        .context("failed to start tokio runtime")
}

/// `block_on` на рантайме моста. Изнутри tokio-контекста (например, хост
/// дёрнул мост из своего async-кода) tokio бы запаниковал, а паника через
/// `extern "C"` роняет процесс, поэтому возвращаем ошибку моста.
fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    if Handle::try_current().is_ok() {
        return Err(anyhow!(
            "bridge called from inside a tokio runtime; call it from a plain thread"
        ));
    }
    Ok(runtime()?.block_on(future))
}

fn global_store() -> Option<Arc<ContactStore>> {
    lock(&GLOBAL_STORE).clone()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Envelope<T> {
    Ok(T),
    Error { code: i32, message: String },
}

impl<T: Serialize> Envelope<T> {
    fn from_result(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => Envelope::Ok(value),
            Err(e) => {
                let code = error_code(&e);
                error!("bridge call failed: {e:#}");
                Envelope::Error {
                    code,
                    message: format!("{e:#}"),
                }
            }
        }
    }
}

fn error_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<StoreError>()
        .map_or(BRIDGE_ERROR_CODE, StoreError::code)
}

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

fn respond<T: Serialize>(result: anyhow::Result<T>) -> *mut c_char {
    let json = serde_json::to_string(&Envelope::from_result(result)).unwrap_or_else(|e| {
        format!(r#"{{"error":{{"code":{BRIDGE_ERROR_CODE},"message":"{e}"}}}}"#)
    });
    into_c_string(json)
}

/// Выполняет операцию на глобальном хранилище и упаковывает результат.
/// До contacts_init - NotOpen.
fn with_store<T, F, Fut>(op: F) -> *mut c_char
where
    T: Serialize,
    F: FnOnce(Arc<ContactStore>) -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let result = (|| -> anyhow::Result<T> {
        let store = global_store().ok_or(StoreError::NotOpen)?;
        let value = block_on(op(store))??;
        Ok(value)
    })();
    respond(result)
}

/// Nullable C-строка → String. Не-UTF-8 - ошибка моста.
unsafe fn c_str_to_string(s: *const c_char) -> anyhow::Result<Option<String>> {
    if s.is_null() {
        return Ok(None);
    }
    let value = CStr::from_ptr(s)
        .to_str()
        .context("argument is not valid UTF-8")?;
    Ok(Some(value.to_owned()))
}

unsafe fn required_str(s: *const c_char, name: &str) -> anyhow::Result<String> {
    c_str_to_string(s)?.ok_or_else(|| anyhow!("{name} is null"))
}

/// Отдельный поток: события из ленты → JSON → callback хоста.
///
/// Callback живёт вне рантайма моста, так что хост может прямо из него
/// перечитать данные через contacts_*. Поток завершается, когда хранилище
/// закрыто и лента пуста.
fn start_change_dispatcher(store: &ContactStore) -> anyhow::Result<()> {
    let mut rx = store.subscribe();
    thread::Builder::new()
        .name("contacts-changes".into())
        .spawn(move || loop {
            match rx.blocking_recv() {
                Ok(event) => notify_host(&event),
                Err(RecvError::Lagged(missed)) => {
                    warn!("change dispatcher lagged, {missed} events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        })
        .context("failed to start change dispatcher")?;
    Ok(())
}

fn notify_host(event: &ContactEvent) {
    // Копируем указатель и отпускаем lock до вызова: callback может
    // перерегистрировать себя.
    let callback = *lock(&CHANGE_CALLBACK);
    let Some(cb) = callback else {
        return;
    };
    match serde_json::to_string(event) {
        Ok(json) => {
            if let Ok(cstr) = CString::new(json) {
                cb(cstr.as_ptr());
            }
        }
        Err(e) => error!("Failed to serialize change event: {e}"),
    }
}

// ---------------------- Экспортируемые функции ----------------------

/// Открывает хранилище.
///
/// - `db_path`: путь к файлу (или ":memory:")
/// - `db_key`: ключ SQLCipher или NULL
///
/// Возвращает `0`, если всё ок, иначе код ошибки. Повторный вызов при
/// открытом хранилище ничего не делает.
#[no_mangle]
pub unsafe extern "C" fn contacts_init(db_path: *const c_char, db_key: *const c_char) -> i32 {
    let _ = env_logger::try_init();

    let mut guard = lock(&GLOBAL_STORE);
    if guard.is_some() {
        warn!("contacts_init: store already open, ignoring");
        return 0;
    }

    let result = (|| -> anyhow::Result<Arc<ContactStore>> {
        let path = required_str(db_path, "db_path")?;
        let key = c_str_to_string(db_key)?;
        let mut config = StoreConfig::new(path);
        if let Some(key) = key {
            config = config.with_key(key);
        }

        let store = block_on(ContactStore::open(config))??;
        start_change_dispatcher(&store)?;
        Ok(Arc::new(store))
    })();

    match result {
        Ok(store) => {
            *guard = Some(store);
            info!("contacts_init success");
            0
        }
        Err(e) => {
            error!("contacts_init failed: {e:#}");
            error_code(&e)
        }
    }
}

/// `0`, если хранилище открыто, иначе `1`.
#[no_mangle]
pub extern "C" fn contacts_is_ready() -> i32 {
    match global_store() {
        Some(store) if store.is_open() => 0,
        _ => 1,
    }
}

#[no_mangle]
pub extern "C" fn contacts_list_all() -> *mut c_char {
    with_store(|store| async move { store.list_all().await })
}

#[no_mangle]
pub extern "C" fn contacts_list_favorites() -> *mut c_char {
    with_store(|store| async move { store.list_favorites().await })
}

#[no_mangle]
pub extern "C" fn contacts_get(id: i64) -> *mut c_char {
    with_store(move |store| async move { store.get(id).await })
}

#[no_mangle]
pub unsafe extern "C" fn contacts_search(query: *const c_char) -> *mut c_char {
    let query = match c_str_to_string(query) {
        Ok(q) => q.unwrap_or_default(),
        Err(e) => return respond::<()>(Err(e)),
    };
    with_store(move |store| async move { store.search(&query).await })
}

/// JSON контакта без id (id во входе игнорируется) → {"ok": новый id}
#[no_mangle]
pub unsafe extern "C" fn contacts_add(json: *const c_char) -> *mut c_char {
    let contact = match required_str(json, "json").and_then(|s| {
        serde_json::from_str::<NewContact>(&s).context("invalid contact JSON")
    }) {
        Ok(contact) => contact,
        Err(e) => return respond::<()>(Err(e)),
    };
    with_store(move |store| async move { store.add(contact).await })
}

/// JSON полного контакта с id. Неизвестный id - код NotFound.
#[no_mangle]
pub unsafe extern "C" fn contacts_update(json: *const c_char) -> *mut c_char {
    let contact = match required_str(json, "json").and_then(|s| {
        serde_json::from_str::<Contact>(&s).context("invalid contact JSON")
    }) {
        Ok(contact) => contact,
        Err(e) => return respond::<()>(Err(e)),
    };
    with_store(move |store| async move { store.update(contact).await })
}

#[no_mangle]
pub extern "C" fn contacts_delete(id: i64) -> *mut c_char {
    with_store(move |store| async move { store.delete(id).await })
}

#[no_mangle]
pub extern "C" fn contacts_toggle_favorite(id: i64) -> *mut c_char {
    with_store(move |store| async move { store.toggle_favorite(id).await })
}

/// Регистрируем callback хоста для уведомления об изменениях
#[no_mangle]
pub extern "C" fn contacts_set_change_callback(cb: extern "C" fn(*const c_char)) {
    *lock(&CHANGE_CALLBACK) = Some(cb);
}

#[no_mangle]
pub extern "C" fn contacts_metrics() -> *mut c_char {
    into_c_string(gather_metrics())
}

/// Закрывает и забывает глобальное хранилище. `0` - ок.
/// При ошибке хранилище остаётся зарегистрированным.
#[no_mangle]
pub extern "C" fn contacts_close() -> i32 {
    let mut guard = lock(&GLOBAL_STORE);
    let Some(store) = guard.clone() else {
        return 0;
    };
    let result = block_on(store.close()).and_then(|closed| closed.map_err(anyhow::Error::from));
    match result {
        Ok(()) => {
            *guard = None;
            0
        }
        Err(e) => {
            error!("contacts_close failed: {e:#}");
            error_code(&e)
        }
    }
}

// Освобождение строк, созданных Rust
#[no_mangle]
pub unsafe extern "C" fn contacts_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static EVENTS_SEEN: AtomicUsize = AtomicUsize::new(0);
    static REFETCHED: AtomicUsize = AtomicUsize::new(0);

    // Ведёт себя как хост: перерегистрирует себя и сразу перечитывает список.
    extern "C" fn on_change(_json: *const c_char) {
        contacts_set_change_callback(on_change);
        let reply = take_json(contacts_list_all());
        if reply.get("ok").is_some() {
            REFETCHED.fetch_add(1, Ordering::SeqCst);
        }
        EVENTS_SEEN.fetch_add(1, Ordering::SeqCst);
    }

    fn wait_for_events(count: usize) {
        for _ in 0..100 {
            if EVENTS_SEEN.load(Ordering::SeqCst) >= count {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    fn take_json(ptr: *mut c_char) -> Value {
        assert!(!ptr.is_null());
        let text = unsafe { CStr::from_ptr(ptr) }
            .to_str()
            .expect("bridge returned non UTF-8")
            .to_owned();
        unsafe { contacts_free_string(ptr) };
        serde_json::from_str(&text).expect("bridge returned invalid JSON")
    }

    // Один тест на весь глобальный мост: состояние общее для процесса.
    #[test]
    fn test_bridge_round_trip() {
        assert_eq!(take_json(contacts_list_all())["error"]["code"], 5);

        let path = CString::new(":memory:").unwrap();
        let code = unsafe { contacts_init(path.as_ptr(), std::ptr::null()) };
        assert_eq!(code, 0, "contacts_init failed");
        assert_eq!(contacts_is_ready(), 0, "DB not ready");
        assert_eq!(unsafe { contacts_init(path.as_ptr(), std::ptr::null()) }, 0);

        contacts_set_change_callback(on_change);

        let ada = CString::new(
            r#"{"id":77,"firstName":"Ada","lastName":"Lovelace","phoneNumber":"555","email":"a@x.com","photoUrl":null,"isFavorite":false}"#,
        )
        .unwrap();
        let added = take_json(unsafe { contacts_add(ada.as_ptr()) });
        assert_eq!(added["ok"], 1);

        // callback перечитал данные через мост и не уронил процесс
        wait_for_events(1);
        assert!(REFETCHED.load(Ordering::SeqCst) >= 1, "callback could not re-fetch");

        // из чужого tokio-рантайма - ошибка моста, а не паника
        let host_rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("Failed to build host runtime");
        let nested = host_rt.block_on(async { take_json(contacts_list_all()) });
        assert_eq!(nested["error"]["code"], BRIDGE_ERROR_CODE);
        drop(host_rt);

        let update = CString::new(
            r#"{"id":1,"firstName":"Ada","lastName":"Lovelace","phoneNumber":"555","email":"a@x.com","photoUrl":null,"isFavorite":true}"#,
        )
        .unwrap();
        let updated = take_json(unsafe { contacts_update(update.as_ptr()) });
        assert!(updated.get("ok").is_some(), "update failed: {updated}");

        let favorites = take_json(contacts_list_favorites());
        assert_eq!(favorites["ok"].as_array().map(Vec::len), Some(1));
        assert_eq!(favorites["ok"][0]["id"], 1);
        assert_eq!(favorites["ok"][0]["isFavorite"], true);

        let query = CString::new("love").unwrap();
        let found = take_json(unsafe { contacts_search(query.as_ptr()) });
        assert_eq!(found["ok"][0]["firstName"], "Ada");

        assert_eq!(take_json(contacts_toggle_favorite(1))["ok"], false);
        assert_eq!(take_json(contacts_get(1))["ok"]["isFavorite"], false);

        let ghost = CString::new(r#"{"id":42,"firstName":"Ghost"}"#).unwrap();
        let missing = take_json(unsafe { contacts_update(ghost.as_ptr()) });
        assert_eq!(missing["error"]["code"], 4);

        let broken = CString::new("{ invalid json }").unwrap();
        let invalid = take_json(unsafe { contacts_add(broken.as_ptr()) });
        assert_eq!(invalid["error"]["code"], BRIDGE_ERROR_CODE);

        assert!(take_json(contacts_delete(1)).get("ok").is_some());
        assert!(take_json(contacts_delete(1)).get("ok").is_some());
        assert_eq!(take_json(contacts_list_all())["ok"], Value::Array(vec![]));
        assert_eq!(take_json(contacts_get(1))["ok"], Value::Null);

        let metrics = contacts_metrics();
        let text = unsafe { CStr::from_ptr(metrics) }.to_string_lossy().into_owned();
        unsafe { contacts_free_string(metrics) };
        assert!(text.contains("contact_store_operations_total"));

        assert_eq!(contacts_close(), 0);
        assert_eq!(contacts_is_ready(), 1);
        assert_eq!(take_json(contacts_list_all())["error"]["code"], 5);

        // insert + update + update(toggle) + delete, доставляются асинхронно
        wait_for_events(4);
        assert!(EVENTS_SEEN.load(Ordering::SeqCst) >= 4);
    }
}
