//! End-to-end tests for the two front ends: the web server over HTTP, and
//! the bot against an in-process fake of the Telegram Bot API.

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use gifbot::auth::AuthList;
use gifbot::bot::{self, BotContext, NOT_AUTHENTICATED, SEARCH_UNAVAILABLE};
use gifbot::config::{AssetsConfig, Config, DbConfig, SearchConfig, ServerConfig};
use gifbot::sqlite_store::SqliteStore;
use gifbot::telegram::{BotApi, Chat, InlineQuery, Message, TelegramGateway, Update, User};
use gifbot::{db, migrate, server};
use gifbot_core::reconcile::AssetResolver;
use gifbot_core::search::SearchParams;
use gifbot_core::store::Store;
use gifbot_core::RawRow;

const AUTHORIZED: i64 = 7;
const STRANGER: i64 = 8;
const SERVICE_CHAT: i64 = 100;

fn test_config(tmp: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: tmp.path().join("data/gifs.sqlite"),
        },
        assets: AssetsConfig {
            dir: tmp.path().join("gifs"),
        },
        search: SearchConfig::default(),
        server: ServerConfig::default(),
        telegram: None,
    }
}

/// A store seeded with the cat and dog records and their asset files.
async fn seeded_store(cfg: &Config) -> Arc<SqliteStore> {
    std::fs::create_dir_all(&cfg.assets.dir).unwrap();
    std::fs::write(cfg.assets.dir.join("cat.gif"), b"GIF89a-cat").unwrap();
    std::fs::write(cfg.assets.dir.join("dog.gif"), b"GIF89a-dog").unwrap();

    let pool = db::connect(cfg).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    let store = SqliteStore::new(pool);
    store.insert("cat.gif", "funny cat jumping").await.unwrap();
    store.insert("dog.gif", "sad dog").await.unwrap();
    Arc::new(store)
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn start_web(cfg: &Config, store: Arc<SqliteStore>) -> u16 {
    let port = find_free_port();
    let app = server::router(store, cfg.web_search_params(), &cfg.assets.dir);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    wait_for_server(port).await;
    port
}

// ─── Web front end ──────────────────────────────────────────────────

#[tokio::test]
async fn test_web_search_returns_ranked_json() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let port = start_web(&cfg, store).await;

    let body: Value = reqwest::get(format!("http://127.0.0.1:{}/search?query=cat", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "cat.gif");
    assert_eq!(results[0]["url"], "/gifs/cat.gif");
    assert_eq!(results[0]["cached"], false);
    assert!(results[0]["score"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_web_search_is_unlimited_by_default_and_honors_limit() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let port = start_web(&cfg, store).await;

    let all: Value = reqwest::get(format!("http://127.0.0.1:{}/search?query=a", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["results"].as_array().unwrap().len(), 2);

    let one: Value = reqwest::get(format!("http://127.0.0.1:{}/search?query=a&limit=1", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(one["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_web_empty_query_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let port = start_web(&cfg, store).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{}/search?query=%20", port))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_web_serves_asset_files() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let port = start_web(&cfg, store).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{}/gifs/dog.gif", port))
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"GIF89a-dog");
}

#[tokio::test]
async fn test_web_asset_links_are_percent_encoded() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    std::fs::write(cfg.assets.dir.join("my cat #1.gif"), b"GIF89a-kitten").unwrap();
    store.insert("my cat #1.gif", "sleepy kitten").await.unwrap();
    let port = start_web(&cfg, store).await;

    let body: Value = reqwest::get(format!("http://127.0.0.1:{}/search?query=kitten", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "my cat #1.gif");
    let url = results[0]["url"].as_str().unwrap();
    assert_eq!(url, "/gifs/my%20cat%20%231.gif");

    // The link resolves to the file rather than being cut at '#'.
    let resp = reqwest::get(format!("http://127.0.0.1:{}{}", port, url))
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"GIF89a-kitten");
}

// ─── Fake Bot API ───────────────────────────────────────────────────

#[derive(Default)]
struct FakeTelegram {
    uploads: AtomicUsize,
    messages: Mutex<Vec<(i64, String)>>,
    animations: Mutex<Vec<(i64, String)>>,
    inline_answers: Mutex<Vec<Value>>,
    pending_updates: Mutex<Vec<Value>>,
}

impl FakeTelegram {
    fn messages(&self) -> Vec<(i64, String)> {
        self.messages.lock().unwrap().clone()
    }
    fn animations(&self) -> Vec<(i64, String)> {
        self.animations.lock().unwrap().clone()
    }
}

fn ok(result: Value) -> Json<Value> {
    Json(json!({ "ok": true, "result": result }))
}

async fn fake_send_message(
    State(tg): State<Arc<FakeTelegram>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let chat_id = body["chat_id"].as_i64().unwrap();
    let text = body["text"].as_str().unwrap().to_string();
    tg.messages.lock().unwrap().push((chat_id, text));
    ok(json!({ "message_id": 1, "chat": { "id": chat_id } }))
}

async fn fake_send_animation(
    State(tg): State<Arc<FakeTelegram>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("multipart/form-data") {
        let n = tg.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(50)).await;
        return ok(json!({
            "message_id": 2,
            "chat": { "id": SERVICE_CHAT },
            "animation": { "file_id": format!("FILE-{}", n) }
        }));
    }

    let body: Value = serde_json::from_slice(&body).unwrap();
    let chat_id = body["chat_id"].as_i64().unwrap();
    let file_id = body["animation"].as_str().unwrap().to_string();
    tg.animations.lock().unwrap().push((chat_id, file_id.clone()));
    ok(json!({
        "message_id": 3,
        "chat": { "id": chat_id },
        "animation": { "file_id": file_id }
    }))
}

async fn fake_answer_inline(
    State(tg): State<Arc<FakeTelegram>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    tg.inline_answers.lock().unwrap().push(body);
    ok(json!(true))
}

async fn fake_get_updates(State(tg): State<Arc<FakeTelegram>>) -> Json<Value> {
    let updates: Vec<Value> = tg.pending_updates.lock().unwrap().drain(..).collect();
    if updates.is_empty() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    ok(Value::Array(updates))
}

async fn start_fake_telegram() -> (Arc<FakeTelegram>, String) {
    let tg = Arc::new(FakeTelegram::default());
    let app = Router::new()
        .route("/botTEST/sendMessage", post(fake_send_message))
        .route("/botTEST/sendAnimation", post(fake_send_animation))
        .route("/botTEST/answerInlineQuery", post(fake_answer_inline))
        .route("/botTEST/getUpdates", post(fake_get_updates))
        .with_state(tg.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (tg, format!("http://{}", addr))
}

fn bot_context(cfg: &Config, store: Arc<dyn Store>, api_url: &str) -> BotContext {
    let api = Arc::new(BotApi::with_client(reqwest::Client::new(), api_url, "TEST"));
    let gateway = Arc::new(TelegramGateway::new(api.clone(), SERVICE_CHAT));
    let resolver = Arc::new(AssetResolver::new(store, gateway, cfg.assets.dir.clone()));
    BotContext::new(
        api,
        resolver,
        AuthList::from_iter([AUTHORIZED]),
        SearchParams::with_max_matches(5),
    )
}

fn text_update(update_id: i64, user: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            from: Some(User {
                id: user,
                username: None,
            }),
            chat: Chat { id: user },
            text: Some(text.to_string()),
            animation: None,
            document: None,
        }),
        inline_query: None,
    }
}

fn media_update(update_id: i64, user: i64) -> Update {
    let mut update = text_update(update_id, user, "");
    if let Some(message) = update.message.as_mut() {
        message.text = None;
    }
    update
}

fn inline_update(update_id: i64, user: i64, query: &str) -> Update {
    Update {
        update_id,
        message: None,
        inline_query: Some(InlineQuery {
            id: format!("q{}", update_id),
            from: User {
                id: user,
                username: None,
            },
            query: query.to_string(),
        }),
    }
}

// ─── Bot front end ──────────────────────────────────────────────────

#[tokio::test]
async fn test_bot_message_uploads_once_then_reuses_handle() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let (tg, api_url) = start_fake_telegram().await;
    let ctx = bot_context(&cfg, store.clone(), &api_url);

    bot::handle_update(&ctx, text_update(1, AUTHORIZED, "cat"))
        .await
        .unwrap();

    assert_eq!(tg.messages(), vec![(AUTHORIZED, "Found 1".to_string())]);
    assert_eq!(tg.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(tg.animations(), vec![(AUTHORIZED, "FILE-1".to_string())]);
    let cat = store.get(1).await.unwrap().unwrap();
    assert_eq!(cat.cached_handle.as_deref(), Some("FILE-1"));

    bot::handle_update(&ctx, text_update(2, AUTHORIZED, "cat"))
        .await
        .unwrap();
    assert_eq!(tg.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(tg.animations().len(), 2);
    assert_eq!(tg.animations()[1].1, "FILE-1");
}

#[tokio::test]
async fn test_bot_refuses_unknown_users() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let (tg, api_url) = start_fake_telegram().await;
    let ctx = bot_context(&cfg, store, &api_url);

    bot::handle_update(&ctx, text_update(1, STRANGER, "cat"))
        .await
        .unwrap();
    assert_eq!(tg.messages(), vec![(STRANGER, NOT_AUTHENTICATED.to_string())]);

    bot::handle_update(&ctx, inline_update(2, STRANGER, "cat"))
        .await
        .unwrap();
    let answers = tg.inline_answers.lock().unwrap().clone();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0]["results"][0]["type"], "article");
    assert_eq!(
        answers[0]["results"][0]["input_message_content"]["message_text"],
        NOT_AUTHENTICATED
    );

    assert_eq!(tg.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bot_commands() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let (tg, api_url) = start_fake_telegram().await;
    let ctx = bot_context(&cfg, store, &api_url);

    bot::handle_update(&ctx, text_update(1, AUTHORIZED, "/ping"))
        .await
        .unwrap();
    bot::handle_update(&ctx, text_update(2, AUTHORIZED, "/start"))
        .await
        .unwrap();

    assert_eq!(
        tg.messages(),
        vec![
            (AUTHORIZED, "pong".to_string()),
            (AUTHORIZED, ":(".to_string())
        ]
    );
    assert!(tg.animations().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inline_queries_upload_each_record_once() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let (tg, api_url) = start_fake_telegram().await;
    let ctx = bot_context(&cfg, store.clone(), &api_url);

    // "a" matches both captions.
    let (first, second) = tokio::join!(
        bot::handle_update(&ctx, inline_update(1, AUTHORIZED, "a")),
        bot::handle_update(&ctx, inline_update(2, AUTHORIZED, "a")),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(tg.uploads.load(Ordering::SeqCst), 2);

    let answers = tg.inline_answers.lock().unwrap().clone();
    assert_eq!(answers.len(), 2);
    for answer in &answers {
        let results = answer["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["id"], "0");
        assert_eq!(results[1]["id"], "1");
        assert_eq!(results[0]["type"], "mpeg4_gif");
    }
    // Both answers reference the same handles.
    assert_eq!(answers[0]["results"], answers[1]["results"]);

    for id in [1, 2] {
        let record = store.get(id).await.unwrap().unwrap();
        assert!(record.cached_handle.is_some());
    }
}

#[tokio::test]
async fn test_poll_loop_dispatches_updates() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let (tg, api_url) = start_fake_telegram().await;
    let ctx = Arc::new(bot_context(&cfg, store, &api_url));

    tg.pending_updates.lock().unwrap().push(json!({
        "update_id": 10,
        "message": {
            "message_id": 1,
            "from": { "id": AUTHORIZED },
            "chat": { "id": AUTHORIZED },
            "text": "/ping"
        }
    }));

    let watcher = tg.clone();
    let replied = async move {
        for _ in 0..50 {
            if !watcher.messages().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };
    bot::run_until(ctx, 1, Duration::from_secs(5), replied).await;

    assert_eq!(tg.messages(), vec![(AUTHORIZED, "pong".to_string())]);
}

#[tokio::test]
async fn test_bot_refuses_strangers_sending_media() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let (tg, api_url) = start_fake_telegram().await;
    let ctx = bot_context(&cfg, store, &api_url);

    bot::handle_update(&ctx, media_update(1, STRANGER)).await.unwrap();
    assert_eq!(tg.messages(), vec![(STRANGER, NOT_AUTHENTICATED.to_string())]);

    // Known users sending anything but text get no reply.
    bot::handle_update(&ctx, media_update(2, AUTHORIZED)).await.unwrap();
    assert_eq!(tg.messages().len(), 1);
    assert!(tg.animations().is_empty());
}

/// A store whose storage can never be read.
struct BrokenStore;

#[async_trait]
impl Store for BrokenStore {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        bail!("database is locked")
    }
    async fn get(&self, _id: u64) -> Result<Option<gifbot_core::Record>> {
        bail!("database is locked")
    }
    async fn update_handle(&self, _id: u64, _handle: &str) -> Result<()> {
        bail!("database is locked")
    }
    async fn clear_handle(&self, _id: u64) -> Result<bool> {
        bail!("database is locked")
    }
    async fn insert(&self, _name: &str, _text: &str) -> Result<u64> {
        bail!("database is locked")
    }
}

#[tokio::test]
async fn test_bot_reports_unreadable_store() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let (tg, api_url) = start_fake_telegram().await;
    let ctx = bot_context(&cfg, Arc::new(BrokenStore), &api_url);

    bot::handle_update(&ctx, text_update(1, AUTHORIZED, "cat"))
        .await
        .unwrap();
    assert_eq!(tg.messages(), vec![(AUTHORIZED, SEARCH_UNAVAILABLE.to_string())]);

    bot::handle_update(&ctx, inline_update(2, AUTHORIZED, "cat"))
        .await
        .unwrap();
    let answers = tg.inline_answers.lock().unwrap().clone();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0]["inline_query_id"], "q2");
    assert_eq!(answers[0]["results"][0]["type"], "article");
    assert_eq!(
        answers[0]["results"][0]["input_message_content"]["message_text"],
        SEARCH_UNAVAILABLE
    );

    assert_eq!(tg.uploads.load(Ordering::SeqCst), 0);
    assert!(tg.animations().is_empty());
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_handlers() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = seeded_store(&cfg).await;
    let (tg, api_url) = start_fake_telegram().await;
    let ctx = Arc::new(bot_context(&cfg, store.clone(), &api_url));

    tg.pending_updates.lock().unwrap().push(json!({
        "update_id": 20,
        "message": {
            "message_id": 1,
            "from": { "id": AUTHORIZED },
            "chat": { "id": AUTHORIZED },
            "text": "cat"
        }
    }));

    // Request shutdown while the upload is still in progress.
    let watcher = tg.clone();
    let mid_upload = async move {
        for _ in 0..500 {
            if watcher.uploads.load(Ordering::SeqCst) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    bot::run_until(ctx, 1, Duration::from_secs(5), mid_upload).await;

    assert_eq!(tg.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(tg.animations(), vec![(AUTHORIZED, "FILE-1".to_string())]);
    let cat = store.get(1).await.unwrap().unwrap();
    assert_eq!(cat.cached_handle.as_deref(), Some("FILE-1"));
    store.close().await;
}
