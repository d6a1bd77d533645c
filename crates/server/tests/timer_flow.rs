//! End-to-end timer flows through the HTTP API, the event listener, the
//! local engine and a real callback target.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use serde_json::{json, Value};

use tock_core::Config;
use tock_server::{build_router, App};
use tock_storage::InMemoryTimerStore;

type Hits = Arc<Mutex<Vec<(Method, String)>>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn callback_target() -> (String, Hits) {
    async fn hit(State(hits): State<Hits>, method: Method, uri: Uri) -> StatusCode {
        hits.lock().unwrap().push((method, uri.path().to_string()));
        StatusCode::NO_CONTENT
    }
    let hits: Hits = Arc::default();
    let url = serve(Router::new().fallback(hit).with_state(hits.clone())).await;
    (url, hits)
}

fn config(callback_base: &str) -> Config {
    let mut config = Config::for_profile("");
    config.callback.base_url = callback_base.to_string();
    config.callback.token_url = None;
    config.callback.static_token = None;
    config.queue.poll_interval_ms = 10;
    config.sync.retry_attempts = 1;
    config
}

/// Running service: its base URL plus the app for inspection.
async fn start(callback_base: &str) -> (String, App) {
    let config = config(callback_base);
    let mut app = App::with_store(Arc::new(InMemoryTimerStore::new()), "memory", &config).unwrap();
    app.spawn_listener();
    let url = serve(build_router(app.state.clone(), "*")).await;
    (url, app)
}

fn module_event(kind: &str, tenant: &str, delay: &str) -> Value {
    json!({
        "topic": "MODULE_RESOURCE",
        "type": kind,
        "tenant": tenant,
        "newValue": {
            "moduleId": "mod-foo-1.0.0",
            "timers": [{
                "methods": ["POST"],
                "pathPattern": "/foo/expire",
                "interval": {"delay": delay, "unit": "SECOND"}
            }]
        }
    })
}

async fn wait_for_drain(app: &App) {
    for _ in 0..100 {
        if app.state.queue.depth().await == (0, 0) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue did not drain");
}

#[tokio::test]
async fn module_create_fires_one_callback_per_interval() {
    let (target, hits) = callback_target().await;
    let (base, app) = start(&target).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{base}/tenant"))
        .header("x-tenant", "diku")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = http
        .post(format!("{base}/events"))
        .json(&module_event("CREATE", "diku", "1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    wait_for_drain(&app).await;
    assert_eq!(app.state.engine.job_count().await, 1);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let seen = hits.lock().unwrap().clone();
    assert_eq!(seen, vec![(Method::POST, "/foo/expire".to_string())]);

    app.state.engine.shutdown().await;
}

#[tokio::test]
async fn module_update_on_unprovisioned_tenant_is_a_no_op() {
    let (target, hits) = callback_target().await;
    let (base, app) = start(&target).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{base}/events"))
        .json(&module_event("UPDATE", "nowhere", "1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    wait_for_drain(&app).await;

    assert_eq!(app.state.engine.job_count().await, 0);
    assert!(hits.lock().unwrap().is_empty());

    let resp = http
        .get(format!("{base}/scheduler/timers"))
        .header("x-tenant", "nowhere")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "tenant nowhere is not provisioned");
}

#[tokio::test]
async fn timer_crud_over_http() {
    let (target, _hits) = callback_target().await;
    let (base, app) = start(&target).await;
    let http = reqwest::Client::new();
    let user = uuid::Uuid::new_v4();

    http.post(format!("{base}/tenant"))
        .header("x-tenant", "diku")
        .send()
        .await
        .unwrap();

    let timer = json!({
        "type": "USER",
        "moduleName": "mod-foo",
        "enabled": true,
        "routingEntry": {
            "methods": ["POST"],
            "pathPattern": "/foo/expire",
            "schedule": {"cron": "0 12 * * *"}
        }
    });
    let resp = http
        .post(format!("{base}/scheduler/timers"))
        .header("x-tenant", "diku")
        .header("x-user-id", user.to_string())
        .json(&timer)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert!(created.get("naturalKey").is_none());
    assert_eq!(created["metadata"]["createdByUserId"], user.to_string());
    assert_eq!(app.state.engine.job_count().await, 1);

    let list: Value = http
        .get(format!("{base}/scheduler/timers?limit=5"))
        .header("x-tenant", "diku")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["totalRecords"], 1);
    assert_eq!(list["timers"][0]["id"], id);

    let mut disabled = created.clone();
    disabled["enabled"] = json!(false);
    let resp = http
        .put(format!("{base}/scheduler/timers/{id}"))
        .header("x-tenant", "diku")
        .json(&disabled)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(app.state.engine.job_count().await, 0);

    let mut mismatched = disabled.clone();
    mismatched["id"] = json!(uuid::Uuid::new_v4());
    let resp = http
        .put(format!("{base}/scheduler/timers/{id}"))
        .header("x-tenant", "diku")
        .json(&mismatched)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = http
        .delete(format!("{base}/scheduler/timers/{id}"))
        .header("x-tenant", "diku")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = http
        .get(format!("{base}/scheduler/timers/{id}"))
        .header("x-tenant", "diku")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn requests_without_tenant_are_rejected() {
    let (target, _hits) = callback_target().await;
    let (base, _app) = start(&target).await;

    let resp = reqwest::get(format!("{base}/scheduler/timers")).await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["store"], "memory");
}
