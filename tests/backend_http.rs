use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mintboard::{
    Backend, BackendConfig, FetchError, ReqwestBackend, SearchMessagesRequest,
    SearchStatsRequest, CONNECTIVITY_MESSAGE, NO_DATA_MESSAGE,
};
use serde_json::{json, Value};

async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(base_url: String) -> BackendConfig {
    BackendConfig {
        base_url,
        timeout_ms: 2_000,
    }
}

// The blocking client must be built, used and dropped off the async worker threads.
async fn with_backend<T: Send + 'static>(
    base_url: String,
    f: impl FnOnce(&ReqwestBackend) -> T + Send + 'static,
) -> T {
    tokio::task::spawn_blocking(move || {
        let backend = ReqwestBackend::new(&config(base_url)).unwrap();
        f(&backend)
    })
    .await
    .unwrap()
}

async fn search_messages(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let word = body["word"].as_str().unwrap_or_default().to_string();
    if word == "boom" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "body": "Search index offline" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "messages": [{ "word": word, "page": body["pageNumber"] }],
            "totalCount": 150
        })),
    )
}

async fn search_stats(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "ten_day_count": { "2022-04-10": 2, "2022-04-11": 5 },
        "source": [["twitter", 3]],
        "echo": body["word"]
    }))
}

async fn todays_mints() -> Json<Value> {
    Json(json!({
        "data": {
            "date": "April 12, 2022",
            "mints": [{
                "project": "Moonbirds",
                "time": "18:00",
                "count": 10000,
                "DiscordOnlineMembers": "410"
            }]
        }
    }))
}

fn full_stub() -> Router {
    Router::new()
        .route("/searchMessages/", post(search_messages))
        .route("/search/", post(search_stats))
        .route("/getTodaysMints", get(todays_mints))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_messages_posts_camel_case_body() {
    let base_url = spawn_stub(full_stub()).await;

    let response = with_backend(base_url, |backend| {
        backend.search_messages(&SearchMessagesRequest {
            word: "bitcoin".to_string(),
            page_number: 3,
        })
    })
    .await
    .unwrap();

    assert_eq!(response.total_count, Some(150));
    let messages = response.messages.unwrap();
    assert_eq!(messages[0]["word"], "bitcoin");
    assert_eq!(messages[0]["page"], 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_stats_normalizes_both_shapes() {
    let base_url = spawn_stub(full_stub()).await;

    let stats = with_backend(base_url, |backend| {
        backend.search_stats(&SearchStatsRequest {
            word: "bitcoin".to_string(),
        })
    })
    .await
    .unwrap();

    let mut daily: Vec<(String, u64)> = stats
        .ten_day_count
        .into_iter()
        .map(|entry| (entry.label, entry.count))
        .collect();
    daily.sort();
    assert_eq!(
        daily,
        vec![("2022-04-10".to_string(), 2), ("2022-04-11".to_string(), 5)]
    );
    assert_eq!(stats.source.len(), 1);
    assert_eq!(stats.source[0].label, "twitter");
    assert_eq!(stats.source[0].count, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn todays_mints_unwraps_data_envelope() {
    let base_url = spawn_stub(full_stub()).await;

    let schedule = with_backend(base_url, |backend| backend.todays_mints())
        .await
        .unwrap();

    assert_eq!(schedule.date, "April 12, 2022");
    assert_eq!(schedule.mints.len(), 1);
    assert_eq!(schedule.mints[0].project, "Moonbirds");
    assert_eq!(schedule.mints[0].count.raw(), Some("10000"));
    assert_eq!(schedule.mints[0].discord_online_members.raw(), Some("410"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_error_carries_body_message() {
    let base_url = spawn_stub(full_stub()).await;

    let err = with_backend(base_url, |backend| {
        backend.search_messages(&SearchMessagesRequest {
            word: "boom".to_string(),
            page_number: 0,
        })
    })
    .await
    .unwrap_err();

    match &err {
        FetchError::Server {
            status, message, ..
        } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "Search index offline");
        }
        other => panic!("expected server error, got {other:?}"),
    }
    assert_eq!(err.user_message(), "Search index offline");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_success_body_is_no_data() {
    let app = Router::new().route("/getTodaysMints", get(|| async { Json(json!({})) }));
    let base_url = spawn_stub(app).await;

    let err = with_backend(base_url, |backend| backend.todays_mints())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Malformed { .. }));
    assert_eq!(err.user_message(), NO_DATA_MESSAGE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_port_is_a_connectivity_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = with_backend(format!("http://{addr}"), |backend| backend.todays_mints())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport { .. }));
    assert_eq!(err.user_message(), CONNECTIVITY_MESSAGE);
}
