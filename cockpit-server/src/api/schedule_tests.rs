use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::Json;
use tower::ServiceExt;

use cockpit_types::{RepeatMode, ScheduleConfig, ScheduleMode};

use super::schedule::{get_schedule, save_schedule};
use crate::router::build_router;
use crate::test_helpers::test_app_state;

fn daily() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        repeat_mode: RepeatMode::Daily,
        daily_times: vec!["08:00".to_string()],
        selected_models: vec!["gemini-3-flash".to_string()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_default_schedule_is_disabled() {
    let app = test_app_state(&["a@x.com"]).await;
    let Json(config) = get_schedule(State(app.state)).await;
    assert!(!config.enabled);
    assert_eq!(config.mode(), ScheduleMode::Disabled);
}

#[tokio::test]
async fn test_save_schedule_returns_snapshot() {
    let app = test_app_state(&["a@x.com"]).await;
    let Json(snapshot) = save_schedule(State(app.state.clone()), Json(daily())).await.unwrap();
    assert_eq!(snapshot.mode, ScheduleMode::Calendar);
    assert_eq!(snapshot.description, "Daily at 08:00");

    let published = app.state.snapshot().await;
    assert_eq!(published.schedule, daily());
}

#[tokio::test]
async fn test_invalid_schedule_is_bad_request() {
    let app = test_app_state(&["a@x.com"]).await;
    let config = ScheduleConfig { selected_models: vec![], ..daily() };
    let (status, message) = save_schedule(State(app.state), Json(config)).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!message.is_empty());
}

#[tokio::test]
async fn test_put_schedule_route() {
    let app = test_app_state(&["a@x.com"]).await;
    let router = build_router(app.state);

    let request = Request::builder()
        .method("PUT")
        .uri("/api/schedule")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&daily()).unwrap()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder().uri("/api/nope").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
