use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;

use cockpit_types::{AccountSelection, RepeatMode, ScheduleConfig};

use super::accounts::{list_accounts, remove_account, switch_account, AccountInfo, SwitchAccountRequest};
use super::schedule::save_schedule;
use crate::test_helpers::test_app_state;

#[tokio::test]
async fn test_list_and_switch() {
    let app = test_app_state(&["a@x.com", "b@x.com"]).await;

    let Json(accounts) = list_accounts(State(app.state.clone())).await.unwrap();
    assert_eq!(
        accounts,
        vec![
            AccountInfo { email: "a@x.com".to_string(), is_current: true, is_scheduled: true },
            AccountInfo { email: "b@x.com".to_string(), is_current: false, is_scheduled: false },
        ]
    );

    let payload = SwitchAccountRequest { email: "b@x.com".to_string() };
    switch_account(State(app.state.clone()), Json(payload)).await.unwrap();
    let Json(accounts) = list_accounts(State(app.state.clone())).await.unwrap();
    assert!(accounts[1].is_current);

    let payload = SwitchAccountRequest { email: "ghost@x.com".to_string() };
    let (status, _) = switch_account(State(app.state), Json(payload)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unconfigured_selection_falls_back_to_first_account() {
    let app = test_app_state(&["a@x.com", "b@x.com"]).await;
    app.accounts.force_active(None);

    let Json(accounts) = list_accounts(State(app.state)).await.unwrap();
    assert!(accounts.iter().all(|a| !a.is_current));
    assert!(accounts[0].is_scheduled);
    assert!(!accounts[1].is_scheduled);
}

#[tokio::test]
async fn test_remove_last_account_disables_schedule() {
    let app = test_app_state(&["a@x.com"]).await;
    let config = ScheduleConfig {
        enabled: true,
        repeat_mode: RepeatMode::Daily,
        daily_times: vec!["08:00".to_string()],
        selected_models: vec!["gemini-3-flash".to_string()],
        selected_accounts: AccountSelection::Explicit(vec!["a@x.com".to_string()]),
        ..Default::default()
    };
    save_schedule(State(app.state.clone()), Json(config)).await.unwrap();

    remove_account(State(app.state.clone()), Path("a@x.com".to_string())).await.unwrap();

    assert!(app.accounts.emails().is_empty());
    let snapshot = app.state.snapshot().await;
    assert!(!snapshot.schedule.enabled);
    assert_eq!(snapshot.schedule.selected_accounts, AccountSelection::Explicit(vec![]));

    let (status, _) =
        remove_account(State(app.state), Path("a@x.com".to_string())).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}
