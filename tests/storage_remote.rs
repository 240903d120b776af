use chrono::NaiveDate;
use savings_guardrails::storage::remote::RemoteStore;
use savings_guardrails::{GuardrailsError, PlanPoint, StorageAdapter};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[tokio::test]
async fn test_get_plan_decodes_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "series": [
                {"date": "2025-01-01", "value": 100000.0},
                {"date": "2026-01-01", "value": 120000.0}
            ],
            "lastUpdated": "2026-08-01T10:00:00Z",
            "scenarios": ["Average", "Optimistic"]
        })))
        .mount(&server)
        .await;

    let store = RemoteStore::new(server.uri());
    let snapshot = store.get_plan(None).await.unwrap();
    assert_eq!(
        snapshot.series,
        vec![
            PlanPoint {
                date: d(2025, 1, 1),
                value: 100_000.0
            },
            PlanPoint {
                date: d(2026, 1, 1),
                value: 120_000.0
            },
        ]
    );
    assert!(snapshot.last_updated.is_some());
    assert_eq!(snapshot.scenarios.len(), 2);
    assert!(snapshot.meta.is_none());
}

#[tokio::test]
async fn test_get_plan_passes_scenario_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plan"))
        .and(query_param("scenario", "Pessimistic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"series": []})))
        .expect(1)
        .mount(&server)
        .await;

    let store = RemoteStore::new(server.uri());
    let snapshot = store.get_plan(Some("Pessimistic")).await.unwrap();
    assert!(snapshot.series.is_empty());
}

#[tokio::test]
async fn test_save_plan_posts_replace_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan"))
        .and(body_json(json!({
            "series": [{"date": "2025-01-01", "value": 100000.0}],
            "replace": true
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = RemoteStore::new(server.uri());
    store
        .save_plan(
            &[PlanPoint {
                date: d(2025, 1, 1),
                value: 100_000.0,
            }],
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upsert_and_delete_actual() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/actuals"))
        .and(body_json(json!({"date": "2025-03-01", "value": 90000.0})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/actuals"))
        .and(query_param("date", "2025-03-01"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = RemoteStore::new(server.uri());
    store.upsert_actual(d(2025, 3, 1), 90_000.0).await.unwrap();
    store.delete_actual(d(2025, 3, 1)).await.unwrap();
}

#[tokio::test]
async fn test_update_actual_maps_404_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/actuals"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = RemoteStore::new(server.uri());
    let err = store.update_actual(d(2025, 3, 1), 1.0).await.unwrap_err();
    assert!(matches!(err, GuardrailsError::ActualNotFound(date) if date == d(2025, 3, 1)));
}

#[tokio::test]
async fn test_settings_round_trip_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lowerPct": 12})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/settings"))
        .and(body_json(json!({"lowerPct": 8, "upperPct": 13})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = RemoteStore::new(server.uri());
    // Missing upperPct falls back to the default band width.
    let settings = store.get_settings().await.unwrap();
    assert_eq!((settings.lower_pct, settings.upper_pct), (12, 15));

    // Rounded client-side before the round trip.
    store.save_settings(8.4, 12.6).await.unwrap();
}

#[tokio::test]
async fn test_save_settings_rejects_negative_without_network() {
    // No routes mounted: a request would fail loudly.
    let server = MockServer::start().await;
    let store = RemoteStore::new(server.uri());
    let err = store.save_settings(-1.0, 10.0).await.unwrap_err();
    assert!(matches!(err, GuardrailsError::InvalidPercentage(_)));
}

#[tokio::test]
async fn test_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/plan"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let store = RemoteStore::new(server.uri());
    let err = store.get_plan(None).await.unwrap_err();
    match err {
        GuardrailsError::RemoteStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected RemoteStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_scenarios() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scenarios"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["Average", "Optimistic", "Pessimistic"])),
        )
        .mount(&server)
        .await;

    let store = RemoteStore::new(server.uri());
    assert_eq!(
        store.get_scenarios().await.unwrap(),
        vec!["Average", "Optimistic", "Pessimistic"]
    );
}
