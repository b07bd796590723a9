mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use reconciliation_service::{
    pipeline::Reconciler,
    server::{router, AppState},
    sources::TableCache,
};
use tempfile::TempDir;
use tower::ServiceExt;

fn app() -> (TempDir, Router) {
    let (dir, cfg) = common::fixture();
    let reconciler = Reconciler::from_config(&cfg).with_cache(Arc::new(TableCache::new()));
    (dir, router(AppState::new(cfg, reconciler)))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn lists_registered_scopes_by_feeder() {
    let (_dir, app) = app();
    let (status, body) = get(&app, "/scopes").await;
    assert_eq!(status, StatusCode::OK);

    let v = json(&body);
    assert_eq!(v[0]["feeder"], 7088);
    assert_eq!(v[0]["dtrs"][0]["dtr"], 32);
    assert_eq!(v[0]["dtrs"][0]["observed_meaning"], "outage");
    assert_eq!(v[0]["dtrs"][1]["href"], "/scopes/7088/57");
}

#[tokio::test]
async fn dashboard_view_carries_cards_and_charts() {
    let (_dir, app) = app();
    let (status, body) = get(&app, "/scopes/7088/57").await;
    assert_eq!(status, StatusCode::OK);

    let v = json(&body);
    assert_eq!(v["title"], "DTR KPIs Dashboard [Feeder: 7088, DTR: 57]");
    let cards = v["cards"].as_array().unwrap();
    let total = cards
        .iter()
        .find(|c| c["key"] == "totalAfterCorrection")
        .unwrap();
    assert_eq!(total["value"], "3");
    let loss = cards.iter().find(|c| c["key"] == "lossPercent").unwrap();
    assert_eq!(loss["value"], "33.33%");
    assert_eq!(v["pie_chart"]["values"], serde_json::json!([2.0, 1.0, 1.0]));
    assert_eq!(v["tables"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn export_returns_csv_attachment() {
    let (_dir, app) = app();
    let resp = app
        .clone()
        .oneshot(
            Request::get("/scopes/7088/57/export/untagged")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"7088-57_untagged_master_only.csv\""
    );
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        String::from_utf8(body.to_vec()).unwrap(),
        "Meter_Serial_Number,dtrcode,Feedercode,Consumer_Name\na3,57,7088,Chitra\n"
    );
}

#[tokio::test]
async fn unknown_scope_and_set_are_not_found() {
    let (_dir, app) = app();
    assert_eq!(get(&app, "/scopes/1/1").await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        get(&app, "/scopes/7088/57/export/everything").await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn load_failures_are_reported() {
    let (_dir, app) = app();
    let (status, body) = get(&app, "/scopes/7088/32").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json(&body)["error"].as_str().unwrap().contains("missing.csv"));
}

#[tokio::test]
async fn cache_can_be_invalidated() {
    let (_dir, app) = app();
    assert_eq!(get(&app, "/scopes/7088/57").await.0, StatusCode::OK);

    let (status, body) = send(
        &app,
        Request::post("/cache/invalidate").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["cleared"], 4);
}
