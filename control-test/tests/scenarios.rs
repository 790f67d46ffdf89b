use anyhow::Result;
use serde_json::json;
use waystation_test::fixtures::{
    body_amount_breakpoint, header_vip_breakpoint, order_request_body, traceparent_header, SAMPLE_TRACE_ID,
};
use waystation_test::harness::TestApp;
use waystation_core::Config;

/// Scenario 1 — manual freeze with no breakpoints registered: the trace
/// suspends, status reports `frozen`, and release resumes it.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn manual_freeze_and_release_with_no_match() -> Result<()> {
    let app = TestApp::new(Config::default()).await?;

    app.post_rpc(
        "/rpc/freeze",
        json!({ "trace_id": SAMPLE_TRACE_ID, "services": ["service-a"] }),
    )
    .await?;

    let headers = [("traceparent", traceparent_header(SAMPLE_TRACE_ID))];
    let header_pairs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let (_, decision) = app_check(&app, &header_pairs).await?;
    assert_eq!(decision["action"], "freeze");

    let status = app.get_rpc(&format!("/rpc/freezes/{SAMPLE_TRACE_ID}")).await?;
    assert_eq!(status["data"]["state"], "frozen");

    app.post_rpc("/rpc/release", json!({ "trace_id": SAMPLE_TRACE_ID })).await?;

    let (_, decision) = app_check(&app, &header_pairs).await?;
    assert_eq!(decision["action"], "allow");

    Ok(())
}

/// Scenario 2 — a body condition breakpoint auto-freezes a matching trace;
/// the trace shows up in `ListActiveFreezes` until released.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn body_condition_auto_freeze() -> Result<()> {
    let app = TestApp::new(Config::default()).await?;
    let bp = body_amount_breakpoint();
    app.post_rpc(
        "/rpc/breakpoints",
        json!({ "service": bp.service, "endpoint": bp.endpoint, "conditions": bp.conditions }),
    )
    .await?;

    let trace_id = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    let headers = [
        ("traceparent", traceparent_header(trace_id)),
        ("x-service-name", bp.service.to_string()),
        ("x-endpoint", "/order".to_string()),
    ];
    let header_pairs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let body = order_request_body("ORD-1", 999);
    let (_, decision) = app.check(&header_pairs, body).await?;
    assert_eq!(decision["action"], "freeze");

    let active = app.get_rpc("/rpc/freezes").await?;
    let ids: Vec<&str> = active["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["trace_id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&trace_id));

    app.post_rpc("/rpc/release", json!({ "trace_id": trace_id })).await?;
    let active = app.get_rpc("/rpc/freezes").await?;
    assert!(active["data"].as_array().unwrap().is_empty());

    Ok(())
}

/// Scenario 3 — a header condition breakpoint auto-freezes; the captured
/// network snapshot's service name equals the request authority.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn header_condition_auto_freeze_and_snapshot() -> Result<()> {
    let app = TestApp::new(Config::default()).await?;
    let bp = header_vip_breakpoint();
    app.post_rpc(
        "/rpc/breakpoints",
        json!({ "service": bp.service, "endpoint": bp.endpoint, "conditions": bp.conditions }),
    )
    .await?;

    let trace_id = "cccccccccccccccccccccccccccccccc".to_string();
    let headers = [
        ("traceparent", traceparent_header(&trace_id)),
        ("x-service-name", bp.service.to_string()),
        ("x-endpoint", "/checkout".to_string()),
        ("x-orig-user-type", "vip".to_string()),
    ];
    let header_pairs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let (_, decision) = app.check(&header_pairs, json!({})).await?;
    assert_eq!(decision["action"], "freeze");

    app.post_rpc(
        "/snapshot",
        json!({
            "trace_id": trace_id,
            "service_name": bp.service,
            "method": "POST /checkout",
            "body": "{}",
        }),
    )
    .await
    .ok();

    let snapshot_response = app
        .check(&header_pairs, json!({}))
        .await?;
    assert_eq!(snapshot_response.1["action"], "freeze");

    let snapshot = app.get_rpc(&format!("/rpc/snapshot/{trace_id}")).await?;
    assert_eq!(snapshot["data"]["service_name"], bp.service);

    Ok(())
}

/// Scenario 4 — release with an override body: the next `/check` resolves
/// to `allow` with that body; the one after that sees an empty override
/// (pop-once semantics).
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn override_on_release_is_consumed_exactly_once() -> Result<()> {
    let app = TestApp::new(Config::default()).await?;
    let trace_id = "dddddddddddddddddddddddddddddddd";

    app.post_rpc("/rpc/freeze", json!({ "trace_id": trace_id, "services": [] })).await?;

    let override_body = order_request_body("FIXED", 1000).to_string();
    app.post_rpc(
        "/rpc/release",
        json!({ "trace_id": trace_id, "override_body": override_body }),
    )
    .await?;

    let headers = [("traceparent", traceparent_header(trace_id))];
    let header_pairs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let (_, first) = app_check(&app, &header_pairs).await?;
    assert_eq!(first["action"], "allow");
    assert_eq!(first["override_body"], override_body);

    let (_, second) = app_check(&app, &header_pairs).await?;
    assert_eq!(second["action"], "allow");
    assert!(second.get("override_body").is_none());

    Ok(())
}

/// Scenario 5 — emergency release clears every active freeze and reports
/// the pre-call count.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn emergency_release_clears_all_active_freezes() -> Result<()> {
    let app = TestApp::new(Config::default()).await?;

    for trace_id in ["t1", "t2", "t3"] {
        app.post_rpc("/rpc/freeze", json!({ "trace_id": trace_id, "services": [] })).await?;
    }

    let response = app.post_rpc("/rpc/emergency-release", json!({})).await?;
    assert_eq!(response["data"]["freed_count"], 3);

    let active = app.get_rpc("/rpc/freezes").await?;
    assert!(active["data"].as_array().unwrap().is_empty());

    Ok(())
}

/// Scenario 6 — a freeze with a short timeout auto-releases; status becomes
/// `not_found` once the post-release grace period elapses.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn freeze_auto_releases_after_timeout() -> Result<()> {
    let mut config = Config::default();
    config.freeze.release_grace_period_ms = 10;
    let app = TestApp::new(config).await?;
    let trace_id = "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

    app.post_rpc(
        "/rpc/freeze",
        json!({ "trace_id": trace_id, "services": [], "timeout_secs": 0 }),
    )
    .await?;

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let status = app.get_rpc(&format!("/rpc/freezes/{trace_id}")).await?;
    assert_eq!(status["success"], false);

    Ok(())
}

async fn app_check(app: &TestApp, headers: &[(&str, &str)]) -> Result<(u16, serde_json::Value)> {
    app.check(headers, json!({})).await
}
