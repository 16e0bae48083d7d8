mod common;

use axum::http::{StatusCode, header};

use common::{API, get, test_app_with_metrics};
use medrecords::infra::telemetry::install_prometheus;

#[tokio::test]
async fn metrics_endpoint_renders_help_text_for_recorded_series() {
    let handle = install_prometheus().expect("prometheus recorder should install once");
    let app = test_app_with_metrics(Some(handle));
    let (_, token) = app.signed_in("scraper").await;

    let (status, _) = app
        .send_json(get(&format!("{API}/patients"), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, body) = app.send(get("/metrics", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; version=0.0.4");

    let text = String::from_utf8(body.to_vec()).expect("exposition is utf-8");
    assert!(text.contains("# HELP http_requests_total "), "{text}");
    assert!(text.contains("# HELP medrecords_cache_miss_total "), "{text}");
    assert!(
        text.contains(r#"endpoint="/api/v1/patients""#),
        "route template label missing: {text}"
    );
}
