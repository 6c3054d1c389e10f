//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the /api/* endpoints and HTML pages using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use citizen_reports::api::{build_context, create_app};
use citizen_reports::config::AppConfig;
use citizen_reports::loader::generate_sample;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "reportes-boundary";

const UPLOAD_CSV: &str = "ID,Ciudad,Categoria,Urgencia,Zona_Rural,Comentario\n\
                          1,Cali,Salud,Alta,1,Urgente: falta medicamentos en el hospital\n\
                          2,Pasto,Transporte,Baja,0,Gracias por el bus nuevo\n\
                          3,Tunja,Seguridad,Alta,0,Robo en el parque\n";

struct TestApp {
    app: Router,
    // Held so the upload directory outlives the app.
    _dir: TempDir,
}

fn test_app_with(max_upload_bytes: usize) -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = AppConfig {
        upload_dir: dir.path().join("uploads"),
        static_dir: dir.path().join("static"),
        max_upload_bytes,
        ..AppConfig::default()
    };
    let state = build_context(&config, generate_sample(200, 42));
    TestApp { app: create_app(state, &config), _dir: dir }
}

fn test_app() -> TestApp {
    test_app_with(AppConfig::default().max_upload_bytes)
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn upload(app: &Router, field: &str, file_name: &str, content: &[u8]) -> Response {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload-dataset")
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Uploads the sample CSV and returns its analysis id.
async fn upload_sample(app: &Router) -> String {
    let resp = upload(app, "file", "reportes.csv", UPLOAD_CSV.as_bytes()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json(resp).await;
    assert_eq!(v["success"], true);
    v["analysis_id"].as_str().unwrap().to_string()
}

/// All dashboard GET endpoints should return 200 with the success envelope.
#[tokio::test]
async fn test_get_endpoints_return_200() {
    let t = test_app();
    let endpoints = [
        "/api/health",
        "/api/metrics",
        "/api/category-distribution",
        "/api/urgency-distribution",
        "/api/temporal-trends",
        "/api/priority-cases",
        "/api/dashboard-problems",
        "/api/filtered-data",
        "/api/filtered-metrics?categoria=Salud",
        "/api/filtered-priority-cases?urgencia=Urgente&limit=5",
        "/api/filtered-category-distribution?fecha_inicio=2024-01-01",
        "/api/filtered-urgency-distribution?fecha_fin=2024-03-31",
        "/api/filtered-temporal-trends?fecha_inicio=2024-02-01&fecha_fin=2024-02-29",
    ];

    for endpoint in &endpoints {
        let resp = get(&t.app, endpoint).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {endpoint}");
        let v = json(resp).await;
        assert_eq!(v["success"], true, "GET {endpoint}");
        assert!(v.get("data").is_some(), "GET {endpoint}");
    }
}

#[tokio::test]
async fn test_metrics_shape() {
    let t = test_app();
    let v = json(get(&t.app, "/api/metrics").await).await;
    let data = &v["data"];
    assert_eq!(data["total_casos"], 200);
    for key in [
        "casos_urgentes",
        "porcentaje_urgentes",
        "zona_rural",
        "porcentaje_rural",
        "sin_internet",
        "porcentaje_sin_internet",
    ] {
        assert!(data.get(key).is_some(), "missing {key}");
    }
}

#[tokio::test]
async fn test_priority_cases_limit_and_order() {
    let t = test_app();
    let v = json(get(&t.app, "/api/priority-cases?limit=5").await).await;
    let cases = v["data"].as_array().unwrap();
    assert_eq!(cases.len(), 5);
    let priorities: Vec<u64> = cases.iter().map(|c| c["Prioridad"].as_u64().unwrap()).collect();
    assert!(priorities.windows(2).all(|w| w[0] >= w[1]));

    let default = json(get(&t.app, "/api/priority-cases").await).await;
    assert_eq!(default["data"].as_array().unwrap().len(), 20);
}

/// A blank `limit=` falls back to the default instead of failing.
#[tokio::test]
async fn test_blank_limit_uses_default() {
    let t = test_app();
    for uri in [
        "/api/priority-cases?limit=",
        "/api/filtered-priority-cases?categoria=&urgencia=&fecha_inicio=&fecha_fin=&limit=",
    ] {
        let resp = get(&t.app, uri).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {uri}");
        let v = json(resp).await;
        assert_eq!(v["data"].as_array().unwrap().len(), 20, "GET {uri}");
    }

    let resp = get(&t.app, "/api/filtered-priority-cases?categoria=Salud&urgencia=&fecha_inicio=&fecha_fin=&limit=").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json(resp).await;
    for case in v["data"].as_array().unwrap() {
        assert_eq!(case["Categoría del problema"], "Salud");
    }
}

#[tokio::test]
async fn test_filtered_data_matches_category() {
    let t = test_app();
    let v = json(get(&t.app, "/api/filtered-data?categoria=Salud&urgencia=Urgente").await).await;
    let rows = v["data"].as_array().unwrap();
    assert!(!rows.is_empty());
    for row in rows {
        assert_eq!(row["Categoría del problema"], "Salud");
        assert_eq!(row["Nivel de urgencia"], "Urgente");
    }

    let none = json(get(&t.app, "/api/filtered-data?categoria=Inexistente").await).await;
    assert_eq!(none["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_invalid_filters_are_400() {
    let t = test_app();
    for uri in [
        "/api/filtered-metrics?fecha_inicio=2019-01-01",
        "/api/filtered-data?fecha_fin=2026-01-01",
        "/api/filtered-data?fecha_inicio=15/01/2024",
        "/api/filtered-data?fecha_inicio=2024-05-01&fecha_fin=2024-04-01",
        "/api/priority-cases?limit=abc",
        "/api/filtered-priority-cases?limit=abc",
    ] {
        let resp = get(&t.app, uri).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "GET {uri}");
        let v = json(resp).await;
        assert_eq!(v["success"], false);
        assert!(v["error"].is_string());
    }
}

#[tokio::test]
async fn test_unknown_analysis_is_404() {
    let t = test_app();
    for uri in ["/api/custom-metrics/nope", "/api/custom-problems/nope"] {
        let resp = get(&t.app, uri).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "GET {uri}");
        assert_eq!(json(resp).await["success"], false);
    }

    let resp = post_json(&t.app, "/api/generate-report", serde_json::json!({"analysis_id": "nope"})).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_then_custom_views() {
    let t = test_app();
    let id = upload_sample(&t.app).await;

    let metrics = json(get(&t.app, &format!("/api/custom-metrics/{id}")).await).await;
    assert_eq!(metrics["success"], true);
    assert_eq!(metrics["data"]["total_casos"], 3);
    assert_eq!(metrics["data"]["casos_urgentes"], 2);
    assert_eq!(metrics["data"]["file_name"], "reportes.csv");

    let problems = json(get(&t.app, &format!("/api/custom-problems/{id}")).await).await;
    let ids: Vec<&str> = problems["data"]["problems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"insufficient_data"));
    assert!(problems["data"]["action_plan"]["short_term_actions"].is_array());

    let report = post_json(
        &t.app,
        "/api/generate-report",
        serde_json::json!({"analysis_id": id, "report_type": "full"}),
    )
    .await;
    assert_eq!(report.status(), StatusCode::OK);
    let report = json(report).await;
    assert_eq!(report["success"], true);
    assert_eq!(report["analysis_id"], id.as_str());
    assert_eq!(report["dashboard_url"], format!("/dashboard/custom/{id}"));
    assert!(report["report_id"].is_string());

    let page = get(&t.app, &format!("/dashboard/custom/{id}")).await;
    assert_eq!(page.status(), StatusCode::OK);
    let html = axum::body::to_bytes(page.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains(&id));

    let health = json(get(&t.app, "/api/health").await).await;
    assert_eq!(health["data"]["stored_analyses"], 1);
}

#[tokio::test]
async fn test_upload_response_shape() {
    let t = test_app();
    let resp = upload(&t.app, "file", "reportes.csv", UPLOAD_CSV.as_bytes()).await;
    let v = json(resp).await;
    let data = &v["data"];
    assert_eq!(data["analysis_id"], v["analysis_id"]);
    assert_eq!(data["total_records"], 3);
    assert!(data["categories_analysis"]["total_categories"].as_u64().unwrap() >= 3);
    assert_eq!(data["urgency_analysis"]["urgent_cases"], 2);
    assert!(data["sentiment_analysis"]["positive_cases"].is_u64());
    assert!(data["priority_analysis"]["high_priority"].is_u64());
    assert!(data["data_quality"]["quality_score"].is_f64());
    assert!(data["heuristic_confidence"].is_f64());
    assert!(data["columns"].as_array().unwrap().iter().any(|c| c == "Prioridad_IA"));
}

#[tokio::test]
async fn test_upload_rejections() {
    let t = test_app();

    let resp = upload(&t.app, "file", "notas.txt", b"hola").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["success"], false);

    let resp = upload(&t.app, "otro", "reportes.csv", UPLOAD_CSV.as_bytes()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = upload(&t.app, "file", "una_columna.csv", b"solo\n1\n2\n").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_over_limit_is_413() {
    let t = test_app_with(1024);
    let big = UPLOAD_CSV.repeat(64);
    let resp = upload(&t.app, "file", "grande.csv", big.as_bytes()).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json(resp).await["success"], false);
}

#[tokio::test]
async fn test_pages() {
    let t = test_app();
    for uri in ["/", "/upload"] {
        let resp = get(&t.app, uri).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {uri}");
        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"));
    }

    let resp = get(&t.app, "/dashboard/custom/unknown").await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[header::LOCATION], "/upload");
}
