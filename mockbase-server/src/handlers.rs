use actix_web::{web, HttpResponse};
use mockbase::{MockbaseError, Record};

use crate::AppState;

/// Configure the status route and the generic CRUD routes, all under `mount_path`.
pub fn configure(cfg: &mut web::ServiceConfig, mount_path: &str) {
    cfg.service(
        web::scope(mount_path)
            .route("/_status", web::get().to(status))
            .route("/{resource}", web::get().to(list_records))
            .route("/{resource}", web::post().to(create_record))
            .route("/{resource}/{id}", web::get().to(get_record))
            .route("/{resource}/{id}", web::put().to(update_record))
            .route("/{resource}/{id}", web::patch().to(patch_record))
            .route("/{resource}/{id}", web::delete().to(delete_record)),
    );
}

/// `"api/"` and `"/api"` both mount at `/api`; empty or `/` mounts at the root.
pub fn normalize_mount_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn ok_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse::Ok().json(value)
}

fn created_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse::Created().json(value)
}

fn message(text: impl Into<String>) -> serde_json::Value {
    serde_json::json!({ "message": text.into() })
}

fn err_response(e: MockbaseError) -> HttpResponse {
    match &e {
        MockbaseError::NotFound { .. } | MockbaseError::UnknownResource(_) => {
            HttpResponse::NotFound().json(message(e.to_string()))
        }
        MockbaseError::Uniqueness { .. } => HttpResponse::Conflict().json(message(e.to_string())),
        _ if e.is_client_error() => HttpResponse::BadRequest().json(message(e.to_string())),
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(message("Internal server error"))
        }
    }
}

fn parse_id(raw: &str) -> Result<u64, HttpResponse> {
    raw.parse()
        .map_err(|_| HttpResponse::BadRequest().json(message(format!("invalid id '{raw}'"))))
}

// ── Status ──────────────────────────────────────────────────────────

async fn status(state: web::Data<AppState>) -> HttpResponse {
    ok_json(state.registry.status())
}

// ── Generic CRUD handlers ───────────────────────────────────────────

async fn list_records(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let listed = state
        .registry
        .resource(&path)
        .and_then(|resource| resource.list());
    match listed {
        Ok(mut records) => {
            Record::sort_by_id(&mut records);
            ok_json(serde_json::Value::Array(
                records.iter().map(Record::to_json).collect(),
            ))
        }
        Err(e) => err_response(e),
    }
}

async fn get_record(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (resource, raw_id) = path.into_inner();
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.registry.resource(&resource).and_then(|r| r.get(id)) {
        Ok(record) => ok_json(record.to_json()),
        Err(e) => err_response(e),
    }
}

async fn create_record(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let created = state.registry.resource(&path).and_then(|resource| {
        let record = Record::from_json(body.into_inner())?;
        let added = resource.add(record)?;
        resource.get(added.id()?)
    });
    match created {
        Ok(record) => created_json(record.to_json()),
        Err(e) => err_response(e),
    }
}

async fn update_record(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let (resource, raw_id) = path.into_inner();
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let updated = state.registry.resource(&resource).and_then(|resource| {
        resource.update(id, Record::from_json(body.into_inner())?)?;
        resource.get(id)
    });
    match updated {
        Ok(record) => ok_json(record.to_json()),
        Err(e) => err_response(e),
    }
}

async fn patch_record(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let (resource, raw_id) = path.into_inner();
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let patched = state.registry.resource(&resource).and_then(|resource| {
        resource.update_fields(id, Record::from_json(body.into_inner())?)?;
        resource.get(id)
    });
    match patched {
        Ok(record) => ok_json(record.to_json()),
        Err(e) => err_response(e),
    }
}

async fn delete_record(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (resource, raw_id) = path.into_inner();
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.registry.resource(&resource) {
        Ok(resource) => {
            let existed = resource.delete(id);
            ok_json(serde_json::json!({ "ok": true, "deleted": id, "existed": existed }))
        }
        Err(e) => err_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use mockbase::Registry;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, web::Data<AppState>) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("users.json"),
            json!({
                "resource_name": "users",
                "columns": [
                    { "name": "id", "type": "number" },
                    { "name": "name", "type": "string", "unique": true }
                ],
                "has_many": ["books"],
                "current_id": 1,
                "seeds": [ { "id": 1, "name": "Frank" } ]
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("books.json"),
            json!({
                "resource_name": "books",
                "columns": [
                    { "name": "id", "type": "number" },
                    { "name": "title", "type": "string" },
                    { "name": "user_id", "type": "number" }
                ],
                "current_id": 1,
                "seeds": [ { "id": 1, "title": "Dune", "user_id": 1 } ]
            })
            .to_string(),
        )
        .unwrap();
        let registry = Registry::load_dir(tmp.path()).unwrap();
        let state = web::Data::new(AppState {
            registry: Arc::new(registry),
        });
        (tmp, state)
    }

    #[actix_web::test]
    async fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path(""), "");
        assert_eq!(normalize_mount_path("/"), "");
        assert_eq!(normalize_mount_path("api/"), "/api");
        assert_eq!(normalize_mount_path("/api/v1"), "/api/v1");
    }

    #[actix_web::test]
    async fn test_crud_round() {
        let (_tmp, state) = setup();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(|cfg| configure(cfg, "/api")),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/users/1").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            json!({ "id": 1, "name": "Frank", "books": [ { "id": 1, "title": "Dune", "user_id": 1 } ] })
        );

        let req = test::TestRequest::post()
            .uri("/api/users")
            .set_json(json!({ "name": "Anna" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "id": 2, "name": "Anna" }));

        let req = test::TestRequest::patch()
            .uri("/api/users/2")
            .set_json(json!({ "name": "Anne" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "Anne");

        let req = test::TestRequest::put()
            .uri("/api/users/2")
            .set_json(json!({ "name": "Ann" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "id": 2, "name": "Ann" }));

        let req = test::TestRequest::delete().uri("/api/users/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/books").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!([]));

        let req = test::TestRequest::get().uri("/api/users").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!([ { "id": 2, "name": "Ann" } ]));
    }

    #[actix_web::test]
    async fn test_error_statuses() {
        let (_tmp, state) = setup();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(|cfg| configure(cfg, "")),
        )
        .await;

        let cases = vec![
            (test::TestRequest::get().uri("/users/999"), StatusCode::NOT_FOUND),
            (test::TestRequest::get().uri("/nothing"), StatusCode::NOT_FOUND),
            (test::TestRequest::get().uri("/users/abc"), StatusCode::BAD_REQUEST),
            (
                test::TestRequest::post().uri("/users").set_json(json!({ "name": "Frank" })),
                StatusCode::CONFLICT,
            ),
            (
                test::TestRequest::post().uri("/users").set_json(json!({ "name": 5 })),
                StatusCode::BAD_REQUEST,
            ),
            (
                test::TestRequest::post()
                    .uri("/books")
                    .set_json(json!({ "title": "Emma", "user_id": 42 })),
                StatusCode::BAD_REQUEST,
            ),
            (
                test::TestRequest::put().uri("/users/7").set_json(json!({ "name": "Nobody" })),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (req, expected) in cases {
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), expected);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert!(body["message"].is_string());
        }
    }

    #[actix_web::test]
    async fn test_status_route() {
        let (_tmp, state) = setup();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(|cfg| configure(cfg, "")),
        )
        .await;

        let req = test::TestRequest::get().uri("/_status").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["resources"]["users"]["count"], 1);
        assert_eq!(body["resources"]["books"]["dirty"], false);
    }
}
