//! Serves a [`LocalDocuments`] tree with the same `/<path>.json` addressing
//! as the hosted backend, for running without it.

use crate::{backend::DocumentStore, error::ScheduleError, local_documents::LocalDocuments};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Clone)]
struct AppState {
    documents: LocalDocuments,
}

type HandlerResult<T> = Result<T, (StatusCode, String)>;

pub fn router(documents: LocalDocuments) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/*path",
            get(get_document)
                .put(put_document)
                .patch(patch_document)
                .post(post_document)
                .delete(delete_document),
        )
        .with_state(AppState { documents })
        .layer(cors)
}

pub async fn serve(documents: LocalDocuments, listener: TcpListener) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        info!("Document server listening on http://{address}");
    }
    axum::serve(listener, router(documents)).await
}

fn document_path(path: &str) -> HandlerResult<String> {
    match path.strip_suffix(".json") {
        Some(path) => Ok(format!("/{}", path.trim_matches('/'))),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("'{path}' is not a document, expected a .json suffix"),
        )),
    }
}

fn rejected(err: ScheduleError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

async fn get_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> HandlerResult<Json<Value>> {
    let path = document_path(&path)?;
    state.documents.get(&path).await.map(Json).map_err(rejected)
}

async fn put_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(body): Json<Value>,
) -> HandlerResult<Json<Value>> {
    let path = document_path(&path)?;
    state
        .documents
        .put(&path, body.clone())
        .await
        .map_err(rejected)?;
    Ok(Json(body))
}

async fn patch_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(body): Json<Value>,
) -> HandlerResult<Json<Value>> {
    let path = document_path(&path)?;
    state
        .documents
        .patch(&path, body.clone())
        .await
        .map_err(rejected)?;
    Ok(Json(body))
}

async fn post_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(body): Json<Value>,
) -> HandlerResult<Json<Value>> {
    let path = document_path(&path)?;
    let name = state.documents.post(&path, body).await.map_err(rejected)?;
    Ok(Json(json!({ "name": name })))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> HandlerResult<Json<Value>> {
    let path = document_path(&path)?;
    state.documents.delete(&path).await.map_err(rejected)?;
    Ok(Json(Value::Null))
}

#[cfg(test)]
mod test {
    use super::*;
    use reqwest::Client;
    use tokio::task::JoinHandle;

    async fn init() -> (JoinHandle<()>, String, LocalDocuments) {
        let documents = LocalDocuments::default();
        documents.insert_example_schedule(2).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn({
            let documents = documents.clone();
            async move { serve(documents, listener).await.unwrap() }
        });
        (server, address, documents)
    }

    #[test_case::test_case("available_times.json", Ok("/available_times".into()))]
    #[test_case::test_case("available_times/2024-06-01.json", Ok("/available_times/2024-06-01".into()))]
    #[test_case::test_case(".json", Ok("/".into()))]
    #[test_case::test_case("available_times", Err(StatusCode::NOT_FOUND))]
    fn test_document_path(path: &str, expected: Result<String, StatusCode>) {
        assert_eq!(document_path(path).map_err(|(status, _)| status), expected);
    }

    #[tokio::test]
    async fn test_get_available_times() {
        let (server, address, documents) = init().await;

        let response = Client::new()
            .get(format!("{address}/available_times.json"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK.as_u16());
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap(),
            "application/json"
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, documents.snapshot()["available_times"]);

        server.abort();
    }

    #[tokio::test]
    async fn test_missing_document_is_null() {
        let (server, address, _) = init().await;

        let response = Client::new()
            .get(format!("{address}/staff/roster.json"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK.as_u16());
        assert_eq!(response.json::<Value>().await.unwrap(), Value::Null);

        server.abort();
    }

    #[tokio::test]
    async fn test_path_without_suffix_is_not_found() {
        let (server, address, _) = init().await;

        let response = Client::new()
            .get(format!("{address}/available_times"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND.as_u16());

        server.abort();
    }

    #[tokio::test]
    async fn test_post_returns_generated_name() {
        let (server, address, documents) = init().await;

        let response = Client::new()
            .post(format!("{address}/bookings.json"))
            .json(&json!({"name": "Jane Doe"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK.as_u16());

        let body: Value = response.json().await.unwrap();
        let name = body["name"].as_str().unwrap();
        assert_eq!(
            documents.snapshot()["bookings"][name],
            json!({"name": "Jane Doe"})
        );

        server.abort();
    }
}
