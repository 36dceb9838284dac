use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::ClassiDb;
use crate::error::StoreError;
use crate::model::RecordPatch;
use crate::query::QueryParams;

// 4 MB cap on request bodies
const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

pub struct ClassiServer {
    db: Arc<ClassiDb>,
}

impl ClassiServer {
    pub fn new(db: Arc<ClassiDb>) -> Self {
        Self { db }
    }

    /// Serves the API until `shutdown` resolves.
    pub async fn run<S>(&self, addr: SocketAddr, shutdown: S) -> Result<(), warp::Error>
    where
    S: std::future::Future<Output = ()> + Send + 'static,
    {
        let (bound, server) = warp::serve(routes(self.db.clone()))
        .try_bind_with_graceful_shutdown(addr, shutdown)?;
        info!(%bound, "classification API listening");
        server.await;
        Ok(())
    }
}

/// Every route of the API, with CORS, rejection handling and request tracing applied.
pub fn routes(db: Arc<ClassiDb>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    // GET /classifications?type&min_confidence&max_confidence&sort&order&page&limit
    let list = warp::path("classifications")
    .and(warp::path::end())
    .and(warp::get())
    .and(warp::query::<HashMap<String, String>>())
    .and(with_db(db.clone()))
    .and_then(handle_list);

    // POST /classifications
    let create = warp::path("classifications")
    .and(warp::path::end())
    .and(warp::post())
    .and(json_body::<Value>())
    .and(with_db(db.clone()))
    .and_then(handle_create);

    // GET /classifications/:id
    let get_one = warp::path!("classifications" / Uuid)
    .and(warp::get())
    .and(with_db(db.clone()))
    .and_then(handle_get);

    // PATCH /classifications/:id
    let update = warp::path!("classifications" / Uuid)
    .and(warp::patch())
    .and(json_body::<RecordPatch>())
    .and(with_db(db.clone()))
    .and_then(handle_update);

    // POST /classifications/:id/undo
    let undo = warp::path!("classifications" / Uuid / "undo")
    .and(warp::post())
    .and(with_db(db.clone()))
    .and_then(handle_undo);

    // GET /health
    let health = warp::path!("health")
    .and(warp::get())
    .and(with_db(db))
    .and_then(handle_health);

    let cors = warp::cors()
    .allow_any_origin()
    .allow_methods(vec!["GET", "POST", "PATCH", "OPTIONS"])
    .allow_headers(vec!["content-type"]);

    list.or(create)
    .or(get_one)
    .or(update)
    .or(undo)
    .or(health)
    .with(cors)
    .recover(handle_rejection)
    .with(warp::trace::request())
}

fn with_db(db: Arc<ClassiDb>) -> impl Filter<Extract = (Arc<ClassiDb>,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

// --- HANDLERS ---

async fn handle_list(params: HashMap<String, String>, db: Arc<ClassiDb>) -> Result<Response, Infallible> {
    let params = QueryParams::from_pairs(&params);
    Ok(match db.query(&params) {
        Ok(page) => reply(StatusCode::OK, &page),
        Err(e) => store_error(e),
    })
}

async fn handle_create(body: Value, db: Arc<ClassiDb>) -> Result<Response, Infallible> {
    Ok(match db.ingest(body) {
        Ok(created) => reply(
            StatusCode::CREATED,
            &json!({
                "message": format!("{} classification(s) created", created.len()),
                "data": created,
            }),
        ),
        Err(e) => store_error(e),
    })
}

async fn handle_get(id: Uuid, db: Arc<ClassiDb>) -> Result<Response, Infallible> {
    Ok(match db.get(id) {
        Ok(record) => reply(StatusCode::OK, &json!({ "data": record })),
        Err(e) => store_error(e),
    })
}

async fn handle_update(id: Uuid, patch: RecordPatch, db: Arc<ClassiDb>) -> Result<Response, Infallible> {
    Ok(match db.update(id, patch) {
        Ok(record) => reply(
            StatusCode::OK,
            &json!({
                "message": "Classification updated successfully",
                "data": record,
                "canUndo": true,
            }),
        ),
        Err(e) => store_error(e),
    })
}

async fn handle_undo(id: Uuid, db: Arc<ClassiDb>) -> Result<Response, Infallible> {
    Ok(match db.undo(id) {
        Ok(record) => reply(
            StatusCode::OK,
            &json!({
                "message": "Changes undone successfully",
                "data": record,
            }),
        ),
        Err(e) => store_error(e),
    })
}

async fn handle_health(db: Arc<ClassiDb>) -> Result<Response, Infallible> {
    Ok(match db.health() {
        Ok(health) => reply(StatusCode::OK, &health),
        Err(e) => store_error(e),
    })
}

// --- REPLIES ---

fn reply<T: Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    reply(status, &json!({ "error": message }))
}

/// Maps core failures to client-facing errors. Internal detail stays in the log.
fn store_error(err: StoreError) -> Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match &err {
        StoreError::NotFound(_) => "Classification not found",
        StoreError::InvalidInput { .. } => "Request body must be an array of documents",
        StoreError::SeedLoad { .. } => "Seed data could not be loaded",
        StoreError::NoUndoAvailable(_) => "No undo available for this classification",
        StoreError::UndoExpired(_) => "Undo window has expired",
        StoreError::Internal(_) => {
            error!(error = %err, "request failed");
            "Internal server error"
        }
    };
    error_reply(status, message)
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid JSON body")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length header required")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected a JSON body")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<warp::cors::CorsForbidden>().is_some() {
        (StatusCode::FORBIDDEN, "CORS request forbidden")
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(error_reply(status, message))
}
