use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub quantity: Option<u32>,
}

/// One part received by the upload sink.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReceivedPart {
    pub name: String,
    pub filename: Option<String>,
    pub size: usize,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/status/{code}", any(reply_with_status))
        .route("/headers", get(echo_headers))
        .route("/query", get(echo_query))
        .route("/echo", post(echo_body).put(echo_body))
        .route("/text", get(text_page))
        .route("/upload", post(upload))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let mut items: Vec<Item> = db.read().await.values().cloned().collect();
    items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Json(items)
}

/// 422 with a JSON `{"error": …}` body, so clients can surface the payload.
fn rejected(message: &str) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": message }))).into_response()
}

fn checked_name(name: String) -> Result<String, Response> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(rejected("name must not be blank"));
    }
    Ok(trimmed.to_string())
}

async fn create_item(State(db): State<Db>, Json(input): Json<CreateItem>) -> Response {
    let name = match checked_name(input.name) {
        Ok(name) => name,
        Err(response) => return response,
    };
    let item = Item {
        id: Uuid::new_v4(),
        name,
        quantity: input.quantity,
    };
    tracing::debug!(id = %item.id, "created item");
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item)).into_response()
}

async fn get_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Item>, StatusCode> {
    db.read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateItem>,
) -> Response {
    let name = match input.name.map(checked_name).transpose() {
        Ok(name) => name,
        Err(response) => return response,
    };
    let mut items = db.write().await;
    let Some(item) = items.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(name) = name {
        item.name = name;
    }
    if let Some(quantity) = input.quantity {
        item.quantity = quantity;
    }
    Json(item.clone()).into_response()
}

async fn delete_item(State(db): State<Db>, Path(id): Path<Uuid>) -> StatusCode {
    match db.write().await.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// Answers with the status named in the path. 204 and 304 carry no body.
async fn reply_with_status(Path(code): Path<u16>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return status.into_response();
    }
    (status, Json(json!({ "status": code }))).into_response()
}

async fn echo_headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    Json(
        headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
    )
}

async fn echo_query(Query(pairs): Query<Vec<(String, String)>>) -> Json<Vec<(String, String)>> {
    Json(pairs)
}

async fn echo_body(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Json(json!({
        "content_type": content_type,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn text_page() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], "<p>hello</p>")
}

async fn upload(mut multipart: Multipart) -> Result<(StatusCode, Json<Vec<ReceivedPart>>), StatusCode> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        parts.push(ReceivedPart {
            name,
            filename,
            size: data.len(),
        });
    }
    tracing::debug!(parts = parts.len(), "received upload");
    Ok((StatusCode::CREATED, Json(parts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serializes_to_json() {
        let item = Item {
            id: Uuid::nil(),
            name: "Widget".to_string(),
            quantity: 3,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "Widget");
        assert_eq!(json["quantity"], 3);
    }

    #[test]
    fn create_item_defaults_quantity_to_zero() {
        let input: CreateItem = serde_json::from_str(r#"{"name":"No quantity"}"#).unwrap();
        assert_eq!(input.name, "No quantity");
        assert_eq!(input.quantity, 0);
    }

    #[test]
    fn create_item_rejects_missing_name() {
        let result: Result<CreateItem, _> = serde_json::from_str(r#"{"quantity":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn checked_name_trims_and_rejects_blank() {
        assert_eq!(checked_name("  Bolt ".to_string()).unwrap(), "Bolt");
        let response = checked_name("   ".to_string()).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn update_item_all_fields_optional() {
        let input: UpdateItem = serde_json::from_str(r#"{}"#).unwrap();
        assert!(input.name.is_none());
        assert!(input.quantity.is_none());
    }
}
