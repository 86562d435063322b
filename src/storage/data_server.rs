//! Read-only HTTP view of the most recent CSV log rows.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::storage::csv_log::{read_tail, LogRecord};

const DEFAULT_NLINES: usize = 10;

pub type AppState = Arc<PathBuf>;

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub nlines: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub readings: Vec<LogRecord>,
}

/// Creates the router serving `/` and `/data`.
pub fn create_router(log_path: PathBuf) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/data", get(get_data))
        .with_state(Arc::new(log_path))
}

async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Last `nlines` rows of the log, oldest first.
async fn get_data(
    State(log_path): State<AppState>,
    Query(query): Query<DataQuery>,
) -> Result<Json<DataResponse>, StatusCode> {
    let nlines = query.nlines.unwrap_or(DEFAULT_NLINES);
    match read_tail(&log_path, nlines).await {
        Ok(readings) => {
            info!("Sent {} readings to client", readings.len());
            Ok(Json(DataResponse { readings }))
        }
        Err(e) => {
            error!("Failed to read log tail: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Bind `addr` and serve until the task is dropped
pub async fn serve(addr: &str, log_path: PathBuf) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Serving log data on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(log_path)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn write_log(dir: &tempfile::TempDir, rows: usize) -> PathBuf {
        let path = dir.path().join("air_quality.csv");
        let contents: String = (0..rows)
            .map(|i| format!("06/10/24 07:{:02}:00,{},21.5,40.25\n", i, 500 + i))
            .collect();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn data_defaults_to_ten_rows() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(write_log(&dir, 15));

        let (status, body) = get_json(app, "/data").await;
        assert_eq!(status, StatusCode::OK);
        let response: DataResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.readings.len(), 10);
        assert_eq!(response.readings[0].co2, 505);
        assert_eq!(response.readings[9].co2, 514);
    }

    #[tokio::test]
    async fn data_honours_nlines() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(write_log(&dir, 15));

        let (status, body) = get_json(app, "/data?nlines=2").await;
        assert_eq!(status, StatusCode::OK);
        let response: DataResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.readings.len(), 2);
        assert_eq!(response.readings[1].humidity, 40.25);
    }

    #[tokio::test]
    async fn bad_nlines_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(write_log(&dir, 3));
        let (status, _) = get_json(app, "/data?nlines=many").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn root_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(write_log(&dir, 1));
        let (status, body) = get_json(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ok");
    }
}
