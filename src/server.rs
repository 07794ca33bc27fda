//! HTTP surface: upload form in, rendered report out.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use polars::prelude::DataFrame;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::page;
use crate::pipeline::{Pipeline, UploadReport};

/// Request bodies above this size are rejected before parsing.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared handler state. The pipeline is immutable after startup, so a
/// plain `Arc` is all the sharing needs.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        AppState {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(segment))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, pipeline: Pipeline) -> anyhow::Result<()> {
    let app = router(AppState::new(pipeline));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<String> {
    Html(page::index_page())
}

async fn health() -> &'static str {
    "OK"
}

/// Accept a multipart upload, run the pipeline, and render the report.
///
/// A schema miss comes back as a normal report page. Parse failures get
/// the bare error page; scoring failures keep the uploaded-data preview
/// above the banner.
async fn segment(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, PageError> {
    let bytes = read_upload(&mut multipart).await?;
    info!(bytes = bytes.len(), "received upload");

    let table = state.pipeline.parse(&bytes)?;
    let outcome = match state.pipeline.segment(&table) {
        Ok(outcome) => outcome,
        Err(err) => return Err(PageError::from(err).with_table(table)),
    };
    Ok(Html(page::report_page(&UploadReport { table, outcome })))
}

async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, PageError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| PageError::bad_request(format!("malformed upload: {err}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| PageError::bad_request(format!("the upload could not be read: {err}")))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(PageError::bad_request(
        "the upload did not include a \"file\" field".to_string(),
    ))
}

/// A failed request, rendered as the error page with a matching status.
/// When the upload parsed before failing, the table rides along so the
/// error page keeps the uploaded-data preview.
struct PageError {
    status: StatusCode,
    message: String,
    table: Option<DataFrame>,
}

impl PageError {
    fn bad_request(message: String) -> Self {
        PageError {
            status: StatusCode::BAD_REQUEST,
            message,
            table: None,
        }
    }

    fn with_table(mut self, table: DataFrame) -> Self {
        self.table = Some(table);
        self
    }
}

impl From<PipelineError> for PageError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::Parse(_) => StatusCode::BAD_REQUEST,
            PipelineError::Model(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        PageError {
            status,
            message: err.to_string(),
            table: None,
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        error!(status = %self.status, message = %self.message, "request failed");
        let html = page::error_page(&self.message, self.table.as_ref());
        (self.status, Html(html)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KMeansModel, StandardScaler};
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use ndarray::array;
    use tower::ServiceExt;

    const BOUNDARY: &str = "EDGE";

    fn test_state() -> AppState {
        let scaler = StandardScaler::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let model = KMeansModel::new(array![[10.0, 10.0], [90.0, 90.0]]).unwrap();
        AppState::new(Pipeline::new(scaler, model).unwrap())
    }

    fn upload_request(field_name: &str, payload: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"{field_name}\"; filename=\"customers.csv\"\r\n\
                 Content-Type: text/csv\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_serves_upload_page() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("📊 Customer Segmentation with CSV Upload"));
        assert!(html.contains("ℹ️ Please upload a CSV file to proceed."));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_upload_returns_segmentation_report() {
        let csv = b"CustomerID,Annual Income (k$),Spending Score (1-100)\n1,15,9\n2,95,85\n";
        let response = router(test_state())
            .oneshot(upload_request("file", csv))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("🗂️ Uploaded Data Preview"));
        assert!(html.contains("🏷️ Clustered Data"));
        assert!(html.contains("data:text/csv;base64,"));
        assert!(html.contains("download=\"clustered_customers.csv\""));
    }

    #[tokio::test]
    async fn test_upload_missing_columns_is_ok_with_banner() {
        let csv = b"CustomerID,Age\n1,23\n";
        let response = router(test_state())
            .oneshot(upload_request("file", csv))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("❌ The uploaded file must contain the following columns:"));
        assert!(html.contains("🗂️ Uploaded Data Preview"));
        assert!(!html.contains("🏷️ Clustered Data"));
    }

    #[tokio::test]
    async fn test_unparseable_upload_is_bad_request() {
        let response = router(test_state())
            .oneshot(upload_request("file", &[0xff, 0xfe, 0x01]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_text(response).await;
        assert!(html.contains("❌"));
    }

    #[tokio::test]
    async fn test_non_numeric_features_are_unprocessable() {
        let csv = b"Annual Income (k$),Spending Score (1-100)\nplenty,40\n";
        let response = router(test_state())
            .oneshot(upload_request("file", csv))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("Annual Income (k$)"));
    }

    #[tokio::test]
    async fn test_scoring_failure_keeps_uploaded_preview() {
        let csv = b"CustomerID,Annual Income (k$),Spending Score (1-100)\n7,plenty,40\n";
        let response = router(test_state())
            .oneshot(upload_request("file", csv))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("🗂️ Uploaded Data Preview"));
        assert!(html.contains("<td>plenty</td>"));
        assert!(html.contains("❌ the data could not be scored"));
        assert!(!html.contains("🏷️ Clustered Data"));
    }

    #[tokio::test]
    async fn test_upload_without_file_field_is_bad_request() {
        let csv = b"CustomerID\n1\n";
        let response = router(test_state())
            .oneshot(upload_request("attachment", csv))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
