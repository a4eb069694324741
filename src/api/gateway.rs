//! Backend Gateway: one typed operation per pipeline stage.
//!
//! Session-scoped calls read the session id from the injected store and fail
//! with [`ApiError::MissingSession`] before touching the network when there
//! is none. Success bodies are decoded into their stage contract and checked
//! against the session the request was issued for. The gateway caches
//! nothing; the raw body is handed back so the caller can.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use super::transport::{BackendRequest, BackendResponse, RequestBody, Transport};
use super::{ApiError, Endpoint, TransportFailure};
use crate::store::SessionStore;
use crate::types::{
    self, Contract, EdaResponse, FeatureInfo, PredictionRequest, PredictionResponse,
    PreprocessOptions, PreprocessResponse, ReportDownload, ReportFormat, ReportResponse,
    SessionSnapshot, TrainOptions, TrainingResponse, UploadResponse,
};

/// A decoded stage response together with the body it was decoded from
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult<T> {
    pub data: T,
    pub raw: Value,
}

#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    store: SessionStore,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, store: SessionStore) -> Self {
        Self { transport, store }
    }

    /// `POST /api/dataset/upload` as multipart. Callable without a session.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        session_id: Option<&str>,
    ) -> Result<StageResult<UploadResponse>, ApiError> {
        let endpoint = Endpoint::Upload;
        let fields = session_id
            .map(|id| vec![("session_id".to_string(), id.to_string())])
            .unwrap_or_default();

        let request = BackendRequest::new(endpoint).with_body(RequestBody::Multipart {
            field: "file".to_string(),
            file_name: file_name.to_string(),
            bytes,
            fields,
        });

        let response = self.execute(request).await?;
        decode_success(endpoint, &response, None)
    }

    /// `POST /api/eda/analyze` with a JSON body
    pub async fn run_eda(&self) -> Result<StageResult<EdaResponse>, ApiError> {
        let endpoint = Endpoint::Eda;
        let session_id = self.require_session(endpoint)?;

        let request = BackendRequest::new(endpoint)
            .with_body(RequestBody::Json(json!({ "session_id": session_id })));

        let response = self.execute(request).await?;
        decode_success(endpoint, &response, Some(session_id.as_str()))
    }

    /// `POST /api/preprocess/preprocess` with options as query parameters
    pub async fn run_preprocessing(
        &self,
        options: &PreprocessOptions,
    ) -> Result<StageResult<PreprocessResponse>, ApiError> {
        let endpoint = Endpoint::Preprocess;
        let session_id = self.require_session(endpoint)?;

        let request = BackendRequest::new(endpoint)
            .with_query("session_id", session_id.as_str())
            .with_query_pairs(options.to_query());

        let response = self.execute(request).await?;
        decode_success(endpoint, &response, Some(session_id.as_str()))
    }

    /// `GET /api/models/models`, one `models` parameter per selected model
    pub async fn train_models(
        &self,
        options: &TrainOptions,
    ) -> Result<StageResult<TrainingResponse>, ApiError> {
        let endpoint = Endpoint::Train;
        let session_id = self.require_session(endpoint)?;

        let request = BackendRequest::new(endpoint)
            .with_query("session_id", session_id.as_str())
            .with_query_pairs(options.to_query());

        let response = self.execute(request).await?;
        decode_success(endpoint, &response, Some(session_id.as_str()))
    }

    /// `GET /api/report/preview`
    pub async fn report_preview(
        &self,
        format: ReportFormat,
    ) -> Result<StageResult<ReportResponse>, ApiError> {
        let endpoint = Endpoint::ReportPreview;
        let session_id = self.require_session(endpoint)?;

        let request = BackendRequest::new(endpoint)
            .with_query("session_id", session_id.as_str())
            .with_query("format", format.as_str());

        let response = self.execute(request).await?;
        decode_success(endpoint, &response, Some(session_id.as_str()))
    }

    /// `GET /api/report/generate`, returning the file body untouched
    pub async fn report_download(&self, format: ReportFormat) -> Result<ReportDownload, ApiError> {
        let endpoint = Endpoint::ReportGenerate;
        let session_id = self.require_session(endpoint)?;

        let request = BackendRequest::new(endpoint)
            .with_query("session_id", session_id.as_str())
            .with_query("format", format.as_str());

        let response = self.execute(request).await?;
        if response.body.is_empty() {
            return Err(ApiError::contract(endpoint, "empty report body"));
        }

        Ok(ReportDownload {
            format,
            content_type: response.content_type,
            bytes: response.body,
        })
    }

    /// `GET /api/predict/features`
    pub async fn feature_info(&self) -> Result<FeatureInfo, ApiError> {
        let endpoint = Endpoint::FeatureInfo;
        let session_id = self.require_session(endpoint)?;

        let request =
            BackendRequest::new(endpoint).with_query("session_id", session_id.as_str());

        let response = self.execute(request).await?;
        decode_success(endpoint, &response, Some(session_id.as_str())).map(|r| r.data)
    }

    /// `POST /api/predict/single`
    pub async fn predict(&self, input: &PredictionRequest) -> Result<PredictionResponse, ApiError> {
        let endpoint = Endpoint::Predict;
        let session_id = self.require_session(endpoint)?;

        let body = serde_json::to_value(input)
            .map_err(|e| ApiError::contract(endpoint, format!("cannot encode request: {}", e)))?;
        let request = BackendRequest::new(endpoint)
            .with_query("session_id", session_id.as_str())
            .with_body(RequestBody::Json(body));

        let response = self.execute(request).await?;
        decode_success(endpoint, &response, Some(session_id.as_str())).map(|r| r.data)
    }

    /// Link to the trained model file for the current session
    pub fn model_download_url(&self) -> Result<String, ApiError> {
        let endpoint = Endpoint::ModelDownload;
        let session_id = self.require_session(endpoint)?;
        Ok(format!(
            "{}?session_id={}",
            self.transport.url(endpoint.path()),
            session_id
        ))
    }

    /// `GET /api/session/{id}` for the stored session. A 404 means the
    /// backend does not know the session and yields `Ok(None)`.
    pub async fn fetch_session(&self) -> Result<Option<StageResult<SessionSnapshot>>, ApiError> {
        let endpoint = Endpoint::Session;
        let session_id = self.require_session(endpoint)?;

        let request = BackendRequest::new(endpoint)
            .with_path(format!("{}/{}", endpoint.path(), session_id));

        let response = match self.execute(request).await {
            Ok(response) => response,
            Err(ApiError::Transport {
                status: Some(404), ..
            }) => {
                tracing::debug!(session_id = %session_id, "Backend does not know this session");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        decode_success(endpoint, &response, Some(session_id.as_str())).map(Some)
    }

    fn require_session(&self, endpoint: Endpoint) -> Result<String, ApiError> {
        self.store
            .session_id()
            .ok_or(ApiError::MissingSession { endpoint })
    }

    /// Send a request and turn anything but a 2xx into a transport error
    async fn execute(&self, request: BackendRequest) -> Result<BackendResponse, ApiError> {
        let endpoint = request.endpoint;
        tracing::debug!(
            endpoint = %endpoint,
            method = %request.method,
            path = %request.path,
            "Sending backend request"
        );

        let response = self.transport.send(request).await.map_err(|failure| {
            tracing::warn!(endpoint = %endpoint, error = %failure, "Backend unreachable");
            failure_error(endpoint, &failure)
        })?;

        tracing::debug!(endpoint = %endpoint, status = response.status, "Backend responded");

        if response.is_success() {
            return Ok(response);
        }

        let message = error_detail(&response.body)
            .unwrap_or_else(|| endpoint.fallback_message().to_string());
        Err(ApiError::transport(endpoint, Some(response.status), message))
    }
}

fn failure_error(endpoint: Endpoint, failure: &TransportFailure) -> ApiError {
    ApiError::transport(
        endpoint,
        None,
        format!("{} ({})", endpoint.fallback_message(), failure),
    )
}

/// Human-readable message from an error body's `detail` field. Validation
/// errors carry a list of `{msg}` objects, which are joined.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let message = match value.get("detail")? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str).or(item.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        _ => return None,
    };
    (!message.is_empty()).then_some(message)
}

fn decode_success<T: Contract>(
    endpoint: Endpoint,
    response: &BackendResponse,
    expected_session: Option<&str>,
) -> Result<StageResult<T>, ApiError> {
    let raw: Value = serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::contract(endpoint, format!("body is not JSON: {}", e)))?;

    let data: T = types::decode(raw.clone()).map_err(|e| ApiError::contract(endpoint, e))?;

    if let (Some(expected), Some(actual)) = (expected_session, data.session_id()) {
        if !same_session(expected, actual) {
            return Err(ApiError::contract(
                endpoint,
                format!(
                    "response is for session {} but the request was for {}",
                    actual, expected
                ),
            ));
        }
    }

    Ok(StageResult { data, raw })
}

fn same_session(expected: &str, actual: Uuid) -> bool {
    match Uuid::parse_str(expected) {
        Ok(expected) => expected == actual,
        Err(_) => expected == actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTransport;
    use crate::store::MemoryStorage;

    const SESSION: &str = "11111111-1111-1111-1111-111111111111";

    fn gateway(with_session: bool) -> (Gateway, MockTransport) {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        if with_session {
            store.set_session_id(SESSION).unwrap();
        }
        let mock = MockTransport::new();
        (Gateway::new(Arc::new(mock.clone()), store), mock)
    }

    fn eda_body(session: &str) -> Value {
        json!({
            "status": "success",
            "session_id": session,
            "eda_report": {
                "missing_values": {"age": 3},
                "numerical_summary": {},
                "categorical_summary": {}
            }
        })
    }

    #[tokio::test]
    async fn test_missing_session_fails_before_network() {
        let (gateway, mock) = gateway(false);

        let err = gateway.run_eda().await.unwrap_err();
        assert_eq!(err, ApiError::missing_session(Endpoint::Eda));

        let err = gateway.train_models(&TrainOptions::default()).await.unwrap_err();
        assert!(err.is_missing_session());
        assert!(gateway.model_download_url().is_err());
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_detail_message_is_surfaced() {
        let (gateway, mock) = gateway(false);
        mock.respond(Endpoint::Upload, 413, &json!({"detail": "file too large"}));

        let err = gateway.upload("big.csv", vec![1, 2], None).await.unwrap_err();
        assert_eq!(err.to_string(), "file too large");
        assert_eq!(err.status(), Some(413));
    }

    #[tokio::test]
    async fn test_unparseable_error_body_uses_fallback() {
        let (gateway, mock) = gateway(true);
        mock.respond_raw(Endpoint::Eda, 500, "<html>Internal Server Error</html>");
        mock.respond(Endpoint::Eda, 500, &json!({"detail": ""}));

        let err = gateway.run_eda().await.unwrap_err();
        assert_eq!(err.to_string(), "EDA analysis failed");
        let err = gateway.run_eda().await.unwrap_err();
        assert_eq!(err.to_string(), "EDA analysis failed");
    }

    #[tokio::test]
    async fn test_validation_detail_list_is_joined() {
        let (gateway, mock) = gateway(true);
        mock.respond(
            Endpoint::Train,
            422,
            &json!({"detail": [{"msg": "field required"}, {"msg": "value is not a valid float"}]}),
        );

        let err = gateway.train_models(&TrainOptions::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "field required; value is not a valid float");
    }

    #[tokio::test]
    async fn test_network_failure_maps_to_transport_error() {
        let (gateway, mock) = gateway(true);
        mock.fail(Endpoint::Preprocess, TransportFailure::Timeout(300));

        let err = gateway
            .run_preprocessing(&PreprocessOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Preprocessing failed (timed out after 300s)");
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_eda_sends_json_session() {
        let (gateway, mock) = gateway(true);
        mock.respond(Endpoint::Eda, 200, &eda_body(SESSION));

        let result = gateway.run_eda().await.unwrap();
        assert_eq!(result.data.eda_report.columns_with_missing(), vec![("age", 3)]);
        assert_eq!(result.raw, eda_body(SESSION));

        let request = mock.last_request().unwrap();
        assert_eq!(request.body, RequestBody::Json(json!({"session_id": SESSION})));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_contract_error() {
        let (gateway, mock) = gateway(true);
        mock.respond(Endpoint::Eda, 200, &json!({"status": "success"}));
        mock.respond_raw(Endpoint::Eda, 200, "not json");

        assert!(gateway.run_eda().await.unwrap_err().is_contract_error());
        assert!(gateway.run_eda().await.unwrap_err().is_contract_error());
    }

    #[tokio::test]
    async fn test_response_for_other_session_is_contract_error() {
        let (gateway, mock) = gateway(true);
        mock.respond(
            Endpoint::Eda,
            200,
            &eda_body("22222222-2222-2222-2222-222222222222"),
        );

        let err = gateway.run_eda().await.unwrap_err();
        assert!(err.is_contract_error());
    }

    #[tokio::test]
    async fn test_train_repeats_models_in_query() {
        let (gateway, mock) = gateway(true);
        let options = TrainOptions {
            models: vec!["Random Forest".to_string(), "Logistic Regression".to_string()],
            ..Default::default()
        };
        let _ = gateway.train_models(&options).await;

        let request = mock.last_request().unwrap();
        assert_eq!(request.query_value("session_id"), Some(SESSION));
        assert_eq!(
            request.query_values("models"),
            vec!["Random Forest", "Logistic Regression"]
        );
        assert_eq!(request.body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn test_session_not_found_is_absent() {
        let (gateway, mock) = gateway(true);
        mock.respond(Endpoint::Session, 404, &json!({"detail": "Session not found"}));
        mock.respond(Endpoint::Session, 500, &json!({"detail": "boom"}));

        assert_eq!(gateway.fetch_session().await.unwrap(), None);
        let request = mock.last_request().unwrap();
        assert_eq!(request.path, format!("/api/session/{}", SESSION));

        assert_eq!(gateway.fetch_session().await.unwrap_err().to_string(), "boom");
    }

    #[tokio::test]
    async fn test_report_download_returns_bytes() {
        let (gateway, mock) = gateway(true);
        mock.respond_raw(Endpoint::ReportGenerate, 200, "%PDF-1.4");

        let download = gateway.report_download(ReportFormat::Pdf).await.unwrap();
        assert_eq!(download.bytes, b"%PDF-1.4".to_vec());
        assert_eq!(
            mock.last_request().unwrap().query_value("format"),
            Some("pdf")
        );
    }

    #[test]
    fn test_model_download_url() {
        let (gateway, _) = gateway(true);
        assert_eq!(
            gateway.model_download_url().unwrap(),
            format!("http://mock/api/predict/download-model?session_id={}", SESSION)
        );
    }
}
