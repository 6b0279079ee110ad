use crate::api::responses::{
    ErrorCode, ErrorResponse, FieldSuccessResponse, HealthStatus, HealthSuccessResponse,
    ReloadSuccessResponse, SummarySuccessResponse,
};
use crate::dataset::{DatasetSummary, Metric, ScatteredMetricDataset};
use crate::interpolation::{self, EdgePolicy, GridSpec, InterpolationError, Method};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

type SharedState = Arc<RwLock<AppState>>;

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

/// Either a success body or an error body with its status.
pub enum ApiResponse<T> {
    Success(T),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

fn error_response<T>(
    status: StatusCode,
    error_code: ErrorCode,
    message: impl Into<String>,
    now: SystemTime,
) -> ApiResponse<T> {
    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Error {
            status,
            body: ErrorResponse {
                error_code,
                error_message: message.into(),
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn internal_error<T>(message: &str) -> ApiResponse<T> {
    error!(message = message, "Internal error while handling API request");
    let formatted = format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: formatted,
        },
    }
}

pub async fn get_health(State(state): State<SharedState>) -> impl IntoResponse {
    build_health_response(state, SystemTime::now())
}

pub async fn get_summary(State(state): State<SharedState>) -> impl IntoResponse {
    build_summary_response(state, SystemTime::now())
}

pub async fn get_field(
    State(state): State<SharedState>,
    Query(query): Query<FieldQuery>,
) -> impl IntoResponse {
    // interpolation is CPU-bound; keep it off the async workers
    match tokio::task::spawn_blocking(move || build_field_response(state, query, SystemTime::now()))
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "Field computation task failed");
            internal_error("field computation task failed")
        }
    }
}

pub async fn post_reload(State(state): State<SharedState>) -> impl IntoResponse {
    match tokio::task::spawn_blocking(move || build_reload_response(state, SystemTime::now())).await
    {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "Reload task failed");
            internal_error("reload task failed")
        }
    }
}

fn build_health_response(
    state: SharedState,
    now: SystemTime,
) -> ApiResponse<HealthSuccessResponse> {
    let (record_count, loaded_at) = match state.read() {
        Ok(guard) => (guard.records().len(), guard.loaded_at()),
        Err(_) => return internal_error("state lock poisoned while reading records"),
    };

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => return internal_error("timestamp formatting failure"),
    };
    let loaded_at = match loaded_at.map(format_timestamp).transpose() {
        Ok(formatted) => formatted,
        Err(_) => return internal_error("timestamp formatting failure"),
    };

    let status = if record_count == 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    };

    ApiResponse::Success(HealthSuccessResponse {
        status,
        record_count,
        loaded_at,
        timestamp,
    })
}

fn build_summary_response(
    state: SharedState,
    now: SystemTime,
) -> ApiResponse<SummarySuccessResponse> {
    let summary = match state.read() {
        Ok(guard) => DatasetSummary::from_records(guard.records()),
        Err(_) => return internal_error("state lock poisoned while reading records"),
    };

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success(SummarySuccessResponse { summary, timestamp }),
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

/// `GET /api/field` query; unset values fall back to the configured grid.
#[derive(Debug, Default, Deserialize)]
pub struct FieldQuery {
    pub metric: Option<String>,
    pub method: Option<String>,
    pub edge_policy: Option<String>,
    pub nx: Option<usize>,
    pub ny: Option<usize>,
}

fn resolve_field_request(
    query: &FieldQuery,
    defaults: &GridSpec,
) -> Result<(Metric, GridSpec), String> {
    let metric = match query.metric.as_deref() {
        Some(name) => name.parse::<Metric>().map_err(|err| err.to_string())?,
        None => Metric::Rssi,
    };
    let method = match query.method.as_deref() {
        Some(name) => name.parse::<Method>().map_err(|err| err.to_string())?,
        None => defaults.method,
    };
    let edge_policy = match query.edge_policy.as_deref() {
        Some(name) => name.parse::<EdgePolicy>().map_err(|err| err.to_string())?,
        None => defaults.edge_policy,
    };

    Ok((
        metric,
        GridSpec {
            resolution_x: query.nx.unwrap_or(defaults.resolution_x),
            resolution_y: query.ny.unwrap_or(defaults.resolution_y),
            method,
            edge_policy,
            region: defaults.region,
        },
    ))
}

fn build_field_response(
    state: SharedState,
    query: FieldQuery,
    now: SystemTime,
) -> ApiResponse<FieldSuccessResponse> {
    let (dataset, spec) = {
        let guard = match state.read() {
            Ok(guard) => guard,
            Err(_) => return internal_error("state lock poisoned while reading records"),
        };
        let (metric, spec) = match resolve_field_request(&query, guard.grid()) {
            Ok(resolved) => resolved,
            Err(message) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    ErrorCode::InvalidRequest,
                    message,
                    now,
                );
            }
        };
        (ScatteredMetricDataset::from_records(guard.records(), metric), spec)
    };

    let field = match interpolation::interpolate(&dataset, &spec) {
        Ok(field) => field,
        Err(err) => {
            warn!(
                metric = %dataset.metric(),
                method = %spec.method,
                error = %err,
                "Field request rejected"
            );
            let (status, code) = match err {
                InterpolationError::InsufficientData { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::InsufficientData)
                }
                InterpolationError::NumericFailure(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::NumericFailure)
                }
                InterpolationError::InvalidGrid(_) => {
                    (StatusCode::BAD_REQUEST, ErrorCode::InvalidRequest)
                }
            };
            return error_response(status, code, err.to_string(), now);
        }
    };

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success(FieldSuccessResponse { field, timestamp }),
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn build_reload_response(
    state: SharedState,
    now: SystemTime,
) -> ApiResponse<ReloadSuccessResponse> {
    let mut guard = match state.write() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while reloading records"),
    };

    let record_count = match guard.reload(now) {
        Ok(count) => count,
        Err(err) => {
            drop(guard);
            warn!(error = %err, "Reload failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::ReloadFailed,
                err.to_string(),
                now,
            );
        }
    };
    drop(guard);

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success(ReloadSuccessResponse {
            record_count,
            timestamp,
        }),
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::{Bounds, Region};
    use crate::platform::WifiSample;
    use crate::record::{Coordinates, MeasurementRecord};
    use std::time::{Duration, UNIX_EPOCH};

    fn record(x: f64, y: f64, rssi: Option<i32>) -> MeasurementRecord {
        MeasurementRecord {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            coordinates: Coordinates::new(x, y),
            wifi_info: WifiSample {
                rssi,
                ..WifiSample::default()
            },
            latency: Default::default(),
            throughput: Default::default(),
            os: None,
            interface: None,
            gateway_ip: None,
        }
    }

    fn state_with(records: Vec<MeasurementRecord>) -> SharedState {
        let grid = GridSpec {
            resolution_x: 3,
            resolution_y: 3,
            method: Method::Nearest,
            edge_policy: EdgePolicy::NearestFill,
            region: Region::Explicit(Bounds {
                min_x: 0.0,
                max_x: 10.0,
                min_y: 0.0,
                max_y: 10.0,
            }),
        };
        let mut state = AppState::new("/definitely/not/a/measurement/dir", grid);
        state.set_records(records, UNIX_EPOCH);
        Arc::new(RwLock::new(state))
    }

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_767_225_600)
    }

    #[test]
    fn health_is_degraded_without_records() {
        let response = build_health_response(state_with(Vec::new()), now());

        match response {
            ApiResponse::Success(body) => {
                assert_eq!(body.status, HealthStatus::Degraded);
                assert_eq!(body.record_count, 0);
                assert_eq!(body.loaded_at.as_deref(), Some("1970-01-01T00:00:00Z"));
                assert_eq!(body.timestamp, "2026-01-01T00:00:00Z");
            }
            ApiResponse::Error { .. } => panic!("expected success"),
        }
    }

    #[test]
    fn field_uses_configured_grid() {
        let state = state_with(vec![
            record(0.0, 0.0, Some(-30)),
            record(10.0, 0.0, Some(-70)),
            record(5.0, 10.0, Some(-50)),
        ]);

        let response = build_field_response(state, FieldQuery::default(), now());

        match response {
            ApiResponse::Success(body) => {
                assert_eq!(body.field.values[1], vec![Some(-30.0), Some(-50.0), Some(-70.0)]);
                assert_eq!(body.field.sample_count, 3);
            }
            ApiResponse::Error { body, .. } => panic!("unexpected error {body:?}"),
        }
    }

    #[test]
    fn insufficient_data_is_unprocessable() {
        let state = state_with(vec![record(0.0, 0.0, Some(-30)), record(1.0, 0.0, None)]);

        let response = build_field_response(state, FieldQuery::default(), now());

        match response {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(body.error_code, ErrorCode::InsufficientData);
            }
            ApiResponse::Success(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn collinear_linear_request_is_numeric_failure() {
        let state = state_with(vec![
            record(0.0, 0.0, Some(-30)),
            record(5.0, 0.0, Some(-40)),
            record(10.0, 0.0, Some(-50)),
        ]);
        let query = FieldQuery {
            method: Some("linear".to_string()),
            ..FieldQuery::default()
        };

        let response = build_field_response(state, query, now());

        match response {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(body.error_code, ErrorCode::NumericFailure);
            }
            ApiResponse::Success(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn unknown_metric_is_bad_request() {
        let query = FieldQuery {
            metric: Some("snr".to_string()),
            ..FieldQuery::default()
        };

        let response = build_field_response(state_with(Vec::new()), query, now());

        match response {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body.error_code, ErrorCode::InvalidRequest);
            }
            ApiResponse::Success(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn failed_reload_reports_error() {
        let response = build_reload_response(state_with(Vec::new()), now());

        match response {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body.error_code, ErrorCode::ReloadFailed);
            }
            ApiResponse::Success(_) => panic!("expected reload failure"),
        }
    }

    #[test]
    fn summary_counts_records() {
        let state = state_with(vec![record(0.0, 0.0, Some(-30)), record(2.0, 3.0, None)]);

        match build_summary_response(state, now()) {
            ApiResponse::Success(body) => {
                assert_eq!(body.summary.record_count, 2);
                assert_eq!(body.summary.metric(Metric::Rssi).map(|m| m.count), Some(1));
            }
            ApiResponse::Error { .. } => panic!("expected success"),
        }
    }
}
