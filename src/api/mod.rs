mod audit;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

pub use audit::{AuditError, AuditLog, AuditRecord};

use crate::core::{
    MonthRecord, ProjectionError, RateSearchConfig, SavingsInputs, SavingsPolicy, SearchInputs,
    SearchIteration, SearchOutcome, format_duration, trace_savings,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub audit_log: Option<PathBuf>,
    /// Truncate the audit log on startup instead of appending to it.
    pub reset_audit_log: bool,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

#[derive(Default)]
pub struct AppState {
    audit: Option<AuditLog>,
}

impl AppState {
    pub fn new(audit: Option<AuditLog>) -> Self {
        Self { audit }
    }

    fn record(&self, request: &ApiRequest, result: &Result<CalculationResponse, ProjectionError>) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.record(&audit_record(request, result)) {
            tracing::warn!(path = %audit.path().display(), error = %e, "failed to append audit row");
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiMode {
    #[serde(alias = "partA", alias = "part-a")]
    Fixed,
    #[serde(alias = "partB", alias = "part-b", alias = "steppedRaise")]
    Stepped,
    #[serde(alias = "partC", alias = "part-c", alias = "rateSearch")]
    Search,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Fixed,
    Stepped,
    Search,
}

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Fixed => "fixed",
            ResponseMode::Stepped => "stepped",
            ResponseMode::Search => "search",
        }
    }
}

impl From<SavingsPolicy> for ResponseMode {
    fn from(value: SavingsPolicy) -> Self {
        match value {
            SavingsPolicy::Fixed => ResponseMode::Fixed,
            SavingsPolicy::SteppedRaise => ResponseMode::Stepped,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CalculatePayload {
    mode: Option<ApiMode>,
    annual_salary: Option<f64>,
    portion_saved: Option<f64>,
    total_cost: Option<f64>,
    semi_raise: Option<f64>,
    #[serde(alias = "salary")]
    starting_salary: Option<f64>,
    include_trace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Calculation {
    Projection(SavingsInputs),
    Search(SearchInputs),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApiRequest {
    pub calculation: Calculation,
    pub include_trace: bool,
}

impl ApiRequest {
    pub fn new(calculation: Calculation, include_trace: bool) -> Self {
        Self {
            calculation,
            include_trace,
        }
    }

    pub fn mode(&self) -> ResponseMode {
        match &self.calculation {
            Calculation::Projection(inputs) => inputs.policy().into(),
            Calculation::Search(_) => ResponseMode::Search,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResponse {
    pub mode: ResponseMode,
    pub message: String,
    pub months: Option<u32>,
    pub duration: Option<String>,
    pub feasible: Option<bool>,
    pub rate: Option<f64>,
    pub rate_units: Option<u32>,
    pub rate_percent: Option<f64>,
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<MonthRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<Vec<SearchIteration>>,
}

impl CalculationResponse {
    fn empty(mode: ResponseMode, message: String) -> Self {
        Self {
            mode,
            message,
            months: None,
            duration: None,
            feasible: None,
            rate: None,
            rate_units: None,
            rate_percent: None,
            steps: None,
            schedule: None,
            iterations: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Runs the calculation a request asks for and renders its message.
pub fn evaluate(request: &ApiRequest) -> Result<CalculationResponse, ProjectionError> {
    let mode = request.mode();
    match &request.calculation {
        Calculation::Projection(inputs) => {
            let (months, schedule) = if request.include_trace {
                let schedule = trace_savings(inputs)?;
                (schedule.len() as u32, Some(schedule))
            } else {
                (inputs.project()?, None)
            };
            let duration = format_duration(months);
            let message = format!("It will take {duration} to save for the down payment");
            Ok(CalculationResponse {
                months: Some(months),
                duration: Some(duration),
                schedule,
                ..CalculationResponse::empty(mode, message)
            })
        }
        Calculation::Search(inputs) => {
            let config = RateSearchConfig::default();
            let report = inputs.search(&config)?;
            let iterations = request.include_trace.then_some(report.iterations);
            let response = match report.outcome {
                SearchOutcome::Found {
                    rate,
                    rate_units,
                    steps,
                } => CalculationResponse {
                    feasible: Some(true),
                    rate: Some(rate),
                    rate_units: Some(rate_units),
                    rate_percent: Some(rate * 100.0),
                    steps: Some(steps),
                    ..CalculationResponse::empty(
                        mode,
                        format!(
                            "Best savings rate = {rate:.4} ({:.2}%), Found in {steps} steps",
                            rate * 100.0
                        ),
                    )
                },
                SearchOutcome::Infeasible { steps } => CalculationResponse {
                    feasible: Some(false),
                    steps,
                    ..CalculationResponse::empty(
                        mode,
                        format!(
                            "Not possible to save for the down payment in {}",
                            format_duration(config.horizon_months)
                        ),
                    )
                },
            };
            Ok(CalculationResponse {
                iterations,
                ..response
            })
        }
    }
}

pub fn audit_record(
    request: &ApiRequest,
    result: &Result<CalculationResponse, ProjectionError>,
) -> AuditRecord {
    let outcome = match result {
        Ok(response) => response.message.clone(),
        Err(e) => format!("error: {e}"),
    };
    let base = AuditRecord::now(request.mode().as_str(), outcome);
    match &request.calculation {
        Calculation::Projection(inputs) => AuditRecord {
            annual_salary: Some(inputs.annual_salary),
            portion_saved: Some(inputs.portion_saved),
            total_cost: Some(inputs.total_cost),
            semi_raise: inputs.semi_annual_raise,
            ..base
        },
        Calculation::Search(inputs) => AuditRecord {
            starting_salary: Some(inputs.starting_salary),
            ..base
        },
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/calculate",
            get(calculate_get_handler).post(calculate_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(config: ServerConfig) -> Result<(), ServerError> {
    let audit = match &config.audit_log {
        Some(path) => {
            let log = AuditLog::open(path, config.reset_audit_log)?;
            tracing::info!(
                path = %path.display(),
                reset = config.reset_audit_log,
                "audit log ready"
            );
            Some(log)
        }
        None => None,
    };
    let app = build_router(Arc::new(AppState::new(audit)));

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("down payment planner listening on http://{addr}");
    tracing::info!("local access: http://127.0.0.1:{}/", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_get_handler(
    State(state): State<Arc<AppState>>,
    Query(payload): Query<CalculatePayload>,
) -> Response {
    run_calculation(state, payload).await
}

async fn calculate_post_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CalculatePayload>,
) -> Response {
    run_calculation(state, payload).await
}

// The audit row is a blocking file write behind a std mutex, so the whole
// evaluation runs on the blocking pool.
async fn run_calculation(state: Arc<AppState>, payload: CalculatePayload) -> Response {
    match tokio::task::spawn_blocking(move || calculate_handler_impl(&state, payload)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "calculation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn calculate_handler_impl(state: &AppState, payload: CalculatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            tracing::info!(error = %msg, "rejected calculation payload");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    let result = evaluate(&request);
    state.record(&request, &result);
    match result {
        Ok(response) => {
            tracing::info!(mode = request.mode().as_str(), message = %response.message, "calculated");
            json_response(StatusCode::OK, response)
        }
        Err(e) => {
            tracing::info!(mode = request.mode().as_str(), error = %e, "calculation failed");
            error_response(status_for(&e), &e.to_string())
        }
    }
}

fn status_for(error: &ProjectionError) -> StatusCode {
    match error {
        ProjectionError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        ProjectionError::DidNotConverge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<CalculatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: CalculatePayload) -> Result<ApiRequest, String> {
    let Some(mode) = payload.mode else {
        return Err("mode is required (fixed, stepped or search)".to_string());
    };

    let calculation = match mode {
        ApiMode::Fixed => Calculation::Projection(SavingsInputs::fixed(
            required(payload.annual_salary, "annualSalary")?,
            required(payload.portion_saved, "portionSaved")?,
            required(payload.total_cost, "totalCost")?,
        )),
        ApiMode::Stepped => Calculation::Projection(SavingsInputs::stepped(
            required(payload.annual_salary, "annualSalary")?,
            required(payload.portion_saved, "portionSaved")?,
            required(payload.total_cost, "totalCost")?,
            required(payload.semi_raise, "semiRaise")?,
        )),
        ApiMode::Search => Calculation::Search(SearchInputs {
            starting_salary: required(payload.starting_salary, "startingSalary")?,
        }),
    };

    Ok(ApiRequest::new(calculation, payload.include_trace))
}

fn required(value: Option<f64>, name: &str) -> Result<f64, String> {
    value.ok_or_else(|| format!("{name} is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn evaluate_json(json: &str) -> Result<CalculationResponse, ProjectionError> {
        let request = api_request_from_json(json).expect("valid payload");
        evaluate(&request)
    }

    #[test]
    fn api_request_from_json_parses_web_keys_and_aliases() {
        let request = api_request_from_json(
            r#"{"mode":"partA","annualSalary":120000,"portionSaved":0.1,"totalCost":500000,"semiRaise":0.03}"#,
        )
        .expect("valid payload");
        assert_eq!(request.mode(), ResponseMode::Fixed);
        assert!(!request.include_trace);
        assert_eq!(
            request.calculation,
            Calculation::Projection(SavingsInputs::fixed(120_000.0, 0.1, 500_000.0))
        );

        let request = api_request_from_json(
            r#"{"mode":"stepped","annualSalary":120000,"portionSaved":0.05,"totalCost":500000,"semiRaise":0.03,"includeTrace":true}"#,
        )
        .expect("valid payload");
        assert_eq!(request.mode(), ResponseMode::Stepped);
        assert!(request.include_trace);

        let request =
            api_request_from_json(r#"{"mode":"partC","salary":150000}"#).expect("valid payload");
        assert_eq!(
            request.calculation,
            Calculation::Search(SearchInputs {
                starting_salary: 150_000.0
            })
        );
    }

    #[test]
    fn api_request_from_json_reports_missing_fields() {
        assert_eq!(
            api_request_from_json(r#"{"annualSalary":1}"#).expect_err("mode missing"),
            "mode is required (fixed, stepped or search)"
        );
        assert_eq!(
            api_request_from_json(
                r#"{"mode":"stepped","annualSalary":1,"portionSaved":0.1,"totalCost":10}"#
            )
            .expect_err("raise missing"),
            "semiRaise is required"
        );
        assert_eq!(
            api_request_from_json(r#"{"mode":"search"}"#).expect_err("salary missing"),
            "startingSalary is required"
        );
        assert!(
            api_request_from_json(r#"{"mode":"fixed","annualSalary":"lots"}"#)
                .expect_err("not a number")
                .starts_with("Invalid API JSON payload")
        );
    }

    #[test]
    fn evaluate_fixed_reports_months_and_duration() {
        let response = evaluate_json(
            r#"{"mode":"fixed","annualSalary":120000,"portionSaved":0.1,"totalCost":500000}"#,
        )
        .expect("converges");
        assert_eq!(response.mode, ResponseMode::Fixed);
        assert_eq!(response.months, Some(105));
        assert_eq!(response.duration.as_deref(), Some("8 years and 9 months"));
        assert_eq!(
            response.message,
            "It will take 8 years and 9 months to save for the down payment"
        );
        assert!(response.schedule.is_none());
    }

    #[test]
    fn evaluate_stepped_with_trace_returns_schedule() {
        let response = evaluate_json(
            r#"{"mode":"stepped","annualSalary":120000,"portionSaved":0.05,"totalCost":500000,"semiRaise":0.03,"includeTrace":true}"#,
        )
        .expect("converges");
        assert_eq!(response.months, Some(142));
        let schedule = response.schedule.expect("schedule requested");
        assert_eq!(schedule.len(), 142);
        assert_eq!(schedule[141].month, 142);
    }

    #[test]
    fn evaluate_search_reports_found_rate() {
        let response =
            evaluate_json(r#"{"mode":"search","startingSalary":150000}"#).expect("valid");
        assert_eq!(response.feasible, Some(true));
        assert_eq!(response.rate_units, Some(4_410));
        assert_eq!(response.steps, Some(12));
        assert_approx(response.rate.expect("rate"), 0.441);
        assert_approx(response.rate_percent.expect("percent"), 44.1);
        assert_eq!(
            response.message,
            "Best savings rate = 0.4410 (44.10%), Found in 12 steps"
        );
        assert!(response.iterations.is_none());
    }

    #[test]
    fn evaluate_search_reports_infeasible_deadline() {
        let response = evaluate_json(r#"{"mode":"search","startingSalary":40000,"includeTrace":true}"#)
            .expect("valid");
        assert_eq!(response.feasible, Some(false));
        assert_eq!(response.steps, None);
        assert_eq!(response.rate, None);
        assert_eq!(
            response.message,
            "Not possible to save for the down payment in 3 years"
        );
        assert_eq!(response.iterations.map(|it| it.len()), Some(0));
    }

    #[test]
    fn evaluation_errors_map_to_http_statuses() {
        let err = evaluate_json(
            r#"{"mode":"fixed","annualSalary":-5,"portionSaved":0.1,"totalCost":500000}"#,
        )
        .expect_err("negative salary");
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);

        let err = evaluate_json(
            r#"{"mode":"fixed","annualSalary":50000,"portionSaved":0,"totalCost":500000}"#,
        )
        .expect_err("never converges");
        assert!(matches!(err, ProjectionError::DidNotConverge { .. }));
        assert_eq!(status_for(&err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn calculation_response_serialization_contains_expected_fields() {
        let response =
            evaluate_json(r#"{"mode":"search","startingSalary":150000}"#).expect("valid");
        let json = serde_json::to_value(&response).expect("serializable");
        assert_eq!(json["mode"], "search");
        assert_eq!(json["rateUnits"], 4_410);
        assert_eq!(json["steps"], 12);
        assert_eq!(json["feasible"], true);
        assert!(json["months"].is_null());
        assert!(json.get("iterations").is_none());
        assert!(json.get("schedule").is_none());
    }

    #[test]
    fn audit_record_captures_inputs_and_outcome() {
        let request = api_request_from_json(
            r#"{"mode":"partB","annualSalary":80000,"portionSaved":0.1,"totalCost":800000,"semiRaise":0.03}"#,
        )
        .expect("valid payload");
        let result = evaluate(&request);
        let record = audit_record(&request, &result);
        assert_eq!(record.mode, "stepped");
        assert_eq!(record.annual_salary, Some(80_000.0));
        assert_eq!(record.semi_raise, Some(0.03));
        assert_eq!(record.starting_salary, None);
        assert_eq!(
            record.outcome,
            "It will take 13 years and 3 months to save for the down payment"
        );

        let request = ApiRequest::new(
            Calculation::Search(SearchInputs {
                starting_salary: -1.0,
            }),
            false,
        );
        let record = audit_record(&request, &evaluate(&request));
        assert_eq!(record.mode, "search");
        assert!(record.outcome.starts_with("error: starting_salary must be"));
    }

    fn payload(json: &str) -> CalculatePayload {
        serde_json::from_str(json).expect("valid payload")
    }

    fn audit_rows(path: &std::path::Path) -> Vec<csv::StringRecord> {
        csv::Reader::from_path(path)
            .expect("readable log")
            .records()
            .collect::<Result<Vec<_>, _>>()
            .expect("valid rows")
    }

    fn cache_control(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
    }

    #[test]
    fn calculate_handler_appends_one_audit_row_per_evaluated_request() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("requests.csv");
        let state = AppState::new(Some(AuditLog::open(&path, true).expect("open log")));

        let response = calculate_handler_impl(
            &state,
            payload(r#"{"mode":"fixed","annualSalary":120000,"portionSaved":0.1,"totalCost":500000}"#),
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_control(&response), Some("no-store"));
        let rows = audit_rows(&path);
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "fixed");
        assert_eq!(&rows[0][2], "120000.0");
        assert_eq!(
            &rows[0][7],
            "It will take 8 years and 9 months to save for the down payment"
        );

        let response =
            calculate_handler_impl(&state, payload(r#"{"mode":"search","startingSalary":-1}"#));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(cache_control(&response), Some("no-store"));
        let rows = audit_rows(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][1], "search");
        assert_eq!(&rows[1][6], "-1.0");
        assert!(rows[1][7].starts_with("error: starting_salary must be"));

        let response = calculate_handler_impl(&state, payload(r#"{"annualSalary":120000}"#));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(cache_control(&response), Some("no-store"));
        assert_eq!(audit_rows(&path).len(), 2);
    }

    #[test]
    fn calculate_handler_without_audit_log_maps_errors_to_statuses() {
        let state = AppState::default();
        let response = calculate_handler_impl(
            &state,
            payload(r#"{"mode":"fixed","annualSalary":50000,"portionSaved":0,"totalCost":500000}"#),
        );
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn run_calculation_returns_json_body_from_blocking_pool() {
        let state = Arc::new(AppState::default());
        let response =
            run_calculation(state, payload(r#"{"mode":"partC","salary":300000}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["mode"], "search");
        assert_eq!(json["rateUnits"], 2_205);
        assert_eq!(
            json["message"],
            "Best savings rate = 0.2205 (22.05%), Found in 9 steps"
        );
    }
}
