//! # Customs Calculator
//!
//! Request-facing entry point: raw request in, response or [`ApiError`] out.
//!
//! ## Error Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Failure                              ErrorCategory        Logged at    │
//! │  ───────                              ─────────────        ─────────    │
//! │  Validation, UnknownClassification,   INVALID_REQUEST      debug        │
//! │  malformed JSON                                                         │
//! │                                                                         │
//! │  UnsupportedCurrency,                 SERVICE_UNAVAILABLE  warn         │
//! │  StaleOrMissingRateTable, no                                            │
//! │  snapshot, storage failures                                             │
//! │                                                                         │
//! │  CircularOrForwardBaseReference,      SCHEDULE_DEFECT      error        │
//! │  InvalidConfiguration, AmountOverflow                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `INVALID_REQUEST` is the caller's fault. The other two mean the
//! loaded rates or rules need attention; nothing here retries.

use chrono::{DateTime, Utc};
use customs_core::engine::{calculate, valuate_only};
use customs_core::result::{CifResponse, CustomsResponse};
use customs_core::validation::{validate_cif_request, validate_request, RawCalculationRequest};
use customs_core::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::error::ServiceError;
use crate::snapshot::SnapshotStore;

// =============================================================================
// API Error
// =============================================================================

/// Error returned to whoever submitted the request.
///
/// ```json
/// {
///   "code": "INVALID_REQUEST",
///   "message": "product_price must be positive",
///   "field": "product_price"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ApiError {
    pub code: ErrorCategory,
    pub message: String,
    /// Offending request field, when there is one.
    pub field: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorCategory {
    /// The request itself is wrong (400).
    InvalidRequest,

    /// Rates or snapshot unavailable (503).
    ServiceUnavailable,

    /// The loaded charge schedule is inconsistent (500).
    ScheduleDefect,
}

impl ApiError {
    pub fn new(code: ErrorCategory, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCategory::InvalidRequest, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCategory::ServiceUnavailable, message)
    }

    fn with_field(mut self, field: Option<&str>) -> Self {
        self.field = field.map(str::to_string);
        self
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::Validation(_) | CoreError::UnknownClassification { .. } => {
                ErrorCategory::InvalidRequest
            }
            CoreError::UnsupportedCurrency { .. } | CoreError::StaleOrMissingRateTable { .. } => {
                ErrorCategory::ServiceUnavailable
            }
            CoreError::CircularOrForwardBaseReference { .. }
            | CoreError::InvalidConfiguration(_)
            | CoreError::AmountOverflow { .. } => ErrorCategory::ScheduleDefect,
        };
        ApiError::new(code, err.to_string()).with_field(err.field())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(core) => core.into(),
            ServiceError::MalformedRequest(_) | ServiceError::Io(_) => {
                ApiError::invalid_request(err.to_string())
            }
            other => ApiError::unavailable(other.to_string()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Calculator
// =============================================================================

/// Runs validated requests against the current snapshot.
#[derive(Debug, Clone)]
pub struct CustomsCalculator {
    store: SnapshotStore,
}

impl CustomsCalculator {
    pub fn new(store: SnapshotStore) -> Self {
        CustomsCalculator { store }
    }

    /// Decodes a JSON request body.
    pub fn parse_request(body: &str) -> Result<RawCalculationRequest, ApiError> {
        serde_json::from_str(body).map_err(|e| {
            debug!(error = %e, "Rejected malformed request body");
            ApiError::from(ServiceError::from(e))
        })
    }

    /// Full calculation: CIF, charges and total.
    pub async fn calculate(&self, raw: &RawCalculationRequest) -> Result<CustomsResponse, ApiError> {
        self.calculate_at(raw, Utc::now()).await
    }

    pub async fn calculate_at(
        &self,
        raw: &RawCalculationRequest,
        now: DateTime<Utc>,
    ) -> Result<CustomsResponse, ApiError> {
        let request = validate_request(raw).map_err(|e| reject(e.into()))?;
        let snapshot = self.store.current().await.map_err(|e| reject(e.into()))?;

        let result = calculate(&request, &snapshot, now).map_err(|e| reject(e.into()))?;
        info!(
            snapshot_id = %snapshot.id,
            classification_code = %request.classification_code,
            transaction_type = %request.transaction_type,
            charges = result.line_items.len(),
            total = %result.total,
            "Customs charges calculated"
        );
        Ok(result.to_response())
    }

    /// CIF valuation only.
    pub async fn calculate_cif(&self, raw: &RawCalculationRequest) -> Result<CifResponse, ApiError> {
        self.calculate_cif_at(raw, Utc::now()).await
    }

    pub async fn calculate_cif_at(
        &self,
        raw: &RawCalculationRequest,
        now: DateTime<Utc>,
    ) -> Result<CifResponse, ApiError> {
        let request = validate_cif_request(raw).map_err(|e| reject(e.into()))?;
        let snapshot = self.store.current().await.map_err(|e| reject(e.into()))?;

        let breakdown = valuate_only(&request, &snapshot, now).map_err(|e| reject(e.into()))?;
        info!(
            snapshot_id = %snapshot.id,
            product_currency = %request.product_currency,
            cif_local = %breakdown.cif.local.round_for_output(),
            "CIF valuated"
        );
        Ok(CifResponse::from_breakdown(&breakdown))
    }
}

/// Logs a failure at the level its category deserves.
fn reject(err: ApiError) -> ApiError {
    match err.code {
        ErrorCategory::InvalidRequest => {
            debug!(field = ?err.field, message = %err.message, "Request rejected")
        }
        ErrorCategory::ServiceUnavailable => {
            warn!(message = %err.message, "Calculation unavailable")
        }
        ErrorCategory::ScheduleDefect => {
            error!(message = %err.message, "Charge schedule defect")
        }
    }
    err
}
