//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`CalorError`]
//! via `#[from]`. Nothing below the configuration bootstrap is allowed to
//! terminate the process, so every variant here is recoverable by design of
//! the calling code.

/// Top-level error for the calor workspace.
#[derive(Debug, thiserror::Error)]
pub enum CalorError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced room, cycle, device or record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// Persistence (load/save/archive) failed.
    #[error("storage error")]
    Storage(#[from] StorageError),

    /// A device gateway call failed.
    #[error("gateway error")]
    Gateway(#[from] GatewayError),
}

/// Domain invariant violations raised by `validate()` implementations.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("cycle must contain at least one room")]
    NoRooms,

    #[error("pump id must not be empty")]
    EmptyPump,

    #[error("temperature band is inverted: t_min {t_min} >= t_max {t_max}")]
    InvertedTemperatureBand { t_min: f64, t_max: f64 },

    #[error("weekly cycle weight {0} is outside 0..=1")]
    WeightOutOfRange(f64),

    #[error("in_threshold must be positive, got {0}")]
    NonPositiveThreshold(f64),
}

/// A lookup failed: the entity kind and the id that was requested.
#[derive(Debug, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A persistence operation failed.
///
/// Storage errors are scoped to the operation so the control cycle can keep
/// going with last-good in-memory values; the queue file is re-read from disk
/// on the next cycle, which is the recovery path.
#[derive(Debug, thiserror::Error)]
#[error("storage operation '{operation}' failed: {message}")]
pub struct StorageError {
    pub operation: &'static str,
    pub message: String,
}

impl StorageError {
    #[must_use]
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// A synchronous gateway call (sensor read, valve/pump/boiler write) failed.
#[derive(Debug, thiserror::Error)]
#[error("gateway call for '{device}' failed: {message}")]
pub struct GatewayError {
    pub device: String,
    pub message: String,
}

impl GatewayError {
    #[must_use]
    pub fn new(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            message: message.into(),
        }
    }
}

/// Where in the control cycle a failure happened.
///
/// Mirrored outward as the "last error / phase" flag operators see.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Sync,
    Schedule,
    AcquireState,
    Voting,
    IssueCommands,
    ExecuteCommands,
    ExportState,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Sync => "sync",
            Self::Schedule => "schedule",
            Self::AcquireState => "acquire_state",
            Self::Voting => "voting",
            Self::IssueCommands => "issue_commands",
            Self::ExecuteCommands => "execute_commands",
            Self::ExportState => "export_state",
        };
        f.write_str(name)
    }
}

/// Severity tier of a reported failure.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

/// A structured failure report consumed by the reporter task.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorReport {
    pub phase: Phase,
    pub severity: Severity,
    pub message: String,
    pub at: crate::time::Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_calor_error() {
        let err: CalorError = ValidationError::EmptyName.into();
        assert!(matches!(
            err,
            CalorError::Validation(ValidationError::EmptyName)
        ));
    }

    #[test]
    fn should_render_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Room",
            id: "7".to_string(),
        };
        assert_eq!(err.to_string(), "Room not found: 7");
    }

    #[test]
    fn should_render_gateway_error_with_device() {
        let err = GatewayError::new("pump_2", "relay unreachable");
        assert_eq!(
            err.to_string(),
            "gateway call for 'pump_2' failed: relay unreachable"
        );
    }
}
