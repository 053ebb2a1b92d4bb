//! Unified error handling for the activity-dashboard library.
//!
//! This module provides a consistent error type for all dashboard operations,
//! replacing mixed error handling patterns (Option, panic, silent failures).

use std::fmt;

/// Unified error type for dashboard operations.
#[derive(Debug, Clone)]
pub enum DashboardError {
    /// Dimension handle does not refer to a live dimension
    UnknownDimension { index: usize },
    /// Too many dimensions declared on one store
    DimensionLimit { limit: usize },
    /// Group handle does not refer to a live group
    UnknownGroup { dimension: usize, slot: usize },
    /// HTTP/API error
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// Malformed response body
    Parse { message: String },
    /// Configuration error
    Config { message: String },
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::UnknownDimension { index } => {
                write!(f, "Dimension {} is not registered on this store", index)
            }
            DashboardError::DimensionLimit { limit } => {
                write!(f, "Store supports at most {} dimensions", limit)
            }
            DashboardError::UnknownGroup { dimension, slot } => {
                write!(
                    f,
                    "Group {} on dimension {} is not registered on this store",
                    slot, dimension
                )
            }
            DashboardError::Http {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            DashboardError::Parse { message } => {
                write!(f, "Parse error: {}", message)
            }
            DashboardError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for DashboardError {}

/// Result type alias for dashboard operations.
pub type Result<T> = std::result::Result<T, DashboardError>;
