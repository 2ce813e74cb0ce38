//! Centralized constants for the update-returning crate.
//!
//! Defaults, limits and environment variable names live here so that
//! configuration and drivers agree on them.

// ============================================================================
// CONNECTION DEFAULTS
// ============================================================================

/// Alias recorded on returned objects when no alias is configured.
pub const DEFAULT_DB_ALIAS: &str = "default";

/// Number of rows a driver hands over per cursor chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

// ============================================================================
// SQL LIMITS
// ============================================================================

/// Maximum length for SQL identifiers (`PostgreSQL` limit is 63).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

// ============================================================================
// ENVIRONMENT VARIABLES
// ============================================================================

/// Alias of the connection results are bound to.
pub const ENV_DB_ALIAS: &str = "UPDATE_RETURNING_DB_ALIAS";

/// Whether shapes without a row-returning counterpart are rejected.
pub const ENV_STRICT: &str = "UPDATE_RETURNING_STRICT";

/// Rows per cursor chunk for bundled drivers.
pub const ENV_CHUNK_SIZE: &str = "UPDATE_RETURNING_CHUNK_SIZE";
