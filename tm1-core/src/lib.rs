// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # TM1 Core
//!
//! Core types, models, and version gates for the TM1 REST client.
//!
//! This crate has no networking. It provides:
//!
//! - Error types ([`CoreError`])
//! - The dotted version comparator ([`compare_versions`], [`ServerVersion`])
//! - Version-gated capabilities ([`Capability`], [`ContentRoot`])
//! - Domain models for cellsets, chores, the active user, and log deltas
//!
//! ## Key Types
//!
//! ### Cellsets
//! - [`Cellset`] - Axes, tuples and cells of an executed query
//! - [`CellMap`] - Coordinate key to projected cell properties
//! - [`ordinal_to_indices`] - Mixed-radix ordinal decomposition
//!
//! ### Chores
//! - [`Chore`] - Schedule, flags and tasks
//! - [`ChoreTask`] - One process invocation

pub mod capability;
pub mod error;
pub mod models;
pub mod version;

pub use capability::{Capability, ContentRoot};
pub use error::CoreError;
pub use models::{
    // Cellsets
    Cell,
    CellMap,
    CellProperties,
    CellProperty,
    Cellset,
    CellsetAxis,
    DEFAULT_CELL_PROPERTIES,
    Member,
    Tuple,
    ordinal_to_indices,
    // Chores
    Chore,
    ChoreFrequency,
    ChoreTask,
    ChoreTaskParameter,
    ExecutionMode,
    local_start_time_body,
    parse_start_time,
    // Logs
    DeltaPage,
    LogTail,
    delta_link_endpoint,
    // Users
    ActiveUser,
    Group,
};
pub use version::{ServerVersion, V12, compare_versions, is_version_at_least};
