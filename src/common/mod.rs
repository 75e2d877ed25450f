//! Common types and error definitions for longitudinal_planner
//!
//! This module provides the foundational building blocks shared by
//! the kinematic model, constraint construction and mode selection.

pub mod types;
pub mod error;

pub use types::*;
pub use error::*;
