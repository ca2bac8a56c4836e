//! Flat re-exports of the helpers command-line code reaches for most.
//!
//! New library code should import from `crate::core` directly.

pub use crate::core::concurrency::determine_allowed_cpus;
pub use crate::core::errors::is_broken_pipe;
pub use crate::core::fs::{file_exists, is_bgzipped, make_parent_dirs};
pub use crate::core::io::{get_reader, get_writer};
