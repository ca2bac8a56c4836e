pub mod concurrency;
pub mod errors;
pub mod fs;
pub mod io;
pub mod programs;

pub mod prelude {
    pub use super::concurrency::{build_pool, determine_allowed_cpus};
    pub use super::errors::is_broken_pipe;
    pub use super::fs::{
        append_stem, file_exists, is_bgzipped, make_parent_dirs, splitext_plus, symlink_plus,
        with_transaction,
    };
    pub use super::io::{get_reader, get_writer, write_text};
    pub use super::programs::{run_program, run_program_to_file};
}
