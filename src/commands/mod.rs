pub mod combine;
pub mod common;
pub mod exclude;
pub mod samples;

pub use combine::{run_combine, CombineArgs};
pub use exclude::{run_exclude, ExcludeArgs};
pub use samples::{run_samples, SamplesArgs};
