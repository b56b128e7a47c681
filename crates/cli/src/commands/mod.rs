//! Command implementations.

mod process;
mod read;
mod simulate;
mod validate;

pub use process::{run_batch, run_directory, run_process};
pub use read::run_read;
pub use simulate::run_simulate;
pub use validate::run_validate;
