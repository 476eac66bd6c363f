pub mod executor;

pub use executor::{Executor, Mode, Outcome, WorkerTag};
