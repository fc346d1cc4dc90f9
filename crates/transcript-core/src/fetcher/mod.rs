pub mod engine;
pub mod failure;
pub mod outcome;
pub mod strategy;

pub use engine::{FetchError, Fetcher};
pub use failure::{Attempt, Failure, FailureKind};
pub use outcome::Outcome;
pub use strategy::Strategy;
