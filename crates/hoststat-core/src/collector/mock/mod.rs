//! Mock filesystem for testing the sampler without real `/proc`.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
