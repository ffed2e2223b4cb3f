//! Data sources that can be indexed.

mod local;

pub use local::{FileOutcome, LocalSource, SkipReason, WalkRules};
