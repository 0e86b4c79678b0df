//! Stream combinators used by the playback scheduler

mod dedup;

pub use dedup::{Dedup, DedupExt, Emission};
