//! Durable job store over the relational schema.
//!
//! The store is the authoritative record of work. All state transitions on
//! jobs go through here, and the claim transition is the sole concurrency
//! primitive coordinating workers.

mod job_store;

pub use job_store::{
    JobStore, MediaJobSeed, NewMediaAsset, NewStory, NewStoryPage, NewVocabEntry,
};
