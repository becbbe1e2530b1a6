//! One module per pipeline stage (§4.3). Each stage is a small function over
//! `(Job, shared services) -> side effects`; the driver (`pipeline::driver`)
//! owns status transitions and persistence.

pub mod generate;
pub mod ingest;
pub mod refine;
pub mod scribe;
pub mod shelve;
