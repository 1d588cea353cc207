pub mod engine;
pub mod state;

pub use engine::{ApplyOutcome, SyncEngine};
pub use state::{SyncEvent, SyncPhase};
