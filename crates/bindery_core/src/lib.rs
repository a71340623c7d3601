//! Bindery core: job model, page ordering, and the pure scheduler state machine.
mod effect;
mod job;
mod msg;
mod order;
mod state;
mod update;
mod validate;
mod view_model;

pub use effect::Effect;
pub use job::{CoverSet, JobDescription, JobId, OutputKind, PageItem, QualityProfile};
pub use msg::{JobOutcome, Msg};
pub use order::{order, order_job, EntrySlot, OrderedEntry};
pub use state::{JobPhase, QueueState, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_CONCURRENT};
pub use update::update;
pub use validate::{validate_job, ValidationError};
pub use view_model::QueueSnapshot;
