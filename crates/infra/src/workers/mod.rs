//! Background workers.

pub mod sync_trigger;

pub use sync_trigger::{SyncTrigger, TriggerHandle};
