//! Inventory ledger domain.
//!
//! Business rules for the two-epoch stock ledger, implemented as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod ledger;
pub mod movement;
pub mod watermark;
pub mod window;

pub use item::Item;
pub use ledger::{Balance, LedgerRow, SameDayTotalPolicy, SyncPass, Transition};
pub use movement::{EffectiveDay, MovementEvent, parse_feed_date};
pub use watermark::Watermark;
pub use window::DayCursor;
