//! Game state as the sync core sees it: authoritative snapshots, the actions a
//! player can submit, and the ledger of actions still in flight.

pub mod action;
pub mod pending;
pub mod roster;
pub mod snapshot;

pub use action::{project, ActionType, GameAction, ProjectionConflict};
pub use pending::{ActionId, PendingAction, PendingOrigin};
pub use roster::Roster;
pub use snapshot::{CardId, GamePhase, GameSnapshot, GameStatus, Suit};
