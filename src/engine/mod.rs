//! The domain engine: sticky calendar reconciliation, the current-event
//! state machine, and weekly statistics aggregation (spec §4.3-4.5). Every
//! function here is generic over `S: Stores` and knows nothing about which
//! backend it's talking to.

pub mod lifecycle;
pub mod stats;
pub mod sticky;
