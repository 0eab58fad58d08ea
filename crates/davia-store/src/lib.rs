//! Davia Store - persisted per-graph settings

pub mod state_map;

pub use state_map::{SqliteStateMap, StateMapStore, STATE_MAP_TABLE};
