//! Playback of recorded interactions

mod list;

pub use list::{InteractionList, InteractionLookup, NullList};
