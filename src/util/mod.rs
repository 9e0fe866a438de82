//! Internal containers backing the await graph.

pub mod arena;
pub mod list;

pub use arena::{Arena, ArenaIndex};
pub use list::SmallList;
