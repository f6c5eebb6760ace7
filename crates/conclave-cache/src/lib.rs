pub mod debate;

pub use debate::{CachedDebate, DebateCache};
