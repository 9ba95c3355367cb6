pub mod future;
pub mod geometry;
pub mod queue;
pub mod time;
