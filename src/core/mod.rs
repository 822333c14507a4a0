pub mod friendship;
pub mod scheduler;
