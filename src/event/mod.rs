//! Cross-thread callback delivery.

mod queue;

pub use queue::EventQueue;
