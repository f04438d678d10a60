//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): resolution error codes and taxonomy
//! - [`ResolutionAttempts`](attempt::ResolutionAttempts): last-attempt diagnostics

pub mod attempt;
pub mod context;
pub mod neterror;
