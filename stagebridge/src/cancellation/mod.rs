//! Cooperative cancellation used to interrupt in-flight worker calls.

mod token;

pub use token::CancellationToken;
