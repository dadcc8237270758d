//! Cooperative cancellation for monitoring sessions.

mod token;

pub use token::CancellationToken;
