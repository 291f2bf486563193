//! REST backend integration tests.
//!
//! Starts an axum mock of the hosted backend and drives it through
//! `RestBackend`.

#[cfg(feature = "http")]
mod mock;
#[cfg(feature = "http")]
mod transport;
