//! Routing with automatic fallback
//!
//! The dispatcher tries providers in the order the registry ranks them and
//! moves on when a provider fails with a retryable error.

pub mod dispatcher;

pub use dispatcher::{
    DispatchAttempt, DispatchConfig, DispatchError, Dispatcher, PermanentErrorPolicy,
};
