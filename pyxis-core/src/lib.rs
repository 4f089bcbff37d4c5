//! Pyxis Core
//!
//! Core library for an infrastructure management tool that maps declarative
//! resource definitions onto control-plane API calls. Providers implement the
//! [`provider::Provider`] trait; asynchronous state transitions are observed
//! with the [`waiter`] module.

pub mod provider;
pub mod resource;
pub mod schema;
pub mod waiter;
