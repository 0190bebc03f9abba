//! `cachetx` - transaction configuration resolver for clustered caches
//!
//! Turns the declarative transaction attributes of a cache (mode, locking,
//! stop timeout) into a concrete configuration, deciding which transaction
//! services the cache needs from its environment and failing early when a
//! mandatory one is missing.

pub mod cli;
pub mod config;
pub mod container;
pub mod environment;
pub mod error;
pub mod observability;
pub mod resolver;
