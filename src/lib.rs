//! `rstunpack` — finds files that a VGA Planets host embedded in a player's
//! turn data, decides which of them are safe to write, and saves them.
//!
//! This crate provides the core library: readers for result and util-data
//! files, the attachment store, and the unpacking policy.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod store;
pub mod unpack;
