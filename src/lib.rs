//! Voxpop, a synthetic opinion panel service.
//!
//! Given a topic, a language model invents a small panel of demographic
//! personas; the panel's simulated opinions on the topic are then
//! solicited through a second model call. A small JSON HTTP API fronts
//! the pipeline: validation → sanitization → cache lookup → prompt
//! construction → model call → output parsing → cache write.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod logging;
pub mod panel;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod ratelimit;
pub mod routes;
pub mod sanitize;
pub mod server;
pub mod service;
pub mod validate;
