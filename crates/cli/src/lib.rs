//! # fastpath-cli
//!
//! Shared pieces of the `fastpath` binary.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

pub mod handler;
pub mod opts;
pub mod utils;
