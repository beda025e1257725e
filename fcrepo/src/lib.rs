#![doc = include_str!("../README.md")]
#![warn(
    unreachable_pub,
    missing_debug_implementations,
    missing_docs,
    clippy::pedantic
)]

pub mod acl;
pub mod api;
pub mod auth;
pub mod collection;
pub mod content;
pub mod errors;
mod fs;
pub(crate) mod jsonld;
pub mod location;
pub mod path;
pub mod session;
pub mod sparql;
pub mod tree;
pub mod turtle;

pub(crate) type Result<T> = core::result::Result<T, errors::Error>;

pub use errors::Error;
pub use fs::*;
