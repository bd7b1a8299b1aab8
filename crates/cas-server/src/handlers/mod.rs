//! HTTP request handlers.

pub(crate) mod assets;
pub(crate) mod cache;
pub(crate) mod health;
