//! HTTP layer over the federation core.

pub mod inbox;
