//! Route handlers

pub mod condition;
pub mod events;
pub mod interaction;
pub mod stream;
