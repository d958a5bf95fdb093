//! taxibot - driver bot and operator CLI on top of `dispatchcore`.

pub mod cli;
pub mod telegram;
