pub mod classify;
pub mod config;
pub mod connection;
pub mod decode;
pub mod error;
pub mod lifecycle;
pub mod log_entry;
pub mod pipeline;
pub mod router;
pub mod session;
pub mod signals;
pub mod sink;
pub mod test_utils;
