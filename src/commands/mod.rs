//! # Commands Module
//!
//! The three entry points behind the `bullet` binary:
//!
//! ## `send`
//! Shares a local file through the relay:
//! - Registers the file's name and size under a share code
//!   (custom, or generated by the relay)
//! - Waits until a receiver is ready, then streams the raw bytes
//!
//! ## `receive`
//! Fetches a file by share code:
//! - Looks the code up and shows the file's name and size
//! - Writes the streamed bytes to a file or to stdout
//!
//! ## `relay`
//! Runs the relay server:
//! - Accepts senders and receivers on one port
//! - Pairs them by share code and copies the file across without storing it

pub mod receive;
pub mod relay;
pub mod send;
