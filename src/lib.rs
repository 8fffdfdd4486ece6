pub mod bytes;
pub mod commands;
pub mod error;
pub mod networking;
pub mod protocol;
pub mod relay_utils;
pub mod utils;

pub use error::RelayError;

pub const SHARE_CODE_LEN: usize = 8;
pub const SHARE_CODE_ALPHABET: &[u8] = b"1234567890qwertyuiopasdfghjklzxcvbnmQWERTYUIOPASDFGHJKLZXCVBNM";
pub const CHUNK_SIZE: usize = 64 * 1024;

pub const DEFAULT_PORT: u16 = 3030;
pub const RELAY_ADDR: &str = "127.0.0.1:3030";
