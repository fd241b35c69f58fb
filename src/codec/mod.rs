//! Encoder and decoder between typed [`Value`]s and the calling convention's
//! 32-byte-word head/tail layout.
//!
//! Static values are written inline into the head, dynamic values write
//! an offset into the head and their length-prefixed content into the tail.
//! Integers are big-endian and sign-extended, addresses occupy the low
//! 20 bytes of a word, fixed byte arrays the high bytes.
//!
//! Besides values, the module derives method selectors and event topics
//! from canonical signatures, encodes indexed event fields into topics
//! and decodes revert payloads.

mod decode;
mod encode;
mod log;
mod revert;
mod signature;
mod value;

pub use decode::{decode, decode_topic};
pub use encode::{encode, encode_call, encode_topic};
pub use log::{decode_log, encode_log};
pub use revert::{decode_revert, revert_message};
pub use signature::{selector, signature, topic0};
pub use value::{FromValue, Value};
