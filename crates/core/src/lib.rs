//! Core data plane for the relaytun tunnel: the stream cipher, the
//! cipher+compression codec, the IPv4/TCP/UDP packet editor, and the
//! two-level NAT table (with its backing LRU).
//!
//! Everything in this crate is synchronous and allocation-light on the hot
//! path; the event loops and OS adapters that drive it live in
//! `relaytun-client` and `relaytun-relay`.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod lru;
pub mod nat;
pub mod packet;

pub use cipher::Cipher;
pub use codec::Codec;
pub use error::{CodecError, NatError};
pub use lru::Lru;
pub use nat::NatTable;
pub use packet::{hex_dump, IpPacket, Transport};
