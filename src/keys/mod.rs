//! Content-hash keys (CHKs) at the node level.
//!
//! A node-level CHK carries just enough information to route a request and
//! verify that a block is intact: a 32-byte routing key and the one-byte
//! cryptographic algorithm tag. It cannot decode the payload on its own.
//!
//! # Wire format
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────┐
//! │ type tag u16 │ routing key (32 bytes)           │
//! │ big-endian   │                                  │
//! └──────────────┴──────────────────────────────────┘
//!   0x0100 | algorithm
//! ```
//!
//! A bare 32-byte buffer is the routing key alone.

mod chk;

pub use chk::{
    recover_routing_key, routing_key_from_full_key, ContentKey, KeyDecodeAnomaly, KeyError,
    RoutingKey, ALGO_AES_CTR_256_SHA256, ALGO_AES_PCFB_256_SHA256, BASE_TYPE, BLOCK_SIZE,
    FULL_KEY_LENGTH, KEY_LENGTH,
};
