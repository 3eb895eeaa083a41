//! Continuation-token codec.
//!
//! A continuation token is an opaque string from which a poller can be
//! rebuilt later, possibly in another process. Strategies decide *what* goes
//! into a token; this module decides *how* it is written down.
//!
//! # Format
//!
//! ```text
//! base64(STANDARD, {"v": 1, "kind": "<strategy kind>", "payload": <strategy state>})
//! ```
//!
//! The `kind` tag lets a strategy reject tokens minted by a different
//! strategy instead of misreading them.

mod codec;

pub use codec::{CodecError, TOKEN_VERSION, TokenHeader, TokenPayload, inspect};
