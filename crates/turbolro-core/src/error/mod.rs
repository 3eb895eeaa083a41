//! Error conversion helpers shared across TurboLRO crates.
//!
//! See [`error_boundary!`](crate::error_boundary).

mod boundary;
