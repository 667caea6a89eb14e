//! Low-level primitives shared by the key and row codecs.

/// Byte-level utilities and encoding/decoding.
///
/// Order-preserving fixed-width encoders plus the varint helpers used by the
/// base-record row format.
pub mod bytes;
