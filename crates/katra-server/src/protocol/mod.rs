//! Wire protocol: the shared envelope type plus one module per transport.

pub mod stdio;
pub mod tcp;
pub mod types;
pub mod unix;

/// Lines longer than this are rejected with `ERR_PARSE` on every transport.
pub const MAX_LINE_BYTES: usize = 32 * 1024;
