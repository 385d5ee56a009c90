//! Remote address validation
//!
//! Foreign addresses are opaque `u64` values. Anything outside the plausible
//! user-space window is rejected before it reaches the transport.

use crate::error::{ReadError, Result};

/// Lowest address treated as a real allocation (first 64K is never mapped)
pub const MIN_VALID_ADDRESS: u64 = 0x10000;

/// Upper bound of canonical x86-64 user space
pub const MAX_VALID_ADDRESS: u64 = 0x8000_0000_0000;

/// Check whether an address is plausible user-space memory
#[inline]
pub fn is_valid(address: u64) -> bool {
    (MIN_VALID_ADDRESS..MAX_VALID_ADDRESS).contains(&address)
}

/// Validate an address, returning an access error describing why it failed
pub fn ensure_valid(address: u64) -> Result<u64> {
    if address == 0 {
        return Err(ReadError::access(address, "null pointer"));
    }
    if !is_valid(address) {
        return Err(ReadError::access(address, "outside user-space range"));
    }
    Ok(address)
}

/// Validate a span: both ends must stay inside the user-space window
pub fn ensure_valid_span(address: u64, len: usize) -> Result<u64> {
    ensure_valid(address)?;
    let end = address
        .checked_add(len as u64)
        .ok_or_else(|| ReadError::access(address, "span overflows address space"))?;
    if end > MAX_VALID_ADDRESS {
        return Err(ReadError::access(address, "span crosses user-space limit"));
    }
    Ok(address)
}
