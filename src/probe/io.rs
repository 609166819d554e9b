//! Raw in-process memory reads and writes.
//!
//! This module is the unsafe core every overlay goes through. It provides unchecked, typed reads
//! and writes of plain values at arbitrary addresses of the current process, byte-range copies,
//! and the interlocked flag updates the hosted engine itself performs on its bit fields.
//!
//! # Key Components
//!
//! - [`crate::probe::io::RawIO`] - Marker trait for values that may be read from any bit pattern
//! - [`crate::probe::io::read`] / [`crate::probe::io::write`] - Typed access at an address
//! - [`crate::probe::io::read_bytes`] / [`crate::probe::io::write_bytes`] - Raw byte ranges
//! - [`crate::probe::io::copy`] - Overlap-tolerant memory copy
//! - [`crate::probe::io::fetch_or_u8`] / [`crate::probe::io::fetch_or_u16`] - Atomic flag updates
//!
//! # Usage Examples
//!
//! ```rust
//! use clrlive::probe::{io, Address};
//!
//! let mut slot = 0u64;
//! let address = Address::from(&mut slot as *mut u64);
//!
//! unsafe {
//!     io::write::<u64>(address, 0x1234);
//!     assert_eq!(io::read::<u64>(address), 0x1234);
//! }
//! ```
//!
//! # Safety
//!
//! Nothing here validates an address. Reading or writing memory that is not mapped, or that the
//! engine is concurrently rewriting without the caller holding the matching engine lock, is
//! undefined behavior rather than an error.

use std::{
    ffi::{c_char, CStr},
    ptr,
    sync::atomic::{AtomicU16, AtomicU8, AtomicUsize, Ordering},
};

use crate::probe::Address;

/// Trait for plain values that can be read from and written to raw memory.
///
/// Implementors must be valid for every bit pattern of their size, the engine's memory is read
/// without any validation.
///
/// # Safety
///
/// Implementing this trait for a type with invalid bit patterns (e.g. `bool`, references,
/// enums) makes [`read`] unsound.
pub unsafe trait RawIO: Copy + 'static {}

// Implement RawIO support for all plain integer types and the address newtype
macro_rules! impl_raw_io {
    ($($ty:ty),* $(,)?) => {
        $(
            unsafe impl RawIO for $ty {}
        )*
    };
}

impl_raw_io!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, Address);

/// Reads a value of type `T` at `address`.
///
/// The read does not require `address` to be aligned for `T`.
///
/// # Safety
///
/// `address..address + size_of::<T>()` must be mapped and readable.
#[must_use]
pub unsafe fn read<T: RawIO>(address: Address) -> T {
    unsafe { ptr::read_unaligned(address.as_ptr::<T>()) }
}

/// Writes `value` at `address`.
///
/// # Safety
///
/// `address..address + size_of::<T>()` must be mapped and writable, and no other party may
/// rely on the previous contents without synchronization.
pub unsafe fn write<T: RawIO>(address: Address, value: T) {
    unsafe { ptr::write_unaligned(address.as_mut_ptr::<T>(), value) }
}

/// Reads a pointer-sized value at `address` and returns it as an [`Address`].
///
/// # Safety
///
/// Same requirements as [`read`].
#[must_use]
pub unsafe fn read_ptr(address: Address) -> Address {
    unsafe { read::<Address>(address) }
}

/// Copies `len` bytes starting at `address` into a new buffer.
///
/// # Safety
///
/// `address..address + len` must be mapped and readable.
#[must_use]
pub unsafe fn read_bytes(address: Address, len: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; len];
    unsafe { ptr::copy(address.as_ptr::<u8>(), buffer.as_mut_ptr(), len) };
    buffer
}

/// Reads the NUL-terminated UTF-8 string at `address`, replacing invalid sequences.
///
/// # Safety
///
/// `address` must point at a readable, NUL-terminated byte string.
#[must_use]
pub unsafe fn read_c_str(address: Address) -> String {
    unsafe { CStr::from_ptr(address.as_ptr::<c_char>()) }
        .to_string_lossy()
        .into_owned()
}

/// Writes `data` starting at `address`.
///
/// # Safety
///
/// `address..address + data.len()` must be mapped and writable.
pub unsafe fn write_bytes(address: Address, data: &[u8]) {
    unsafe { ptr::copy(data.as_ptr(), address.as_mut_ptr::<u8>(), data.len()) };
}

/// Copies `len` bytes from `source` to `destination`, the ranges may overlap.
///
/// # Safety
///
/// Both ranges must be mapped, `source` readable and `destination` writable.
pub unsafe fn copy(destination: Address, source: Address, len: usize) {
    unsafe { ptr::copy(source.as_ptr::<u8>(), destination.as_mut_ptr::<u8>(), len) };
}

/// Atomically ORs `bits` into the 16-bit value at `address`, returning the previous value.
///
/// # Safety
///
/// `address` must be mapped, writable and aligned to 2 bytes.
pub unsafe fn fetch_or_u16(address: Address, bits: u16) -> u16 {
    unsafe { AtomicU16::from_ptr(address.as_mut_ptr::<u16>()) }.fetch_or(bits, Ordering::SeqCst)
}

/// Atomically ORs `bits` into the byte at `address`, returning the previous value.
///
/// # Safety
///
/// `address` must be mapped and writable.
pub unsafe fn fetch_or_u8(address: Address, bits: u8) -> u8 {
    unsafe { AtomicU8::from_ptr(address.as_mut_ptr::<u8>()) }.fetch_or(bits, Ordering::SeqCst)
}

/// Atomically replaces the pointer at `address` with `new` if it still equals `current`.
///
/// Returns the previous value, `Ok` if the exchange happened.
///
/// # Safety
///
/// `address` must be mapped, writable and pointer aligned.
pub unsafe fn compare_exchange_ptr(
    address: Address,
    current: Address,
    new: Address,
) -> std::result::Result<Address, Address> {
    unsafe { AtomicUsize::from_ptr(address.as_mut_ptr::<usize>()) }
        .compare_exchange(current.value(), new.value(), Ordering::SeqCst, Ordering::SeqCst)
        .map(Address)
        .map_err(Address)
}
