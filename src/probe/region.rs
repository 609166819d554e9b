//! Virtual memory allocation through the host OS.
//!
//! A thin wrapper over the platform's reserve/commit/decommit/release primitives, expressed with
//! the Win32 vocabulary the engine itself uses. On Unix the states and protections are mapped to
//! `mmap`, `mprotect`, `madvise` and `munmap`. There are no retries, failures are returned as
//! [`crate::Error::Os`] carrying the OS error.

use bitflags::bitflags;
use tracing::trace;

use crate::{probe::Address, Result};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Allocation state requested from [`alloc`]
    pub struct MemoryState: u32 {
        /// Back the range with memory
        const COMMIT = 0x1000;
        /// Reserve address space without backing it
        const RESERVE = 0x2000;
        /// The range is free (query only, not valid for allocation)
        const FREE = 0x10000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Page protection of an allocated range
    pub struct MemoryProtect: u32 {
        /// No access
        const NO_ACCESS = 0x001;
        /// Read only
        const READ_ONLY = 0x002;
        /// Read and write
        const READ_WRITE = 0x004;
        /// Copy on write
        const WRITE_COPY = 0x008;
        /// Execute only
        const EXECUTE = 0x010;
        /// Execute and read
        const EXECUTE_READ = 0x020;
        /// Execute, read and write
        const EXECUTE_READ_WRITE = 0x040;
        /// Execute and copy on write
        const EXECUTE_WRITE_COPY = 0x080;
        /// Guard page modifier
        const GUARD = 0x100;
        /// Non-cached modifier
        const NO_CACHE = 0x200;
    }
}

/// How [`free`] gives a range back to the OS
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum FreeType {
    /// Drop the backing memory but keep the reservation
    Decommit = 0x4000,
    /// Release the whole reservation
    Release = 0x8000,
}

/// Allocates or commits a range of virtual memory.
///
/// ## Arguments
/// * 'address' - Requested address, `None` lets the OS choose. Required when only committing
/// * 'size'    - Size of the range in bytes
/// * 'state'   - [`MemoryState::RESERVE`], [`MemoryState::COMMIT`] or both
/// * 'protect' - Page protection of the committed range
///
/// # Errors
/// Returns [`crate::Error::Os`] if the OS rejects the request, or a precondition error for
/// requests that cannot be expressed (no state, committing without an address on Unix).
pub fn alloc(
    address: Option<Address>,
    size: usize,
    state: MemoryState,
    protect: MemoryProtect,
) -> Result<Address> {
    if size == 0 || !state.intersects(MemoryState::COMMIT | MemoryState::RESERVE) {
        return Err(precondition_error!(
            "Invalid allocation request - size {}, state {:?}",
            size,
            state
        ));
    }

    let allocated = alloc_impl(address, size, state, protect)?;
    trace!(address = %allocated, size, ?state, ?protect, "allocated region");
    Ok(allocated)
}

/// Decommits or releases a range previously returned by [`alloc`].
///
/// # Errors
/// Returns [`crate::Error::Os`] if the OS rejects the request.
pub fn free(address: Address, size: usize, free_type: FreeType) -> Result<()> {
    if address.is_null() {
        return Ok(());
    }

    free_impl(address, size, free_type)?;
    trace!(%address, size, ?free_type, "freed region");
    Ok(())
}

/// Changes the protection of a committed range.
///
/// # Errors
/// Returns [`crate::Error::Os`] if the OS rejects the request.
pub fn protect(address: Address, size: usize, protect: MemoryProtect) -> Result<()> {
    if address.is_null() || size == 0 {
        return Err(precondition_error!(
            "Invalid protection request - address {}, size {}",
            address,
            size
        ));
    }

    protect_impl(address, size, protect)?;
    trace!(%address, size, ?protect, "protected region");
    Ok(())
}

#[cfg(windows)]
fn alloc_impl(
    address: Option<Address>,
    size: usize,
    state: MemoryState,
    protect: MemoryProtect,
) -> Result<Address> {
    use windows_sys::Win32::System::Memory::VirtualAlloc;

    let requested = address.map_or(std::ptr::null(), |a| a.as_ptr::<core::ffi::c_void>());
    let allocated = unsafe { VirtualAlloc(requested, size, state.bits(), protect.bits()) };
    if allocated.is_null() {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(Address::from(allocated))
}

#[cfg(windows)]
fn free_impl(address: Address, size: usize, free_type: FreeType) -> Result<()> {
    use windows_sys::Win32::System::Memory::VirtualFree;

    // MEM_RELEASE requires a size of zero
    let size = match free_type {
        FreeType::Release => 0,
        FreeType::Decommit => size,
    };

    let ok = unsafe { VirtualFree(address.as_mut_ptr(), size, free_type as u32) };
    if ok == 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(windows)]
fn protect_impl(address: Address, size: usize, protect: MemoryProtect) -> Result<()> {
    use windows_sys::Win32::System::Memory::VirtualProtect;

    let mut previous = 0u32;
    let ok = unsafe { VirtualProtect(address.as_mut_ptr(), size, protect.bits(), &mut previous) };
    if ok == 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(unix)]
fn unix_protection(protect: MemoryProtect) -> libc::c_int {
    let mut prot = libc::PROT_NONE;
    if protect.intersects(
        MemoryProtect::READ_ONLY
            | MemoryProtect::READ_WRITE
            | MemoryProtect::WRITE_COPY
            | MemoryProtect::EXECUTE_READ
            | MemoryProtect::EXECUTE_READ_WRITE
            | MemoryProtect::EXECUTE_WRITE_COPY,
    ) {
        prot |= libc::PROT_READ;
    }
    if protect.intersects(
        MemoryProtect::READ_WRITE
            | MemoryProtect::WRITE_COPY
            | MemoryProtect::EXECUTE_READ_WRITE
            | MemoryProtect::EXECUTE_WRITE_COPY,
    ) {
        prot |= libc::PROT_WRITE;
    }
    if protect.intersects(
        MemoryProtect::EXECUTE
            | MemoryProtect::EXECUTE_READ
            | MemoryProtect::EXECUTE_READ_WRITE
            | MemoryProtect::EXECUTE_WRITE_COPY,
    ) {
        prot |= libc::PROT_EXEC;
    }
    prot
}

#[cfg(unix)]
fn alloc_impl(
    address: Option<Address>,
    size: usize,
    state: MemoryState,
    protect: MemoryProtect,
) -> Result<Address> {
    let prot = if state.contains(MemoryState::COMMIT) {
        unix_protection(protect)
    } else {
        libc::PROT_NONE
    };

    if state.contains(MemoryState::RESERVE) {
        let hint = address.map_or(std::ptr::null_mut(), |a| a.as_mut_ptr::<libc::c_void>());
        let mapped = unsafe {
            libc::mmap(
                hint,
                size,
                prot,
                libc::MAP_ANON | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };
        if mapped == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error().into());
        }
        return Ok(Address::from(mapped));
    }

    // Commit of an existing reservation
    let Some(address) = address else {
        return Err(precondition_error!(
            "Committing memory requires the address of a reservation"
        ));
    };

    let rc = unsafe { libc::mprotect(address.as_mut_ptr(), size, prot) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(address)
}

#[cfg(unix)]
fn free_impl(address: Address, size: usize, free_type: FreeType) -> Result<()> {
    match free_type {
        FreeType::Release => {
            let rc = unsafe { libc::munmap(address.as_mut_ptr(), size) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }
        FreeType::Decommit => {
            let rc = unsafe { libc::madvise(address.as_mut_ptr(), size, libc::MADV_DONTNEED) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
            let rc = unsafe { libc::mprotect(address.as_mut_ptr(), size, libc::PROT_NONE) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn protect_impl(address: Address, size: usize, protect: MemoryProtect) -> Result<()> {
    let rc = unsafe { libc::mprotect(address.as_mut_ptr(), size, unix_protection(protect)) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn alloc_impl(
    _address: Option<Address>,
    _size: usize,
    _state: MemoryState,
    _protect: MemoryProtect,
) -> Result<Address> {
    Err(unsupported_error!(
        "Virtual memory allocation is not implemented for this platform"
    ))
}

#[cfg(not(any(unix, windows)))]
fn free_impl(_address: Address, _size: usize, _free_type: FreeType) -> Result<()> {
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn protect_impl(_address: Address, _size: usize, _protect: MemoryProtect) -> Result<()> {
    Err(unsupported_error!(
        "Page protection is not implemented for this platform"
    ))
}
