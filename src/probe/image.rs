//! Resolution of the hosted engine's loaded image.
//!
//! The engine image anchors every fixed-offset computation: the pre-stub, the global app domain
//! pointer and the engine-internal helpers all live at build-specific offsets from its base.
//! Resolution is a black box to the rest of the crate, it only ever sees an [`EngineImage`].

use tracing::debug;

use crate::{probe::Address, Error, Result};

/// Base address and size of the engine's loaded binary.
///
/// Immutable once resolved, the image cannot move while the engine is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineImage {
    /// Address the image was loaded at
    pub base: Address,
    /// Size of the mapped image in bytes
    pub size: usize,
}

impl EngineImage {
    /// Creates a new image description
    ///
    /// ## Arguments
    /// * 'base' - Address the image was loaded at
    /// * 'size' - Size of the mapped image in bytes
    #[must_use]
    pub fn new(base: Address, size: usize) -> Self {
        EngineImage { base, size }
    }

    /// Address at `offset` bytes into the image
    #[must_use]
    pub fn at(&self, offset: usize) -> Address {
        self.base.add(offset)
    }

    /// Returns true if `address` falls inside the mapped image
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        address >= self.base && address.value() - self.base.value() < self.size
    }
}

/// File name of the engine image on the current platform
#[must_use]
pub fn default_image_name() -> &'static str {
    if cfg!(windows) {
        "coreclr.dll"
    } else if cfg!(target_os = "macos") {
        "libcoreclr.dylib"
    } else {
        "libcoreclr.so"
    }
}

/// Locates the loaded image named `name` in the current process.
///
/// ## Arguments
/// * 'name' - File name of the image, e.g. `coreclr.dll`
///
/// # Errors
/// Returns [`Error::ImageNotFound`] if no image with that name is loaded, or a header parsing
/// error if the image headers cannot be read.
pub fn resolve_image(name: &str) -> Result<EngineImage> {
    let image = resolve_image_impl(name)?;
    debug!(name, base = %image.base, size = image.size, "resolved engine image");
    Ok(image)
}

#[cfg(windows)]
fn resolve_image_impl(name: &str) -> Result<EngineImage> {
    use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;

    let wide = widestring::U16CString::from_str(name)
        .map_err(|_| Error::ImageNotFound(name.to_string()))?;

    let module = unsafe { GetModuleHandleW(wide.as_ptr()) };
    if module.is_null() {
        return Err(Error::ImageNotFound(name.to_string()));
    }

    let base = Address::from(module as *const u8);
    let size = unsafe { pe_image_size(base) }?;

    Ok(EngineImage { base, size })
}

/// Reads `SizeOfImage` from the PE headers mapped at `base`.
#[cfg(windows)]
unsafe fn pe_image_size(base: Address) -> Result<usize> {
    use crate::probe::io::{read, read_bytes};

    // e_lfanew, then signature, COFF header and a PE32+ optional header
    let pe_offset = unsafe { read::<u32>(base.add(0x3C)) } as usize;
    let headers = unsafe { read_bytes(base, pe_offset + 4 + 20 + 240) };

    let header = goblin::pe::header::Header::parse(&headers)?;
    match header.optional_header {
        Some(optional) => Ok(optional.windows_fields.size_of_image as usize),
        None => Err(unsupported_error!(
            "Engine image at {} has no optional header",
            base
        )),
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn resolve_image_impl(name: &str) -> Result<EngineImage> {
    use std::ffi::CStr;

    struct Search<'a> {
        name: &'a str,
        found: Option<EngineImage>,
    }

    unsafe extern "C" fn visit(
        info: *mut libc::dl_phdr_info,
        _size: libc::size_t,
        data: *mut libc::c_void,
    ) -> libc::c_int {
        let search = unsafe { &mut *data.cast::<Search>() };
        let info = unsafe { &*info };
        if info.dlpi_name.is_null() || info.dlpi_phdr.is_null() {
            return 0;
        }

        let path = unsafe { CStr::from_ptr(info.dlpi_name) }.to_string_lossy();
        let file_name = path.rsplit('/').next().unwrap_or_default();
        if file_name != search.name {
            return 0;
        }

        let headers =
            unsafe { std::slice::from_raw_parts(info.dlpi_phdr, usize::from(info.dlpi_phnum)) };

        let mut low = usize::MAX;
        let mut high = 0usize;
        for header in headers.iter().filter(|h| h.p_type == libc::PT_LOAD) {
            low = low.min(header.p_vaddr as usize);
            high = high.max((header.p_vaddr + header.p_memsz) as usize);
        }

        if low >= high {
            return 0;
        }

        search.found = Some(EngineImage {
            base: Address(info.dlpi_addr as usize + low),
            size: high - low,
        });
        1
    }

    let mut search = Search { name, found: None };
    unsafe {
        libc::dl_iterate_phdr(Some(visit), (&mut search as *mut Search).cast());
    }

    search
        .found
        .ok_or_else(|| Error::ImageNotFound(name.to_string()))
}

#[cfg(not(any(windows, target_os = "linux", target_os = "android")))]
fn resolve_image_impl(name: &str) -> Result<EngineImage> {
    tracing::warn!(name, "engine image resolution is not implemented for this platform");
    Err(Error::ImageNotFound(name.to_string()))
}
