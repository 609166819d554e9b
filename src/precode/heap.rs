use tracing::{debug, warn};

use crate::{
    layout::{Address, BuildProfile},
    precode::PrecodeType,
    probe::{
        io,
        region::{self, FreeType, MemoryProtect, MemoryState},
    },
    Result,
};

/// Filler of unused code bytes, `int3`
const CODE_FILLER: u8 = 0xCC;

/// Interleaved code and data pages for stubs created by this crate.
///
/// Each allocation is a pair of stub code pages serving one stub kind. The code page is filled
/// with that kind's template once and then made execute-read, the data page stays writable and
/// holds the matching records at the same offsets. Stub code addresses its record `rip`-relative,
/// so a record sits exactly one page after its stub. Pages are only released when the heap is
/// dropped.
#[derive(Debug)]
pub struct PrecodeHeap {
    profile: &'static BuildProfile,
    pages: Vec<Address>,
    stub: Cursor,
    fixup: Cursor,
}

/// Next free slot on the current page of one kind
#[derive(Debug, Default, Clone, Copy)]
struct Cursor {
    page: Option<Address>,
    next: usize,
}

impl PrecodeHeap {
    /// Creates an empty heap, pages are allocated on first use
    #[must_use]
    pub fn new(profile: &'static BuildProfile) -> Self {
        PrecodeHeap {
            profile,
            pages: Vec::new(),
            stub: Cursor::default(),
            fixup: Cursor::default(),
        }
    }

    /// Number of stubs fitting on one code page
    #[must_use]
    pub fn slots_per_page(&self) -> usize {
        self.profile.stub_code_page_size() / self.profile.precode.code_size
    }

    /// Number of page pairs allocated so far
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Hands out a stub of `kind`, returning the stub's entry point.
    ///
    /// The code is already in place, the data record is zeroed and the caller initializes it.
    ///
    /// # Errors
    /// Returns [`crate::Error::Unsupported`] for kinds without a code template and
    /// [`crate::Error::Os`] if a new page pair cannot be allocated or protected.
    pub fn allocate(&mut self, kind: PrecodeType) -> Result<Address> {
        let code = template(self.profile, kind)?;
        let slots = self.slots_per_page();

        let cursor = *self.cursor(kind);
        let (page, index) = match cursor.page {
            Some(page) if cursor.next < slots => (page, cursor.next),
            _ => (self.grow(&code)?, 0),
        };
        *self.cursor(kind) = Cursor {
            page: Some(page),
            next: index + 1,
        };

        Ok(page.add(index * self.profile.precode.code_size))
    }

    fn cursor(&mut self, kind: PrecodeType) -> &mut Cursor {
        match kind {
            PrecodeType::Stub => &mut self.stub,
            _ => &mut self.fixup,
        }
    }

    fn grow(&mut self, code: &[u8]) -> Result<Address> {
        let page_size = self.profile.stub_code_page_size();

        let base = region::alloc(
            None,
            2 * page_size,
            MemoryState::RESERVE,
            MemoryProtect::NO_ACCESS,
        )?;
        let prepared = region::alloc(
            Some(base),
            2 * page_size,
            MemoryState::COMMIT,
            MemoryProtect::READ_WRITE,
        )
        .and_then(|_| {
            let mut page = Vec::with_capacity(page_size);
            for _ in 0..self.slots_per_page() {
                page.extend_from_slice(code);
            }
            page.resize(page_size, CODE_FILLER);
            unsafe { io::write_bytes(base, &page) };

            region::protect(base, page_size, MemoryProtect::EXECUTE_READ)
        });
        if let Err(error) = prepared {
            let _ = region::free(base, 2 * page_size, FreeType::Release);
            return Err(error);
        }

        debug!(%base, page_size, "allocated precode page pair");
        self.pages.push(base);
        Ok(base)
    }
}

impl Drop for PrecodeHeap {
    fn drop(&mut self) {
        let size = 2 * self.profile.stub_code_page_size();
        for page in self.pages.drain(..) {
            if let Err(error) = region::free(page, size, FreeType::Release) {
                warn!(%page, %error, "failed to release precode pages");
            }
        }
    }
}

/// Encodes the x64 code of a stub of `kind`
fn template(profile: &BuildProfile, kind: PrecodeType) -> Result<Vec<u8>> {
    let page = profile.stub_code_page_size();
    let mut code = Vec::with_capacity(profile.precode.code_size);

    // Displacement from the end of the instruction at `code.len()` to the data field at `field`
    let rip_relative = |code: &Vec<u8>, length: usize, field: usize| -> [u8; 4] {
        let displacement = (page + field) as i64 - (code.len() + length) as i64;
        (displacement as i32).to_le_bytes()
    };

    match kind {
        PrecodeType::Stub => {
            let layout = &profile.stub_precode;
            // mov r10, [rip + method_desc]
            let displacement = rip_relative(&code, 7, layout.method_desc.offset());
            code.extend_from_slice(&[0x4C, 0x8B, 0x15]);
            code.extend_from_slice(&displacement);
            // jmp [rip + target]
            let displacement = rip_relative(&code, 6, layout.target.offset());
            code.extend_from_slice(&[0xFF, 0x25]);
            code.extend_from_slice(&displacement);
        }
        PrecodeType::Fixup => {
            let layout = &profile.fixup_precode;
            // jmp [rip + target]
            let displacement = rip_relative(&code, 6, layout.target.offset());
            code.extend_from_slice(&[0xFF, 0x25]);
            code.extend_from_slice(&displacement);
            // fixup entry: mov r10, [rip + method_desc]
            let displacement = rip_relative(&code, 7, layout.method_desc.offset());
            code.extend_from_slice(&[0x4C, 0x8B, 0x15]);
            code.extend_from_slice(&displacement);
            // jmp [rip + precode_fixup_thunk]
            let displacement = rip_relative(&code, 6, layout.precode_fixup_thunk.offset());
            code.extend_from_slice(&[0xFF, 0x25]);
            code.extend_from_slice(&displacement);
        }
        _ => {
            return Err(unsupported_error!(
                "No code template for precode kind {:?}",
                kind
            ))
        }
    }

    code.resize(profile.precode.code_size, CODE_FILLER);
    Ok(code)
}
