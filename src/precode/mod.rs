//! Precodes, the small call stubs standing in for methods without native code.
//!
//! Every stub is `code_size` bytes of code on an executable page, paired with a data record at the
//! same offset of the following page. The code starts with a discriminator byte identifying the
//! stub kind; the data holds the owning method descriptor and the current call target.
//!
//! # Key Components
//!
//! - [`Precode`] - A stub of any kind, decodes the discriminator and dispatches
//! - [`StubPrecode`] - The simple redirect stub
//! - [`FixupPrecode`] - The fixup-then-redirect stub used for temporary entry points
//! - [`PrecodeHeap`] - Page pairs for stubs created by this crate
//!
//! # Examples
//!
//! ```rust,no_run
//! use clrlive::{layout::Address, Engine};
//!
//! let engine = Engine::global()?;
//! let method = unsafe { engine.method_desc(Address(0x7ffd_1234_5678)) };
//! if method.has_precode() {
//!     let precode = method.precode()?;
//!     println!("{:?} -> {}", precode.precode_type()?, precode.target()?);
//! }
//! # Ok::<(), clrlive::Error>(())
//! ```

mod fixup;
mod heap;
mod stub;

pub use fixup::FixupPrecode;
pub use heap::PrecodeHeap;
pub use stub::StubPrecode;

use strum::{EnumCount, EnumIter};
use tracing::debug;

use crate::{
    layout::{Address, MethodDesc},
    Result,
};

/// Stub discriminators.
///
/// The code byte of a redirect stub is the first byte of its `mov` instruction, the effective
/// kind of such a stub is the type byte of its data record. Only [`PrecodeType::Stub`] and
/// [`PrecodeType::Fixup`] are supported.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount)]
#[repr(u8)]
pub enum PrecodeType {
    /// Simple redirect stub
    Stub = 0x4C,
    /// Fixup-then-redirect stub
    Fixup = 0xFF,
    /// Placeholder of a freed stub
    Invalid = 0xCC,
    /// Stub swapping the `this` pointer and the return buffer
    ThisPtrRetBuf = 0x90,
    /// Native import stub
    NDirectImport = 0x05,
}

impl PrecodeType {
    /// Decodes a discriminator byte
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        use strum::IntoEnumIterator;

        PrecodeType::iter().find(|kind| *kind as u8 == byte)
    }

    /// The kind can be decoded and re-initialized
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(self, PrecodeType::Stub | PrecodeType::Fixup)
    }
}

overlay! {
    /// A precode of any kind, addressed by its entry point
    Precode
}

impl<'e> Precode<'e> {
    /// The paired data record, one stub code page after the code
    #[must_use]
    pub fn data(&self) -> Address {
        self.address()
            .add(self.engine().profile().stub_code_page_size())
    }

    /// The discriminator byte at the start of the code
    #[must_use]
    pub fn code_byte(&self) -> u8 {
        read_field!(self, precode.type_byte)
    }

    /// The stub kind
    ///
    /// # Errors
    /// Returns [`crate::Error::Unsupported`] for unknown discriminators and for kinds this crate
    /// cannot handle.
    pub fn precode_type(&self) -> Result<PrecodeType> {
        let mut byte = self.code_byte();
        if byte == PrecodeType::Stub as u8 {
            byte = self.as_stub().type_byte();
        }

        match PrecodeType::from_byte(byte) {
            Some(kind) if kind.is_supported() => Ok(kind),
            Some(kind) => Err(unsupported_error!(
                "Precode at {} has unsupported kind {:?}",
                self.address(),
                kind
            )),
            None => Err(unsupported_error!(
                "Precode at {} has unknown discriminator 0x{:02x}",
                self.address(),
                byte
            )),
        }
    }

    /// Views the stub as a simple redirect stub, without checking its kind
    #[must_use]
    pub fn as_stub(&self) -> StubPrecode<'e> {
        unsafe { StubPrecode::new(self.engine(), self.address()) }
    }

    /// Views the stub as a fixup stub, without checking its kind
    #[must_use]
    pub fn as_fixup(&self) -> FixupPrecode<'e> {
        unsafe { FixupPrecode::new(self.engine(), self.address()) }
    }

    /// The owning method descriptor, `None` if the data record holds none
    ///
    /// # Errors
    /// Returns any error of [`Precode::precode_type`].
    pub fn method_desc(&self) -> Result<Option<MethodDesc<'e>>> {
        Ok(match self.precode_type()? {
            PrecodeType::Fixup => self.as_fixup().method_desc(),
            _ => self.as_stub().method_desc(),
        })
    }

    /// The current call target
    ///
    /// # Errors
    /// Returns any error of [`Precode::precode_type`].
    pub fn target(&self) -> Result<Address> {
        Ok(match self.precode_type()? {
            PrecodeType::Fixup => self.as_fixup().target(),
            _ => self.as_stub().target(),
        })
    }

    /// Initializes the data record for a stub of `kind`
    ///
    /// # Errors
    /// Returns [`crate::Error::Unsupported`] for kinds that cannot be initialized.
    pub fn init(
        &self,
        kind: PrecodeType,
        method_desc: MethodDesc<'_>,
        allocator: Address,
        target: Option<Address>,
    ) -> Result<()> {
        match kind {
            PrecodeType::Stub => self.as_stub().init(method_desc, allocator, target),
            PrecodeType::Fixup => self.as_fixup().init(method_desc, allocator, target),
            _ => {
                return Err(unsupported_error!(
                    "Cannot initialize precode of kind {:?}",
                    kind
                ))
            }
        }

        Ok(())
    }

    /// Re-initializes the stub in place so it routes to the pre-compilation thunk again
    ///
    /// # Errors
    /// Returns [`crate::Error::Unsupported`] for unsupported kinds and
    /// [`crate::Error::Precondition`] if the stub has no owning descriptor.
    pub fn reset(&self) -> Result<()> {
        let kind = self.precode_type()?;
        let Some(method_desc) = self.method_desc()? else {
            return Err(precondition_error!(
                "Precode at {} has no method descriptor",
                self.address()
            ));
        };

        debug!(precode = %self.address(), ?kind, method_desc = %method_desc.address(), "resetting precode");
        self.init(kind, method_desc, method_desc.loader_allocator(), None)?;

        // Redirect stubs only take a target from init when an allocator exists
        if matches!(kind, PrecodeType::Stub) {
            self.as_stub().set_target(self.engine().pre_stub());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        test::{offsets, Fixture, MethodShape},
        Error,
    };

    #[test]
    fn discriminators() {
        for kind in PrecodeType::iter() {
            assert_eq!(PrecodeType::from_byte(kind as u8), Some(kind));
        }
        assert_eq!(PrecodeType::from_byte(0x00), None);
        assert!(PrecodeType::Fixup.is_supported());
        assert!(!PrecodeType::NDirectImport.is_supported());
    }

    #[test]
    fn stub_kind_defers_to_data() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        let precode = fixture.stub_precode(0, method, Address(0x1234));

        assert_eq!(precode.code_byte(), 0x4C);
        assert_eq!(precode.precode_type().unwrap(), PrecodeType::Stub);

        // A native import stub shares the redirect stub's code
        fixture
            .memory()
            .write::<u8>(offsets::PRECODE + offsets::STUB_CODE_PAGE + 0x10, 0x05);
        assert!(matches!(precode.precode_type(), Err(Error::Unsupported { .. })));
    }

    #[test]
    fn unknown_discriminators() {
        let fixture = Fixture::new();
        let precode = fixture.precode(0);

        fixture.memory().write::<u8>(offsets::PRECODE, 0xCC);
        assert!(matches!(precode.precode_type(), Err(Error::Unsupported { .. })));
        assert!(matches!(precode.target(), Err(Error::Unsupported { .. })));

        fixture.memory().write::<u8>(offsets::PRECODE, 0x12);
        assert!(matches!(precode.precode_type(), Err(Error::Unsupported { .. })));
        assert!(matches!(precode.reset(), Err(Error::Unsupported { .. })));
    }

    #[test]
    fn fixup_reset_restores_pre_stub_route() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        let precode = fixture.fixup_precode(0, method, Address(0xDEAD_0000));

        assert_eq!(precode.target().unwrap(), Address(0xDEAD_0000));
        precode.reset().unwrap();

        assert_eq!(precode.target().unwrap(), precode.address().add(6));
        assert_eq!(precode.method_desc().unwrap(), Some(method));
        assert_eq!(precode.as_fixup().precode_fixup_thunk(), fixture.engine().pre_stub());
    }

    #[test]
    fn stub_reset_targets_pre_stub() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        let precode = fixture.stub_precode(0, method, Address(0xDEAD_0000));

        precode.reset().unwrap();
        assert_eq!(precode.target().unwrap(), fixture.engine().pre_stub());
        assert_eq!(precode.precode_type().unwrap(), PrecodeType::Stub);
    }

    #[test]
    fn stub_reset_without_loader_allocator() {
        let fixture = Fixture::new();
        fixture.memory().write(offsets::MODULE + 0x98, Address::NULL);
        let method = fixture.add_method(MethodShape::default());
        let precode = fixture.stub_precode(0, method, Address(0x7FF0_0000_1000));
        assert!(method.loader_allocator().is_null());

        precode.reset().unwrap();
        assert_eq!(precode.target().unwrap(), fixture.engine().pre_stub());
        assert_eq!(precode.method_desc().unwrap(), Some(method));
    }

    #[test]
    fn reset_without_descriptor() {
        let fixture = Fixture::new();
        let precode = fixture.precode(0);
        fixture.memory().write::<u8>(offsets::PRECODE, 0xFF);

        assert!(matches!(precode.reset(), Err(Error::Precondition { .. })));
    }

    #[test]
    fn init_rejects_unsupported_kinds() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        let precode = fixture.precode(0);

        assert!(matches!(
            precode.init(PrecodeType::ThisPtrRetBuf, method, Address::NULL, None),
            Err(Error::Unsupported { .. })
        ));
    }
}
