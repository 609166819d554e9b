//! Method implementation attributes as stored in the `MethodDef` table.

use bitflags::bitflags;

/// Bitmask for `CODE_TYPE` extraction
pub const METHOD_IMPL_CODE_TYPE_MASK: u16 = 0x0003;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Method implementation attributes, `ImplFlags` of a `MethodDef` row
    pub struct CorMethodImpl: u16 {
        /// Method impl is IL
        const IL = 0x0000;
        /// Method impl is native
        const NATIVE = 0x0001;
        /// Method impl is OPTIL
        const OPTIL = 0x0002;
        /// Method impl is provided by the runtime
        const RUNTIME = 0x0003;
        /// Method impl is unmanaged, otherwise managed
        const UNMANAGED = 0x0004;
        /// Method may not be inlined
        const NO_INLINING = 0x0008;
        /// Indicates method is defined; used primarily in merge scenarios
        const FORWARD_REF = 0x0010;
        /// Method is single threaded through the body
        const SYNCHRONIZED = 0x0020;
        /// Method is never optimized by the JIT
        const NO_OPTIMIZATION = 0x0040;
        /// Indicates method sig is not to be mangled to do `HRESULT` conversion
        const PRESERVE_SIG = 0x0080;
        /// Method should be inlined if possible
        const AGGRESSIVE_INLINING = 0x0100;
        /// Method is compiled fully optimized, bypassing tiering
        const AGGRESSIVE_OPTIMIZATION = 0x0200;
        /// Reserved for internal use
        const INTERNAL_CALL = 0x1000;
    }
}

impl CorMethodImpl {
    /// The code type bits
    #[must_use]
    pub fn code_type(self) -> CorMethodImpl {
        CorMethodImpl::from_bits_retain(self.bits() & METHOD_IMPL_CODE_TYPE_MASK)
    }

    /// Requests a fixed optimization level
    #[must_use]
    pub fn requests_optimization_level(self) -> bool {
        self.intersects(CorMethodImpl::NO_OPTIMIZATION | CorMethodImpl::AGGRESSIVE_OPTIMIZATION)
    }
}
