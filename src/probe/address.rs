use std::fmt;

/// A raw address in the current process.
///
/// Addresses are plain integers, they carry no provenance and no lifetime. Every structure of the
/// hosted engine is reached by offsetting from an address, and every overlay is anchored at one.
/// Arithmetic wraps like the pointer arithmetic of the engine it mirrors.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Address(pub usize);

impl Address {
    /// The null address
    pub const NULL: Address = Address(0);

    /// Creates a new address from a raw integer value
    #[must_use]
    pub const fn new(value: usize) -> Self {
        Address(value)
    }

    /// Returns the raw address value
    #[must_use]
    pub const fn value(&self) -> usize {
        self.0
    }

    /// Returns true if this is the null address
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns `None` for the null address, `Some(self)` otherwise
    #[must_use]
    pub const fn non_null(self) -> Option<Self> {
        if self.0 == 0 {
            None
        } else {
            Some(self)
        }
    }

    /// Address `bytes` bytes after this one
    #[must_use]
    pub const fn add(self, bytes: usize) -> Self {
        Address(self.0.wrapping_add(bytes))
    }

    /// Address `bytes` bytes before this one
    #[must_use]
    pub const fn sub(self, bytes: usize) -> Self {
        Address(self.0.wrapping_sub(bytes))
    }

    /// Address displaced by a signed amount of bytes
    #[must_use]
    pub const fn offset(self, bytes: isize) -> Self {
        Address(self.0.wrapping_add_signed(bytes))
    }

    /// Returns true if the address is a multiple of `alignment` (a power of two)
    #[must_use]
    pub const fn is_aligned(&self, alignment: usize) -> bool {
        self.0 & (alignment - 1) == 0
    }

    /// The address as a typed raw pointer
    #[must_use]
    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    /// The address as a typed mutable raw pointer
    #[must_use]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Address(value)
    }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl<T> From<*const T> for Address {
    fn from(pointer: *const T) -> Self {
        Address(pointer as usize)
    }
}

impl<T> From<*mut T> for Address {
    fn from(pointer: *mut T) -> Self {
        Address(pointer as usize)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{:016x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_arithmetic() {
        let address = Address::new(0x1000);
        assert_eq!(address.add(0x18), Address(0x1018));
        assert_eq!(address.sub(0x8), Address(0x0FF8));
        assert_eq!(address.offset(-0x10), Address(0x0FF0));
        assert_eq!(address.offset(0x10), Address(0x1010));
    }

    #[test]
    fn test_address_null() {
        assert!(Address::NULL.is_null());
        assert_eq!(Address::NULL.non_null(), None);
        assert_eq!(Address(0x10).non_null(), Some(Address(0x10)));
    }

    #[test]
    fn test_address_alignment() {
        assert!(Address(0x4000).is_aligned(0x4000));
        assert!(Address(0x18).is_aligned(8));
        assert!(!Address(0x1C).is_aligned(8));
    }

    #[test]
    fn test_address_display() {
        assert_eq!(format!("{}", Address(0x7ff6_1234_0000)), "0x00007ff612340000");
        assert!(format!("{:?}", Address(0x10)).contains("0x0000000000000010"));
    }

    #[test]
    fn test_address_conversion() {
        let value = 0xDEAD_BEEF_usize;
        let address: Address = value.into();
        let back: usize = address.into();
        assert_eq!(back, value);

        let pointer = 0x2000 as *const u64;
        assert_eq!(Address::from(pointer), Address(0x2000));
        assert_eq!(Address(0x2000).as_ptr::<u64>(), pointer);
    }
}
