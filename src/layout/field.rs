use std::{fmt, marker::PhantomData, mem::size_of};

use crate::probe::{
    io::{self, RawIO},
    Address,
};

/// Descriptor of a single field inside an engine structure.
///
/// A field is an offset relative to the structure's base plus a value type, the width is the size
/// of that type. Descriptors are declared once in a [`crate::layout::BuildProfile`] and carry no
/// address of their own.
pub struct Field<T> {
    offset: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RawIO> Field<T> {
    /// Creates a field descriptor at `offset`
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Field {
            offset,
            _marker: PhantomData,
        }
    }

    /// Offset of the field relative to the structure base
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Width of the field in bytes
    #[must_use]
    pub const fn width(&self) -> usize {
        size_of::<T>()
    }

    /// Offset of the first byte after the field
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + size_of::<T>()
    }

    /// Address of the field inside the structure at `base`
    #[must_use]
    pub fn address(&self, base: Address) -> Address {
        base.add(self.offset)
    }

    /// Reads the field of the structure at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point at a live structure containing this field.
    #[must_use]
    pub unsafe fn read(&self, base: Address) -> T {
        unsafe { io::read::<T>(self.address(base)) }
    }

    /// Writes the field of the structure at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point at a live, writable structure containing this field.
    pub unsafe fn write(&self, base: Address, value: T) {
        unsafe { io::write::<T>(self.address(base), value) }
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field<{}>(+0x{:x})",
            std::any::type_name::<T>(),
            self.offset
        )
    }
}

/// Descriptor of an inline array of equally spaced fields.
///
/// Used for the per-table arrays of the metadata model, the inline token storage of enumeration
/// cursors and the virtual slot indirection cells that trail a method table.
pub struct FieldArray<T> {
    offset: usize,
    stride: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RawIO> FieldArray<T> {
    /// Creates an array descriptor whose first element is at `offset`
    #[must_use]
    pub const fn new(offset: usize, stride: usize) -> Self {
        FieldArray {
            offset,
            stride,
            _marker: PhantomData,
        }
    }

    /// Offset of the first element
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Distance between two consecutive elements
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Descriptor of the element at `index`
    #[must_use]
    pub const fn at(&self, index: usize) -> Field<T> {
        Field::new(self.offset + index * self.stride)
    }

    /// Reads element `index` of the array inside the structure at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point at a live structure whose array holds at least `index + 1` elements.
    #[must_use]
    pub unsafe fn read(&self, base: Address, index: usize) -> T {
        unsafe { self.at(index).read(base) }
    }

    /// Writes element `index` of the array inside the structure at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point at a live, writable structure whose array holds at least `index + 1`
    /// elements.
    pub unsafe fn write(&self, base: Address, index: usize, value: T) {
        unsafe { self.at(index).write(base, value) }
    }
}

impl<T> Clone for FieldArray<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldArray<T> {}

impl<T> fmt::Debug for FieldArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FieldArray<{}>(+0x{:x}, stride 0x{:x})",
            std::any::type_name::<T>(),
            self.offset,
            self.stride
        )
    }
}
