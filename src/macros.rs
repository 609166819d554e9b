#![allow(unused_macros)]

/// Declares a typed overlay over a private engine structure
///
/// An overlay is a `Copy` handle made of the structure's address and the [`crate::Engine`] whose
/// build profile describes its layout. Creating one is the single unsafe boundary, every accessor
/// declared on it afterwards relies on the constructor's contract.
///
/// ```rust, ignore
/// overlay! {
///     /// A method table
///     MethodTable
/// }
/// ```
macro_rules! overlay {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name<'e> {
            engine: &'e crate::Engine,
            address: crate::layout::Address,
        }

        impl<'e> $name<'e> {
            /// Overlays the structure located at `address`.
            ///
            /// # Safety
            ///
            /// `address` must point at a live instance of this structure, laid out as described
            /// by the build profile of `engine`, for as long as the overlay is used.
            #[must_use]
            pub unsafe fn new(engine: &'e crate::Engine, address: crate::layout::Address) -> Self {
                Self { engine, address }
            }

            /// Address of the overlaid structure
            #[must_use]
            pub fn address(&self) -> crate::layout::Address {
                self.address
            }

            /// The engine context this overlay was created from
            #[must_use]
            pub fn engine(&self) -> &'e crate::Engine {
                self.engine
            }
        }

        impl core::fmt::Debug for $name<'_> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.address)
            }
        }

        impl PartialEq for $name<'_> {
            fn eq(&self, other: &Self) -> bool {
                self.address == other.address
            }
        }

        impl Eq for $name<'_> {}
    };
}

/// Reads a field of the overlay through its build-profile descriptor
///
/// ```rust, ignore
/// let count = read_field!(self, method_table.num_virtuals);
/// ```
macro_rules! read_field {
    ($overlay:expr, $layout:ident . $field:ident) => {
        unsafe {
            $overlay
                .engine()
                .profile()
                .$layout
                .$field
                .read($overlay.address())
        }
    };
}

/// Writes a field of the overlay through its build-profile descriptor
///
/// ```rust, ignore
/// write_field!(self, code_data.temporary_entry_point, precode);
/// ```
macro_rules! write_field {
    ($overlay:expr, $layout:ident . $field:ident, $value:expr) => {
        unsafe {
            $overlay
                .engine()
                .profile()
                .$layout
                .$field
                .write($overlay.address(), $value)
        }
    };
}
