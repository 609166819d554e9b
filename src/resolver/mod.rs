//! Entry point resolution and mutation for method descriptors.
//!
//! Everything here is an inherent method of [`crate::layout::MethodDesc`] or
//! [`crate::layout::MethodDescChunk`], grouped by concern:
//!
//! - `slot` - Where a method's entry point, private slot and native code slot live
//! - `entrypoint` - Reading the entry point, establishing temporary entry points, reset
//! - `tiering` - Tiered compilation eligibility of descriptors and chunks
//!
//! A method without native code is called through a precode. The first call of that stub
//! enters the pre-compilation thunk, which compiles the method and patches the dispatch slot.
//! [`crate::layout::MethodDesc::reset`] restores that initial state so the next call compiles
//! again.

mod entrypoint;
mod slot;
mod tiering;
