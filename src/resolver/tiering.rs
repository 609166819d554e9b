use tracing::{debug, trace};

use crate::layout::{
    types::{ChunkFlags, MethodDescFlags3},
    MethodDesc, MethodDescChunk,
};

impl MethodDesc<'_> {
    /// Decides whether the method takes part in tiered compilation and records a positive answer.
    ///
    /// Eligible methods have a dedicated native code slot, are no wrapper stub and do not request
    /// a fixed optimization level. A method whose attributes cannot be read is not eligible.
    pub fn determine_and_set_tiering_eligibility(&self) -> bool {
        if !self.has_native_code_slot() || self.is_wrapper_stub() {
            return false;
        }

        match self.is_jit_optimization_level_requested() {
            Ok(false) => {
                self.set_flags3(MethodDescFlags3::IS_ELIGIBLE_FOR_TIERED_COMPILATION);
                true
            }
            Ok(true) => false,
            Err(error) => {
                debug!(method_desc = %self.address(), %error, "no implementation attributes, not eligible for tiering");
                false
            }
        }
    }
}

impl MethodDescChunk<'_> {
    /// Decides tiering eligibility for every descriptor of the chunk, once.
    ///
    /// With tiered compilation disabled no descriptor becomes eligible, the chunk is still marked
    /// as determined.
    pub fn determine_and_set_tiering_eligibility(&self) {
        if self.determined_tiering_eligibility() {
            return;
        }

        if self.engine().tiered_compilation() {
            let eligible = self
                .method_descs()
                .filter(|method| method.determine_and_set_tiering_eligibility())
                .count();
            trace!(chunk = %self.address(), eligible, count = self.count(), "determined tiering eligibility");
        }

        self.set_flags(ChunkFlags::DETERMINED_IS_ELIGIBLE_FOR_TIERED_COMPILATION);
    }
}
