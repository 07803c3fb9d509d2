/*!
Target configuration
*/
use super::{CpuFeature, CpuFeatures};

/// The size of every instruction, in bytes
pub const INSTRUCTION_SIZE: usize = 4;

/// The default slack, in instructions, added to every estimated branch displacement
pub const DEFAULT_MAX_SELF_OFFSET_INSTRUCTIONS: usize = 2;

/// Configuration of the target being emitted for
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TargetConfig {
    /// The optional features available on the target CPU
    pub features: CpuFeatures,
    /**
    How many instructions of slack to add to an estimated branch displacement.

    Code emitted between the probe and the branch itself, or shifted by a later pass, may move the
    branch by a few instructions; estimates are padded by this much away from zero.
    */
    pub max_self_offset_instructions: usize,
}

impl Default for TargetConfig {
    fn default() -> TargetConfig {
        TargetConfig {
            features: CpuFeatures::none(),
            max_self_offset_instructions: DEFAULT_MAX_SELF_OFFSET_INSTRUCTIONS,
        }
    }
}

impl TargetConfig {
    /// Enable a CPU feature
    pub fn with_feature(mut self, feature: CpuFeature) -> TargetConfig {
        self.features = self.features.with(feature);
        self
    }
    /// Set the displacement slack, in instructions
    pub fn with_max_self_offset(mut self, instructions: usize) -> TargetConfig {
        self.max_self_offset_instructions = instructions;
        self
    }
    /// Whether the target CPU supports a feature
    #[inline]
    pub fn has_feature(&self, feature: CpuFeature) -> bool {
        self.features.has(feature)
    }
    /// The displacement slack, in bytes
    #[inline]
    pub fn self_offset_slack(&self) -> usize {
        self.max_self_offset_instructions * INSTRUCTION_SIZE
    }
}
