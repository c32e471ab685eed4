use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ash::vk;

use crate::core::device::DescriptorDevice;
use crate::pipeline::binding_layout::ShaderBindingLayout;
use crate::pipeline::pipeline_layout::{BindingTier, PipelineLayout};
use crate::Error;

fn hash_code(code: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    code.hash(&mut hasher);
    hasher.finish()
}

/// Info required to create a shader. Use [`ShaderCreateInfo::from_spirv`] to construct this.
///
/// The SPIR-V code can be retargeted to the descriptor set indices of a [`PipelineLayout`] with
/// [`ShaderCreateInfo::bind_to_layout`] before the shader module is created.
#[derive(Debug, Clone)]
pub struct ShaderCreateInfo {
    stage: vk::ShaderStageFlags,
    code: Vec<u8>,
    code_hash: u64,
    binding_layout: Option<ShaderBindingLayout>,
}

impl ShaderCreateInfo {
    /// Load in a spirv binary into a shader create info structure.
    pub fn from_spirv(stage: vk::ShaderStageFlags, code: Vec<u8>) -> Self {
        Self {
            stage,
            code_hash: hash_code(&code),
            code,
            binding_layout: None,
        }
    }

    /// Load in a spirv binary given as words in host byte order.
    pub fn from_spirv_words(stage: vk::ShaderStageFlags, words: &[u32]) -> Self {
        let code = words.iter().flat_map(|word| word.to_ne_bytes()).collect();
        Self::from_spirv(stage, code)
    }

    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    pub fn code(&self) -> &[u8] {
        self.code.as_slice()
    }

    /// Hash of the current code. Changes whenever the code is retargeted to different binding slots.
    pub fn code_hash(&self) -> u64 {
        self.code_hash
    }

    /// The binding layout of the code, if it was built by a call to [`ShaderCreateInfo::bind_to_layout`].
    pub fn binding_layout(&self) -> Option<&ShaderBindingLayout> {
        self.binding_layout.as_ref()
    }

    /// Move the bindings of this shader to the descriptor sets the pipeline layout assigned to each binding tier.
    /// The binding layout of the code is built on first use.
    ///
    /// Returns the number of bindings that changed. The code is only rewritten if this is not zero.
    /// # Errors
    /// - [`Error::InvalidSpirv`] if the code is not a valid SPIR-V module.
    pub fn bind_to_layout<D: DescriptorDevice>(&mut self, layout: &PipelineLayout<D>, ascending_order: bool) -> Result<u32, Error> {
        if self.binding_layout.is_none() {
            let mut binding_layout = ShaderBindingLayout::default();
            binding_layout.build_from_spirv_module(&self.code)?;
            self.binding_layout = Some(binding_layout);
        }
        let binding_layout = self.binding_layout.get_or_insert_with(ShaderBindingLayout::default);

        let mut num_changed = 0;
        for tier in BindingTier::DESCRIPTOR_SET_TIERS {
            let Some(dst_set) = layout.set_bind_slot(tier) else {
                continue;
            };
            let slots = || layout.layout_bindings(tier).iter().map(|binding| binding.slot);
            if !binding_layout.matches_binding_slots(slots(), dst_set, ascending_order) {
                num_changed += binding_layout.assign_binding_slots(slots(), dst_set, ascending_order);
            }
        }

        if num_changed > 0 {
            binding_layout.update_spirv_module(&mut self.code);
            self.code_hash = hash_code(&self.code);
            trace!("Retargeted {num_changed} bindings of {:?} shader", self.stage);
        }
        Ok(num_changed)
    }
}
