//! Re-assigning `layout(set = S, binding = B)` decorations of compiled SPIR-V modules.
//!
//! Shaders are compiled once, but the same module can be used with pipeline layouts that place its resources
//! in different descriptor sets. A [`ShaderBindingLayout`] records where each binding decoration lives in the
//! module, so binding slots can be compared, re-assigned and written back without parsing the module again.
//!
//! # Example
//! ```ignore
//! let mut layout = ShaderBindingLayout::default();
//! layout.build_from_spirv_module(&code)?;
//! let slots = create_info.bindings.iter().map(|binding| binding.slot);
//! if !layout.matches_binding_slots(slots.clone(), dynamic_set, false) {
//!     if layout.assign_binding_slots(slots, dynamic_set, false) > 0 {
//!         layout.update_spirv_module(&mut code);
//!     }
//! }
//! ```

use std::collections::HashMap;

use crate::pipeline::create_info::BindingSlot;
use crate::pipeline::spirv::{BindingDecoration, Endianness, SpirvModule, DECORATION_BINDING, DECORATION_DESCRIPTOR_SET};
use crate::Error;

/// A resource binding found in a SPIR-V module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleBinding {
    /// Descriptor set the module was compiled with.
    pub src_set: u32,
    /// Binding index the module was compiled with.
    pub src_binding: u32,
    /// Re-assigned descriptor set.
    pub dst_set: u32,
    /// Re-assigned binding index.
    pub dst_binding: u32,
    /// Word offset of the `DescriptorSet` decoration operand.
    pub set_word_offset: u32,
    /// Word offset of the `Binding` decoration operand.
    pub binding_word_offset: u32,
}

impl ModuleBinding {
    fn matches_source(&self, slot: &BindingSlot) -> bool {
        self.src_set == slot.set && self.src_binding == slot.index
    }

    fn matches_destination(&self, dst_set: u32, dst_binding: u32) -> bool {
        self.dst_set == dst_set && self.dst_binding == dst_binding
    }
}

assert_impl_all!(ShaderBindingLayout: Send, Sync);

/// Binding table of one SPIR-V module.
#[derive(Debug, Clone, Default)]
pub struct ShaderBindingLayout {
    bindings: Vec<ModuleBinding>,
    endianness: Endianness,
}

impl ShaderBindingLayout {
    /// Scan a SPIR-V module for resource bindings and record them, replacing any previous state.
    /// # Errors
    /// - [`Error::InvalidSpirv`] if the module is malformed. The layout is left empty in that case.
    pub fn build_from_spirv_module(&mut self, code: &[u8]) -> Result<(), Error> {
        *self = Self::default();

        let module = SpirvModule::parse(code)?;
        let decorations = module.binding_decorations()?;

        // Pair up the DescriptorSet and Binding decorations of each variable, keeping the order of first appearance.
        let mut targets: Vec<(u32, Option<BindingDecoration>, Option<BindingDecoration>)> = vec![];
        let mut target_index: HashMap<u32, usize> = HashMap::new();
        for decoration in decorations {
            let index = *target_index.entry(decoration.target).or_insert_with(|| {
                targets.push((decoration.target, None, None));
                targets.len() - 1
            });
            match decoration.decoration {
                DECORATION_DESCRIPTOR_SET => targets[index].1 = Some(decoration),
                DECORATION_BINDING => targets[index].2 = Some(decoration),
                _ => {}
            }
        }

        self.bindings = targets
            .into_iter()
            .filter_map(|(target, set, binding)| match (set, binding) {
                (Some(set), Some(binding)) => Some(ModuleBinding {
                    src_set: set.value,
                    src_binding: binding.value,
                    dst_set: set.value,
                    dst_binding: binding.value,
                    set_word_offset: set.operand_offset,
                    binding_word_offset: binding.operand_offset,
                }),
                _ => {
                    warn!("SPIR-V id %{target} is missing a DescriptorSet or Binding decoration and cannot be re-assigned");
                    None
                }
            })
            .collect();
        self.endianness = module.endianness();
        Ok(())
    }

    /// Returns true if [`ShaderBindingLayout::assign_binding_slots`] with the same arguments would not change anything.
    ///
    /// With `ascending_order`, the n-th slot yielded by `slots` is expected at binding index `n`. Otherwise, each
    /// binding is expected at its original binding index. Slots that the module does not use are ignored.
    pub fn matches_binding_slots(&self, slots: impl IntoIterator<Item = BindingSlot>, dst_set: u32, ascending_order: bool) -> bool {
        slots.into_iter().enumerate().all(|(position, slot)| {
            self.bindings
                .iter()
                .filter(|binding| binding.matches_source(&slot))
                .all(|binding| {
                    let dst_binding = if ascending_order { position as u32 } else { binding.src_binding };
                    binding.matches_destination(dst_set, dst_binding)
                })
        })
    }

    /// Move every binding in `slots` to descriptor set `dst_set`. With `ascending_order`, the n-th slot is also
    /// moved to binding index `n`, otherwise it keeps its original binding index.
    /// Slots that the module does not use are skipped.
    ///
    /// Returns the number of module bindings that changed. If this is zero, the module does not need to be updated.
    pub fn assign_binding_slots(&mut self, slots: impl IntoIterator<Item = BindingSlot>, dst_set: u32, ascending_order: bool) -> u32 {
        let mut num_changed = 0;
        for (position, slot) in slots.into_iter().enumerate() {
            for binding in self.bindings.iter_mut().filter(|binding| binding.matches_source(&slot)) {
                let dst_binding = if ascending_order { position as u32 } else { binding.src_binding };
                if !binding.matches_destination(dst_set, dst_binding) {
                    binding.dst_set = dst_set;
                    binding.dst_binding = dst_binding;
                    num_changed += 1;
                }
            }
        }
        num_changed
    }

    /// Write the assigned descriptor sets and binding indices into `code`.
    ///
    /// `code` must be the module this layout was built from, or a copy of it that differs at most in its binding
    /// decoration operands. This is not checked. Passing any other module corrupts it, or panics if it is too small.
    pub fn update_spirv_module(&self, code: &mut [u8]) {
        for binding in &self.bindings {
            self.endianness
                .write_word(code, binding.set_word_offset as usize, binding.dst_set);
            self.endianness
                .write_word(code, binding.binding_word_offset as usize, binding.dst_binding);
        }
    }

    /// Byte order of the last successfully built module.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// All bindings found in the module, in the order they were declared.
    pub fn bindings(&self) -> &[ModuleBinding] {
        self.bindings.as_slice()
    }

    /// Find the binding that was compiled with the given slot.
    pub fn find(&self, slot: BindingSlot) -> Option<&ModuleBinding> {
        self.bindings.iter().find(|binding| binding.matches_source(&slot))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
