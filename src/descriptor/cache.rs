use std::collections::HashMap;

use anyhow::Result;
use ash::vk;

use crate::core::device::{DescriptorDevice, Device};
use crate::descriptor::descriptor_pool::DescriptorPool;
use crate::descriptor::pool_size::DescriptorPoolSize;
use crate::descriptor::staging_pool::StagingDescriptorSetPool;
use crate::descriptor::writer::DescriptorSetWriter;
use crate::pipeline::set_layout::LayoutBinding;
use crate::Error;

/// A resource that can be written into a dynamic binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorContents {
    /// A range of a uniform or storage buffer.
    Buffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    /// A sampled or storage image view.
    Image {
        view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    Sampler(vk::Sampler),
}

impl DescriptorContents {
    fn name(&self) -> &'static str {
        match self {
            DescriptorContents::Buffer { .. } => "a buffer",
            DescriptorContents::Image { .. } => "an image",
            DescriptorContents::Sampler(_) => "a sampler",
        }
    }

    fn is_compatible(&self, ty: vk::DescriptorType) -> bool {
        match self {
            DescriptorContents::Buffer { .. } => matches!(
                ty,
                vk::DescriptorType::UNIFORM_BUFFER
                    | vk::DescriptorType::STORAGE_BUFFER
                    | vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
                    | vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
            ),
            DescriptorContents::Image { .. } => matches!(
                ty,
                vk::DescriptorType::SAMPLED_IMAGE | vk::DescriptorType::STORAGE_IMAGE | vk::DescriptorType::INPUT_ATTACHMENT
            ),
            DescriptorContents::Sampler(_) => ty == vk::DescriptorType::SAMPLER,
        }
    }
}

/// Manages the descriptor sets of the dynamic binding tier of a [`PipelineLayout`](crate::PipelineLayout).
///
/// Resources are written into a resident descriptor set that is never bound. Flushing copies the resident set
/// into a fresh set from a [`StagingDescriptorSetPool`], which can then be bound for a draw or dispatch. Sets
/// with identical contents are reused until the cache is reset.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorCache<D: DescriptorDevice = Device> {
    #[derivative(Debug = "ignore")]
    device: D,
    set_layout: vk::DescriptorSetLayout,
    resident_set: vk::DescriptorSet,
    pool_size: DescriptorPoolSize,
    bindings: Vec<LayoutBinding>,
    offsets: Vec<usize>,
    contents: Vec<Option<DescriptorContents>>,
    dirty: bool,
    current_set: vk::DescriptorSet,
    flushed: HashMap<Vec<Option<DescriptorContents>>, vk::DescriptorSet>,
}

impl<D: DescriptorDevice> DescriptorCache<D> {
    /// Create a new descriptor cache. The resident set is allocated from `pool`.
    /// `pool_size` must hold the descriptor counts of a single set with layout `set_layout`.
    /// # Errors
    /// - Fails if the resident descriptor set cannot be allocated.
    pub fn new(
        device: D,
        pool: &DescriptorPool<D>,
        set_layout: vk::DescriptorSetLayout,
        pool_size: DescriptorPoolSize,
        bindings: Vec<LayoutBinding>,
    ) -> Result<Self> {
        let resident_set = pool.allocate(set_layout).map_err(Error::from)?;
        let mut offsets = Vec::with_capacity(bindings.len());
        let mut num_descriptors = 0;
        for binding in &bindings {
            offsets.push(num_descriptors);
            num_descriptors += binding.descriptor_count as usize;
        }
        Ok(Self {
            device,
            set_layout,
            resident_set,
            pool_size,
            bindings,
            offsets,
            contents: vec![None; num_descriptors],
            dirty: true,
            current_set: vk::DescriptorSet::null(),
            flushed: HashMap::new(),
        })
    }

    /// Create a writer large enough to hold one write for every descriptor in this cache.
    pub fn create_writer(&self) -> DescriptorSetWriter {
        let num_bindings = self.bindings.len() as u32;
        DescriptorSetWriter::new(self.num_descriptors() as u32, num_bindings, num_bindings)
    }

    /// Write a resource into the binding at `binding_index` (an index into the layout's dynamic bindings, not a
    /// binding slot). The write is recorded into `writer` and submitted on the next flush.
    /// Writing the same resource that is already bound does nothing.
    /// # Errors
    /// - Fails if the binding or array element does not exist.
    /// - Fails if the resource does not match the descriptor type of the binding.
    /// - Fails with [`Error::WriterExhausted`] if `writer` has no scratch space left. Flush first in that case.
    pub fn emplace_descriptor(
        &mut self,
        binding_index: usize,
        array_element: u32,
        contents: DescriptorContents,
        writer: &mut DescriptorSetWriter,
    ) -> Result<()> {
        let binding = *self.bindings.get(binding_index).ok_or(Error::BindingOutOfRange {
            index: binding_index,
            count: self.bindings.len(),
        })?;
        if array_element >= binding.descriptor_count {
            return Err(Error::ArrayElementOutOfRange {
                element: array_element,
                count: binding.descriptor_count,
            }
            .into());
        }
        if !contents.is_compatible(binding.descriptor_type) {
            return Err(Error::DescriptorTypeMismatch {
                contents: contents.name(),
                ty: binding.descriptor_type,
            }
            .into());
        }

        let index = self.offsets[binding_index] + array_element as usize;
        if self.contents[index] == Some(contents) {
            return Ok(());
        }

        let (buffer_info, image_info): (*const vk::DescriptorBufferInfo, *const vk::DescriptorImageInfo) = match contents {
            DescriptorContents::Buffer { buffer, offset, range } => {
                let info = writer.next_buffer_info().ok_or(Error::WriterExhausted)?;
                *info = vk::DescriptorBufferInfo {
                    buffer,
                    offset,
                    range,
                };
                (info as *const _, std::ptr::null())
            }
            DescriptorContents::Image { view, layout } => {
                let info = writer.next_image_info().ok_or(Error::WriterExhausted)?;
                *info = vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: view,
                    image_layout: layout,
                };
                (std::ptr::null(), info as *const _)
            }
            DescriptorContents::Sampler(sampler) => {
                let info = writer.next_image_info().ok_or(Error::WriterExhausted)?;
                *info = vk::DescriptorImageInfo {
                    sampler,
                    image_view: vk::ImageView::null(),
                    image_layout: vk::ImageLayout::UNDEFINED,
                };
                (std::ptr::null(), info as *const _)
            }
        };

        let write = writer.next_write_descriptor();
        write.dst_set = self.resident_set;
        write.dst_binding = binding.slot.index;
        write.dst_array_element = array_element;
        write.descriptor_count = 1;
        write.descriptor_type = binding.descriptor_type;
        write.p_buffer_info = buffer_info;
        write.p_image_info = image_info;

        self.contents[index] = Some(contents);
        self.dirty = true;
        Ok(())
    }

    /// Get a descriptor set with the current contents, ready to be bound.
    ///
    /// If nothing changed since the last flush, the previous set is returned. Otherwise the pending writes in
    /// `writer` are submitted, and the resident set is copied into a set from `staging` (or an earlier set with the
    /// same contents is reused). `writer` is reset afterwards.
    pub fn flush_descriptor_set(&mut self, staging: &mut StagingDescriptorSetPool<D>, writer: &mut DescriptorSetWriter) -> Result<vk::DescriptorSet> {
        if !self.dirty && self.current_set != vk::DescriptorSet::null() {
            return Ok(self.current_set);
        }

        let set = match self.flushed.get(&self.contents) {
            Some(set) => *set,
            None => {
                let set = staging.allocate_descriptor_set(self.set_layout, &self.pool_size)?;
                self.copy_resident_set(set, writer);
                self.flushed.insert(self.contents.clone(), set);
                set
            }
        };

        writer.update_descriptor_sets(&self.device);
        writer.reset();

        self.current_set = set;
        self.dirty = false;
        Ok(set)
    }

    fn copy_resident_set(&self, dst_set: vk::DescriptorSet, writer: &mut DescriptorSetWriter) {
        for (binding, offset) in self.bindings.iter().zip(self.offsets.iter()) {
            let contents = &self.contents[*offset..*offset + binding.descriptor_count as usize];
            // Only copy elements that were written, in contiguous runs.
            let mut element = 0;
            while element < contents.len() {
                if contents[element].is_none() {
                    element += 1;
                    continue;
                }
                let start = element;
                while element < contents.len() && contents[element].is_some() {
                    element += 1;
                }
                let copy = writer.next_copy_descriptor();
                copy.src_set = self.resident_set;
                copy.src_binding = binding.slot.index;
                copy.src_array_element = start as u32;
                copy.dst_set = dst_set;
                copy.dst_binding = binding.slot.index;
                copy.dst_array_element = start as u32;
                copy.descriptor_count = (element - start) as u32;
            }
        }
    }

    /// Forget all staging sets. Must be called whenever the staging pool used for flushing is reset.
    /// The written resources are kept.
    pub fn reset(&mut self) {
        self.flushed.clear();
        self.current_set = vk::DescriptorSet::null();
        self.dirty = true;
    }

    /// The set resources are written into. This set is never bound.
    pub fn resident_set(&self) -> vk::DescriptorSet {
        self.resident_set
    }

    /// The set returned by the last flush, or a null handle.
    pub fn current_set(&self) -> vk::DescriptorSet {
        self.current_set
    }

    /// Whether contents changed since the last flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Total number of descriptors over all bindings, counting each array element.
    pub fn num_descriptors(&self) -> usize {
        self.contents.len()
    }

    pub fn bindings(&self) -> &[LayoutBinding] {
        self.bindings.as_slice()
    }

    pub fn pool_size(&self) -> &DescriptorPoolSize {
        &self.pool_size
    }

    /// The resource currently written to a binding element, if any.
    pub fn contents(&self, binding_index: usize, array_element: u32) -> Option<DescriptorContents> {
        let offset = *self.offsets.get(binding_index)?;
        let binding = self.bindings.get(binding_index)?;
        if array_element >= binding.descriptor_count {
            return None;
        }
        self.contents[offset + array_element as usize]
    }
}
