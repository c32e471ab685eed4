//! Batches descriptor writes and copies into a single `vkUpdateDescriptorSets` call.

use ash::vk;

use crate::core::device::DescriptorDevice;

/// Collects `VkWriteDescriptorSet` and `VkCopyDescriptorSet` records and flushes them in one call.
///
/// Buffer and image infos referenced by writes live in scratch storage that is sized once, at creation,
/// to the maximum number of resource views. This storage never reallocates, so pointers to it stay valid
/// until [`DescriptorSetWriter::reset`] is called.
///
/// # Example
/// ```ignore
/// let mut writer = DescriptorSetWriter::new(4, 4, 0);
/// let Some(info) = writer.next_buffer_info() else { panic!("writer too small") };
/// *info = vk::DescriptorBufferInfo { buffer, offset: 0, range: vk::WHOLE_SIZE };
/// let info: *const vk::DescriptorBufferInfo = info;
/// let write = writer.next_write_descriptor();
/// write.dst_set = set;
/// write.dst_binding = 0;
/// write.descriptor_count = 1;
/// write.descriptor_type = vk::DescriptorType::UNIFORM_BUFFER;
/// write.p_buffer_info = info;
/// writer.update_descriptor_sets(&device);
/// ```
#[derive(Debug)]
pub struct DescriptorSetWriter {
    buffer_infos: Box<[vk::DescriptorBufferInfo]>,
    image_infos: Box<[vk::DescriptorImageInfo]>,
    num_buffer_infos: usize,
    num_image_infos: usize,
    writes: Vec<vk::WriteDescriptorSet>,
    copies: Vec<vk::CopyDescriptorSet>,
}

impl DescriptorSetWriter {
    /// Create a writer that can hold up to `max_resource_views` buffer infos and as many image infos.
    /// `reserved_writes` and `reserved_copies` are only capacity hints.
    pub fn new(max_resource_views: u32, reserved_writes: u32, reserved_copies: u32) -> Self {
        let max = max_resource_views as usize;
        Self {
            buffer_infos: vec![vk::DescriptorBufferInfo::default(); max].into_boxed_slice(),
            image_infos: vec![vk::DescriptorImageInfo::default(); max].into_boxed_slice(),
            num_buffer_infos: 0,
            num_image_infos: 0,
            writes: Vec::with_capacity(reserved_writes as usize),
            copies: Vec::with_capacity(reserved_copies as usize),
        }
    }

    /// Clear all writes, copies and scratch infos. Scratch storage is kept.
    pub fn reset(&mut self) {
        self.writes.clear();
        self.copies.clear();
        self.num_buffer_infos = 0;
        self.num_image_infos = 0;
    }

    /// Get the next free buffer info, or `None` if all of them are in use.
    pub fn next_buffer_info(&mut self) -> Option<&mut vk::DescriptorBufferInfo> {
        let info = self.buffer_infos.get_mut(self.num_buffer_infos)?;
        self.num_buffer_infos += 1;
        Some(info)
    }

    /// Get the next free image info, or `None` if all of them are in use.
    pub fn next_image_info(&mut self) -> Option<&mut vk::DescriptorImageInfo> {
        let info = self.image_infos.get_mut(self.num_image_infos)?;
        self.num_image_infos += 1;
        Some(info)
    }

    /// Append a zero-initialized write record and return it for the caller to fill in.
    pub fn next_write_descriptor(&mut self) -> &mut vk::WriteDescriptorSet {
        self.writes.push(vk::WriteDescriptorSet::default());
        let index = self.writes.len() - 1;
        &mut self.writes[index]
    }

    /// Append a zero-initialized copy record and return it for the caller to fill in.
    pub fn next_copy_descriptor(&mut self) -> &mut vk::CopyDescriptorSet {
        self.copies.push(vk::CopyDescriptorSet::default());
        let index = self.copies.len() - 1;
        &mut self.copies[index]
    }

    /// Submit all writes and copies in a single call. Does nothing if there are none.
    /// Writes are applied before copies, each in the order they were added.
    ///
    /// The records are not cleared, call [`DescriptorSetWriter::reset`] before reusing the writer.
    pub fn update_descriptor_sets<D: DescriptorDevice>(&self, device: &D) {
        if self.writes.is_empty() && self.copies.is_empty() {
            return;
        }
        // SAFETY: Every pointer stored in a write points into `buffer_infos` or `image_infos`, which do not move
        // for the lifetime of `self`.
        unsafe {
            device.update_descriptor_sets(self.writes.as_slice(), self.copies.as_slice());
        }
    }

    pub fn writes(&self) -> &[vk::WriteDescriptorSet] {
        self.writes.as_slice()
    }

    pub fn copies(&self) -> &[vk::CopyDescriptorSet] {
        self.copies.as_slice()
    }

    /// Maximum number of buffer or image infos.
    pub fn max_resource_views(&self) -> usize {
        self.buffer_infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.copies.is_empty()
    }
}
