//! Accumulates how many descriptors of each type a descriptor pool must hold.

use std::fmt::{Display, Formatter};

use ash::vk;

/// Finalized, compact per-type descriptor counts. Each descriptor type appears at most once.
#[derive(Debug, Clone, Default)]
pub struct DescriptorPoolSize(pub(crate) Vec<vk::DescriptorPoolSize>);

impl PartialEq for DescriptorPoolSize {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.ty == b.ty && a.descriptor_count == b.descriptor_count)
    }
}

impl Eq for DescriptorPoolSize {}

impl DescriptorPoolSize {
    /// The pool sizes, in a form that can be passed to Vulkan directly.
    pub fn as_slice(&self) -> &[vk::DescriptorPoolSize] {
        self.0.as_slice()
    }

    /// Number of descriptors of the given type, zero if the type is not present.
    pub fn count(&self, ty: vk::DescriptorType) -> u32 {
        self.0
            .iter()
            .find(|size| size.ty == ty)
            .map(|size| size.descriptor_count)
            .unwrap_or(0)
    }

    /// Total number of descriptors of all types, saturating at `u32::MAX`.
    pub fn total(&self) -> u32 {
        self.0
            .iter()
            .fold(0u32, |total, size| total.saturating_add(size.descriptor_count))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for DescriptorPoolSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "DescriptorPoolSize (")?;
        for size in &self.0 {
            writeln!(f, "{:?} => {}", size.ty, size.descriptor_count)?;
        }
        write!(f, ")")
    }
}

/// Tallies descriptor counts per type.
///
/// ```ignore
/// let mut accum = PoolSizeAccumulator::new();
/// accum.accumulate(vk::DescriptorType::UNIFORM_BUFFER, 1);
/// accum.accumulate(vk::DescriptorType::SAMPLER, 2);
/// accum.accumulate(vk::DescriptorType::UNIFORM_BUFFER, 1);
/// let size = accum.finalize();
/// assert_eq!(size.count(vk::DescriptorType::UNIFORM_BUFFER), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoolSizeAccumulator {
    sizes: Vec<vk::DescriptorPoolSize>,
}

impl PoolSizeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` descriptors of type `ty`.
    pub fn accumulate(&mut self, ty: vk::DescriptorType, count: u32) {
        self.sizes.push(vk::DescriptorPoolSize {
            ty,
            descriptor_count: count,
        });
    }

    /// Merge all entries of the same type and drop empty ones.
    /// Entries are sorted by descriptor type so equal requests produce equal sizes.
    pub fn finalize(mut self) -> DescriptorPoolSize {
        self.sizes.sort_by_key(|size| size.ty.as_raw());
        let mut merged: Vec<vk::DescriptorPoolSize> = Vec::with_capacity(self.sizes.len());
        for size in self.sizes.into_iter().filter(|size| size.descriptor_count > 0) {
            match merged.last_mut() {
                Some(last) if last.ty == size.ty => last.descriptor_count += size.descriptor_count,
                _ => merged.push(size),
            }
        }
        DescriptorPoolSize(merged)
    }
}
