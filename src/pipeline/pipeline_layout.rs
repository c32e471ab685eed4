//! Wrapper around `VkPipelineLayout` objects, and everything a pipeline layout owns.

use anyhow::Result;
use ash::vk;

use crate::core::device::{DescriptorDevice, Device};
use crate::descriptor::cache::DescriptorCache;
use crate::descriptor::descriptor_pool::DescriptorPool;
use crate::descriptor::pool_size::{DescriptorPoolSize, PoolSizeAccumulator};
use crate::pipeline::create_info::*;
use crate::pipeline::set_layout::{DescriptorSetLayout, LayoutBinding};
use crate::sampler::Sampler;
use crate::util::to_vk::{as_vulkan_vec, IntoVulkanType};
use crate::Error;

/// Binding tiers, grouped by how often their contents change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingTier {
    /// Descriptor sets managed by the application.
    Heap,
    /// Descriptor sets written per draw through the descriptor cache.
    Dynamic,
    /// A single descriptor set of samplers fixed at layout creation.
    ImmutableSamplers,
    /// Push constants. These never occupy a descriptor set.
    PushConstants,
}

impl BindingTier {
    /// Tiers that own a descriptor set, in the order their set indices are assigned.
    pub const DESCRIPTOR_SET_TIERS: [BindingTier; 3] = [BindingTier::Heap, BindingTier::Dynamic, BindingTier::ImmutableSamplers];

    fn set_layout_index(self) -> Option<usize> {
        match self {
            BindingTier::Heap => Some(0),
            BindingTier::Dynamic => Some(1),
            BindingTier::ImmutableSamplers => Some(2),
            BindingTier::PushConstants => None,
        }
    }
}

const NUM_SET_LAYOUTS: usize = BindingTier::DESCRIPTOR_SET_TIERS.len();

/// Resolve the descriptor type of a heap or dynamic binding.
/// # Errors
/// - [`Error::UnsupportedBindingType`] if no descriptor type matches the resource type and bind flags.
pub fn descriptor_type(desc: &BindingDescriptor) -> Result<vk::DescriptorType, Error> {
    let unsupported = || Error::UnsupportedBindingType {
        resource: desc.resource_type,
        bind_flags: desc.bind_flags,
    };
    match desc.resource_type {
        ResourceType::Sampler => Ok(vk::DescriptorType::SAMPLER),
        ResourceType::Texture => {
            if desc.bind_flags.contains(BindFlags::STORAGE) && !desc.bind_flags.contains(BindFlags::SAMPLED) {
                Ok(vk::DescriptorType::STORAGE_IMAGE)
            } else {
                Ok(vk::DescriptorType::SAMPLED_IMAGE)
            }
        }
        ResourceType::Buffer => {
            if desc.bind_flags.contains(BindFlags::CONSTANT_BUFFER) {
                Ok(vk::DescriptorType::UNIFORM_BUFFER)
            } else if desc.bind_flags.intersects(BindFlags::SAMPLED | BindFlags::STORAGE) {
                Ok(vk::DescriptorType::STORAGE_BUFFER)
            } else {
                Err(unsupported())
            }
        }
        ResourceType::Undefined => Err(unsupported()),
    }
}

fn convert_bindings(descs: &[BindingDescriptor]) -> Result<(Vec<vk::DescriptorSetLayoutBinding>, Vec<LayoutBinding>), Error> {
    let mut vk_bindings = Vec::with_capacity(descs.len());
    let mut layout_bindings = Vec::with_capacity(descs.len());
    for desc in descs {
        let ty = descriptor_type(desc)?;
        vk_bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(desc.slot.index)
                .descriptor_type(ty)
                .descriptor_count(desc.descriptor_count())
                .stage_flags(desc.stage_flags.into_vulkan())
                .build(),
        );
        layout_bindings.push(LayoutBinding {
            slot: desc.slot,
            stage_flags: desc.stage_flags,
            descriptor_type: ty,
            descriptor_count: desc.descriptor_count(),
        });
    }
    Ok((vk_bindings, layout_bindings))
}

fn create_binding_set_layout<D: DescriptorDevice>(device: &D, descs: &[BindingDescriptor]) -> Result<(DescriptorSetLayout<D>, Vec<LayoutBinding>)> {
    let (vk_bindings, layout_bindings) = convert_bindings(descs)?;
    // SAFETY: No immutable samplers are referenced.
    let set_layout = unsafe { DescriptorSetLayout::new(device.clone(), vk_bindings.as_slice())? };
    Ok((set_layout, layout_bindings))
}

fn create_immutable_samplers<D: DescriptorDevice>(
    device: &D,
    descs: &[StaticSamplerDescriptor],
) -> Result<(Vec<Sampler<D>>, DescriptorSetLayout<D>, Vec<LayoutBinding>)> {
    let samplers = descs
        .iter()
        .map(|desc| Sampler::new(device.clone(), &desc.sampler))
        .collect::<Result<Vec<_>>>()?;
    // SAFETY: The samplers are owned by the caller together with the layout.
    let handles = samplers.iter().map(|sampler| unsafe { sampler.handle() }).collect::<Vec<_>>();

    let vk_bindings = descs
        .iter()
        .zip(handles.iter())
        .map(|(desc, handle)| vk::DescriptorSetLayoutBinding {
            binding: desc.slot.index,
            descriptor_type: vk::DescriptorType::SAMPLER,
            descriptor_count: 1,
            stage_flags: desc.stage_flags.into_vulkan(),
            p_immutable_samplers: handle,
        })
        .collect::<Vec<_>>();
    let layout_bindings = descs
        .iter()
        .map(|desc| LayoutBinding {
            slot: desc.slot,
            stage_flags: desc.stage_flags,
            descriptor_type: vk::DescriptorType::SAMPLER,
            descriptor_count: 1,
        })
        .collect();

    // SAFETY: `handles` outlives this call, and the samplers are returned alongside the layout.
    let set_layout = unsafe { DescriptorSetLayout::new(device.clone(), vk_bindings.as_slice())? };
    Ok((samplers, set_layout, layout_bindings))
}

fn accumulate_bindings(accum: &mut PoolSizeAccumulator, bindings: &[LayoutBinding]) {
    for binding in bindings {
        accum.accumulate(binding.descriptor_type, binding.descriptor_count);
    }
}

/// A fully built pipeline layout, with all descriptor set layouts, immutable samplers and descriptor pools it needs.
///
/// Every non-empty binding tier gets its own descriptor set layout. Tiers are assigned consecutive set indices in
/// the order heap, dynamic, immutable samplers, skipping absent tiers. Shaders must use these set indices, see
/// [`ShaderBindingLayout`](crate::ShaderBindingLayout) to re-assign them in compiled SPIR-V.
///
/// # Example
/// ```ignore
/// let info = PipelineLayoutCreateInfo::new()
///     .with_binding(BindingDescriptor::new(
///         ResourceType::Buffer,
///         BindFlags::CONSTANT_BUFFER,
///         StageFlags::VERTEX,
///         BindingSlot::new(0, 0),
///     ))
///     .with_static_sampler(StaticSamplerDescriptor::new(
///         StageFlags::FRAGMENT,
///         BindingSlot::new(0, 1),
///         SamplerDescriptor::default(),
///     ));
/// let layout = PipelineLayout::new(device.clone(), &info)?;
/// assert_eq!(layout.set_bind_slot(BindingTier::Dynamic), Some(0));
/// assert_eq!(layout.set_bind_slot(BindingTier::ImmutableSamplers), Some(1));
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PipelineLayout<D: DescriptorDevice = Device> {
    #[derivative(Debug = "ignore")]
    device: D,
    handle: vk::PipelineLayout,
    // Fields are dropped in declaration order. Set layouts must go before the samplers they reference.
    descriptor_cache: Option<DescriptorCache<D>>,
    static_descriptor_set: vk::DescriptorSet,
    set_layouts: [Option<DescriptorSetLayout<D>>; NUM_SET_LAYOUTS],
    set_bind_slots: [Option<u32>; NUM_SET_LAYOUTS],
    layout_bindings: [Vec<LayoutBinding>; NUM_SET_LAYOUTS],
    immutable_samplers: Vec<Sampler<D>>,
    descriptor_pool: Option<DescriptorPool<D>>,
    push_constants: Vec<PushConstantRange>,
}

impl<D: DescriptorDevice> PipelineLayout<D> {
    /// Create a pipeline layout and all objects it owns.
    /// # Errors
    /// - Fails with [`Error::UnsupportedBindingType`] if a binding has no matching descriptor type.
    /// - Fails if any Vulkan object cannot be created. Objects created up to that point are destroyed again.
    pub fn new(device: D, info: &PipelineLayoutCreateInfo) -> Result<Self> {
        // Locals are dropped in reverse order on error, so the samplers go after every set layout that references them.
        let mut immutable_samplers = vec![];
        let mut set_layouts: [Option<DescriptorSetLayout<D>>; NUM_SET_LAYOUTS] = [None, None, None];
        let mut layout_bindings: [Vec<LayoutBinding>; NUM_SET_LAYOUTS] = [vec![], vec![], vec![]];

        if !info.heap_bindings.is_empty() {
            let (set_layout, bindings) = create_binding_set_layout(&device, &info.heap_bindings)?;
            set_layouts[0] = Some(set_layout);
            layout_bindings[0] = bindings;
        }
        if !info.bindings.is_empty() {
            let (set_layout, bindings) = create_binding_set_layout(&device, &info.bindings)?;
            set_layouts[1] = Some(set_layout);
            layout_bindings[1] = bindings;
        }
        let mut sampler_set_layout = None;
        if !info.static_samplers.is_empty() {
            let (samplers, set_layout, bindings) = create_immutable_samplers(&device, &info.static_samplers)?;
            immutable_samplers = samplers;
            sampler_set_layout = Some(set_layout);
            layout_bindings[2] = bindings;
        }

        // One pool holds the resident set of the descriptor cache and the static sampler set.
        let descriptor_pool = if !info.bindings.is_empty() || !info.static_samplers.is_empty() {
            let mut accum = PoolSizeAccumulator::new();
            accumulate_bindings(&mut accum, &layout_bindings[1]);
            accum.accumulate(vk::DescriptorType::SAMPLER, immutable_samplers.len() as u32);
            let max_sets = u32::from(!info.bindings.is_empty()) + u32::from(!info.static_samplers.is_empty());
            Some(DescriptorPool::new(device.clone(), max_sets, accum.finalize())?)
        } else {
            None
        };

        let descriptor_cache = match (&descriptor_pool, &set_layouts[1]) {
            (Some(pool), Some(set_layout)) => {
                // Immutable samplers live in their own set, so they are not part of the cache's pool size.
                let mut accum = PoolSizeAccumulator::new();
                accumulate_bindings(&mut accum, &layout_bindings[1]);
                // SAFETY: The set layout is owned by this pipeline layout and outlives the cache.
                let handle = unsafe { set_layout.handle() };
                Some(DescriptorCache::new(device.clone(), pool, handle, accum.finalize(), layout_bindings[1].clone())?)
            }
            _ => None,
        };

        let static_descriptor_set = match (&descriptor_pool, &sampler_set_layout) {
            // Immutable samplers need no descriptor writes, the set is complete as soon as it is allocated.
            (Some(pool), Some(set_layout)) => pool
                .allocate(unsafe { set_layout.handle() })
                .map_err(Error::from)?,
            _ => vk::DescriptorSet::null(),
        };
        set_layouts[2] = sampler_set_layout;

        let mut set_bind_slots = [None; NUM_SET_LAYOUTS];
        let mut vk_set_layouts = Vec::with_capacity(NUM_SET_LAYOUTS);
        for (slot, set_layout) in set_bind_slots.iter_mut().zip(set_layouts.iter()) {
            if let Some(set_layout) = set_layout {
                *slot = Some(vk_set_layouts.len() as u32);
                vk_set_layouts.push(unsafe { set_layout.handle() });
            }
        }

        // Layouts with only push constants are folded into the pipeline permutations, they don't get a VkPipelineLayout.
        let handle = if info.has_descriptor_sets() {
            let push_constants = as_vulkan_vec(&info.push_constants);
            let handle = unsafe { device.create_pipeline_layout(vk_set_layouts.as_slice(), push_constants.as_slice()) }.map_err(Error::from)?;
            #[cfg(feature = "log-objects")]
            trace!("Created new VkPipelineLayout {handle:p}");
            handle
        } else {
            vk::PipelineLayout::null()
        };

        debug!(
            "Created pipeline layout with {} heap bindings, {} dynamic bindings, {} static samplers (descriptor sets: {:?})",
            layout_bindings[0].len(),
            layout_bindings[1].len(),
            layout_bindings[2].len(),
            set_bind_slots
        );

        Ok(Self {
            device,
            handle,
            descriptor_cache,
            static_descriptor_set,
            set_layouts,
            set_bind_slots,
            layout_bindings,
            immutable_samplers,
            descriptor_pool,
            push_constants: info.push_constants.clone(),
        })
    }

    /// Get unsafe access to the internal `VkPipelineLayout`. This is a null handle for layouts with only push constants.
    /// # Safety
    /// Any vulkan calls that mutate this pipeline layout may put the system in an undefined state.
    pub unsafe fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    /// Whether a `VkPipelineLayout` object was created.
    pub fn has_handle(&self) -> bool {
        self.handle != vk::PipelineLayout::null()
    }

    /// Bind the immutable sampler set at its set index. Does nothing if this layout has no static samplers.
    pub fn bind_static_descriptor_set(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint) {
        self.bind_descriptor_set(BindingTier::ImmutableSamplers, cmd, bind_point, self.static_descriptor_set);
    }

    /// Bind a set of the dynamic tier, usually obtained from [`DescriptorCache::flush_descriptor_set`].
    /// Does nothing if `set` is a null handle.
    pub fn bind_dynamic_descriptor_set(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, set: vk::DescriptorSet) {
        self.bind_descriptor_set(BindingTier::Dynamic, cmd, bind_point, set);
    }

    /// Bind a set of the heap tier. Does nothing if `set` is a null handle.
    pub fn bind_heap_descriptor_set(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, set: vk::DescriptorSet) {
        self.bind_descriptor_set(BindingTier::Heap, cmd, bind_point, set);
    }

    fn bind_descriptor_set(&self, tier: BindingTier, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, set: vk::DescriptorSet) {
        if set == vk::DescriptorSet::null() {
            return;
        }
        let Some(first_set) = self.set_bind_slot(tier) else {
            return;
        };
        // SAFETY: The pipeline layout is valid for the lifetime of `self`, the set index comes from its creation.
        unsafe {
            self.device
                .cmd_bind_descriptor_sets(cmd, bind_point, self.handle, first_set, std::slice::from_ref(&set));
        }
    }

    /// The set index assigned to a tier, or `None` if the tier is absent. This is the `set` value shaders must use
    /// for bindings of this tier.
    pub fn set_bind_slot(&self, tier: BindingTier) -> Option<u32> {
        tier.set_layout_index().and_then(|index| self.set_bind_slots[index])
    }

    /// Whether a tier is present in this layout.
    pub fn has_tier(&self, tier: BindingTier) -> bool {
        match tier {
            BindingTier::PushConstants => !self.push_constants.is_empty(),
            _ => self.set_bind_slot(tier).is_some(),
        }
    }

    /// Get the descriptor set layout of a tier.
    /// # Safety
    /// The handle must not be destroyed, and is only valid while `self` is alive.
    pub unsafe fn set_layout(&self, tier: BindingTier) -> Option<vk::DescriptorSetLayout> {
        let index = tier.set_layout_index()?;
        self.set_layouts[index].as_ref().map(|layout| layout.handle())
    }

    /// Number of descriptor set layouts in this pipeline layout.
    pub fn num_set_layouts(&self) -> usize {
        self.set_layouts.iter().flatten().count()
    }

    /// Bindings of a tier as they appear in its descriptor set layout. Empty for absent tiers and push constants.
    pub fn layout_bindings(&self, tier: BindingTier) -> &[LayoutBinding] {
        match tier.set_layout_index() {
            Some(index) => self.layout_bindings[index].as_slice(),
            None => &[],
        }
    }

    /// Bindings of the heap tier.
    pub fn heap_bindings(&self) -> &[LayoutBinding] {
        self.layout_bindings(BindingTier::Heap)
    }

    /// Bindings of the dynamic tier.
    pub fn bindings(&self) -> &[LayoutBinding] {
        self.layout_bindings(BindingTier::Dynamic)
    }

    pub fn num_heap_bindings(&self) -> u32 {
        self.heap_bindings().len() as u32
    }

    /// Number of dynamic bindings.
    pub fn num_bindings(&self) -> u32 {
        self.bindings().len() as u32
    }

    pub fn num_static_samplers(&self) -> u32 {
        self.immutable_samplers.len() as u32
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        self.push_constants.as_slice()
    }

    pub fn num_push_constant_ranges(&self) -> u32 {
        self.push_constants.len() as u32
    }

    /// The descriptor cache of the dynamic tier.
    pub fn descriptor_cache(&self) -> Option<&DescriptorCache<D>> {
        self.descriptor_cache.as_ref()
    }

    /// The descriptor cache of the dynamic tier.
    /// # Errors
    /// - [`Error::NoDynamicBindings`] if this layout has no dynamic bindings.
    pub fn descriptor_cache_mut(&mut self) -> Result<&mut DescriptorCache<D>, Error> {
        self.descriptor_cache.as_mut().ok_or(Error::NoDynamicBindings)
    }

    /// The descriptor set holding the immutable samplers, or a null handle.
    pub fn static_descriptor_set(&self) -> vk::DescriptorSet {
        self.static_descriptor_set
    }

    /// Size of the pool owned by this layout, if any.
    pub fn descriptor_pool_size(&self) -> Option<&DescriptorPoolSize> {
        self.descriptor_pool.as_ref().map(|pool| pool.size())
    }
}

impl<D: DescriptorDevice> Drop for PipelineLayout<D> {
    fn drop(&mut self) {
        if self.handle == vk::PipelineLayout::null() {
            return;
        }
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkPipelineLayout {:p}", self.handle);
        unsafe {
            self.device.destroy_pipeline_layout(self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(bind_flags: BindFlags) -> BindingDescriptor {
        BindingDescriptor::new(ResourceType::Buffer, bind_flags, StageFlags::VERTEX, BindingSlot::new(0, 0))
    }

    #[test]
    fn buffer_descriptor_types() {
        assert_eq!(descriptor_type(&buffer(BindFlags::CONSTANT_BUFFER)).unwrap(), vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(
            descriptor_type(&buffer(BindFlags::CONSTANT_BUFFER | BindFlags::STORAGE)).unwrap(),
            vk::DescriptorType::UNIFORM_BUFFER
        );
        assert_eq!(descriptor_type(&buffer(BindFlags::SAMPLED)).unwrap(), vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(descriptor_type(&buffer(BindFlags::STORAGE)).unwrap(), vk::DescriptorType::STORAGE_BUFFER);
        assert!(matches!(
            descriptor_type(&buffer(BindFlags::VERTEX_BUFFER)),
            Err(Error::UnsupportedBindingType { .. })
        ));
        assert!(descriptor_type(&buffer(BindFlags::empty())).is_err());
    }

    #[test]
    fn texture_and_sampler_descriptor_types() {
        let texture = |flags| BindingDescriptor::new(ResourceType::Texture, flags, StageFlags::FRAGMENT, BindingSlot::new(0, 0));
        assert_eq!(descriptor_type(&texture(BindFlags::SAMPLED)).unwrap(), vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(descriptor_type(&texture(BindFlags::STORAGE)).unwrap(), vk::DescriptorType::STORAGE_IMAGE);
        assert_eq!(
            descriptor_type(&texture(BindFlags::SAMPLED | BindFlags::STORAGE)).unwrap(),
            vk::DescriptorType::SAMPLED_IMAGE
        );
        let sampler = BindingDescriptor::new(ResourceType::Sampler, BindFlags::empty(), StageFlags::FRAGMENT, BindingSlot::new(0, 0));
        assert_eq!(descriptor_type(&sampler).unwrap(), vk::DescriptorType::SAMPLER);
        let undefined = BindingDescriptor::default();
        assert!(descriptor_type(&undefined).is_err());
    }

    #[test]
    fn array_bindings_use_array_size() {
        let descs = [
            buffer(BindFlags::CONSTANT_BUFFER),
            BindingDescriptor::new(ResourceType::Texture, BindFlags::SAMPLED, StageFlags::FRAGMENT, BindingSlot::new(0, 1)).with_array_size(8),
        ];
        let (vk_bindings, layout_bindings) = convert_bindings(&descs).unwrap();
        assert_eq!(vk_bindings[0].descriptor_count, 1);
        assert_eq!(vk_bindings[1].descriptor_count, 8);
        assert_eq!(vk_bindings[1].binding, 1);
        assert_eq!(vk_bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(layout_bindings[1].descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
    }
}
