use archive_device_traits::{PipelineResourceBinding, PipelineResourceSignatureDesc, ShaderStages};

use crate::assigner::{array_size, BindingAssigner};

/// Vulkan descriptor-set binding: a running `desc_set_layout_count` that
/// each signature shifts forward by however many of its two possible
/// descriptor-set layouts (static/mutable, dynamic) it actually contributed.
pub struct VulkanAssigner;

impl BindingAssigner for VulkanAssigner {
    fn assign(
        &self,
        signatures: &[&PipelineResourceSignatureDesc],
        stages: ShaderStages,
        _num_render_targets: u32,
    ) -> Vec<PipelineResourceBinding> {
        let mut desc_set_layout_count = 0u32;
        let mut out = Vec::new();

        for sig in signatures {
            for resource in sig.all_bindings() {
                if !resource.stages.intersects(stages) {
                    continue;
                }
                out.push(PipelineResourceBinding {
                    name: resource.name.clone(),
                    resource_type: resource.resource_type,
                    shader_stages: resource.stages,
                    array_size: array_size(resource),
                    register: resource.vulkan_binding,
                    space: desc_set_layout_count + resource.vulkan_descriptor_set,
                });
            }

            desc_set_layout_count += sig.vulkan_static_mutable_set_size.is_some() as u32
                + sig.vulkan_dynamic_set_size.is_some() as u32;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_device_traits::{ResourceFlags, ResourceType, SignatureResource};

    fn sig(binding_index: u32, static_mutable: Option<u32>, dynamic: Option<u32>) -> PipelineResourceSignatureDesc {
        PipelineResourceSignatureDesc {
            name: format!("sig{binding_index}"),
            binding_index,
            resources: vec![SignatureResource::unassigned(
                "r",
                ResourceType::ConstantBuffer,
                ShaderStages::VERTEX,
                1,
                ResourceFlags::empty(),
            )],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: static_mutable,
            vulkan_dynamic_set_size: dynamic,
        }
    }

    #[test]
    fn set_count_advances_by_non_empty_sets_only() {
        let sig0 = sig(0, Some(4), Some(2));
        let sig1 = sig(1, Some(1), None);

        let bindings = VulkanAssigner.assign(&[&sig0, &sig1], ShaderStages::VERTEX, 0);
        assert_eq!(bindings[0].space, 0);
        // sig0 contributed 2 sets (static/mutable + dynamic), so sig1 starts at 2.
        assert_eq!(bindings[1].space, 2);
    }

    #[test]
    fn signature_with_no_vulkan_sets_does_not_advance_count() {
        let sig0 = sig(0, None, None);
        let sig1 = sig(1, Some(1), None);

        let bindings = VulkanAssigner.assign(&[&sig0, &sig1], ShaderStages::VERTEX, 0);
        assert_eq!(bindings[0].space, 0);
        assert_eq!(bindings[1].space, 0);
    }
}
