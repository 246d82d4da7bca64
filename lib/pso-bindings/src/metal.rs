use archive_device_traits::{
    PipelineResourceBinding, PipelineResourceSignatureDesc, ShaderStages, D3D11_STAGE_ORDER,
    NUM_D3D11_STAGES,
};

use crate::assigner::{array_size, BindingAssigner};

/// The platform's maximum simultaneous argument-buffer count, which stands
/// in for D3D11's register ranges in Metal's binding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetalArgBufferCount {
    Ios,
    MacOs,
}

impl MetalArgBufferCount {
    fn slot(self) -> u32 {
        match self {
            MetalArgBufferCount::Ios => 31,
            MetalArgBufferCount::MacOs => 8,
        }
    }
}

/// Metal argument-buffer binding: shares D3D11's per-stage accumulation
/// pattern, but keyed by a single platform-chosen argument-buffer slot
/// instead of by register range.
pub struct MetalAssigner {
    pub arg_buffer_count: MetalArgBufferCount,
}

impl BindingAssigner for MetalAssigner {
    fn assign(
        &self,
        signatures: &[&PipelineResourceSignatureDesc],
        stages: ShaderStages,
        _num_render_targets: u32,
    ) -> Vec<PipelineResourceBinding> {
        let active_stages = stages & ShaderStages::GRAPHICS_AND_COMPUTE;
        let mut base = [0u32; NUM_D3D11_STAGES];
        let slot = self.arg_buffer_count.slot();
        let mut out = Vec::new();

        for sig in signatures {
            let mut shift = [0u32; NUM_D3D11_STAGES];

            for resource in sig.all_bindings() {
                for (stage_idx, &stage) in D3D11_STAGE_ORDER.iter().enumerate() {
                    if !active_stages.contains(stage) || !resource.stages.contains(stage) {
                        continue;
                    }
                    out.push(PipelineResourceBinding {
                        name: resource.name.clone(),
                        resource_type: resource.resource_type,
                        shader_stages: stage,
                        array_size: array_size(resource),
                        register: base[stage_idx] + resource.gl_cache_offset,
                        space: slot,
                    });
                    shift[stage_idx] += 1;
                }
            }

            for stage_idx in 0..NUM_D3D11_STAGES {
                base[stage_idx] += shift[stage_idx];
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_device_traits::{ResourceFlags, ResourceType, SignatureResource};

    #[test]
    fn space_is_fixed_to_the_platform_arg_buffer_slot() {
        let sig0 = PipelineResourceSignatureDesc {
            name: "sig0".into(),
            binding_index: 0,
            resources: vec![SignatureResource::unassigned(
                "a",
                ResourceType::ConstantBuffer,
                ShaderStages::VERTEX,
                1,
                ResourceFlags::empty(),
            )],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: None,
            vulkan_dynamic_set_size: None,
        };

        let bindings = MetalAssigner { arg_buffer_count: MetalArgBufferCount::Ios }
            .assign(&[&sig0], ShaderStages::GRAPHICS_AND_COMPUTE, 0);
        assert_eq!(bindings[0].space, 31);
        assert_eq!(bindings[0].register, 0);
    }
}
