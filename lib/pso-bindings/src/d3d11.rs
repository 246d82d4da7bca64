use archive_device_traits::{
    d3d11_stage_index, PipelineResourceBinding, PipelineResourceSignatureDesc, RegisterRange,
    ResourceType, ShaderStages, D3D11_STAGE_ORDER, NUM_D3D11_STAGES,
};

use crate::assigner::{array_size, BindingAssigner};

const NUM_RANGES: usize = 4;

fn range_index(range: RegisterRange) -> usize {
    match range {
        RegisterRange::ConstantBuffer => 0,
        RegisterRange::ShaderResource => 1,
        RegisterRange::Sampler => 2,
        RegisterRange::UnorderedAccess => 3,
    }
}

/// D3D11-style binding assignment: per-stage, per-register-range base
/// counters that shift forward after each signature is consumed.
///
/// Also backs the Metal assigner and (stage-agnostic) the GL assigner —
/// see [`crate::metal::MetalAssigner`] and [`crate::gl::GlAssigner`].
pub struct D3D11Assigner;

impl BindingAssigner for D3D11Assigner {
    fn assign(
        &self,
        signatures: &[&PipelineResourceSignatureDesc],
        stages: ShaderStages,
        num_render_targets: u32,
    ) -> Vec<PipelineResourceBinding> {
        let active_stages = stages & ShaderStages::GRAPHICS_AND_COMPUTE;

        let mut base = [[0u32; NUM_D3D11_STAGES]; NUM_RANGES];
        let pixel_idx = d3d11_stage_index(ShaderStages::PIXEL).expect("pixel is a d3d11 stage");
        base[range_index(RegisterRange::UnorderedAccess)][pixel_idx] = num_render_targets;

        let mut out = Vec::new();

        for sig in signatures {
            let mut shift = [[0u32; NUM_D3D11_STAGES]; NUM_RANGES];

            for resource in sig.all_bindings() {
                let range = range_index(resource.resource_type.register_range());
                for (stage_idx, &stage) in D3D11_STAGE_ORDER.iter().enumerate() {
                    if !active_stages.contains(stage) || !resource.stages.contains(stage) {
                        continue;
                    }
                    let bind_point = resource.d3d11_bind_points[stage_idx].unwrap_or(0);
                    out.push(PipelineResourceBinding {
                        name: resource.name.clone(),
                        resource_type: resource.resource_type,
                        shader_stages: stage,
                        array_size: array_size(resource),
                        register: base[range][stage_idx] + bind_point,
                        space: 0,
                    });
                    shift[range][stage_idx] += 1;
                }
            }

            for range in 0..NUM_RANGES {
                for stage_idx in 0..NUM_D3D11_STAGES {
                    base[range][stage_idx] += shift[range][stage_idx];
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_device_traits::{PipelineResourceSignatureDesc, ResourceFlags, SignatureResource};

    fn cbuf(name: &str, stages: ShaderStages) -> SignatureResource {
        SignatureResource::unassigned(name, ResourceType::ConstantBuffer, stages, 1, ResourceFlags::empty())
    }

    #[test]
    fn pixel_uav_starts_after_render_targets() {
        let mut uav = SignatureResource::unassigned(
            "g_output",
            ResourceType::TextureUav,
            ShaderStages::PIXEL,
            1,
            ResourceFlags::empty(),
        );
        uav.d3d11_bind_points[d3d11_stage_index(ShaderStages::PIXEL).unwrap()] = Some(0);

        let sig = PipelineResourceSignatureDesc {
            name: "sig0".into(),
            binding_index: 0,
            resources: vec![uav],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: None,
            vulkan_dynamic_set_size: None,
        };

        let bindings = D3D11Assigner.assign(&[&sig], ShaderStages::GRAPHICS_AND_COMPUTE, 3);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].register, 3);
    }

    #[test]
    fn second_signature_bindings_shift_past_first() {
        let mut a = cbuf("a", ShaderStages::VERTEX);
        a.d3d11_bind_points[d3d11_stage_index(ShaderStages::VERTEX).unwrap()] = Some(0);
        let sig0 = PipelineResourceSignatureDesc {
            name: "sig0".into(),
            binding_index: 0,
            resources: vec![a],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: None,
            vulkan_dynamic_set_size: None,
        };

        let mut b = cbuf("b", ShaderStages::VERTEX);
        b.d3d11_bind_points[d3d11_stage_index(ShaderStages::VERTEX).unwrap()] = Some(0);
        let sig1 = PipelineResourceSignatureDesc {
            name: "sig1".into(),
            binding_index: 1,
            resources: vec![b],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: None,
            vulkan_dynamic_set_size: None,
        };

        let bindings = D3D11Assigner.assign(&[&sig0, &sig1], ShaderStages::GRAPHICS_AND_COMPUTE, 0);
        assert_eq!(bindings[0].register, 0);
        assert_eq!(bindings[1].register, 1);
    }
}
