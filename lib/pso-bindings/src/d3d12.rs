use archive_device_traits::{PipelineResourceBinding, PipelineResourceSignatureDesc, ShaderStages};

use crate::assigner::{array_size, BindingAssigner};

/// D3D12 root-signature binding: every signature gets its own register
/// space equal to its `binding_index` (signatures are already dense and
/// ordered by the time they reach here — see
/// [`crate::get_pipeline_resource_bindings`]).
pub struct D3D12Assigner;

impl BindingAssigner for D3D12Assigner {
    fn assign(
        &self,
        signatures: &[&PipelineResourceSignatureDesc],
        stages: ShaderStages,
        _num_render_targets: u32,
    ) -> Vec<PipelineResourceBinding> {
        let mut out = Vec::new();

        for sig in signatures {
            let base_register_space = sig.binding_index;
            for resource in sig.all_bindings() {
                if !resource.stages.intersects(stages) {
                    continue;
                }
                out.push(PipelineResourceBinding {
                    name: resource.name.clone(),
                    resource_type: resource.resource_type,
                    shader_stages: resource.stages,
                    array_size: array_size(resource),
                    register: resource.d3d12_register,
                    space: base_register_space + resource.d3d12_space,
                });
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
    fn register_spaces_are_keyed_by_signature_binding_index() {
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
        let sig1 = PipelineResourceSignatureDesc {
            name: "sig1".into(),
            binding_index: 1,
            resources: vec![SignatureResource::unassigned(
                "b",
                ResourceType::ConstantBuffer,
                ShaderStages::VERTEX,
                1,
                ResourceFlags::empty(),
            )],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: None,
            vulkan_dynamic_set_size: None,
        };

        let bindings = D3D12Assigner.assign(&[&sig0, &sig1], ShaderStages::VERTEX, 0);
        assert_eq!(bindings[0].space, 0);
        assert_eq!(bindings[1].space, 1);
    }
}
