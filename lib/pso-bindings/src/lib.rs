//! The binding-assignment algorithm (§4.5): given a signature list and an
//! active backend, decide where each resource lands in that backend's
//! register/space/binding vocabulary.
//!
//! This is the read side's largest single component and is reused verbatim
//! by the write side's offline preview (`pso-archiver::SerializationDevice`).

pub mod assigner;
pub mod d3d11;
pub mod d3d12;
pub mod gl;
pub mod metal;
pub mod vulkan;

pub use assigner::BindingAssigner;
pub use d3d11::D3D11Assigner;
pub use d3d12::D3D12Assigner;
pub use gl::GlAssigner;
pub use metal::{MetalArgBufferCount, MetalAssigner};
pub use vulkan::VulkanAssigner;

use archive_device_traits::{PipelineResourceBinding, PipelineResourceSignatureDesc, ShaderStages};
use archive_format::{ArchiveError, BackendTag, Result};

/// Sorts `signatures` by `binding_index`, validates the indices densely
/// fill `[0, N)` with no gaps or duplicates, then dispatches to the
/// backend's [`BindingAssigner`].
///
/// Pure function of its inputs (§8 law 7) — same inputs always produce the
/// same `Vec`, in the same order.
pub fn get_pipeline_resource_bindings(
    signatures: &[PipelineResourceSignatureDesc],
    backend: BackendTag,
    stages: ShaderStages,
    num_render_targets: u32,
) -> Result<Vec<PipelineResourceBinding>> {
    let mut ordered: Vec<&PipelineResourceSignatureDesc> = signatures.iter().collect();
    ordered.sort_by_key(|s| s.binding_index);

    for (expected, sig) in ordered.iter().enumerate() {
        if sig.binding_index != expected as u32 {
            return Err(ArchiveError::InvalidSignatureLayout(format!(
                "expected binding_index {expected}, found {} (signature {:?})",
                sig.binding_index, sig.name
            )));
        }
    }

    let bindings = match backend {
        BackendTag::OpenGl => GlAssigner.assign(&ordered, stages, num_render_targets),
        BackendTag::Direct3D11 => D3D11Assigner.assign(&ordered, stages, num_render_targets),
        BackendTag::Direct3D12 => D3D12Assigner.assign(&ordered, stages, num_render_targets),
        BackendTag::Vulkan => VulkanAssigner.assign(&ordered, stages, num_render_targets),
        BackendTag::MetalIos => MetalAssigner { arg_buffer_count: MetalArgBufferCount::Ios }
            .assign(&ordered, stages, num_render_targets),
        BackendTag::MetalMacos => MetalAssigner { arg_buffer_count: MetalArgBufferCount::MacOs }
            .assign(&ordered, stages, num_render_targets),
    };

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_device_traits::{ResourceFlags, ResourceType, SignatureResource};

    fn sig(binding_index: u32) -> PipelineResourceSignatureDesc {
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
            vulkan_static_mutable_set_size: None,
            vulkan_dynamic_set_size: None,
        }
    }

    #[test]
    fn gap_in_binding_index_is_rejected() {
        let signatures = vec![sig(0), sig(2)];
        let err = get_pipeline_resource_bindings(
            &signatures,
            BackendTag::Vulkan,
            ShaderStages::VERTEX,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidSignatureLayout(_)));
    }

    #[test]
    fn out_of_order_input_is_sorted_before_assignment() {
        let signatures = vec![sig(1), sig(0)];
        let bindings = get_pipeline_resource_bindings(
            &signatures,
            BackendTag::Direct3D12,
            ShaderStages::VERTEX,
            0,
        )
        .unwrap();
        assert_eq!(bindings[0].space, 0);
        assert_eq!(bindings[1].space, 1);
    }

    #[test]
    fn same_inputs_produce_identical_output() {
        let signatures = vec![sig(0), sig(1)];
        let a = get_pipeline_resource_bindings(&signatures, BackendTag::Vulkan, ShaderStages::VERTEX, 0).unwrap();
        let b = get_pipeline_resource_bindings(&signatures, BackendTag::Vulkan, ShaderStages::VERTEX, 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn vulkan_two_signature_scenario_matches_the_documented_register_and_space_sequence() {
        let mut a0 = SignatureResource::unassigned(
            "a0",
            ResourceType::ConstantBuffer,
            ShaderStages::VERTEX,
            1,
            ResourceFlags::empty(),
        );
        a0.vulkan_descriptor_set = 0;
        a0.vulkan_binding = 0;

        let mut a1 = SignatureResource::unassigned(
            "a1",
            ResourceType::ConstantBuffer,
            ShaderStages::VERTEX,
            1,
            ResourceFlags::empty(),
        );
        a1.vulkan_descriptor_set = 0;
        a1.vulkan_binding = 1;

        let sig_a = PipelineResourceSignatureDesc {
            name: "a".to_string(),
            binding_index: 0,
            resources: vec![a0, a1],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: Some(2),
            vulkan_dynamic_set_size: None,
        };

        let mut b0 = SignatureResource::unassigned(
            "b0",
            ResourceType::ConstantBuffer,
            ShaderStages::VERTEX,
            1,
            ResourceFlags::empty(),
        );
        b0.vulkan_descriptor_set = 0;
        b0.vulkan_binding = 0;

        let sig_b = PipelineResourceSignatureDesc {
            name: "b".to_string(),
            binding_index: 1,
            resources: vec![b0],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: None,
            vulkan_dynamic_set_size: Some(1),
        };

        let bindings = get_pipeline_resource_bindings(
            &[sig_a, sig_b],
            BackendTag::Vulkan,
            ShaderStages::VERTEX,
            0,
        )
        .unwrap();

        let spaces: Vec<u32> = bindings.iter().map(|b| b.space).collect();
        let registers: Vec<u32> = bindings.iter().map(|b| b.register).collect();
        assert_eq!(spaces, vec![0, 0, 1]);
        assert_eq!(registers, vec![0, 1, 0]);
    }
}
