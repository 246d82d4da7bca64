use archive_device_traits::{
    PipelineResourceBinding, PipelineResourceSignatureDesc, ResourceFlags, ShaderStages,
};

/// Per-backend binding-assignment strategy (§4.5). One impl per
/// [`archive_format::BackendTag`], selected by [`crate::get_pipeline_resource_bindings`] —
/// composition over an inheritance hierarchy, since the five backends share
/// almost no code once you get past "iterate signatures in order".
pub trait BindingAssigner {
    fn assign(
        &self,
        signatures: &[&PipelineResourceSignatureDesc],
        stages: ShaderStages,
        num_render_targets: u32,
    ) -> Vec<PipelineResourceBinding>;
}

pub(crate) fn array_size(resource: &archive_device_traits::SignatureResource) -> u32 {
    if resource.flags.contains(ResourceFlags::RUNTIME_ARRAY) {
        0
    } else {
        resource.array_size
    }
}
