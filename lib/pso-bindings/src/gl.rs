use archive_device_traits::{
    PipelineResourceBinding, PipelineResourceSignatureDesc, RegisterRange, ShaderStages,
    D3D11_STAGE_ORDER,
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

/// GL/GLES binding assignment: same four register ranges as D3D11, but one
/// counter per range shared across every stage (GL cache slots aren't
/// per-stage) rather than per-`(range, stage)`.
pub struct GlAssigner;

impl BindingAssigner for GlAssigner {
    fn assign(
        &self,
        signatures: &[&PipelineResourceSignatureDesc],
        stages: ShaderStages,
        _num_render_targets: u32,
    ) -> Vec<PipelineResourceBinding> {
        let active_stages = stages & ShaderStages::GRAPHICS_AND_COMPUTE;
        let mut base = [0u32; NUM_RANGES];
        let mut out = Vec::new();

        for sig in signatures {
            let mut shift = [0u32; NUM_RANGES];

            for resource in sig.all_bindings() {
                let range = range_index(resource.resource_type.register_range());
                let mut touched = false;
                for &stage in D3D11_STAGE_ORDER.iter() {
                    if !active_stages.contains(stage) || !resource.stages.contains(stage) {
                        continue;
                    }
                    out.push(PipelineResourceBinding {
                        name: resource.name.clone(),
                        resource_type: resource.resource_type,
                        shader_stages: stage,
                        array_size: array_size(resource),
                        register: base[range] + resource.gl_cache_offset,
                        space: 0,
                    });
                    touched = true;
                }
                if touched {
                    shift[range] += 1;
                }
            }

            for range in 0..NUM_RANGES {
                base[range] += shift[range];
            }
        }

        out
    }
}
