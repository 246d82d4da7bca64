use serde::{Deserialize, Serialize};

use crate::resource::ResourceType;
use crate::stages::ShaderStages;

/// One resolved binding location, as produced by a `pso-bindings`
/// `BindingAssigner` and consumed both by the unpacker (to wire shaders
/// together, §4.6) and by `get_pipeline_resource_bindings` offline preview
/// (§4.8 write side).
///
/// `register`/`space` read as D3D-style register + space for D3D11/D3D12,
/// as a flat binding slot for GL, and as `(descriptor_set, binding)` packed
/// into `space`/`register` respectively for Vulkan — the field names are
/// generic on purpose since the five backends don't share a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResourceBinding {
    pub name: String,
    pub resource_type: ResourceType,
    pub shader_stages: ShaderStages,
    pub array_size: u32,
    pub register: u32,
    pub space: u32,
}
