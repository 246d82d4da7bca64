use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::stages::ShaderStages;

/// What a resource binding in a signature is used for.
///
/// Closed, same way [`archive_format::header::BackendTag`] is closed — adding
/// a new resource kind is a format-version bump, not an open extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    ConstantBuffer,
    TextureSrv,
    BufferSrv,
    TextureUav,
    BufferUav,
    Sampler,
    InputAttachment,
    AccelStructure,
}

/// The traditional four register ranges every non-Vulkan backend's binding
/// rules key off of (§4.5 D3D11/GL "per-range counters", D3D12 root tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterRange {
    ConstantBuffer,
    ShaderResource,
    Sampler,
    UnorderedAccess,
}

impl ResourceType {
    pub fn register_range(self) -> RegisterRange {
        match self {
            ResourceType::ConstantBuffer => RegisterRange::ConstantBuffer,
            ResourceType::TextureSrv
            | ResourceType::BufferSrv
            | ResourceType::InputAttachment
            | ResourceType::AccelStructure => RegisterRange::ShaderResource,
            ResourceType::Sampler => RegisterRange::Sampler,
            ResourceType::TextureUav | ResourceType::BufferUav => RegisterRange::UnorderedAccess,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ResourceFlags: u32 {
        /// Resource is a runtime-sized array; `array_size` is a maximum, not
        /// an exact count.
        const RUNTIME_ARRAY = 1 << 0;
        /// Resource may be unbound/sparse within its array range.
        const PARTIALLY_BOUND = 1 << 1;
    }
}

/// One binding slot inside a [`PipelineResourceSignatureDesc`] — either an
/// ordinary resource or, when placed in `immutable_samplers`, a sampler baked
/// into the signature at creation time.
///
/// Per-backend attribute fields below are the already-merged values the
/// unpacker (§4.6 step 3) produces by combining the common per-resource bytes
/// with the active backend's block; see DESIGN.md for the reasoning behind
/// collapsing the wire format's "one block per backend" storage into this
/// single in-memory struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureResource {
    pub name: String,
    pub resource_type: ResourceType,
    pub stages: ShaderStages,
    pub array_size: u32,
    pub flags: ResourceFlags,

    pub d3d11_bind_points: [Option<u32>; crate::stages::NUM_D3D11_STAGES],
    pub d3d12_register: u32,
    pub d3d12_space: u32,
    pub gl_cache_offset: u32,
    pub vulkan_descriptor_set: u32,
    pub vulkan_binding: u32,
}

impl SignatureResource {
    /// A freshly-decoded resource before `pso-bindings` has assigned any
    /// backend-specific location.
    pub fn unassigned(
        name: impl Into<String>,
        resource_type: ResourceType,
        stages: ShaderStages,
        array_size: u32,
        flags: ResourceFlags,
    ) -> Self {
        SignatureResource {
            name: name.into(),
            resource_type,
            stages,
            array_size,
            flags,
            d3d11_bind_points: [None; crate::stages::NUM_D3D11_STAGES],
            d3d12_register: 0,
            d3d12_space: 0,
            gl_cache_offset: 0,
            vulkan_descriptor_set: 0,
            vulkan_binding: 0,
        }
    }
}

/// A resource signature: a reusable, ordered group of bindings (§3 resource
/// directory "signatures", §4.5's unit of binding assignment).
///
/// The two Vulkan set sizes use the wire format's own sentinel
/// (`u32::MAX` == "this signature contributes no such set") rather than an
/// `Option<u32>` on the wire, but are exposed here already translated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResourceSignatureDesc {
    pub name: String,
    pub binding_index: u32,
    pub resources: Vec<SignatureResource>,
    pub immutable_samplers: Vec<SignatureResource>,
    pub vulkan_static_mutable_set_size: Option<u32>,
    pub vulkan_dynamic_set_size: Option<u32>,
}

impl PipelineResourceSignatureDesc {
    /// All bindings in assignment order: ordinary resources first, then
    /// immutable samplers (§4.5 tie-break rule).
    pub fn all_bindings(&self) -> impl Iterator<Item = &SignatureResource> {
        self.resources.iter().chain(self.immutable_samplers.iter())
    }

    pub fn all_bindings_mut(&mut self) -> impl Iterator<Item = &mut SignatureResource> {
        self.resources.iter_mut().chain(self.immutable_samplers.iter_mut())
    }
}
