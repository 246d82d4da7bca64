//! The external-collaborator contract between an `Archive` reader (or a
//! `SerializationDevice` writer) and a real GPU backend: what a create-info
//! looks like for each resource kind, and the `Device`/`ByteSource` traits a
//! concrete backend implements.
//!
//! Nothing in this crate knows how to talk to a GPU — same separation the
//! teacher draws between `graphics-backend-traits` (shapes) and
//! `graphics-backend` (a concrete Vulkan/GL implementation).

pub mod backend_flags;
pub mod binding;
pub mod byte_source;
pub mod device;
pub mod resource;
pub mod stages;

pub use backend_flags::BackendFlags;
pub use binding::PipelineResourceBinding;
pub use byte_source::ByteSource;
pub use device::{
    ComputePipelineStateCreateInfo, Device, DeviceObject, GraphicsPipelineStateCreateInfo,
    GraphicsShaderSet, LockedFields, PipelineType, RayTracingPipelineStateCreateInfo,
    RenderPassCreateInfo, ShaderCreateInfo, ShaderGroupGeneral, ShaderGroupProceduralHit,
    ShaderGroupTriangleHit, ShaderRef, TilePipelineStateCreateInfo,
};
pub use resource::{
    PipelineResourceSignatureDesc, RegisterRange, ResourceFlags, ResourceType, SignatureResource,
};
pub use stages::{d3d11_stage_index, ShaderStages, D3D11_STAGE_ORDER, NUM_D3D11_STAGES};
