use std::any::Any;
use std::sync::Arc;

use crate::resource::PipelineResourceSignatureDesc;
use crate::stages::ShaderStages;

/// A constructed backend object, handed back opaque. The unpacker never
/// looks inside — it only stores it in a cache cell and threads it into
/// whatever create-info needs it next (a shader into a pipeline state, a
/// signature into a pipeline state, ...).
pub type DeviceObject = Arc<dyn Any + Send + Sync>;

/// A reference to a shader slot inside a pipeline create-info.
///
/// Wire format stores a shader index (ray-tracing's sentinel `u32::MAX`
/// meaning "no shader" — §9 Open Question resolution: any other
/// out-of-range index is a hard [`archive_format::ArchiveError::DecodeUnderflow`],
/// never a silent `Resolved(None)`). The unpacker (§4.6 step 6) rewrites
/// `Unresolved` to `Resolved` in place once the shader cache has the object.
#[derive(Debug, Clone)]
pub enum ShaderRef {
    Unresolved(u32),
    Resolved(Option<DeviceObject>),
}

/// Which of the four PSO kinds a create-info describes — used only for the
/// locked-field identity check (§4.6 step 8): a mutation callback may change
/// backend-specific extension fields but must not change the pipeline's
/// type, its resource layout, or its signature list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineType {
    Graphics,
    Compute,
    RayTracing,
    Tile,
}

/// Snapshot of the fields a mutation callback is forbidden to change.
/// Compared by value before/after the callback runs; any difference is
/// [`archive_format::ArchiveError::IllegalModification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedFields {
    pub pipeline_type: PipelineType,
    pub signature_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ShaderCreateInfo<'a> {
    pub name: &'a str,
    pub stage: ShaderStages,
    pub bytecode: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct RenderPassCreateInfo<'a> {
    pub name: &'a str,
    pub color_attachment_count: u32,
    pub has_depth_stencil: bool,
}

#[derive(Debug, Clone)]
pub struct GraphicsShaderSet {
    pub vertex: ShaderRef,
    pub hull: Option<ShaderRef>,
    pub domain: Option<ShaderRef>,
    pub geometry: Option<ShaderRef>,
    pub pixel: Option<ShaderRef>,
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineStateCreateInfo<'a> {
    pub name: &'a str,
    pub signature_names: Vec<String>,
    pub render_pass_name: Option<&'a str>,
    pub render_pass: Option<DeviceObject>,
    pub signatures: Vec<Arc<PipelineResourceSignatureDesc>>,
    pub signature_objects: Vec<DeviceObject>,
    pub shaders: GraphicsShaderSet,
}

#[derive(Debug, Clone)]
pub struct ComputePipelineStateCreateInfo<'a> {
    pub name: &'a str,
    pub signature_names: Vec<String>,
    pub signatures: Vec<Arc<PipelineResourceSignatureDesc>>,
    pub signature_objects: Vec<DeviceObject>,
    pub compute_shader: ShaderRef,
}

#[derive(Debug, Clone)]
pub struct TilePipelineStateCreateInfo<'a> {
    pub name: &'a str,
    pub signature_names: Vec<String>,
    pub signatures: Vec<Arc<PipelineResourceSignatureDesc>>,
    pub signature_objects: Vec<DeviceObject>,
    pub tile_shader: ShaderRef,
}

#[derive(Debug, Clone)]
pub struct ShaderGroupGeneral {
    pub shader: ShaderRef,
}

#[derive(Debug, Clone)]
pub struct ShaderGroupTriangleHit {
    pub closest_hit: ShaderRef,
    pub any_hit: ShaderRef,
}

#[derive(Debug, Clone)]
pub struct ShaderGroupProceduralHit {
    pub intersection: ShaderRef,
    pub closest_hit: ShaderRef,
    pub any_hit: ShaderRef,
}

#[derive(Debug, Clone)]
pub struct RayTracingPipelineStateCreateInfo<'a> {
    pub name: &'a str,
    pub signature_names: Vec<String>,
    pub signatures: Vec<Arc<PipelineResourceSignatureDesc>>,
    pub signature_objects: Vec<DeviceObject>,
    pub general_shaders: Vec<ShaderGroupGeneral>,
    pub triangle_hit_groups: Vec<ShaderGroupTriangleHit>,
    pub procedural_hit_groups: Vec<ShaderGroupProceduralHit>,
    pub max_recursion_depth: u32,
}

/// The external GPU-backend collaborator the archive hands fully-resolved
/// create-infos to. Implemented by whatever real backend (Vulkan, D3D12,
/// ...) is wired in at the call site — actual device/GPU-object creation is
/// out of scope here, same as the teacher's own `GraphicsBackendInterface`
/// only describes the shape of backend calls without owning the backend.
///
/// Object-safe by construction: no generic methods, every return boxed
/// behind `Arc<dyn Any + Send + Sync>`.
pub trait Device: Send + Sync {
    fn create_shader(&self, ci: &ShaderCreateInfo<'_>) -> anyhow::Result<DeviceObject>;

    fn create_render_pass(&self, ci: &RenderPassCreateInfo<'_>) -> anyhow::Result<DeviceObject>;

    fn create_pipeline_resource_signature(
        &self,
        desc: &PipelineResourceSignatureDesc,
    ) -> anyhow::Result<DeviceObject>;

    fn create_graphics_pipeline_state(
        &self,
        ci: &GraphicsPipelineStateCreateInfo<'_>,
    ) -> anyhow::Result<DeviceObject>;

    fn create_compute_pipeline_state(
        &self,
        ci: &ComputePipelineStateCreateInfo<'_>,
    ) -> anyhow::Result<DeviceObject>;

    fn create_tile_pipeline_state(
        &self,
        ci: &TilePipelineStateCreateInfo<'_>,
    ) -> anyhow::Result<DeviceObject>;

    fn create_ray_tracing_pipeline_state(
        &self,
        ci: &RayTracingPipelineStateCreateInfo<'_>,
    ) -> anyhow::Result<DeviceObject>;
}
