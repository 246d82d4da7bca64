use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// The shader stages a resource, shader or pipeline touches.
    ///
    /// Mirrors the teacher's own [`BackendShaderStage`]-style bitflags
    /// (`graphics-backend-traits::plugin`), extended to cover every stage the
    /// binding-assignment rules in §4.5 need to mask against.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const COMPUTE = 1 << 5;
        const AMPLIFICATION = 1 << 6;
        const MESH = 1 << 7;
        const RAY_GEN = 1 << 8;
        const RAY_MISS = 1 << 9;
        const RAY_CLOSEST_HIT = 1 << 10;
        const RAY_ANY_HIT = 1 << 11;
        const RAY_INTERSECTION = 1 << 12;
        const CALLABLE = 1 << 13;
    }
}

impl ShaderStages {
    pub const GRAPHICS: ShaderStages = ShaderStages::from_bits_truncate(
        ShaderStages::VERTEX.bits()
            | ShaderStages::HULL.bits()
            | ShaderStages::DOMAIN.bits()
            | ShaderStages::GEOMETRY.bits()
            | ShaderStages::PIXEL.bits(),
    );

    pub const GRAPHICS_AND_COMPUTE: ShaderStages =
        ShaderStages::from_bits_truncate(ShaderStages::GRAPHICS.bits() | ShaderStages::COMPUTE.bits());
}

/// The D3D11/GL binding rules (§4.5) iterate stages in this fixed order —
/// the stage's position here is its `stageIndex` into `base_bindings`.
pub const D3D11_STAGE_ORDER: [ShaderStages; 6] = [
    ShaderStages::VERTEX,
    ShaderStages::HULL,
    ShaderStages::DOMAIN,
    ShaderStages::GEOMETRY,
    ShaderStages::PIXEL,
    ShaderStages::COMPUTE,
];

pub const NUM_D3D11_STAGES: usize = D3D11_STAGE_ORDER.len();

pub fn d3d11_stage_index(stage: ShaderStages) -> Option<usize> {
    D3D11_STAGE_ORDER.iter().position(|&s| s == stage)
}
