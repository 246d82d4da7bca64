//! Wire layout for the per-entry "common bytes" every PSO kind, render pass
//! and resource signature starts with (§4.6 step 3): a [`archive_format::ChunkType`]
//! tag for the type-mismatch check, the kind's own fields, and a trailing
//! per-backend size table gating the backend-specific block lookup
//! (§4.6 step 5).
//!
//! Backend-specific payload bytes themselves aren't modeled here: the
//! abstract [`archive_device_traits::Device`] this crate targets consumes
//! already-resolved descriptors, not raw backend bytes, so only the size
//! (needed for the `MissingBackendData` gate) is kept — see DESIGN.md.

use archive_format::header::{ChunkType, NUM_BACKENDS};
use archive_format::{ArchiveError, Result, Serializer};

pub const NO_SHADER: u32 = u32::MAX;

fn encode_tag(ser: &mut Serializer<'_>, ty: ChunkType) -> Result<()> {
    let mut tag = ty.as_u32();
    ser.u32(&mut tag)
}

fn decode_and_check_tag(ser: &mut Serializer<'_>, expected: ChunkType) -> Result<()> {
    let mut tag = 0u32;
    ser.u32(&mut tag)?;
    let found = ChunkType::from_u32(tag)?;
    if found != expected {
        return Err(ArchiveError::TypeMismatch {
            found: format!("{found:?}"),
            expected: format!("{expected:?}"),
        });
    }
    Ok(())
}

fn encode_name_list(ser: &mut Serializer<'_>, names: &[String]) -> Result<()> {
    let mut count = names.len() as u32;
    ser.u32(&mut count)?;
    for name in names {
        ser.cstr_encode(name)?;
    }
    Ok(())
}

fn decode_name_list(ser: &mut Serializer<'_>) -> Result<Vec<String>> {
    let mut count = 0u32;
    ser.u32(&mut count)?;
    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        names.push(ser.cstr_decode()?.to_string());
    }
    Ok(names)
}

fn encode_backend_sizes(ser: &mut Serializer<'_>, sizes: &[u32; NUM_BACKENDS]) -> Result<()> {
    for size in sizes {
        let mut size = *size;
        ser.u32(&mut size)?;
    }
    Ok(())
}

fn decode_backend_sizes(ser: &mut Serializer<'_>) -> Result<[u32; NUM_BACKENDS]> {
    let mut sizes = [0u32; NUM_BACKENDS];
    for slot in sizes.iter_mut() {
        ser.u32(slot)?;
    }
    Ok(sizes)
}

fn encode_shader_ref(ser: &mut Serializer<'_>, index: Option<u32>) -> Result<()> {
    let mut raw = index.unwrap_or(NO_SHADER);
    ser.u32(&mut raw)
}

fn decode_shader_ref(ser: &mut Serializer<'_>) -> Result<u32> {
    let mut raw = 0u32;
    ser.u32(&mut raw)?;
    Ok(raw)
}

#[derive(Debug, Clone)]
pub struct RawGraphicsEntry {
    pub signature_names: Vec<String>,
    pub render_pass_name: Option<String>,
    pub vertex_shader: u32,
    pub hull_shader: u32,
    pub domain_shader: u32,
    pub geometry_shader: u32,
    pub pixel_shader: u32,
    pub backend_sizes: [u32; NUM_BACKENDS],
}

pub fn encode_graphics_entry(ser: &mut Serializer<'_>, e: &RawGraphicsEntry) -> Result<()> {
    encode_tag(ser, ChunkType::GraphicsPipelineStates)?;
    encode_name_list(ser, &e.signature_names)?;
    let mut has_rp = e.render_pass_name.is_some() as u8;
    ser.u8(&mut has_rp)?;
    if let Some(name) = &e.render_pass_name {
        ser.cstr_encode(name)?;
    }
    encode_shader_ref(ser, Some(e.vertex_shader).filter(|&v| v != NO_SHADER))?;
    encode_shader_ref(ser, Some(e.hull_shader).filter(|&v| v != NO_SHADER))?;
    encode_shader_ref(ser, Some(e.domain_shader).filter(|&v| v != NO_SHADER))?;
    encode_shader_ref(ser, Some(e.geometry_shader).filter(|&v| v != NO_SHADER))?;
    encode_shader_ref(ser, Some(e.pixel_shader).filter(|&v| v != NO_SHADER))?;
    encode_backend_sizes(ser, &e.backend_sizes)?;
    Ok(())
}

pub fn decode_graphics_entry(ser: &mut Serializer<'_>) -> Result<RawGraphicsEntry> {
    decode_and_check_tag(ser, ChunkType::GraphicsPipelineStates)?;
    let signature_names = decode_name_list(ser)?;
    let mut has_rp = 0u8;
    ser.u8(&mut has_rp)?;
    let render_pass_name = if has_rp != 0 {
        Some(ser.cstr_decode()?.to_string())
    } else {
        None
    };
    let vertex_shader = decode_shader_ref(ser)?;
    let hull_shader = decode_shader_ref(ser)?;
    let domain_shader = decode_shader_ref(ser)?;
    let geometry_shader = decode_shader_ref(ser)?;
    let pixel_shader = decode_shader_ref(ser)?;
    let backend_sizes = decode_backend_sizes(ser)?;
    Ok(RawGraphicsEntry {
        signature_names,
        render_pass_name,
        vertex_shader,
        hull_shader,
        domain_shader,
        geometry_shader,
        pixel_shader,
        backend_sizes,
    })
}

#[derive(Debug, Clone)]
pub struct RawComputeEntry {
    pub signature_names: Vec<String>,
    pub compute_shader: u32,
    pub backend_sizes: [u32; NUM_BACKENDS],
}

pub fn encode_compute_entry(ser: &mut Serializer<'_>, e: &RawComputeEntry) -> Result<()> {
    encode_tag(ser, ChunkType::ComputePipelineStates)?;
    encode_name_list(ser, &e.signature_names)?;
    let mut shader = e.compute_shader;
    ser.u32(&mut shader)?;
    encode_backend_sizes(ser, &e.backend_sizes)?;
    Ok(())
}

pub fn decode_compute_entry(ser: &mut Serializer<'_>) -> Result<RawComputeEntry> {
    decode_and_check_tag(ser, ChunkType::ComputePipelineStates)?;
    let signature_names = decode_name_list(ser)?;
    let mut compute_shader = 0u32;
    ser.u32(&mut compute_shader)?;
    let backend_sizes = decode_backend_sizes(ser)?;
    Ok(RawComputeEntry {
        signature_names,
        compute_shader,
        backend_sizes,
    })
}

#[derive(Debug, Clone)]
pub struct RawTileEntry {
    pub signature_names: Vec<String>,
    pub tile_shader: u32,
    pub backend_sizes: [u32; NUM_BACKENDS],
}

pub fn encode_tile_entry(ser: &mut Serializer<'_>, e: &RawTileEntry) -> Result<()> {
    encode_tag(ser, ChunkType::TilePipelineStates)?;
    encode_name_list(ser, &e.signature_names)?;
    let mut shader = e.tile_shader;
    ser.u32(&mut shader)?;
    encode_backend_sizes(ser, &e.backend_sizes)?;
    Ok(())
}

pub fn decode_tile_entry(ser: &mut Serializer<'_>) -> Result<RawTileEntry> {
    decode_and_check_tag(ser, ChunkType::TilePipelineStates)?;
    let signature_names = decode_name_list(ser)?;
    let mut tile_shader = 0u32;
    ser.u32(&mut tile_shader)?;
    let backend_sizes = decode_backend_sizes(ser)?;
    Ok(RawTileEntry {
        signature_names,
        tile_shader,
        backend_sizes,
    })
}

#[derive(Debug, Clone)]
pub struct RawTriangleHitGroup {
    pub closest_hit: u32,
    pub any_hit: u32,
}

#[derive(Debug, Clone)]
pub struct RawProceduralHitGroup {
    pub intersection: u32,
    pub closest_hit: u32,
    pub any_hit: u32,
}

#[derive(Debug, Clone)]
pub struct RawRayTracingEntry {
    pub signature_names: Vec<String>,
    pub max_recursion_depth: u32,
    pub general_shaders: Vec<u32>,
    pub triangle_hit_groups: Vec<RawTriangleHitGroup>,
    pub procedural_hit_groups: Vec<RawProceduralHitGroup>,
    pub backend_sizes: [u32; NUM_BACKENDS],
}

pub fn encode_ray_tracing_entry(ser: &mut Serializer<'_>, e: &RawRayTracingEntry) -> Result<()> {
    encode_tag(ser, ChunkType::RayTracingPipelineStates)?;
    encode_name_list(ser, &e.signature_names)?;
    let mut depth = e.max_recursion_depth;
    ser.u32(&mut depth)?;

    let mut general_count = e.general_shaders.len() as u32;
    ser.u32(&mut general_count)?;
    for &shader in &e.general_shaders {
        let mut shader = shader;
        ser.u32(&mut shader)?;
    }

    let mut triangle_count = e.triangle_hit_groups.len() as u32;
    ser.u32(&mut triangle_count)?;
    for group in &e.triangle_hit_groups {
        let mut closest = group.closest_hit;
        ser.u32(&mut closest)?;
        let mut any = group.any_hit;
        ser.u32(&mut any)?;
    }

    let mut procedural_count = e.procedural_hit_groups.len() as u32;
    ser.u32(&mut procedural_count)?;
    for group in &e.procedural_hit_groups {
        let mut intersection = group.intersection;
        ser.u32(&mut intersection)?;
        let mut closest = group.closest_hit;
        ser.u32(&mut closest)?;
        let mut any = group.any_hit;
        ser.u32(&mut any)?;
    }

    encode_backend_sizes(ser, &e.backend_sizes)?;
    Ok(())
}

pub fn decode_ray_tracing_entry(ser: &mut Serializer<'_>) -> Result<RawRayTracingEntry> {
    decode_and_check_tag(ser, ChunkType::RayTracingPipelineStates)?;
    let signature_names = decode_name_list(ser)?;
    let mut max_recursion_depth = 0u32;
    ser.u32(&mut max_recursion_depth)?;

    let mut general_count = 0u32;
    ser.u32(&mut general_count)?;
    let mut general_shaders = Vec::with_capacity(general_count as usize);
    for _ in 0..general_count {
        let mut shader = 0u32;
        ser.u32(&mut shader)?;
        general_shaders.push(shader);
    }

    let mut triangle_count = 0u32;
    ser.u32(&mut triangle_count)?;
    let mut triangle_hit_groups = Vec::with_capacity(triangle_count as usize);
    for _ in 0..triangle_count {
        let mut closest_hit = 0u32;
        ser.u32(&mut closest_hit)?;
        let mut any_hit = 0u32;
        ser.u32(&mut any_hit)?;
        triangle_hit_groups.push(RawTriangleHitGroup { closest_hit, any_hit });
    }

    let mut procedural_count = 0u32;
    ser.u32(&mut procedural_count)?;
    let mut procedural_hit_groups = Vec::with_capacity(procedural_count as usize);
    for _ in 0..procedural_count {
        let mut intersection = 0u32;
        ser.u32(&mut intersection)?;
        let mut closest_hit = 0u32;
        ser.u32(&mut closest_hit)?;
        let mut any_hit = 0u32;
        ser.u32(&mut any_hit)?;
        procedural_hit_groups.push(RawProceduralHitGroup {
            intersection,
            closest_hit,
            any_hit,
        });
    }

    let backend_sizes = decode_backend_sizes(ser)?;
    Ok(RawRayTracingEntry {
        signature_names,
        max_recursion_depth,
        general_shaders,
        triangle_hit_groups,
        procedural_hit_groups,
        backend_sizes,
    })
}

#[derive(Debug, Clone)]
pub struct RawRenderPassEntry {
    pub color_attachment_count: u32,
    pub has_depth_stencil: bool,
    pub backend_sizes: [u32; NUM_BACKENDS],
}

pub fn encode_render_pass_entry(ser: &mut Serializer<'_>, e: &RawRenderPassEntry) -> Result<()> {
    encode_tag(ser, ChunkType::RenderPass)?;
    let mut count = e.color_attachment_count;
    ser.u32(&mut count)?;
    let mut has_ds = e.has_depth_stencil as u8;
    ser.u8(&mut has_ds)?;
    encode_backend_sizes(ser, &e.backend_sizes)?;
    Ok(())
}

pub fn decode_render_pass_entry(ser: &mut Serializer<'_>) -> Result<RawRenderPassEntry> {
    decode_and_check_tag(ser, ChunkType::RenderPass)?;
    let mut color_attachment_count = 0u32;
    ser.u32(&mut color_attachment_count)?;
    let mut has_ds = 0u8;
    ser.u8(&mut has_ds)?;
    let backend_sizes = decode_backend_sizes(ser)?;
    Ok(RawRenderPassEntry {
        color_attachment_count,
        has_depth_stencil: has_ds != 0,
        backend_sizes,
    })
}

/// Resource-signature entries share the render-pass/PSO "tag + backend
/// sizes" envelope even though, in this rendition, every backend's
/// per-resource attributes already live in the common bytes (§4.4, §4.5) —
/// the backend-size table here is purely the `MissingBackendData` gate.
pub fn encode_signature_entry(
    ser: &mut Serializer<'_>,
    sig: &archive_device_traits::PipelineResourceSignatureDesc,
    backend_sizes: &[u32; NUM_BACKENDS],
) -> Result<()> {
    encode_tag(ser, ChunkType::ResourceSignature)?;
    crate::wire::encode_signature(ser, sig)?;
    encode_backend_sizes(ser, backend_sizes)?;
    Ok(())
}

pub fn decode_signature_entry(
    ser: &mut Serializer<'_>,
) -> Result<(archive_device_traits::PipelineResourceSignatureDesc, [u32; NUM_BACKENDS])> {
    decode_and_check_tag(ser, ChunkType::ResourceSignature)?;
    let sig = crate::wire::decode_signature(ser)?;
    let backend_sizes = decode_backend_sizes(ser)?;
    Ok((sig, backend_sizes))
}

/// One `Shaders` chunk entry's own body: `{ cstring name; u32 stage_bits;
/// u32 bytecode_len; bytecode[bytecode_len] }`. The table's `(offset, size)`
/// pair is shared across every backend (§3: the shader table carries no
/// per-backend column), so `pso-archiver` pads shorter backends' blocks with
/// trailing zero bytes to match the widest one at the same index — the
/// explicit `bytecode_len` (rather than "everything left in the slice")
/// is what keeps that padding from leaking into a shorter backend's
/// bytecode on decode.
pub fn encode_shader_block(ser: &mut Serializer<'_>, name: &str, stage_bits: u32, bytecode: &[u8]) -> Result<()> {
    ser.cstr_encode(name)?;
    let mut stage_bits = stage_bits;
    ser.u32(&mut stage_bits)?;
    let mut len = bytecode.len() as u32;
    ser.u32(&mut len)?;
    let mut bytes = bytecode.to_vec();
    ser.bytes(&mut bytes)?;
    Ok(())
}

pub struct DecodedShaderBlock<'a> {
    pub name: &'a str,
    pub stage_bits: u32,
    pub bytecode: &'a [u8],
}

pub fn decode_shader_block(ser: &mut Serializer<'_>) -> Result<DecodedShaderBlock<'_>> {
    let name = ser.cstr_decode()?;
    let mut stage_bits = 0u32;
    ser.u32(&mut stage_bits)?;
    let mut len = 0u32;
    ser.u32(&mut len)?;
    let bytecode = match ser {
        Serializer::Decode { buf, pos } => {
            let start = *pos;
            let end = start + len as usize;
            if end > buf.len() {
                return Err(ArchiveError::DecodeUnderflow {
                    needed: end - start,
                    remaining: buf.len().saturating_sub(start),
                });
            }
            &buf[start..end]
        }
        _ => unreachable!("decode_shader_block called outside decode mode"),
    };
    Ok(DecodedShaderBlock {
        name,
        stage_bits,
        bytecode,
    })
}

#[cfg(test)]
mod shader_block_tests {
    use super::*;
    use archive_format::Serializer;

    #[test]
    fn shader_block_round_trips() {
        let mut buf = vec![0u8; 64];
        let mut enc = Serializer::encoder(&mut buf);
        encode_shader_block(&mut enc, "vs_main", 0b1, &[1, 2, 3, 4]).unwrap();
        let written = enc.pos();

        let decoded = decode_shader_block(&mut Serializer::decoder(&buf[..written])).unwrap();
        assert_eq!(decoded.name, "vs_main");
        assert_eq!(decoded.stage_bits, 0b1);
        assert_eq!(decoded.bytecode, &[1, 2, 3, 4]);
    }

    /// Trailing zero bytes appended to equalize block length across
    /// backends (pso-archiver's shared offset/size scheme) must not leak
    /// into the decoded bytecode.
    #[test]
    fn trailing_padding_past_bytecode_len_is_ignored() {
        let mut buf = vec![0u8; 64];
        let mut enc = Serializer::encoder(&mut buf);
        encode_shader_block(&mut enc, "ps_main", 0b10, &[7, 8]).unwrap();
        let written = enc.pos();
        let padded_len = written + 5;

        let decoded = decode_shader_block(&mut Serializer::decoder(&buf[..padded_len])).unwrap();
        assert_eq!(decoded.bytecode, &[7, 8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_format::Serializer;

    #[test]
    fn graphics_entry_type_mismatch_is_detected() {
        let e = RawComputeEntry {
            signature_names: vec![],
            compute_shader: NO_SHADER,
            backend_sizes: [1; NUM_BACKENDS],
        };
        let mut buf = vec![0u8; 256];
        let mut enc = Serializer::encoder(&mut buf);
        encode_compute_entry(&mut enc, &e).unwrap();
        let written = enc.pos();

        let err = decode_graphics_entry(&mut Serializer::decoder(&buf[..written])).unwrap_err();
        assert!(matches!(err, ArchiveError::TypeMismatch { .. }));
    }

    #[test]
    fn graphics_entry_round_trips() {
        let e = RawGraphicsEntry {
            signature_names: vec!["sig0".into()],
            render_pass_name: Some("main_pass".into()),
            vertex_shader: 0,
            hull_shader: NO_SHADER,
            domain_shader: NO_SHADER,
            geometry_shader: NO_SHADER,
            pixel_shader: 1,
            backend_sizes: [16; NUM_BACKENDS],
        };
        let mut buf = vec![0u8; 256];
        let mut enc = Serializer::encoder(&mut buf);
        encode_graphics_entry(&mut enc, &e).unwrap();
        let written = enc.pos();

        let decoded = decode_graphics_entry(&mut Serializer::decoder(&buf[..written])).unwrap();
        assert_eq!(decoded.signature_names, e.signature_names);
        assert_eq!(decoded.render_pass_name, e.render_pass_name);
        assert_eq!(decoded.vertex_shader, 0);
        assert_eq!(decoded.hull_shader, NO_SHADER);
        assert_eq!(decoded.pixel_shader, 1);
    }

    #[test]
    fn ray_tracing_entry_round_trips_sentinel_and_real_indices() {
        let e = RawRayTracingEntry {
            signature_names: vec![],
            max_recursion_depth: 4,
            general_shaders: vec![0, NO_SHADER],
            triangle_hit_groups: vec![RawTriangleHitGroup { closest_hit: 1, any_hit: NO_SHADER }],
            procedural_hit_groups: vec![],
            backend_sizes: [8; NUM_BACKENDS],
        };
        let mut buf = vec![0u8; 256];
        let mut enc = Serializer::encoder(&mut buf);
        encode_ray_tracing_entry(&mut enc, &e).unwrap();
        let written = enc.pos();

        let decoded = decode_ray_tracing_entry(&mut Serializer::decoder(&buf[..written])).unwrap();
        assert_eq!(decoded.general_shaders, vec![0, NO_SHADER]);
        assert_eq!(decoded.triangle_hit_groups[0].any_hit, NO_SHADER);
    }
}
