//! Wire encode/decode for the descriptor types shared with `pso-archiver`'s
//! writer. Kept separate from `archive-format` since it has to know about
//! `archive-device-traits`' concrete descriptor shapes, which the pure wire
//! format crate deliberately doesn't.

use archive_device_traits::{
    PipelineResourceSignatureDesc, ResourceFlags, ResourceType, ShaderStages, SignatureResource,
    NUM_D3D11_STAGES,
};
use archive_format::{ArchiveError, Result, Serializer};

const NO_VALUE: u32 = u32::MAX;

fn resource_type_to_u32(ty: ResourceType) -> u32 {
    match ty {
        ResourceType::ConstantBuffer => 0,
        ResourceType::TextureSrv => 1,
        ResourceType::BufferSrv => 2,
        ResourceType::TextureUav => 3,
        ResourceType::BufferUav => 4,
        ResourceType::Sampler => 5,
        ResourceType::InputAttachment => 6,
        ResourceType::AccelStructure => 7,
    }
}

fn resource_type_from_u32(v: u32) -> Result<ResourceType> {
    Ok(match v {
        0 => ResourceType::ConstantBuffer,
        1 => ResourceType::TextureSrv,
        2 => ResourceType::BufferSrv,
        3 => ResourceType::TextureUav,
        4 => ResourceType::BufferUav,
        5 => ResourceType::Sampler,
        6 => ResourceType::InputAttachment,
        7 => ResourceType::AccelStructure,
        other => {
            return Err(ArchiveError::TypeMismatch {
                found: other.to_string(),
                expected: "a recognized resource type tag (0..=7)".to_string(),
            })
        }
    })
}

fn opt_u32_encode(ser: &mut Serializer<'_>, value: Option<u32>) -> Result<()> {
    let mut raw = value.unwrap_or(NO_VALUE);
    ser.u32(&mut raw)
}

fn opt_u32_decode(ser: &mut Serializer<'_>) -> Result<Option<u32>> {
    let mut raw = 0u32;
    ser.u32(&mut raw)?;
    Ok((raw != NO_VALUE).then_some(raw))
}

pub fn encode_signature_resource(ser: &mut Serializer<'_>, r: &SignatureResource) -> Result<()> {
    ser.cstr_encode(&r.name)?;
    let mut ty = resource_type_to_u32(r.resource_type);
    ser.u32(&mut ty)?;
    let mut stages = r.stages.bits();
    ser.u32(&mut stages)?;
    let mut array_size = r.array_size;
    ser.u32(&mut array_size)?;
    let mut flags = r.flags.bits();
    ser.u32(&mut flags)?;

    for i in 0..NUM_D3D11_STAGES {
        opt_u32_encode(ser, r.d3d11_bind_points[i])?;
    }
    let mut d12_reg = r.d3d12_register;
    ser.u32(&mut d12_reg)?;
    let mut d12_space = r.d3d12_space;
    ser.u32(&mut d12_space)?;
    let mut gl_off = r.gl_cache_offset;
    ser.u32(&mut gl_off)?;
    let mut vk_set = r.vulkan_descriptor_set;
    ser.u32(&mut vk_set)?;
    let mut vk_binding = r.vulkan_binding;
    ser.u32(&mut vk_binding)?;
    Ok(())
}

pub fn decode_signature_resource(ser: &mut Serializer<'_>) -> Result<SignatureResource> {
    let name = ser.cstr_decode()?.to_string();
    let mut ty = 0u32;
    ser.u32(&mut ty)?;
    let mut stages = 0u32;
    ser.u32(&mut stages)?;
    let mut array_size = 0u32;
    ser.u32(&mut array_size)?;
    let mut flags = 0u32;
    ser.u32(&mut flags)?;

    let mut d3d11_bind_points = [None; NUM_D3D11_STAGES];
    for slot in d3d11_bind_points.iter_mut() {
        *slot = opt_u32_decode(ser)?;
    }
    let mut d3d12_register = 0u32;
    ser.u32(&mut d3d12_register)?;
    let mut d3d12_space = 0u32;
    ser.u32(&mut d3d12_space)?;
    let mut gl_cache_offset = 0u32;
    ser.u32(&mut gl_cache_offset)?;
    let mut vulkan_descriptor_set = 0u32;
    ser.u32(&mut vulkan_descriptor_set)?;
    let mut vulkan_binding = 0u32;
    ser.u32(&mut vulkan_binding)?;

    Ok(SignatureResource {
        name,
        resource_type: resource_type_from_u32(ty)?,
        stages: ShaderStages::from_bits_truncate(stages),
        array_size,
        flags: ResourceFlags::from_bits_truncate(flags),
        d3d11_bind_points,
        d3d12_register,
        d3d12_space,
        gl_cache_offset,
        vulkan_descriptor_set,
        vulkan_binding,
    })
}

pub fn encode_signature(ser: &mut Serializer<'_>, sig: &PipelineResourceSignatureDesc) -> Result<()> {
    ser.cstr_encode(&sig.name)?;
    let mut binding_index = sig.binding_index;
    ser.u32(&mut binding_index)?;
    opt_u32_encode(ser, sig.vulkan_static_mutable_set_size)?;
    opt_u32_encode(ser, sig.vulkan_dynamic_set_size)?;

    let mut resource_count = sig.resources.len() as u32;
    ser.u32(&mut resource_count)?;
    for resource in &sig.resources {
        encode_signature_resource(ser, resource)?;
    }

    let mut sampler_count = sig.immutable_samplers.len() as u32;
    ser.u32(&mut sampler_count)?;
    for sampler in &sig.immutable_samplers {
        encode_signature_resource(ser, sampler)?;
    }
    Ok(())
}

pub fn decode_signature(ser: &mut Serializer<'_>) -> Result<PipelineResourceSignatureDesc> {
    let name = ser.cstr_decode()?.to_string();
    let mut binding_index = 0u32;
    ser.u32(&mut binding_index)?;
    let vulkan_static_mutable_set_size = opt_u32_decode(ser)?;
    let vulkan_dynamic_set_size = opt_u32_decode(ser)?;

    let mut resource_count = 0u32;
    ser.u32(&mut resource_count)?;
    let mut resources = Vec::with_capacity(resource_count as usize);
    for _ in 0..resource_count {
        resources.push(decode_signature_resource(ser)?);
    }

    let mut sampler_count = 0u32;
    ser.u32(&mut sampler_count)?;
    let mut immutable_samplers = Vec::with_capacity(sampler_count as usize);
    for _ in 0..sampler_count {
        immutable_samplers.push(decode_signature_resource(ser)?);
    }

    Ok(PipelineResourceSignatureDesc {
        name,
        binding_index,
        resources,
        immutable_samplers,
        vulkan_static_mutable_set_size,
        vulkan_dynamic_set_size,
    })
}

/// Sentinel for "no shader at this slot", used by ray-tracing and tile
/// shader-group entries (§4.6 step 7).
pub const NO_SHADER: u32 = u32::MAX;
