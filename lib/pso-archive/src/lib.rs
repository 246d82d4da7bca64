//! The device-object archive reader and unpacker (C3 loading, C4 directories,
//! C6 unpacker, C7 shader cache).
//!
//! `Archive::open` parses the header and chunk table once; every later
//! `unpack_*` call walks the already-built directories, decodes one entry's
//! common bytes through `archive_format::Serializer`, resolves whatever it
//! references (signatures, render pass, shaders), and calls into the
//! caller-supplied `archive_device_traits::Device`.

pub mod directory;
pub mod entries;
pub mod shader_table;
pub mod unpack;
pub mod wire;

use std::sync::Arc;

use archive_device_traits::{
    BackendFlags, ByteSource, ComputePipelineStateCreateInfo, Device, DeviceObject,
    GraphicsPipelineStateCreateInfo, GraphicsShaderSet, LockedFields, PipelineResourceSignatureDesc,
    PipelineType, RayTracingPipelineStateCreateInfo, RenderPassCreateInfo, ShaderCreateInfo,
    ShaderGroupGeneral, ShaderGroupProceduralHit, ShaderGroupTriangleHit, ShaderRef,
    TilePipelineStateCreateInfo,
};
use archive_format::header::{BackendTag, ChunkType, NUM_BACKENDS};
use archive_format::{ArchiveError, Header, Result, Serializer};

use directory::ResourceDirectory;
use entries::{
    decode_compute_entry, decode_graphics_entry, decode_ray_tracing_entry,
    decode_render_pass_entry, decode_signature_entry, decode_tile_entry, NO_SHADER,
};
use shader_table::ShaderTable;
use unpack::Unpack;

/// A mutation callback (§4.6 step 8): given a mutable create-info, it may
/// tweak backend-specific extension fields but must not touch the fields
/// captured in [`LockedFields`] — if it does, the unpack fails
/// [`ArchiveError::IllegalModification`] and no pipeline is constructed.
pub type MutateGraphics<'a> = dyn FnOnce(&mut GraphicsPipelineStateCreateInfo<'_>) + 'a;
pub type MutateCompute<'a> = dyn FnOnce(&mut ComputePipelineStateCreateInfo<'_>) + 'a;
pub type MutateTile<'a> = dyn FnOnce(&mut TilePipelineStateCreateInfo<'_>) + 'a;
pub type MutateRayTracing<'a> = dyn FnOnce(&mut RayTracingPipelineStateCreateInfo<'_>) + 'a;

struct NameDirectoryEntry {
    offset: u32,
    size: u32,
}

/// Parses one named directory chunk: `u32 count; { cstring name; u32 offset; u32 size }[count]`.
fn parse_name_directory(ser: &mut Serializer<'_>) -> Result<Vec<(String, NameDirectoryEntry)>> {
    let mut count = 0u32;
    ser.u32(&mut count)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = ser.cstr_decode()?.to_string();
        let mut offset = 0u32;
        ser.u32(&mut offset)?;
        let mut size = 0u32;
        ser.u32(&mut size)?;
        out.push((name, NameDirectoryEntry { offset, size }));
    }
    Ok(out)
}

/// Parses the shader directory chunk: `u32 count; { u32 offset; u32 size }[count]`.
fn parse_shader_directory(ser: &mut Serializer<'_>) -> Result<Vec<(u32, u32)>> {
    let mut count = 0u32;
    ser.u32(&mut count)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut offset = 0u32;
        ser.u32(&mut offset)?;
        let mut size = 0u32;
        ser.u32(&mut size)?;
        out.push((offset, size));
    }
    Ok(out)
}

/// The archive's own compiled-in debug tag, compared against the archive's
/// `ArchiveDebugInfo` chunk (§4.3 step 5) — an informational mismatch, never
/// a construction failure.
const API_VERSION_TAG: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// A loaded, indexed archive bound to one [`BackendTag`].
///
/// Construction (`Archive::open`) is the only place the closed
/// construction-error set (`BadMagic`, `UnsupportedVersion`, `DuplicateChunk`,
/// `UnknownChunkType`, `IoError`) can surface; once an `Archive` exists every
/// later error is per-entry and leaves the archive itself usable (§7).
pub struct Archive {
    backend: BackendTag,
    block_base_offsets: [u32; NUM_BACKENDS],
    body: Vec<u8>,

    signatures: ResourceDirectory<(Arc<PipelineResourceSignatureDesc>, DeviceObject)>,
    graphics: ResourceDirectory<DeviceObject>,
    compute: ResourceDirectory<DeviceObject>,
    ray_tracing: ResourceDirectory<DeviceObject>,
    tile: ResourceDirectory<DeviceObject>,
    render_passes: ResourceDirectory<DeviceObject>,
    shaders: ShaderTable,
}

impl Archive {
    /// Reads the fixed header, the chunk table, and every chunk's name
    /// directory out of `source` (§4.3). The body (everything after the
    /// header and chunk table) is copied into memory once so later
    /// `unpack_*` calls only slice an owned buffer rather than re-reading
    /// through `source` for every field.
    pub fn open(source: &dyn ByteSource, backend: BackendTag) -> Result<Self> {
        let file_size = source.size();

        let fixed_header_len = Header::ENCODED_SIZE as u64;
        let fixed_header_bytes = source.read_to_vec(0, fixed_header_len as usize)?;
        let header = Header::decode(&mut Serializer::decoder(&fixed_header_bytes))?;

        let chunk_table_offset = fixed_header_len;
        let chunk_table_len = header.num_chunks as u64 * archive_format::ChunkHeader::ENCODED_SIZE as u64;
        let chunk_table_bytes = source.read_to_vec(chunk_table_offset, chunk_table_len as usize)?;
        let mut chunk_ser = Serializer::decoder(&chunk_table_bytes);
        let mut chunks = Vec::with_capacity(header.num_chunks as usize);
        for _ in 0..header.num_chunks {
            chunks.push(archive_format::ChunkHeader::decode(&mut chunk_ser)?);
        }

        let body_start = chunk_table_offset + chunk_table_len;
        let body = source.read_to_vec(body_start, (file_size - body_start) as usize)?;

        let mut signatures = ResourceDirectory::new("resource signature");
        let mut graphics = ResourceDirectory::new("graphics pipeline state");
        let mut compute = ResourceDirectory::new("compute pipeline state");
        let mut ray_tracing = ResourceDirectory::new("ray tracing pipeline state");
        let mut tile = ResourceDirectory::new("tile pipeline state");
        let mut render_passes = ResourceDirectory::new("render pass");
        let mut shader_slots: Vec<(u32, u32)> = Vec::new();

        let mut seen = std::collections::HashSet::new();
        for chunk in &chunks {
            if !seen.insert(chunk.ty) {
                return Err(ArchiveError::DuplicateChunk(format!("{:?}", chunk.ty)));
            }

            let chunk_body = &body[chunk.offset as usize..(chunk.offset + chunk.size) as usize];

            match chunk.ty {
                ChunkType::ArchiveDebugInfo => {
                    let mut ser = Serializer::decoder(chunk_body);
                    let api_version_tag = ser.cstr_decode()?;
                    let _source_commit = ser.cstr_decode()?;
                    if api_version_tag != API_VERSION_TAG {
                        log::warn!(
                            "archive debug tag {api_version_tag:?} does not match this build's {API_VERSION_TAG:?}"
                        );
                    }
                }
                ChunkType::ResourceSignature => {
                    for (name, entry) in parse_name_directory(&mut Serializer::decoder(chunk_body))? {
                        signatures.insert(name, entry.offset, entry.size)?;
                    }
                }
                ChunkType::GraphicsPipelineStates => {
                    for (name, entry) in parse_name_directory(&mut Serializer::decoder(chunk_body))? {
                        graphics.insert(name, entry.offset, entry.size)?;
                    }
                }
                ChunkType::ComputePipelineStates => {
                    for (name, entry) in parse_name_directory(&mut Serializer::decoder(chunk_body))? {
                        compute.insert(name, entry.offset, entry.size)?;
                    }
                }
                ChunkType::RayTracingPipelineStates => {
                    for (name, entry) in parse_name_directory(&mut Serializer::decoder(chunk_body))? {
                        ray_tracing.insert(name, entry.offset, entry.size)?;
                    }
                }
                ChunkType::TilePipelineStates => {
                    for (name, entry) in parse_name_directory(&mut Serializer::decoder(chunk_body))? {
                        tile.insert(name, entry.offset, entry.size)?;
                    }
                }
                ChunkType::RenderPass => {
                    for (name, entry) in parse_name_directory(&mut Serializer::decoder(chunk_body))? {
                        render_passes.insert(name, entry.offset, entry.size)?;
                    }
                }
                ChunkType::Shaders => {
                    shader_slots = parse_shader_directory(&mut Serializer::decoder(chunk_body))?;
                }
            }
        }

        log::info!(
            "opened archive: {file_size} bytes, {} chunks, {} shaders",
            chunks.len(),
            shader_slots.len()
        );

        Ok(Archive {
            backend,
            block_base_offsets: header.block_base_offsets,
            body,
            signatures,
            graphics,
            compute,
            ray_tracing,
            tile,
            render_passes,
            shaders: ShaderTable::new(shader_slots),
        })
    }

    pub fn backend(&self) -> BackendTag {
        self.backend
    }

    fn common_bytes(&self, offset: u32, size: u32) -> &[u8] {
        &self.body[offset as usize..(offset + size) as usize]
    }

    /// Checks `block_base_offsets[backend] + offset + size <= body.len()`
    /// (§3 per-entry header invariant) and returns the slice if it holds.
    fn backend_block(&self, offset: u32, size: u32) -> Result<&[u8]> {
        if size == 0 {
            return Err(ArchiveError::MissingBackendData(format!("{:?}", self.backend)));
        }
        let base = self.block_base_offsets[self.backend.as_u32() as usize];
        let start = base as u64 + offset as u64;
        let end = start + size as u64;
        if end > self.body.len() as u64 {
            return Err(ArchiveError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("backend block [{start}, {end}) exceeds archive body of {} bytes", self.body.len()),
            )));
        }
        Ok(&self.body[start as usize..end as usize])
    }

    pub fn clear_resource_cache(&self) {
        self.signatures.clear_cache();
        self.graphics.clear_cache();
        self.compute.clear_cache();
        self.ray_tracing.clear_cache();
        self.tile.clear_cache();
        self.render_passes.clear_cache();
        self.shaders.clear_cache();
    }

    /// The per-backend body-relative base offsets from the fixed header,
    /// indexed by [`BackendTag::as_u32`] — exposed for inspection tooling.
    pub fn block_base_offsets(&self) -> [u32; NUM_BACKENDS] {
        self.block_base_offsets
    }

    pub fn signature_names(&self) -> impl Iterator<Item = &str> {
        self.signatures.names()
    }

    pub fn graphics_pipeline_state_names(&self) -> impl Iterator<Item = &str> {
        self.graphics.names()
    }

    pub fn compute_pipeline_state_names(&self) -> impl Iterator<Item = &str> {
        self.compute.names()
    }

    pub fn ray_tracing_pipeline_state_names(&self) -> impl Iterator<Item = &str> {
        self.ray_tracing.names()
    }

    pub fn tile_pipeline_state_names(&self) -> impl Iterator<Item = &str> {
        self.tile.names()
    }

    pub fn render_pass_names(&self) -> impl Iterator<Item = &str> {
        self.render_passes.names()
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Resolves shader index `index` through the shared [`ShaderTable`]
    /// (§4.7): cache hit under lock, or release-construct-reinstall. Sentinel
    /// [`entries::NO_SHADER`] means "no shader" and never touches the table.
    fn resolve_shader_ref(&self, index: u32, device: &dyn Device, unpack: &Unpack) -> Result<ShaderRef> {
        if index == NO_SHADER {
            return Ok(ShaderRef::Resolved(None));
        }

        if let Some(cached) = self.shaders.get_cached(index) {
            log::debug!("shader cache hit for index {index}");
            return Ok(ShaderRef::Resolved(Some(cached)));
        }

        let (offset, size) = self.shaders.offset_and_size(index).ok_or_else(|| {
            ArchiveError::DecodeUnderflow {
                needed: (index as usize + 1) * 4,
                remaining: self.shaders.len() * 4,
            }
        })?;

        log::debug!("shader cache miss for index {index}, constructing");
        let block = self.backend_block(offset, size)?;
        let decoded = entries::decode_shader_block(&mut Serializer::decoder(block))?;
        let name = unpack.copy_str(decoded.name);
        let bytecode = unpack.copy_bytes(decoded.bytecode);

        let ci = ShaderCreateInfo {
            name,
            stage: archive_device_traits::ShaderStages::from_bits_truncate(decoded.stage_bits),
            bytecode,
        };
        let shader = device.create_shader(&ci)?;
        let installed = self.shaders.install(index, shader);
        Ok(ShaderRef::Resolved(Some(installed)))
    }

    /// Resolves `index`, treating any other out-of-range value as a hard
    /// decode error rather than silently nulling it (§4.6 step 7, §9 Open
    /// Question resolved in favor of erroring).
    fn resolve_shader_index_strict(
        &self,
        index: u32,
        device: &dyn Device,
        unpack: &Unpack,
    ) -> Result<ShaderRef> {
        if index != NO_SHADER && index as usize >= self.shaders.len() {
            return Err(ArchiveError::DecodeUnderflow {
                needed: index as usize + 1,
                remaining: self.shaders.len(),
            });
        }
        self.resolve_shader_ref(index, device, unpack)
    }

    /// Resolves every name in `names` into a constructed
    /// [`PipelineResourceSignatureDesc`] + its device object, recursing
    /// through [`Self::unpack_resource_signature`] (§4.6 step 4).
    fn resolve_signatures(
        &self,
        names: &[String],
        device: &dyn Device,
    ) -> Result<(Vec<Arc<PipelineResourceSignatureDesc>>, Vec<DeviceObject>)> {
        let mut descs = Vec::with_capacity(names.len());
        let mut objects = Vec::with_capacity(names.len());
        for name in names {
            let (desc, obj) = self.unpack_resource_signature(name, device)?;
            descs.push(desc);
            objects.push(obj);
        }
        Ok((descs, objects))
    }

    /// Unpacks a resource signature by name (§4.6, shader-free variant).
    /// Returns both the decoded descriptor (needed by callers that
    /// recompute bindings) and the constructed device object (cached).
    pub fn unpack_resource_signature(
        &self,
        name: &str,
        device: &dyn Device,
    ) -> Result<(Arc<PipelineResourceSignatureDesc>, DeviceObject)> {
        if let Some(cached) = self.signatures.cached(name) {
            return Ok((*cached).clone());
        }

        let (offset, size) = self.signatures.lookup(name)?;
        let common = self.common_bytes(offset, size);
        let (desc, backend_sizes) = decode_signature_entry(&mut Serializer::decoder(common))?;

        let backend_idx = self.backend.as_u32() as usize;
        if backend_sizes[backend_idx] == 0 {
            return Err(ArchiveError::MissingBackendData(format!("{:?}", self.backend)));
        }

        let desc = Arc::new(desc);
        let object = device.create_pipeline_resource_signature(&desc)?;
        self.signatures.store(name, Arc::new((desc.clone(), object.clone())));
        Ok((desc, object))
    }

    /// Unpacks a render pass by name (§4.6, shader-free variant).
    pub fn unpack_render_pass(&self, name: &str, device: &dyn Device) -> Result<DeviceObject> {
        if let Some(obj) = self.render_passes.cached(name) {
            return Ok(obj);
        }

        let (offset, size) = self.render_passes.lookup(name)?;
        let common = self.common_bytes(offset, size);
        let raw = decode_render_pass_entry(&mut Serializer::decoder(common))?;

        let backend_idx = self.backend.as_u32() as usize;
        if raw.backend_sizes[backend_idx] == 0 {
            return Err(ArchiveError::MissingBackendData(format!("{:?}", self.backend)));
        }

        let ci = RenderPassCreateInfo {
            name,
            color_attachment_count: raw.color_attachment_count,
            has_depth_stencil: raw.has_depth_stencil,
        };
        let object = device.create_render_pass(&ci)?;
        self.render_passes.store(name, object.clone());
        Ok(object)
    }

    /// Unpacks the graphics pipeline state named `name` (§4.6 full skeleton).
    ///
    /// `mutate`, if provided, runs after every resource/shader has been
    /// resolved but before the device call; the fields in [`LockedFields`]
    /// are snapshotted before and compared after, and any difference is
    /// [`ArchiveError::IllegalModification`] — no pipeline is constructed and
    /// nothing is cached in that case (§8 law 6).
    pub fn unpack_graphics_pipeline_state(
        &self,
        name: &str,
        device: &dyn Device,
        mutate: Option<&mut MutateGraphics<'_>>,
    ) -> Result<DeviceObject> {
        if mutate.is_none() {
            if let Some(obj) = self.graphics.cached(name) {
                return Ok(obj);
            }
        }

        let (offset, size) = self.graphics.lookup(name)?;
        let common = self.common_bytes(offset, size);
        let raw = decode_graphics_entry(&mut Serializer::decoder(common))?;

        let render_pass = raw
            .render_pass_name
            .as_deref()
            .map(|n| self.unpack_render_pass(n, device))
            .transpose()?;

        let (signatures, signature_objects) = self.resolve_signatures(&raw.signature_names, device)?;

        let backend_idx = self.backend.as_u32() as usize;
        let _block = self.backend_block(0, raw.backend_sizes[backend_idx])?;

        let unpack = Unpack::new();
        let vertex = self.resolve_shader_index_strict(raw.vertex_shader, device, &unpack)?;
        let hull = self.resolve_shader_index_strict(raw.hull_shader, device, &unpack)?;
        let domain = self.resolve_shader_index_strict(raw.domain_shader, device, &unpack)?;
        let geometry = self.resolve_shader_index_strict(raw.geometry_shader, device, &unpack)?;
        let pixel = self.resolve_shader_index_strict(raw.pixel_shader, device, &unpack)?;

        let locked = LockedFields {
            pipeline_type: PipelineType::Graphics,
            signature_names: raw.signature_names.clone(),
        };

        let name_owned = unpack.copy_str(name);
        let mut ci = GraphicsPipelineStateCreateInfo {
            name: name_owned,
            signature_names: raw.signature_names.clone(),
            render_pass_name: raw.render_pass_name.as_deref(),
            render_pass,
            signatures,
            signature_objects,
            shaders: GraphicsShaderSet {
                vertex,
                hull: Some(hull),
                domain: Some(domain),
                geometry: Some(geometry),
                pixel: Some(pixel),
            },
        };

        if let Some(mutate) = mutate {
            mutate(&mut ci);
            let after = LockedFields {
                pipeline_type: PipelineType::Graphics,
                signature_names: ci.signature_names.clone(),
            };
            if after != locked {
                return Err(ArchiveError::IllegalModification(
                    "graphics pipeline state: pipeline type or signature list changed".to_string(),
                ));
            }
            return Ok(device.create_graphics_pipeline_state(&ci)?);
        }

        let object = device.create_graphics_pipeline_state(&ci)?;
        self.graphics.store(name, object.clone());
        Ok(object)
    }

    pub fn unpack_compute_pipeline_state(
        &self,
        name: &str,
        device: &dyn Device,
        mutate: Option<&mut MutateCompute<'_>>,
    ) -> Result<DeviceObject> {
        if mutate.is_none() {
            if let Some(obj) = self.compute.cached(name) {
                return Ok(obj);
            }
        }

        let (offset, size) = self.compute.lookup(name)?;
        let common = self.common_bytes(offset, size);
        let raw = decode_compute_entry(&mut Serializer::decoder(common))?;

        let (signatures, signature_objects) = self.resolve_signatures(&raw.signature_names, device)?;

        let backend_idx = self.backend.as_u32() as usize;
        let _block = self.backend_block(0, raw.backend_sizes[backend_idx])?;

        let unpack = Unpack::new();
        let compute_shader = self.resolve_shader_index_strict(raw.compute_shader, device, &unpack)?;

        let locked = LockedFields {
            pipeline_type: PipelineType::Compute,
            signature_names: raw.signature_names.clone(),
        };

        let name_owned = unpack.copy_str(name);
        let mut ci = ComputePipelineStateCreateInfo {
            name: name_owned,
            signature_names: raw.signature_names.clone(),
            signatures,
            signature_objects,
            compute_shader,
        };

        if let Some(mutate) = mutate {
            mutate(&mut ci);
            let after = LockedFields {
                pipeline_type: PipelineType::Compute,
                signature_names: ci.signature_names.clone(),
            };
            if after != locked {
                return Err(ArchiveError::IllegalModification(
                    "compute pipeline state: pipeline type or signature list changed".to_string(),
                ));
            }
            return Ok(device.create_compute_pipeline_state(&ci)?);
        }

        let object = device.create_compute_pipeline_state(&ci)?;
        self.compute.store(name, object.clone());
        Ok(object)
    }

    pub fn unpack_tile_pipeline_state(
        &self,
        name: &str,
        device: &dyn Device,
        mutate: Option<&mut MutateTile<'_>>,
    ) -> Result<DeviceObject> {
        if mutate.is_none() {
            if let Some(obj) = self.tile.cached(name) {
                return Ok(obj);
            }
        }

        let (offset, size) = self.tile.lookup(name)?;
        let common = self.common_bytes(offset, size);
        let raw = decode_tile_entry(&mut Serializer::decoder(common))?;

        let (signatures, signature_objects) = self.resolve_signatures(&raw.signature_names, device)?;

        let backend_idx = self.backend.as_u32() as usize;
        let _block = self.backend_block(0, raw.backend_sizes[backend_idx])?;

        let unpack = Unpack::new();
        let tile_shader = self.resolve_shader_index_strict(raw.tile_shader, device, &unpack)?;

        let locked = LockedFields {
            pipeline_type: PipelineType::Tile,
            signature_names: raw.signature_names.clone(),
        };

        let name_owned = unpack.copy_str(name);
        let mut ci = TilePipelineStateCreateInfo {
            name: name_owned,
            signature_names: raw.signature_names.clone(),
            signatures,
            signature_objects,
            tile_shader,
        };

        if let Some(mutate) = mutate {
            mutate(&mut ci);
            let after = LockedFields {
                pipeline_type: PipelineType::Tile,
                signature_names: ci.signature_names.clone(),
            };
            if after != locked {
                return Err(ArchiveError::IllegalModification(
                    "tile pipeline state: pipeline type or signature list changed".to_string(),
                ));
            }
            return Ok(device.create_tile_pipeline_state(&ci)?);
        }

        let object = device.create_tile_pipeline_state(&ci)?;
        self.tile.store(name, object.clone());
        Ok(object)
    }

    pub fn unpack_ray_tracing_pipeline_state(
        &self,
        name: &str,
        device: &dyn Device,
        mutate: Option<&mut MutateRayTracing<'_>>,
    ) -> Result<DeviceObject> {
        if mutate.is_none() {
            if let Some(obj) = self.ray_tracing.cached(name) {
                return Ok(obj);
            }
        }

        let (offset, size) = self.ray_tracing.lookup(name)?;
        let common = self.common_bytes(offset, size);
        let raw = decode_ray_tracing_entry(&mut Serializer::decoder(common))?;

        let (signatures, signature_objects) = self.resolve_signatures(&raw.signature_names, device)?;

        let backend_idx = self.backend.as_u32() as usize;
        let _block = self.backend_block(0, raw.backend_sizes[backend_idx])?;

        let unpack = Unpack::new();
        let mut general_shaders = Vec::with_capacity(raw.general_shaders.len());
        for &index in &raw.general_shaders {
            general_shaders.push(ShaderGroupGeneral {
                shader: self.resolve_shader_index_strict(index, device, &unpack)?,
            });
        }

        let mut triangle_hit_groups = Vec::with_capacity(raw.triangle_hit_groups.len());
        for group in &raw.triangle_hit_groups {
            triangle_hit_groups.push(ShaderGroupTriangleHit {
                closest_hit: self.resolve_shader_index_strict(group.closest_hit, device, &unpack)?,
                any_hit: self.resolve_shader_index_strict(group.any_hit, device, &unpack)?,
            });
        }

        let mut procedural_hit_groups = Vec::with_capacity(raw.procedural_hit_groups.len());
        for group in &raw.procedural_hit_groups {
            procedural_hit_groups.push(ShaderGroupProceduralHit {
                intersection: self.resolve_shader_index_strict(group.intersection, device, &unpack)?,
                closest_hit: self.resolve_shader_index_strict(group.closest_hit, device, &unpack)?,
                any_hit: self.resolve_shader_index_strict(group.any_hit, device, &unpack)?,
            });
        }

        let locked = LockedFields {
            pipeline_type: PipelineType::RayTracing,
            signature_names: raw.signature_names.clone(),
        };

        let name_owned = unpack.copy_str(name);
        let mut ci = RayTracingPipelineStateCreateInfo {
            name: name_owned,
            signature_names: raw.signature_names.clone(),
            signatures,
            signature_objects,
            general_shaders,
            triangle_hit_groups,
            procedural_hit_groups,
            max_recursion_depth: raw.max_recursion_depth,
        };

        if let Some(mutate) = mutate {
            mutate(&mut ci);
            let after = LockedFields {
                pipeline_type: PipelineType::RayTracing,
                signature_names: ci.signature_names.clone(),
            };
            if after != locked {
                return Err(ArchiveError::IllegalModification(
                    "ray tracing pipeline state: pipeline type or signature list changed".to_string(),
                ));
            }
            return Ok(device.create_ray_tracing_pipeline_state(&ci)?);
        }

        let object = device.create_ray_tracing_pipeline_state(&ci)?;
        self.ray_tracing.store(name, object.clone());
        Ok(object)
    }
}

/// Which backends are actually present in the archive's block offset table
/// with a non-zero-sized chunk, used by ambient tooling (`archive-dump`) to
/// report what a file actually carries without trying every tag.
pub fn compiled_backend_flags() -> BackendFlags {
    BackendFlags::ALL
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_device_traits::{
        PipelineResourceSignatureDesc, ResourceFlags, ResourceType, ShaderStages, SignatureResource,
    };
    use archive_format::header::NUM_BACKENDS;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct InMemorySource {
        bytes: Vec<u8>,
    }

    impl ByteSource for InMemorySource {
        fn size(&self) -> u64 {
            self.bytes.len() as u64
        }

        fn read(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
            let start = offset as usize;
            let end = start + buf.len();
            if end > self.bytes.len() {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "read past end"));
            }
            buf.copy_from_slice(&self.bytes[start..end]);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDevice {
        shader_calls: AtomicUsize,
        last_shader_names: StdMutex<Vec<String>>,
    }

    impl Device for CountingDevice {
        fn create_shader(&self, ci: &ShaderCreateInfo<'_>) -> anyhow::Result<DeviceObject> {
            self.shader_calls.fetch_add(1, Ordering::SeqCst);
            self.last_shader_names.lock().unwrap().push(ci.name.to_string());
            Ok(Arc::new(ci.name.to_string()))
        }

        fn create_render_pass(&self, ci: &RenderPassCreateInfo<'_>) -> anyhow::Result<DeviceObject> {
            Ok(Arc::new(ci.name.to_string()))
        }

        fn create_pipeline_resource_signature(
            &self,
            desc: &PipelineResourceSignatureDesc,
        ) -> anyhow::Result<DeviceObject> {
            Ok(Arc::new(desc.name.clone()))
        }

        fn create_graphics_pipeline_state(
            &self,
            ci: &GraphicsPipelineStateCreateInfo<'_>,
        ) -> anyhow::Result<DeviceObject> {
            Ok(Arc::new(ci.name.to_string()))
        }

        fn create_compute_pipeline_state(
            &self,
            ci: &ComputePipelineStateCreateInfo<'_>,
        ) -> anyhow::Result<DeviceObject> {
            Ok(Arc::new(ci.name.to_string()))
        }

        fn create_tile_pipeline_state(
            &self,
            ci: &TilePipelineStateCreateInfo<'_>,
        ) -> anyhow::Result<DeviceObject> {
            Ok(Arc::new(ci.name.to_string()))
        }

        fn create_ray_tracing_pipeline_state(
            &self,
            ci: &RayTracingPipelineStateCreateInfo<'_>,
        ) -> anyhow::Result<DeviceObject> {
            Ok(Arc::new(ci.name.to_string()))
        }
    }

    /// Hand-builds a minimal single-chunk archive (`ResourceSignature` only)
    /// with one signature entry, so the directory/load path can be exercised
    /// without needing a full `pso-archiver` round trip.
    fn build_signature_only_archive(sig_name: &str) -> Vec<u8> {
        let sig = PipelineResourceSignatureDesc {
            name: sig_name.to_string(),
            binding_index: 0,
            resources: vec![SignatureResource::unassigned(
                "g_tex",
                ResourceType::TextureSrv,
                ShaderStages::PIXEL,
                1,
                ResourceFlags::empty(),
            )],
            immutable_samplers: vec![],
            vulkan_static_mutable_set_size: None,
            vulkan_dynamic_set_size: None,
        };

        let mut entry_buf = vec![0u8; 4096];
        let mut measure = Serializer::measure();
        entries::encode_signature_entry(&mut measure, &sig, &[16; NUM_BACKENDS]).unwrap();
        let entry_len = measure.pos();
        entries::encode_signature_entry(
            &mut Serializer::encoder(&mut entry_buf[..entry_len]),
            &sig,
            &[16; NUM_BACKENDS],
        )
        .unwrap();
        entry_buf.truncate(entry_len);

        // The directory's per-entry `offset` is a body-relative offset, same
        // as the chunk table's own offsets — not relative to the chunk. The
        // entry bytes are laid out right after the directory chunk's bytes,
        // so the entry's body offset is `dir_len` (computed once the
        // directory's own length is known).
        let mut dir_buf = vec![0u8; 4096];
        let dir_len = {
            let mut dser = Serializer::measure();
            let mut count = 1u32;
            dser.u32(&mut count).unwrap();
            dser.cstr_encode(sig_name).unwrap();
            let mut offset = 0u32;
            dser.u32(&mut offset).unwrap();
            let mut size = entry_len as u32;
            dser.u32(&mut size).unwrap();
            dser.pos()
        };

        {
            let mut dser = Serializer::encoder(&mut dir_buf[..dir_len]);
            let mut count = 1u32;
            dser.u32(&mut count).unwrap();
            dser.cstr_encode(sig_name).unwrap();
            let mut offset = dir_len as u32;
            dser.u32(&mut offset).unwrap();
            let mut size = entry_len as u32;
            dser.u32(&mut size).unwrap();
        }
        dir_buf.truncate(dir_len);

        let chunk = archive_format::ChunkHeader {
            ty: ChunkType::ResourceSignature,
            offset: 0,
            size: dir_len as u32,
        };

        let header = Header {
            version: archive_format::VERSION,
            num_chunks: 1,
            block_base_offsets: [0; NUM_BACKENDS],
        };

        let mut out = vec![0u8; Header::ENCODED_SIZE];
        header.encode(&mut Serializer::encoder(&mut out)).unwrap();

        let mut chunk_bytes = vec![0u8; archive_format::ChunkHeader::ENCODED_SIZE];
        chunk.encode(&mut Serializer::encoder(&mut chunk_bytes)).unwrap();
        out.extend_from_slice(&chunk_bytes);

        out.extend_from_slice(&dir_buf);
        // Body layout: [directory bytes][entry bytes], so the entry sits at
        // body offset `dir_len`, matching the directory entry's `offset` field.
        out.extend_from_slice(&entry_buf);

        out
    }

    #[test]
    fn open_rejects_bad_magic() {
        let mut bytes = vec![0u8; Header::ENCODED_SIZE];
        bytes[0..4].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        let source = InMemorySource { bytes };
        let err = Archive::open(&source, BackendTag::Vulkan).unwrap_err();
        assert!(matches!(err, ArchiveError::BadMagic { .. }));
    }

    #[test]
    fn open_rejects_duplicate_chunk_types() {
        let header = Header {
            version: archive_format::VERSION,
            num_chunks: 2,
            block_base_offsets: [0; NUM_BACKENDS],
        };
        let mut bytes = vec![0u8; Header::ENCODED_SIZE];
        header.encode(&mut Serializer::encoder(&mut bytes)).unwrap();

        let chunk = archive_format::ChunkHeader {
            ty: ChunkType::RenderPass,
            offset: 0,
            size: 4,
        };
        for _ in 0..2 {
            let mut chunk_bytes = vec![0u8; archive_format::ChunkHeader::ENCODED_SIZE];
            chunk.encode(&mut Serializer::encoder(&mut chunk_bytes)).unwrap();
            bytes.extend_from_slice(&chunk_bytes);
        }
        bytes.extend_from_slice(&[0u8; 4]);

        let source = InMemorySource { bytes };
        let err = Archive::open(&source, BackendTag::Vulkan).unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateChunk(_)));
    }

    #[test]
    fn unpack_resource_signature_by_name_resolves_and_caches() {
        let bytes = build_signature_only_archive("main_sig");
        let source = InMemorySource { bytes };
        let archive = Archive::open(&source, BackendTag::Vulkan).unwrap();
        let device = CountingDevice::default();

        let (desc, _obj) = archive.unpack_resource_signature("main_sig", &device).unwrap();
        assert_eq!(desc.name, "main_sig");
        assert_eq!(desc.resources.len(), 1);

        let missing = archive.unpack_resource_signature("nope", &device).unwrap_err();
        assert!(matches!(missing, ArchiveError::NotFound { .. }));
    }

    #[test]
    fn concurrent_shader_resolution_dedupes_construction() {
        let table = ShaderTable::new(vec![(0, 4)]);
        let device = CountingDevice::default();
        let unpack = Unpack::new();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if table.get_cached(0).is_none() {
                        let shader: DeviceObject = device.create_shader(&ShaderCreateInfo {
                            name: "s",
                            stage: ShaderStages::PIXEL,
                            bytecode: &[],
                        }).unwrap();
                        table.install(0, shader);
                    }
                });
            }
        });
        let _ = unpack;

        let calls = device.shader_calls.load(Ordering::SeqCst);
        assert!(calls >= 1 && calls <= 8, "expected 1..=8 construction calls, got {calls}");
        assert!(table.get_cached(0).is_some());
    }

    /// Builds a `{dir}{entries}` byte blob for a single named-directory
    /// chunk, mirroring `ArchiveWriter::encode_directory`'s layout: the
    /// directory lists each entry's name and body-relative offset/size, and
    /// the entries' bytes follow immediately after the directory itself.
    fn encode_name_directory(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let dir_len = {
            let mut dser = Serializer::measure();
            let mut count = entries.len() as u32;
            dser.u32(&mut count).unwrap();
            for (name, bytes) in entries {
                dser.cstr_encode(name).unwrap();
                let mut offset = 0u32;
                dser.u32(&mut offset).unwrap();
                let mut size = bytes.len() as u32;
                dser.u32(&mut size).unwrap();
            }
            dser.pos()
        };

        let mut out = vec![0u8; dir_len];
        {
            let mut dser = Serializer::encoder(&mut out);
            let mut count = entries.len() as u32;
            dser.u32(&mut count).unwrap();
            let mut running = dir_len as u32;
            for (name, bytes) in entries {
                dser.cstr_encode(name).unwrap();
                let mut offset = running;
                dser.u32(&mut offset).unwrap();
                let mut size = bytes.len() as u32;
                dser.u32(&mut size).unwrap();
                running += bytes.len() as u32;
            }
        }
        for (_, bytes) in entries {
            out.extend_from_slice(bytes);
        }
        out
    }

    fn encode_shader_directory(slots: &[(u32, u32)]) -> Vec<u8> {
        let mut measure = Serializer::measure();
        let mut count = slots.len() as u32;
        measure.u32(&mut count).unwrap();
        for &(offset, size) in slots {
            let (mut offset, mut size) = (offset, size);
            measure.u32(&mut offset).unwrap();
            measure.u32(&mut size).unwrap();
        }
        let mut buf = vec![0u8; measure.pos()];
        let mut ser = Serializer::encoder(&mut buf);
        let mut count = slots.len() as u32;
        ser.u32(&mut count).unwrap();
        for &(offset, size) in slots {
            let (mut offset, mut size) = (offset, size);
            ser.u32(&mut offset).unwrap();
            ser.u32(&mut size).unwrap();
        }
        buf
    }

    /// Lays out `[header][chunk table][chunk bodies][backend blob]` for a
    /// hand-built archive whose only populated backend block is
    /// `backend_with_blob`, matching `ArchiveWriter::finish`'s layout.
    fn assemble_archive(
        chunks: &[(ChunkType, Vec<u8>)],
        backend_with_blob: BackendTag,
        blob: &[u8],
    ) -> Vec<u8> {
        let mut body = Vec::new();
        let mut headers = Vec::with_capacity(chunks.len());
        for (ty, bytes) in chunks {
            headers.push(archive_format::ChunkHeader {
                ty: *ty,
                offset: body.len() as u32,
                size: bytes.len() as u32,
            });
            body.extend_from_slice(bytes);
        }

        let mut block_base_offsets = [0u32; NUM_BACKENDS];
        let blob_idx = backend_with_blob.as_u32() as usize;
        block_base_offsets[blob_idx] = body.len() as u32;
        body.extend_from_slice(blob);
        for (i, base) in block_base_offsets.iter_mut().enumerate() {
            if i != blob_idx {
                *base = body.len() as u32;
            }
        }

        let header = Header {
            version: archive_format::VERSION,
            num_chunks: headers.len() as u32,
            block_base_offsets,
        };

        let mut out = vec![0u8; Header::ENCODED_SIZE];
        header.encode(&mut Serializer::encoder(&mut out)).unwrap();
        for h in &headers {
            let mut chunk_bytes = vec![0u8; archive_format::ChunkHeader::ENCODED_SIZE];
            h.encode(&mut Serializer::encoder(&mut chunk_bytes)).unwrap();
            out.extend_from_slice(&chunk_bytes);
        }
        out.extend_from_slice(&body);
        out
    }

    fn encode_one_shader(name: &str, stage_bits: u32, bytecode: &[u8]) -> Vec<u8> {
        let mut measure = Serializer::measure();
        entries::encode_shader_block(&mut measure, name, stage_bits, bytecode).unwrap();
        let mut buf = vec![0u8; measure.pos()];
        entries::encode_shader_block(&mut Serializer::encoder(&mut buf), name, stage_bits, bytecode)
            .unwrap();
        buf
    }

    /// Two graphics PSOs whose `pixel_shader` both point at `shared_shader_index`,
    /// so the shader cache's single-construction guarantee can be checked
    /// through the real `unpack_graphics_pipeline_state` path instead of
    /// against `ShaderTable` in isolation.
    fn build_two_graphics_pipelines_sharing_a_shader(
        shared_shader_index: u32,
        shader_count: usize,
    ) -> Vec<u8> {
        let mut vulkan_only_backend_sizes = [0u32; NUM_BACKENDS];
        vulkan_only_backend_sizes[BackendTag::Vulkan.as_u32() as usize] = 1;

        let encode_entry = || {
            let raw = entries::RawGraphicsEntry {
                signature_names: vec![],
                render_pass_name: None,
                vertex_shader: NO_SHADER,
                hull_shader: NO_SHADER,
                domain_shader: NO_SHADER,
                geometry_shader: NO_SHADER,
                pixel_shader: shared_shader_index,
                backend_sizes: vulkan_only_backend_sizes,
            };
            let mut measure = Serializer::measure();
            entries::encode_graphics_entry(&mut measure, &raw).unwrap();
            let mut buf = vec![0u8; measure.pos()];
            entries::encode_graphics_entry(&mut Serializer::encoder(&mut buf), &raw).unwrap();
            buf
        };

        let entry_a = encode_entry();
        let entry_b = encode_entry();
        let graphics_chunk = encode_name_directory(&[("pso_a", &entry_a), ("pso_b", &entry_b)]);

        let shader_block = encode_one_shader("shared_shader", ShaderStages::PIXEL.bits(), &[9, 9, 9, 9]);
        let mut shader_slots = vec![(0u32, 0u32); shader_count];
        shader_slots[shared_shader_index as usize] = (0, shader_block.len() as u32);
        let shaders_chunk = encode_shader_directory(&shader_slots);

        assemble_archive(
            &[
                (ChunkType::GraphicsPipelineStates, graphics_chunk),
                (ChunkType::Shaders, shaders_chunk),
            ],
            BackendTag::Vulkan,
            &shader_block,
        )
    }

    #[test]
    fn unpacking_two_pipelines_sharing_a_shader_constructs_it_once() {
        let bytes = build_two_graphics_pipelines_sharing_a_shader(7, 8);
        let source = InMemorySource { bytes };
        let archive = Archive::open(&source, BackendTag::Vulkan).unwrap();
        let device = CountingDevice::default();

        archive.unpack_graphics_pipeline_state("pso_a", &device, None).unwrap();
        archive.unpack_graphics_pipeline_state("pso_b", &device, None).unwrap();

        assert_eq!(
            device.shader_calls.load(Ordering::SeqCst),
            1,
            "shared shader index 7 must be constructed exactly once across both pipelines"
        );
    }

    /// A ray-tracing PSO with one sentinel general-shader slot and one real
    /// index, so the `~0`/index remap can be checked through the real
    /// `unpack_ray_tracing_pipeline_state` path instead of only the
    /// wire-codec round trip.
    fn build_ray_tracing_pipeline_with_sentinel_and_indexed_shader(
        real_shader_index: u32,
        shader_count: usize,
    ) -> Vec<u8> {
        let mut vulkan_only_backend_sizes = [0u32; NUM_BACKENDS];
        vulkan_only_backend_sizes[BackendTag::Vulkan.as_u32() as usize] = 1;

        let raw = entries::RawRayTracingEntry {
            signature_names: vec![],
            max_recursion_depth: 1,
            general_shaders: vec![NO_SHADER, real_shader_index],
            triangle_hit_groups: vec![],
            procedural_hit_groups: vec![],
            backend_sizes: vulkan_only_backend_sizes,
        };
        let mut measure = Serializer::measure();
        entries::encode_ray_tracing_entry(&mut measure, &raw).unwrap();
        let mut entry_bytes = vec![0u8; measure.pos()];
        entries::encode_ray_tracing_entry(&mut Serializer::encoder(&mut entry_bytes), &raw).unwrap();

        let rt_chunk = encode_name_directory(&[("rt_pso", &entry_bytes)]);

        let shader_block = encode_one_shader("hit_shader", ShaderStages::RAY_CLOSEST_HIT.bits(), &[5, 5, 5]);
        let mut shader_slots = vec![(0u32, 0u32); shader_count];
        shader_slots[real_shader_index as usize] = (0, shader_block.len() as u32);
        let shaders_chunk = encode_shader_directory(&shader_slots);

        assemble_archive(
            &[
                (ChunkType::RayTracingPipelineStates, rt_chunk),
                (ChunkType::Shaders, shaders_chunk),
            ],
            BackendTag::Vulkan,
            &shader_block,
        )
    }

    #[test]
    fn ray_tracing_sentinel_and_index_remap_through_the_real_unpack_path() {
        let bytes = build_ray_tracing_pipeline_with_sentinel_and_indexed_shader(2, 3);
        let source = InMemorySource { bytes };
        let archive = Archive::open(&source, BackendTag::Vulkan).unwrap();
        let device = CountingDevice::default();

        let checked = std::cell::Cell::new(false);
        let mut mutate = |ci: &mut RayTracingPipelineStateCreateInfo<'_>| {
            assert!(
                matches!(ci.general_shaders[0].shader, ShaderRef::Resolved(None)),
                "sentinel general-shader slot must resolve to no shader"
            );
            match &ci.general_shaders[1].shader {
                ShaderRef::Resolved(Some(obj)) => {
                    assert_eq!(obj.downcast_ref::<String>().unwrap(), "hit_shader");
                }
                other => panic!("expected general-shader slot 1 resolved to a real shader, got {other:?}"),
            }
            checked.set(true);
        };

        archive
            .unpack_ray_tracing_pipeline_state("rt_pso", &device, Some(&mut mutate))
            .unwrap();

        assert!(checked.get());
        assert_eq!(device.shader_calls.load(Ordering::SeqCst), 1);
    }
}
