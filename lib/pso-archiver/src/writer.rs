//! `ArchiveWriter` (§4.8): the supplementary piece that actually produces a
//! file `pso_archive::Archive::open` can parse. Not named as its own
//! component in the distilled spec — "everything else is plumbing" — but
//! required all the same, the sole producer of the wire format, so it
//! performs no validation beyond what's needed to keep the §3 invariants
//! (duplicate names, duplicate chunk types) by construction.

use std::collections::HashMap;

use archive_device_traits::BackendFlags;
use archive_format::header::{ChunkType, NUM_BACKENDS};
use archive_format::{BackendTag, ChunkHeader, Header, Serializer, VERSION};

use crate::device::{RenderPassHandle, SerializationDevice, ShaderHandle};

struct GraphicsEntry {
    name: String,
    signature_names: Vec<String>,
    render_pass_name: Option<String>,
    vertex_shader: Option<ShaderHandle>,
    hull_shader: Option<ShaderHandle>,
    domain_shader: Option<ShaderHandle>,
    geometry_shader: Option<ShaderHandle>,
    pixel_shader: Option<ShaderHandle>,
    backends: BackendFlags,
}

struct ComputeEntry {
    name: String,
    signature_names: Vec<String>,
    compute_shader: Option<ShaderHandle>,
    backends: BackendFlags,
}

struct TileEntry {
    name: String,
    signature_names: Vec<String>,
    tile_shader: Option<ShaderHandle>,
    backends: BackendFlags,
}

struct RayTracingEntry {
    name: String,
    signature_names: Vec<String>,
    max_recursion_depth: u32,
    general_shaders: Vec<Option<ShaderHandle>>,
    triangle_hit_groups: Vec<(Option<ShaderHandle>, Option<ShaderHandle>)>,
    procedural_hit_groups: Vec<(Option<ShaderHandle>, Option<ShaderHandle>, Option<ShaderHandle>)>,
    backends: BackendFlags,
}

/// Accumulates the four PSO kinds against a [`SerializationDevice`]'s
/// already-registered shaders, render passes, and signatures, then lays the
/// whole thing out into one archive byte buffer.
pub struct ArchiveWriter<'a> {
    device: &'a SerializationDevice,
    graphics: Vec<GraphicsEntry>,
    compute: Vec<ComputeEntry>,
    tile: Vec<TileEntry>,
    ray_tracing: Vec<RayTracingEntry>,
}

fn shader_index(handle: Option<&ShaderHandle>) -> u32 {
    handle.map(|h| h.0).unwrap_or(pso_archive::entries::NO_SHADER)
}

impl<'a> ArchiveWriter<'a> {
    pub fn new(device: &'a SerializationDevice) -> Self {
        ArchiveWriter {
            device,
            graphics: Vec::new(),
            compute: Vec::new(),
            tile: Vec::new(),
            ray_tracing: Vec::new(),
        }
    }

    fn check_refs(&self, signature_names: &[String], render_pass_name: Option<&str>) -> anyhow::Result<()> {
        for name in signature_names {
            if !self.device.signatures().contains_key(name) {
                anyhow::bail!("signature {name:?} was not registered with the device");
            }
        }
        if let Some(name) = render_pass_name {
            if !self.device.render_passes().contains_key(name) {
                anyhow::bail!("render pass {name:?} was not registered with the device");
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_graphics_pipeline_state(
        &mut self,
        name: &str,
        signature_names: Vec<String>,
        render_pass: Option<&RenderPassHandle>,
        vertex_shader: Option<ShaderHandle>,
        hull_shader: Option<ShaderHandle>,
        domain_shader: Option<ShaderHandle>,
        geometry_shader: Option<ShaderHandle>,
        pixel_shader: Option<ShaderHandle>,
        backends: BackendFlags,
    ) -> anyhow::Result<()> {
        self.check_refs(&signature_names, render_pass.map(|h| h.0.as_str()))?;
        self.graphics.push(GraphicsEntry {
            name: name.to_string(),
            signature_names,
            render_pass_name: render_pass.map(|h| h.0.clone()),
            vertex_shader,
            hull_shader,
            domain_shader,
            geometry_shader,
            pixel_shader,
            backends,
        });
        Ok(())
    }

    pub fn add_compute_pipeline_state(
        &mut self,
        name: &str,
        signature_names: Vec<String>,
        compute_shader: Option<ShaderHandle>,
        backends: BackendFlags,
    ) -> anyhow::Result<()> {
        self.check_refs(&signature_names, None)?;
        self.compute.push(ComputeEntry {
            name: name.to_string(),
            signature_names,
            compute_shader,
            backends,
        });
        Ok(())
    }

    pub fn add_tile_pipeline_state(
        &mut self,
        name: &str,
        signature_names: Vec<String>,
        tile_shader: Option<ShaderHandle>,
        backends: BackendFlags,
    ) -> anyhow::Result<()> {
        self.check_refs(&signature_names, None)?;
        self.tile.push(TileEntry {
            name: name.to_string(),
            signature_names,
            tile_shader,
            backends,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_ray_tracing_pipeline_state(
        &mut self,
        name: &str,
        signature_names: Vec<String>,
        max_recursion_depth: u32,
        general_shaders: Vec<Option<ShaderHandle>>,
        triangle_hit_groups: Vec<(Option<ShaderHandle>, Option<ShaderHandle>)>,
        procedural_hit_groups: Vec<(Option<ShaderHandle>, Option<ShaderHandle>, Option<ShaderHandle>)>,
        backends: BackendFlags,
    ) -> anyhow::Result<()> {
        self.check_refs(&signature_names, None)?;
        self.ray_tracing.push(RayTracingEntry {
            name: name.to_string(),
            signature_names,
            max_recursion_depth,
            general_shaders,
            triangle_hit_groups,
            procedural_hit_groups,
            backends,
        });
        Ok(())
    }

    fn backend_sizes(backends: BackendFlags) -> [u32; NUM_BACKENDS] {
        let mut sizes = [0u32; NUM_BACKENDS];
        for (i, slot) in sizes.iter_mut().enumerate() {
            let tag = BackendTag::from_u32(i as u32).expect("i < NUM_BACKENDS");
            if backends.contains_tag(tag) {
                *slot = 1;
            }
        }
        sizes
    }

    fn encode_measured<F: FnOnce(&mut Serializer<'_>) -> archive_format::Result<()>>(
        f: F,
    ) -> anyhow::Result<Vec<u8>> {
        let mut measure = Serializer::measure();
        f(&mut measure)?;
        let len = measure.pos();
        let mut buf = vec![0u8; len];
        f(&mut Serializer::encoder(&mut buf))?;
        Ok(buf)
    }

    /// Lays the whole archive out and returns the final byte buffer.
    /// `source_commit` is written into the `ArchiveDebugInfo` chunk verbatim
    /// (§4.3 step 5) — purely informational, never checked by the reader
    /// beyond a logged mismatch.
    pub fn finish(&self, source_commit: &str) -> anyhow::Result<Vec<u8>> {
        // Shader blocks: one common (offset, size) pair per shader shared by
        // every backend (§3's shader table has no per-backend column), so
        // every backend's encoded block for a given shader is padded with
        // trailing zero bytes up to the widest backend's encoding.
        let mut shader_blocks_per_backend: [Vec<u8>; NUM_BACKENDS] = std::array::from_fn(|_| Vec::new());
        let mut shader_directory = Vec::with_capacity(self.device.shaders().len());
        for shader in self.device.shaders() {
            let mut encoded_per_backend: HashMap<BackendTag, Vec<u8>> = HashMap::new();
            let mut max_len = 0usize;
            for (&tag, bytecode) in &shader.backend_bytecode {
                let encoded = Self::encode_measured(|ser| {
                    pso_archive::entries::encode_shader_block(ser, &shader.name, shader.stage.bits(), bytecode)
                })?;
                max_len = max_len.max(encoded.len());
                encoded_per_backend.insert(tag, encoded);
            }

            let offset = shader_blocks_per_backend[0].len() as u32;
            for (i, blob) in shader_blocks_per_backend.iter_mut().enumerate() {
                let tag = BackendTag::from_u32(i as u32).expect("i < NUM_BACKENDS");
                let mut bytes = encoded_per_backend.remove(&tag).unwrap_or_default();
                bytes.resize(max_len, 0);
                blob.extend_from_slice(&bytes);
            }
            shader_directory.push((offset, max_len as u32));
        }

        // Non-shader resource kinds only ever check `block_base_offsets[backend]
        // + 0 + size <= body.len()` as a presence gate (§4.6 step 5) — no
        // backend-specific bytes of their own live in this rendition (see
        // DESIGN.md), so every backend's block just needs to be at least as
        // wide as the largest presence marker, which the shader blocks above
        // already provide whenever any shader exists for that backend.
        let widest_presence_marker = 1u32;
        for blob in shader_blocks_per_backend.iter_mut() {
            if blob.len() < widest_presence_marker as usize {
                blob.resize(widest_presence_marker as usize, 0);
            }
        }

        let mut chunks: Vec<(ChunkType, Vec<u8>)> = Vec::new();

        chunks.push((ChunkType::ArchiveDebugInfo, Self::encode_measured(|ser| {
            ser.cstr_encode(concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")))?;
            ser.cstr_encode(source_commit)?;
            Ok(())
        })?));

        let mut signature_names: Vec<&String> = self.device.signatures().keys().collect();
        signature_names.sort();
        let mut signature_entries = Vec::new();
        for name in &signature_names {
            let record = &self.device.signatures()[*name];
            let bytes = Self::encode_measured(|ser| {
                pso_archive::entries::encode_signature_entry(ser, &record.desc, &Self::backend_sizes(record.backends))
            })?;
            signature_entries.push(((*name).clone(), bytes));
        }
        chunks.push((ChunkType::ResourceSignature, Self::encode_directory(&signature_entries)?));

        let mut render_pass_names: Vec<&String> = self.device.render_passes().keys().collect();
        render_pass_names.sort();
        let mut render_pass_entries = Vec::new();
        for name in &render_pass_names {
            let record = &self.device.render_passes()[*name];
            let bytes = Self::encode_measured(|ser| {
                pso_archive::entries::encode_render_pass_entry(
                    ser,
                    &pso_archive::entries::RawRenderPassEntry {
                        color_attachment_count: record.color_attachment_count,
                        has_depth_stencil: record.has_depth_stencil,
                        backend_sizes: Self::backend_sizes(record.backends),
                    },
                )
            })?;
            render_pass_entries.push(((*name).clone(), bytes));
        }
        chunks.push((ChunkType::RenderPass, Self::encode_directory(&render_pass_entries)?));

        let mut graphics_entries = Vec::new();
        for e in &self.graphics {
            let bytes = Self::encode_measured(|ser| {
                pso_archive::entries::encode_graphics_entry(
                    ser,
                    &pso_archive::entries::RawGraphicsEntry {
                        signature_names: e.signature_names.clone(),
                        render_pass_name: e.render_pass_name.clone(),
                        vertex_shader: shader_index(e.vertex_shader.as_ref()),
                        hull_shader: shader_index(e.hull_shader.as_ref()),
                        domain_shader: shader_index(e.domain_shader.as_ref()),
                        geometry_shader: shader_index(e.geometry_shader.as_ref()),
                        pixel_shader: shader_index(e.pixel_shader.as_ref()),
                        backend_sizes: Self::backend_sizes(e.backends),
                    },
                )
            })?;
            graphics_entries.push((e.name.clone(), bytes));
        }
        chunks.push((ChunkType::GraphicsPipelineStates, Self::encode_directory(&graphics_entries)?));

        let mut compute_entries = Vec::new();
        for e in &self.compute {
            let bytes = Self::encode_measured(|ser| {
                pso_archive::entries::encode_compute_entry(
                    ser,
                    &pso_archive::entries::RawComputeEntry {
                        signature_names: e.signature_names.clone(),
                        compute_shader: shader_index(e.compute_shader.as_ref()),
                        backend_sizes: Self::backend_sizes(e.backends),
                    },
                )
            })?;
            compute_entries.push((e.name.clone(), bytes));
        }
        chunks.push((ChunkType::ComputePipelineStates, Self::encode_directory(&compute_entries)?));

        let mut tile_entries = Vec::new();
        for e in &self.tile {
            let bytes = Self::encode_measured(|ser| {
                pso_archive::entries::encode_tile_entry(
                    ser,
                    &pso_archive::entries::RawTileEntry {
                        signature_names: e.signature_names.clone(),
                        tile_shader: shader_index(e.tile_shader.as_ref()),
                        backend_sizes: Self::backend_sizes(e.backends),
                    },
                )
            })?;
            tile_entries.push((e.name.clone(), bytes));
        }
        chunks.push((ChunkType::TilePipelineStates, Self::encode_directory(&tile_entries)?));

        let mut ray_tracing_entries = Vec::new();
        for e in &self.ray_tracing {
            let bytes = Self::encode_measured(|ser| {
                pso_archive::entries::encode_ray_tracing_entry(
                    ser,
                    &pso_archive::entries::RawRayTracingEntry {
                        signature_names: e.signature_names.clone(),
                        max_recursion_depth: e.max_recursion_depth,
                        general_shaders: e.general_shaders.iter().map(|h| shader_index(h.as_ref())).collect(),
                        triangle_hit_groups: e
                            .triangle_hit_groups
                            .iter()
                            .map(|(ch, ah)| pso_archive::entries::RawTriangleHitGroup {
                                closest_hit: shader_index(ch.as_ref()),
                                any_hit: shader_index(ah.as_ref()),
                            })
                            .collect(),
                        procedural_hit_groups: e
                            .procedural_hit_groups
                            .iter()
                            .map(|(i, ch, ah)| pso_archive::entries::RawProceduralHitGroup {
                                intersection: shader_index(i.as_ref()),
                                closest_hit: shader_index(ch.as_ref()),
                                any_hit: shader_index(ah.as_ref()),
                            })
                            .collect(),
                        backend_sizes: Self::backend_sizes(e.backends),
                    },
                )
            })?;
            ray_tracing_entries.push((e.name.clone(), bytes));
        }
        chunks.push((ChunkType::RayTracingPipelineStates, Self::encode_directory(&ray_tracing_entries)?));

        chunks.push((ChunkType::Shaders, Self::encode_measured(|ser| {
            let mut count = shader_directory.len() as u32;
            ser.u32(&mut count)?;
            for &(offset, size) in &shader_directory {
                let mut offset = offset;
                let mut size = size;
                ser.u32(&mut offset)?;
                ser.u32(&mut size)?;
            }
            Ok(())
        })?));

        let mut body = Vec::new();
        let mut chunk_headers = Vec::with_capacity(chunks.len());
        for (ty, bytes) in &chunks {
            chunk_headers.push(ChunkHeader {
                ty: *ty,
                offset: body.len() as u32,
                size: bytes.len() as u32,
            });
            body.extend_from_slice(bytes);
        }

        let mut block_base_offsets = [0u32; NUM_BACKENDS];
        for (i, blob) in shader_blocks_per_backend.iter().enumerate() {
            block_base_offsets[i] = body.len() as u32;
            body.extend_from_slice(blob);
        }

        let header = Header {
            version: VERSION,
            num_chunks: chunk_headers.len() as u32,
            block_base_offsets,
        };

        let mut out = vec![0u8; Header::ENCODED_SIZE];
        header.encode(&mut Serializer::encoder(&mut out))?;

        for chunk in &chunk_headers {
            let mut chunk_bytes = vec![0u8; ChunkHeader::ENCODED_SIZE];
            chunk.encode(&mut Serializer::encoder(&mut chunk_bytes))?;
            out.extend_from_slice(&chunk_bytes);
        }

        out.extend_from_slice(&body);

        log::info!(
            "wrote archive: {} bytes, {} chunks, {} shaders",
            out.len(),
            chunk_headers.len(),
            shader_directory.len()
        );

        Ok(out)
    }

    fn encode_directory(entries: &[(String, Vec<u8>)]) -> anyhow::Result<Vec<u8>> {
        // Entry bytes are appended right after the directory's own bytes
        // (§6): the directory only needs to know each entry's length up
        // front to compute a running offset, not the entry content itself.
        let dir_len = Self::encode_measured(|ser| {
            let mut count = entries.len() as u32;
            ser.u32(&mut count)?;
            for (name, bytes) in entries {
                ser.cstr_encode(name)?;
                let mut offset = 0u32;
                ser.u32(&mut offset)?;
                let mut size = bytes.len() as u32;
                ser.u32(&mut size)?;
            }
            Ok(())
        })?
        .len();

        let mut out = Self::encode_measured(|ser| {
            let mut count = entries.len() as u32;
            ser.u32(&mut count)?;
            let mut running = dir_len as u32;
            for (name, bytes) in entries {
                ser.cstr_encode(name)?;
                let mut offset = running;
                ser.u32(&mut offset)?;
                let mut size = bytes.len() as u32;
                ser.u32(&mut size)?;
                running += bytes.len() as u32;
            }
            Ok(())
        })?;

        for (_, bytes) in entries {
            out.extend_from_slice(bytes);
        }
        Ok(out)
    }
}
