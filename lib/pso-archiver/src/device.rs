//! The write-side façade (§4.8): a `SerializationDevice` accumulates
//! shaders, render passes, and resource signatures in memory, each tagged
//! with the subset of backends it carries compiled data for, and hands the
//! caller back a handle. [`crate::writer::ArchiveWriter`] later resolves
//! those handles into chunks.

use std::collections::HashMap;

use archive_device_traits::{
    BackendFlags, PipelineResourceBinding, PipelineResourceSignatureDesc, ShaderStages,
};
use archive_format::BackendTag;

/// Indexes into [`SerializationDevice`]'s shader table in registration
/// order — the same order the archive's `Shaders` directory will use, so a
/// handle doubles as the eventual on-disk shader index (§4.6 step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderHandle(pub(crate) u32);

/// Render passes and resource signatures are referenced by name on the read
/// side (§3), so their handles just echo the name back, guaranteeing the
/// caller used the name that was actually registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassHandle(pub(crate) String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHandle(pub(crate) String);

pub(crate) struct ShaderRecord {
    pub name: String,
    pub stage: ShaderStages,
    pub backend_bytecode: HashMap<BackendTag, Vec<u8>>,
}

pub(crate) struct RenderPassRecord {
    pub color_attachment_count: u32,
    pub has_depth_stencil: bool,
    pub backends: BackendFlags,
}

pub(crate) struct SignatureRecord {
    pub desc: PipelineResourceSignatureDesc,
    pub backends: BackendFlags,
}

/// Write-side façade mirroring the shape of [`archive_device_traits::Device`]
/// without implementing that trait — construction here accumulates records
/// for a later [`crate::writer::ArchiveWriter`] pass rather than calling into
/// a live backend.
pub struct SerializationDevice {
    valid_device_bits: BackendFlags,
    shaders: Vec<ShaderRecord>,
    render_passes: HashMap<String, RenderPassRecord>,
    signatures: HashMap<String, SignatureRecord>,
}

impl SerializationDevice {
    /// `valid_device_bits` is the set of backends this device will ever be
    /// asked to carry compiled data for — in the original this came from a
    /// build-time macro set; here the caller passes it explicitly (the
    /// cfg-gated compiled-in backend list lives at the call site, not in
    /// this crate).
    pub fn new(valid_device_bits: BackendFlags) -> Self {
        SerializationDevice {
            valid_device_bits,
            shaders: Vec::new(),
            render_passes: HashMap::new(),
            signatures: HashMap::new(),
        }
    }

    pub fn valid_device_bits(&self) -> BackendFlags {
        self.valid_device_bits
    }

    fn check_backends(&self, backends: BackendFlags) -> anyhow::Result<()> {
        if !self.valid_device_bits.contains(backends) {
            anyhow::bail!(
                "backend set {backends:?} is not a subset of valid_device_bits {:?}",
                self.valid_device_bits
            );
        }
        Ok(())
    }

    /// Registers one shader's compiled bytecode, one entry per backend it
    /// was compiled for. Every key of `backend_bytecode` must be contained
    /// in `valid_device_bits`.
    pub fn create_shader(
        &mut self,
        name: &str,
        stage: ShaderStages,
        backend_bytecode: HashMap<BackendTag, Vec<u8>>,
    ) -> anyhow::Result<ShaderHandle> {
        let backends = backend_bytecode
            .keys()
            .fold(BackendFlags::empty(), |acc, &tag| acc | BackendFlags::from_tag(tag));
        self.check_backends(backends)?;

        let index = self.shaders.len() as u32;
        self.shaders.push(ShaderRecord {
            name: name.to_string(),
            stage,
            backend_bytecode,
        });
        Ok(ShaderHandle(index))
    }

    pub fn create_render_pass(
        &mut self,
        name: &str,
        color_attachment_count: u32,
        has_depth_stencil: bool,
        backends: BackendFlags,
    ) -> anyhow::Result<RenderPassHandle> {
        if self.render_passes.contains_key(name) {
            anyhow::bail!("render pass {name:?} already registered");
        }
        self.check_backends(backends)?;
        self.render_passes.insert(
            name.to_string(),
            RenderPassRecord {
                color_attachment_count,
                has_depth_stencil,
                backends,
            },
        );
        Ok(RenderPassHandle(name.to_string()))
    }

    pub fn create_pipeline_resource_signature(
        &mut self,
        desc: PipelineResourceSignatureDesc,
        backends: BackendFlags,
    ) -> anyhow::Result<SignatureHandle> {
        if self.signatures.contains_key(&desc.name) {
            anyhow::bail!("resource signature {:?} already registered", desc.name);
        }
        self.check_backends(backends)?;
        let name = desc.name.clone();
        self.signatures.insert(name.clone(), SignatureRecord { desc, backends });
        Ok(SignatureHandle(name))
    }

    /// Re-exposes the read side's binding-assignment algorithm (§4.5) so an
    /// offline caller can preview a pipeline's layout before committing it
    /// to a signature or handing shaders to a real compiler.
    pub fn get_pipeline_resource_bindings(
        &self,
        signatures: &[PipelineResourceSignatureDesc],
        backend: BackendTag,
        stages: ShaderStages,
        num_render_targets: u32,
    ) -> archive_format::Result<Vec<PipelineResourceBinding>> {
        pso_bindings::get_pipeline_resource_bindings(signatures, backend, stages, num_render_targets)
    }

    pub(crate) fn shaders(&self) -> &[ShaderRecord] {
        &self.shaders
    }

    pub(crate) fn render_passes(&self) -> &HashMap<String, RenderPassRecord> {
        &self.render_passes
    }

    pub(crate) fn signatures(&self) -> &HashMap<String, SignatureRecord> {
        &self.signatures
    }
}
