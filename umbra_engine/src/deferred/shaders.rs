/// Shader programs of the deferred passes
///
/// Shaders are compiled ahead of time. A `ShaderLoader` hands out the SPIR-V
/// of each pass; every pass needs a vertex stage, the shadow pass may omit
/// its fragment stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::renderer::{Renderer, Shader, ShaderDesc, ShaderStage};
use crate::{engine_debug, engine_fail};

/// Entry point of every deferred shader
pub const SHADER_ENTRY_POINT: &str = "main";

/// The three programs of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderPass {
    Shadow,
    Geometry,
    Composition,
}

impl ShaderPass {
    pub const ALL: [ShaderPass; 3] = [ShaderPass::Shadow, ShaderPass::Geometry, ShaderPass::Composition];

    /// File-name stem of the pass
    pub fn name(&self) -> &'static str {
        match self {
            ShaderPass::Shadow => "shadow",
            ShaderPass::Geometry => "geometry",
            ShaderPass::Composition => "composition",
        }
    }

    /// Whether the pass can run without a fragment stage
    pub fn fragment_optional(&self) -> bool {
        matches!(self, ShaderPass::Shadow)
    }
}

/// Compiled code of one stage
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderBlob {
    pub stage: ShaderStage,
    pub code: Vec<u8>,
    pub entry_point: String,
}

impl ShaderBlob {
    pub fn new(stage: ShaderStage, code: Vec<u8>) -> Self {
        Self {
            stage,
            code,
            entry_point: SHADER_ENTRY_POINT.to_string(),
        }
    }
}

pub trait ShaderLoader {
    /// Every stage available for `pass`
    fn load(&self, pass: ShaderPass) -> Result<Vec<ShaderBlob>>;
}

/// Loads `<dir>/<pass>.<stage>.spv`, e.g. `shaders/geometry.vert.spv`
pub struct DirectoryShaderLoader {
    dir: PathBuf,
}

impl DirectoryShaderLoader {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self, pass: ShaderPass, stage: ShaderStage) -> PathBuf {
        self.dir.join(format!("{}.{}.spv", pass.name(), stage.tag()))
    }
}

impl ShaderLoader for DirectoryShaderLoader {
    fn load(&self, pass: ShaderPass) -> Result<Vec<ShaderBlob>> {
        let mut blobs = Vec::with_capacity(2);
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let path = self.path(pass, stage);
            if !path.exists() {
                continue;
            }
            let code = std::fs::read(&path).map_err(|e| {
                engine_fail!(
                    "umbra::shaders",
                    Error::InitializationFailed(format!("cannot read {}: {}", path.display(), e))
                )
            })?;
            blobs.push(ShaderBlob::new(stage, code));
        }
        Ok(blobs)
    }
}

/// In-memory shader table, for embedded SPIR-V and tests
#[derive(Default)]
pub struct MemoryShaderLoader {
    blobs: FxHashMap<(ShaderPass, ShaderStage), Vec<u8>>,
}

impl MemoryShaderLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pass: ShaderPass, stage: ShaderStage, code: Vec<u8>) {
        self.blobs.insert((pass, stage), code);
    }

    /// Builder form of `insert`
    pub fn with(mut self, pass: ShaderPass, stage: ShaderStage, code: Vec<u8>) -> Self {
        self.insert(pass, stage, code);
        self
    }
}

impl ShaderLoader for MemoryShaderLoader {
    fn load(&self, pass: ShaderPass) -> Result<Vec<ShaderBlob>> {
        let blobs = [ShaderStage::Vertex, ShaderStage::Fragment]
            .into_iter()
            .filter_map(|stage| {
                self.blobs
                    .get(&(pass, stage))
                    .map(|code| ShaderBlob::new(stage, code.clone()))
            })
            .collect();
        Ok(blobs)
    }
}

/// Shader modules of one pass
#[derive(Clone)]
pub struct PassShaders {
    pub vertex: Arc<dyn Shader>,
    pub fragment: Option<Arc<dyn Shader>>,
}

/// Shader modules of all three passes
#[derive(Clone)]
pub struct DeferredShaders {
    pub shadow: PassShaders,
    pub geometry: PassShaders,
    pub composition: PassShaders,
}

impl DeferredShaders {
    /// Load and compile every pass
    pub fn load(renderer: &dyn Renderer, loader: &dyn ShaderLoader) -> Result<Self> {
        Ok(Self {
            shadow: Self::compile_pass(renderer, loader, ShaderPass::Shadow)?,
            geometry: Self::compile_pass(renderer, loader, ShaderPass::Geometry)?,
            composition: Self::compile_pass(renderer, loader, ShaderPass::Composition)?,
        })
    }

    pub fn pass(&self, pass: ShaderPass) -> &PassShaders {
        match pass {
            ShaderPass::Shadow => &self.shadow,
            ShaderPass::Geometry => &self.geometry,
            ShaderPass::Composition => &self.composition,
        }
    }

    fn compile_pass(renderer: &dyn Renderer, loader: &dyn ShaderLoader, pass: ShaderPass) -> Result<PassShaders> {
        let blobs = loader.load(pass)?;
        let mut vertex = None;
        let mut fragment = None;

        for blob in &blobs {
            let label = format!("{}.{}", pass.name(), blob.stage.tag());
            let shader = renderer.create_shader(ShaderDesc {
                label: &label,
                code: &blob.code,
                stage: blob.stage,
                entry_point: &blob.entry_point,
            })?;
            match blob.stage {
                ShaderStage::Vertex => vertex = Some(shader),
                ShaderStage::Fragment => fragment = Some(shader),
            }
        }

        let Some(vertex) = vertex else {
            return Err(engine_fail!(
                "umbra::shaders",
                Error::InitializationFailed(format!("'{}' pass has no vertex shader", pass.name()))
            ));
        };
        if fragment.is_none() && !pass.fragment_optional() {
            return Err(engine_fail!(
                "umbra::shaders",
                Error::InitializationFailed(format!("'{}' pass has no fragment shader", pass.name()))
            ));
        }

        engine_debug!(
            "umbra::shaders",
            "'{}' pass compiled ({} stages)",
            pass.name(), if fragment.is_some() { 2 } else { 1 }
        );
        Ok(PassShaders { vertex, fragment })
    }
}

#[cfg(test)]
#[path = "shaders_tests.rs"]
mod tests;
