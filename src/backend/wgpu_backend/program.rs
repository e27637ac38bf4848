//! GLSL program compilation for the wgpu backend
//!
//! Each stage is parsed and validated with naga, reflected, checked against the other
//! stage and written out as WGSL. Binding convention:
//! - uniform block: `set = 0, binding = 0`, shared by both stages
//! - texture unit N: `texture2D` at `set = 1, binding = 2N`,
//!   `sampler` at `set = 1, binding = 2N + 1`

use crate::backend::traits::{BackendError, BackendResult};
use crate::backend::types::ShaderStage;
use naga::{
    AddressSpace, Binding, Module, ResourceBinding, Scalar, ScalarKind, TypeInner, VectorSize,
};
use std::collections::BTreeSet;

pub const UNIFORM_GROUP: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

/// Entry point name GLSL modules are given by the naga frontend
pub const ENTRY_POINT: &str = "main";

/// Value type of a uniform block member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Mat4,
    Other,
}

/// One member of the uniform block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    pub kind: UniformKind,
}

/// Resource and I/O layout of a linked program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub uniforms: Vec<UniformMember>,
    /// Size in bytes of the uniform block, zero when there is none
    pub block_size: u32,
    /// Texture units sampled by either stage, ascending
    pub texture_units: Vec<u32>,
    /// Vertex input locations, ascending
    pub vertex_inputs: Vec<u32>,
}

impl ProgramInterface {
    pub fn uniform(&self, name: &str) -> Option<(usize, &UniformMember)> {
        self.uniforms
            .iter()
            .enumerate()
            .find(|(_, member)| member.name == name)
    }
}

/// WGSL for both stages plus their shared interface
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub vertex_wgsl: String,
    pub fragment_wgsl: String,
    pub interface: ProgramInterface,
}

/// Reflection of a single stage
#[derive(Debug, Default)]
struct StageInterface {
    block: Option<(Vec<UniformMember>, u32)>,
    textures: BTreeSet<u32>,
    samplers: BTreeSet<u32>,
    inputs: BTreeSet<u32>,
    outputs: BTreeSet<u32>,
}

/// Compile and link a vertex/fragment GLSL pair
pub fn compile_program(
    vertex_source: &str,
    fragment_source: &str,
) -> BackendResult<CompiledProgram> {
    let (vertex_wgsl, vertex) = compile_stage(vertex_source, ShaderStage::Vertex)?;
    let (fragment_wgsl, fragment) = compile_stage(fragment_source, ShaderStage::Fragment)?;
    let interface = link(vertex, fragment)?;

    Ok(CompiledProgram {
        vertex_wgsl,
        fragment_wgsl,
        interface,
    })
}

fn compile_stage(source: &str, stage: ShaderStage) -> BackendResult<(String, StageInterface)> {
    let compile_error = |log: String| BackendError::ShaderCompilationFailed { stage, log };

    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let options = naga::front::glsl::Options {
        stage: naga_stage,
        defines: naga::FastHashMap::default(),
    };

    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| compile_error(format!("GLSL parse error:\n{errors}")))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator
        .validate(&module)
        .map_err(|e| compile_error(format!("Validation error: {e}")))?;

    let reflected = reflect(&module, naga_stage).map_err(compile_error)?;

    let flags = naga::back::wgsl::WriterFlags::empty();
    let wgsl = naga::back::wgsl::write_string(&module, &info, flags)
        .map_err(|e| compile_error(format!("WGSL generation error: {e}")))?;

    Ok((wgsl, reflected))
}

fn reflect(module: &Module, stage: naga::ShaderStage) -> Result<StageInterface, String> {
    let mut layouter = naga::proc::Layouter::default();
    layouter
        .update(module.to_ctx())
        .map_err(|e| format!("Layout error: {e}"))?;

    let mut out = StageInterface::default();

    for (_, global) in module.global_variables.iter() {
        let inner = &module.types[global.ty].inner;
        match (global.space, inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                if out.block.is_some() {
                    return Err("only one uniform block is supported".into());
                }
                expect_binding(global.binding.as_ref(), UNIFORM_GROUP, Some(0), "uniform block")?;
                let members = members
                    .iter()
                    .map(|member| UniformMember {
                        name: member.name.clone().unwrap_or_default(),
                        offset: member.offset,
                        size: layouter[member.ty].size,
                        kind: uniform_kind(&module.types[member.ty].inner),
                    })
                    .collect();
                out.block = Some((members, *span));
            }
            (AddressSpace::Handle, TypeInner::Image { .. }) => {
                let binding =
                    expect_binding(global.binding.as_ref(), TEXTURE_GROUP, None, "texture")?;
                if binding % 2 != 0 {
                    return Err(format!("texture at odd binding {binding}"));
                }
                out.textures.insert(binding / 2);
            }
            (AddressSpace::Handle, TypeInner::Sampler { .. }) => {
                let binding =
                    expect_binding(global.binding.as_ref(), TEXTURE_GROUP, None, "sampler")?;
                if binding % 2 != 1 {
                    return Err(format!("sampler at even binding {binding}"));
                }
                out.samplers.insert(binding / 2);
            }
            (AddressSpace::Uniform, _) => {
                return Err("uniforms must be declared inside a uniform block".into());
            }
            _ => {}
        }
    }

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == ENTRY_POINT)
        .ok_or_else(|| format!("no `{ENTRY_POINT}` entry point"))?;
    for argument in &entry.function.arguments {
        collect_locations(module, argument.ty, argument.binding.as_ref(), &mut out.inputs);
    }
    if let Some(result) = &entry.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut out.outputs);
    }

    Ok(out)
}

fn expect_binding(
    binding: Option<&ResourceBinding>,
    group: u32,
    index: Option<u32>,
    what: &str,
) -> Result<u32, String> {
    match binding {
        Some(rb) if rb.group == group && index.map_or(true, |i| rb.binding == i) => Ok(rb.binding),
        Some(rb) => Err(format!(
            "{what} declared at set = {}, binding = {}",
            rb.group, rb.binding
        )),
        None => Err(format!("{what} has no binding")),
    }
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
    match *inner {
        TypeInner::Scalar(Scalar {
            kind: ScalarKind::Sint,
            width: 4,
        }) => UniformKind::Int,
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar: Scalar {
                kind: ScalarKind::Float,
                width: 4,
            },
        } => UniformKind::Mat4,
        _ => UniformKind::Other,
    }
}

fn collect_locations(
    module: &Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location);
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn link(vertex: StageInterface, fragment: StageInterface) -> BackendResult<ProgramInterface> {
    let link_error = |msg: String| BackendError::ProgramLinkFailed(msg);

    if let Some(missing) = fragment.inputs.difference(&vertex.outputs).next() {
        return Err(link_error(format!(
            "fragment input at location {missing} is not written by the vertex stage"
        )));
    }

    let (uniforms, block_size) = match (vertex.block, fragment.block) {
        (Some(v), Some(f)) if v != f => {
            return Err(link_error("uniform block differs between stages".into()));
        }
        (Some(block), _) | (None, Some(block)) => block,
        (None, None) => (Vec::new(), 0),
    };

    let texture_units: BTreeSet<u32> = vertex.textures.union(&fragment.textures).copied().collect();
    let samplers: BTreeSet<u32> = vertex.samplers.union(&fragment.samplers).copied().collect();
    if texture_units != samplers {
        return Err(link_error(
            "every texture unit needs both a texture and a sampler".into(),
        ));
    }

    Ok(ProgramInterface {
        uniforms,
        block_size,
        texture_units: texture_units.into_iter().collect(),
        vertex_inputs: vertex.inputs.into_iter().collect(),
    })
}
