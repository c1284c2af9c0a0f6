//! Shader programs
//!
//! Programs are WGSL modules with a vertex and a fragment entry point. A
//! program is only constructed after it compiles (parses and validates with
//! naga) and links (both entry points exist and every fragment input location
//! is written by the vertex stage).
//!
//! Every program shares one binding interface:
//!
//! - `@group(0) @binding(0)`: per-frame uniforms (view, projection, eye, lights)
//! - `@group(1) @binding(0)`: per-object uniforms (model, material, flat color)
//! - `@group(1) @binding(1..2)`: texture unit 0 and its sampler
//! - vertex locations 0, 1, 2: position, normal, uv

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{Binding, Handle, Module, ShaderStage, Type, TypeInner};
use rustc_hash::FxHasher;

use crate::error::{Result, SceneError};

/// Per-vertex Phong (Gouraud) shading with up to four point lights
pub const LIT_SHADER: &str = r#"
struct Light {
    position: vec4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    // constant, linear, quadratic, enabled
    attenuation: vec4<f32>,
}

struct Frame {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    eye: vec4<f32>,
    light_count: vec4<u32>,
    lights: array<Light, 4>,
}

struct Object {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    flat_color: vec4<f32>,
    // shininess, has_texture, has_normals, unused
    params: vec4<f32>,
}

@group(0) @binding(0) var<uniform> frame: Frame;
@group(1) @binding(0) var<uniform> object: Object;
@group(1) @binding(1) var texture0: texture_2d<f32>;
@group(1) @binding(2) var sampler0: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let world = object.model * vec4<f32>(in.position, 1.0);
    var out: VertexOutput;
    out.clip_position = frame.projection * frame.view * world;
    out.uv = in.uv;

    if (object.params.z < 0.5) {
        out.color = object.diffuse;
        return out;
    }

    let n = normalize((object.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz);
    let v = normalize(frame.eye.xyz - world.xyz);
    var color = vec3<f32>(0.0);

    for (var i = 0u; i < frame.light_count.x; i = i + 1u) {
        let light = frame.lights[i];
        if (light.attenuation.w < 0.5) {
            continue;
        }

        var l = normalize(light.position.xyz);
        var dist = 0.0;
        if (light.position.w != 0.0) {
            let to_light = light.position.xyz - world.xyz;
            dist = length(to_light);
            l = to_light / max(dist, 1e-6);
        }

        let denom = light.attenuation.x + light.attenuation.y * dist + light.attenuation.z * dist * dist;
        var att = 1.0;
        if (denom > 0.0) {
            att = 1.0 / denom;
        }

        let ndotl = max(dot(n, l), 0.0);
        let ambient = light.ambient.rgb * object.ambient.rgb;
        let diffuse = ndotl * light.diffuse.rgb * object.diffuse.rgb;
        var specular = vec3<f32>(0.0);
        if (ndotl > 0.0) {
            let h = normalize(l + v);
            specular = pow(max(dot(n, h), 0.0), object.params.x) * light.specular.rgb * object.specular.rgb;
        }
        color = color + ambient + att * (diffuse + specular);
    }

    out.color = vec4<f32>(color, object.diffuse.a);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = in.color;
    if (object.params.y > 0.5) {
        color = color * textureSample(texture0, sampler0, in.uv);
    }
    return color;
}
"#;

/// Solid color output, used for identification colors and outlines
pub const UNLIT_SHADER: &str = r#"
struct Frame {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

struct Object {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    flat_color: vec4<f32>,
    params: vec4<f32>,
}

@group(0) @binding(0) var<uniform> frame: Frame;
@group(1) @binding(0) var<uniform> object: Object;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = frame.projection * frame.view * object.model * vec4<f32>(position, 1.0);
    return out;
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return object.flat_color;
}
"#;

/// Stable identity of a program's source and entry points
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u64);

/// A compiled and linked vertex + fragment program
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    name: Arc<str>,
    source: Arc<str>,
    vertex_entry: Arc<str>,
    fragment_entry: Arc<str>,
}

impl PartialEq for ShaderProgram {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl ShaderProgram {
    /// Compile and link WGSL with `vs_main` / `fs_main` entry points
    pub fn from_wgsl(name: &str, source: &str) -> Result<Self> {
        Self::with_entry_points(name, source, "vs_main", "fs_main")
    }

    /// Compile and link WGSL with custom entry point names
    pub fn with_entry_points(name: &str, source: &str, vertex: &str, fragment: &str) -> Result<Self> {
        let module = compile(name, source)?;
        link(&module, vertex, fragment)?;
        tracing::debug!(program = name, "shader program linked");
        Ok(Self::new_unchecked(name, source, vertex, fragment))
    }

    /// The built-in lit program
    pub fn lit() -> Self {
        Self::new_unchecked("lit", LIT_SHADER, "vs_main", "fs_main")
    }

    /// The built-in unlit program
    pub fn unlit() -> Self {
        Self::new_unchecked("unlit", UNLIT_SHADER, "vs_main", "fs_main")
    }

    fn new_unchecked(name: &str, source: &str, vertex: &str, fragment: &str) -> Self {
        let mut hasher = FxHasher::default();
        source.hash(&mut hasher);
        vertex.hash(&mut hasher);
        fragment.hash(&mut hasher);

        Self {
            id: ProgramId(hasher.finish()),
            name: name.into(),
            source: source.into(),
            vertex_entry: vertex.into(),
            fragment_entry: fragment.into(),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    pub fn fragment_entry(&self) -> &str {
        &self.fragment_entry
    }
}

/// Parse and validate a WGSL module
pub fn compile(name: &str, source: &str) -> Result<Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| SceneError::ShaderCompile {
        program: name.to_string(),
        diagnostic: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| SceneError::ShaderCompile {
            program: name.to_string(),
            diagnostic: e.emit_to_string(source),
        })?;

    Ok(module)
}

/// Check that the named stages exist and their interfaces line up
pub fn link(module: &Module, vertex: &str, fragment: &str) -> Result<()> {
    let find = |name: &str, stage: ShaderStage| {
        module
            .entry_points
            .iter()
            .find(|ep| ep.name == name && ep.stage == stage)
            .ok_or_else(|| SceneError::ShaderLink(format!("no {:?} entry point named '{}'", stage, name)))
    };
    let vs = find(vertex, ShaderStage::Vertex)?;
    let fs = find(fragment, ShaderStage::Fragment)?;

    let outputs = match &vs.function.result {
        Some(result) => locations(module, result.ty, result.binding.as_ref()),
        None => Vec::new(),
    };

    let mut missing: Vec<u32> = fs
        .function
        .arguments
        .iter()
        .flat_map(|arg| locations(module, arg.ty, arg.binding.as_ref()))
        .filter(|loc| !outputs.contains(loc))
        .collect();

    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(SceneError::ShaderLink(format!(
            "fragment inputs at locations {:?} are not written by '{}'",
            missing, vertex
        )));
    }
    Ok(())
}

/// User-defined `@location`s carried by an argument or result
fn locations(module: &Module, ty: Handle<Type>, binding: Option<&Binding>) -> Vec<u32> {
    match binding {
        Some(Binding::Location { location, .. }) => vec![*location],
        Some(Binding::BuiltIn(_)) => Vec::new(),
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .filter_map(|m| match m.binding {
                    Some(Binding::Location { location, .. }) => Some(location),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
    }
}
