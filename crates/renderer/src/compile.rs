use std::fmt;

use thiserror::Error;
use wgpu::naga;

/// Name of the float uniform that receives elapsed seconds each frame.
pub const TIME_UNIFORM: &str = "Time";

/// Block declaration substituted for a bare `uniform float Time;` line.
///
/// Kept on a single line so diagnostics still point at the user's line numbers.
const TIME_BLOCK: &str = "layout(std140, set = 0, binding = 0) uniform CanvasTime { float Time; };";

const SEPARATOR: &str = "==========================================================";

/// Pipeline step a piece of shader code is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    pub(crate) fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex shader"),
            StageKind::Fragment => f.write_str("fragment shader"),
        }
    }
}

/// Which object a [`Diagnostic`] was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Stage(StageKind),
    Program,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Stage(kind) => kind.fmt(f),
            DiagnosticKind::Program => f.write_str("shader program"),
        }
    }
}

/// Compiler or linker failure together with the full log text.
#[derive(Debug, Clone, Error)]
#[error("error compiling {kind}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub log: String,
}

impl Diagnostic {
    pub fn stage(kind: StageKind, log: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Stage(kind),
            log: log.into(),
        }
    }

    pub fn program(log: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Program,
            log: log.into(),
        }
    }

    /// Renders the log between separator lines, ready for stderr.
    pub fn framed(&self) -> String {
        format!(
            "Error compiling {kind}.\n{SEPARATOR}\n{log}\n{SEPARATOR}",
            kind = self.kind,
            log = self.log.trim_end()
        )
    }
}

/// GLSL that passed parsing and validation and is ready for the GPU.
#[derive(Debug, Clone)]
pub struct PreparedStage {
    pub kind: StageKind,
    /// Source handed to wgpu, after the time uniform rewrite.
    pub source: String,
    /// Whether the stage declares the [`TIME_UNIFORM`].
    pub uses_time: bool,
}

/// Parses and validates `source` for `kind` without touching the GPU.
///
/// Parse and validation failures come back as a [`Diagnostic`] carrying naga's
/// rendered report, which quotes the offending lines of `source`.
pub fn prepare_stage(source: &str, kind: StageKind) -> Result<PreparedStage, Diagnostic> {
    if source.trim().is_empty() {
        return Err(Diagnostic::stage(kind, "shader source is empty"));
    }

    let source = rewrite_time_uniform(source);
    let options = naga::front::glsl::Options::from(kind.naga_stage());
    let module = naga::front::glsl::Frontend::default()
        .parse(&options, &source)
        .map_err(|errors| Diagnostic::stage(kind, errors.emit_to_string(&source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|error| Diagnostic::stage(kind, error.emit_to_string(&source)))?;

    let uses_time = declares_time_uniform(&module);
    Ok(PreparedStage {
        kind,
        source,
        uses_time,
    })
}

/// Swaps a loose `uniform float Time;` declaration for a std140 block.
///
/// naga only accepts non-opaque uniforms inside blocks, while quick test
/// shaders usually declare the time as a plain uniform.
fn rewrite_time_uniform(source: &str) -> String {
    let mut rewritten = String::with_capacity(source.len() + TIME_BLOCK.len());
    for line in source.lines() {
        if is_loose_time_uniform(line) {
            rewritten.push_str(TIME_BLOCK);
        } else {
            rewritten.push_str(line);
        }
        rewritten.push('\n');
    }
    rewritten
}

fn is_loose_time_uniform(line: &str) -> bool {
    let code = line.split_once("//").map_or(line, |(code, _)| code);
    let Some(declaration) = code.trim().strip_suffix(';') else {
        return false;
    };
    let tokens: Vec<&str> = declaration.split_whitespace().collect();
    match tokens.as_slice() {
        ["uniform", "float", name] => *name == TIME_UNIFORM,
        ["uniform", "lowp" | "mediump" | "highp", "float", name] => *name == TIME_UNIFORM,
        _ => false,
    }
}

fn declares_time_uniform(module: &naga::Module) -> bool {
    module.global_variables.iter().any(|(_, var)| {
        if var.space != naga::AddressSpace::Uniform {
            return false;
        }
        if var.name.as_deref() == Some(TIME_UNIFORM) {
            return true;
        }
        match &module.types[var.ty].inner {
            naga::TypeInner::Struct { members, .. } => members
                .iter()
                .any(|member| member.name.as_deref() == Some(TIME_UNIFORM)),
            _ => false,
        }
    })
}

/// Pass-through vertex shader for the two-triangle quad.
pub const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 aPos;
layout(location = 0) out vec2 UV;

void main() {
    gl_Position = vec4(aPos, 0.0, 1.0);
    UV = aPos * 0.5 + vec2(0.5, 0.5);
}
";

/// Fragment shader used when no file is given: red and green follow the UVs.
pub const DEFAULT_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 UV;
layout(location = 0) out vec4 FragColor;

void main() {
    FragColor = vec4(UV, 0.0, 1.0);
}
";

/// Clip-space positions of the full-screen quad, two counter-clockwise triangles.
pub const QUAD_VERTICES: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sources_validate() {
        let vertex = prepare_stage(VERTEX_SHADER_GLSL, StageKind::Vertex).unwrap();
        let fragment = prepare_stage(DEFAULT_FRAGMENT_GLSL, StageKind::Fragment).unwrap();
        assert!(!vertex.uses_time);
        assert!(!fragment.uses_time);
    }

    #[test]
    fn syntax_error_names_the_stage() {
        let source = "#version 450\nlayout(location = 0) out vec4 FragColor;\nvoid main() { FragColor = ; }\n";
        let diagnostic = prepare_stage(source, StageKind::Fragment).unwrap_err();
        assert_eq!(diagnostic.kind, DiagnosticKind::Stage(StageKind::Fragment));
        assert!(!diagnostic.log.is_empty());
        assert!(diagnostic.framed().contains("fragment"));
        assert!(diagnostic.to_string().contains("fragment"));
    }

    #[test]
    fn empty_source_is_rejected() {
        let diagnostic = prepare_stage("  \n", StageKind::Vertex).unwrap_err();
        assert!(diagnostic.framed().contains("vertex shader"));
    }

    #[test]
    fn loose_time_uniform_becomes_block() {
        let source = r"#version 450
layout(location = 0) in vec2 UV;
layout(location = 0) out vec4 FragColor;
uniform float Time;

void main() {
    FragColor = vec4(UV, 0.5 + 0.5 * sin(Time), 1.0);
}
";
        let prepared = prepare_stage(source, StageKind::Fragment).unwrap();
        assert!(prepared.uses_time);
        assert!(prepared.source.contains("uniform CanvasTime"));
        assert!(!prepared.source.contains("uniform float Time;"));
        assert_eq!(prepared.source.lines().count(), source.lines().count());
    }

    #[test]
    fn explicit_time_block_is_detected() {
        let source = r"#version 450
layout(location = 0) in vec2 UV;
layout(location = 0) out vec4 FragColor;
layout(std140, set = 0, binding = 0) uniform Params { float Time; };

void main() {
    FragColor = vec4(UV * Time, 0.0, 1.0);
}
";
        assert!(prepare_stage(source, StageKind::Fragment).unwrap().uses_time);
    }

    #[test]
    fn only_exact_time_declarations_are_rewritten() {
        assert!(is_loose_time_uniform("uniform float Time;"));
        assert!(is_loose_time_uniform("   uniform   float Time ;"));
        assert!(!is_loose_time_uniform("uniform float TimeScale;"));
        assert!(!is_loose_time_uniform("uniform vec2 Time;"));
        assert!(!is_loose_time_uniform("// uniform float Time;"));
    }

    #[test]
    fn time_declaration_with_trailing_comment_is_rewritten() {
        assert!(is_loose_time_uniform("uniform float Time; // seconds"));
        assert!(is_loose_time_uniform("uniform highp float Time;"));
        assert!(!is_loose_time_uniform("uniform float Time // ;"));

        let source = "#version 450\r\n\
layout(location = 0) in vec2 UV;\r\n\
layout(location = 0) out vec4 FragColor;\r\n\
uniform float Time; // seconds since start\r\n\
void main() {\r\n\
    FragColor = vec4(UV, fract(Time), 1.0);\r\n\
}\r\n";
        let prepared = prepare_stage(source, StageKind::Fragment).unwrap();
        assert!(prepared.uses_time);
        assert!(!prepared.source.contains("seconds since start"));
        assert_eq!(prepared.source.lines().count(), source.lines().count());
    }

    #[test]
    fn quad_covers_clip_space() {
        let uv: Vec<[f32; 2]> = QUAD_VERTICES
            .iter()
            .map(|[x, y]| [x * 0.5 + 0.5, y * 0.5 + 0.5])
            .collect();
        assert!(uv.contains(&[0.0, 0.0]));
        assert!(uv.contains(&[1.0, 1.0]));
        assert!(uv.contains(&[0.0, 1.0]));
        assert!(uv.contains(&[1.0, 0.0]));
    }
}
