//! WGSL front end shared by both devices.
//!
//! Sources go through naga, the front end wgpu itself uses, so the headless
//! device rejects the same shaders a real device would. The parsed module is
//! kept for entry-point, uniform and interface reflection.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, EntryPoint, Handle, Module, Type, TypeInner};

use super::{ShaderStage, VertexLayout};

/// Parses and validates `source`. The error is naga's annotated report.
pub(crate) fn parse(source: &str) -> Result<Module, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;
    Ok(module)
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

fn entry_point<'m>(module: &'m Module, stage: ShaderStage, name: &str) -> Option<&'m EntryPoint> {
    let stage = naga_stage(stage);
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == name)
}

/// Whether `module` declares `name` as an entry point of `stage`.
pub(crate) fn declares_entry_point(module: &Module, stage: ShaderStage, name: &str) -> bool {
    entry_point(module, stage, name).is_some()
}

/// Names of `var<uniform>` globals, in declaration order.
pub(crate) fn uniform_names(module: &Module) -> Vec<String> {
    module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == AddressSpace::Uniform)
        .filter_map(|(_, var)| var.name.clone())
        .collect()
}

fn push_locations(module: &Module, ty: Handle<Type>, binding: Option<&Binding>, out: &mut Vec<u32>) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(*location),
        Some(_) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                out.extend(members.iter().filter_map(|m| match &m.binding {
                    Some(Binding::Location { location, .. }) => Some(*location),
                    _ => None,
                }));
            }
        }
    }
}

/// `@location` inputs of an entry point.
fn input_locations(module: &Module, ep: &EntryPoint) -> Vec<u32> {
    let mut out = Vec::new();
    for arg in &ep.function.arguments {
        push_locations(module, arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

/// `@location` outputs of an entry point.
fn output_locations(module: &Module, ep: &EntryPoint) -> Vec<u32> {
    let mut out = Vec::new();
    if let Some(result) = &ep.function.result {
        push_locations(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

/// One compiled stage as seen by the linker.
pub(crate) struct StageRef<'a> {
    pub module: &'a Module,
    pub entry_point: &'a str,
}

/// Checks that the vertex inputs are fed by `layout` and that every fragment
/// input is written by the vertex stage.
pub(crate) fn check_interface(
    vertex: StageRef<'_>,
    fragment: StageRef<'_>,
    layout: &VertexLayout,
) -> Result<(), String> {
    let vs = entry_point(vertex.module, ShaderStage::Vertex, vertex.entry_point)
        .ok_or_else(|| format!("vertex entry point `{}` not found", vertex.entry_point))?;
    let fs = entry_point(fragment.module, ShaderStage::Fragment, fragment.entry_point)
        .ok_or_else(|| format!("fragment entry point `{}` not found", fragment.entry_point))?;

    for location in input_locations(vertex.module, vs) {
        if !layout.attributes.iter().any(|a| a.location == location) {
            return Err(format!(
                "vertex input @location({location}) has no attribute in the vertex layout"
            ));
        }
    }

    let written = output_locations(vertex.module, vs);
    for location in input_locations(fragment.module, fs) {
        if !written.contains(&location) {
            return Err(format!(
                "fragment input @location({location}) is not written by `{}`",
                vertex.entry_point
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AttributeFormat, VertexAttribute};

    const VS: &str = r#"
        struct VsOut {
            @builtin(position) clip: vec4<f32>,
            @location(0) color: vec3<f32>,
        };

        // transform for the whole quad
        @group(0) @binding(0) var<uniform> transform: mat4x4<f32>;
        @group(0) @binding(1) var<uniform> tint: vec4<f32>;

        @vertex
        fn vs_main(@location(0) pos: vec3<f32>) -> VsOut {
            var out: VsOut;
            out.clip = transform * vec4<f32>(pos, 1.0);
            out.color = tint.rgb;
            return out;
        }
    "#;

    const FS: &str = r#"
        @fragment
        fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
            return vec4<f32>(color, 1.0);
        }
    "#;

    fn position_only() -> VertexLayout {
        VertexLayout {
            stride: 12,
            attributes: vec![VertexAttribute {
                location: 0,
                offset: 0,
                format: AttributeFormat::Float32x3,
            }],
        }
    }

    fn stage<'a>(module: &'a Module, entry_point: &'a str) -> StageRef<'a> {
        StageRef {
            module,
            entry_point,
        }
    }

    #[test]
    fn finds_entry_point_for_matching_stage() {
        let module = parse(VS).unwrap();
        assert!(declares_entry_point(&module, ShaderStage::Vertex, "vs_main"));
        assert!(!declares_entry_point(&module, ShaderStage::Fragment, "vs_main"));
        assert!(!declares_entry_point(&module, ShaderStage::Vertex, "vs"));
    }

    #[test]
    fn commented_out_entry_point_is_ignored() {
        let module = parse("// @vertex fn vs_main() {}\n/* @vertex fn vs_main() {} */").unwrap();
        assert!(!declares_entry_point(&module, ShaderStage::Vertex, "vs_main"));
    }

    #[test]
    fn collects_uniform_names_in_order() {
        let module = parse(VS).unwrap();
        assert_eq!(uniform_names(&module), vec!["transform".to_string(), "tint".to_string()]);
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = parse("@vertex fn vs_main() -> @builtin(position) vec4<f32> { return + ; }")
            .unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn type_errors_are_reported() {
        let src = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec3<f32>(1.0); }";
        assert!(parse(src).is_err());
    }

    #[test]
    fn matching_interface_links() {
        let vs = parse(VS).unwrap();
        let fs = parse(FS).unwrap();
        assert_eq!(
            check_interface(stage(&vs, "vs_main"), stage(&fs, "fs_main"), &position_only()),
            Ok(())
        );
    }

    #[test]
    fn fragment_input_without_vertex_output_is_rejected() {
        let vs = parse(VS).unwrap();
        let fs = parse(
            "@fragment fn fs_main(@location(2) uv: vec2<f32>) -> @location(0) vec4<f32> { return vec4<f32>(uv, 0.0, 1.0); }",
        )
        .unwrap();
        let err = check_interface(stage(&vs, "vs_main"), stage(&fs, "fs_main"), &position_only())
            .unwrap_err();
        assert!(err.contains("@location(2)"), "{err}");
    }

    #[test]
    fn vertex_input_without_attribute_is_rejected() {
        let vs = parse(
            "@vertex fn vs_main(@location(0) p: vec3<f32>, @location(1) c: vec3<f32>) -> @builtin(position) vec4<f32> { return vec4<f32>(p + c, 1.0); }",
        )
        .unwrap();
        let fs = parse("@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }")
            .unwrap();
        let err = check_interface(stage(&vs, "vs_main"), stage(&fs, "fs_main"), &position_only())
            .unwrap_err();
        assert!(err.contains("@location(1)"), "{err}");
    }
}
