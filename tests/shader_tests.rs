// SPDX-License-Identifier: MPL-2.0

//! Validation of the shipped WGSL shader assets and the shader pipeline
//! compile contract

mod common;

use common::CaptureGpu;
use watermark_camera::render::shader::{FRAGMENT_SHADER, ShaderPipeline, VERTEX_SHADER};

fn validate_wgsl(source: &str) {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("WGSL parse failed:\n{}", e.emit_to_string(source)));
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .expect("WGSL validation failed");
}

#[test]
fn test_shipped_shader_assets_validate() {
    // The two stage assets form one module
    let combined = format!("{}\n{}", VERTEX_SHADER, FRAGMENT_SHADER);
    validate_wgsl(&combined);
}

#[test]
fn test_shader_module_has_both_entry_points() {
    let combined = format!("{}\n{}", VERTEX_SHADER, FRAGMENT_SHADER);
    let module = naga::front::wgsl::parse_str(&combined).unwrap();
    let names: Vec<&str> = module
        .entry_points
        .iter()
        .map(|ep| ep.name.as_str())
        .collect();
    assert!(names.contains(&"vs_main"));
    assert!(names.contains(&"fs_main"));
}

#[test]
fn test_compile_produces_fixed_binding_table() {
    let mut gpu = CaptureGpu::new();
    let pipeline = ShaderPipeline::compile_default(&mut gpu).unwrap();
    let bindings = pipeline.bindings();
    assert_eq!(bindings.position, 0);
    assert_eq!(bindings.tex_coordinate, 1);
    assert_ne!(bindings.mvp_matrix, bindings.texture_transform);
}

#[test]
fn test_compile_failure_carries_log() {
    let mut gpu = CaptureGpu::new();
    let error = ShaderPipeline::compile(&mut gpu, "", "").unwrap_err();
    assert!(!error.log.is_empty());
}
