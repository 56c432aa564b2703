/// WGSL shader for batched cube faces.
///
/// Group 0 holds the view-projection uniform, group 1 the bound atlas and
/// its sampler. Untextured draws bind a 1x1 white texture.
pub const BATCH_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@group(1) @binding(0)
var atlas: texture_2d<f32>;
@group(1) @binding(1)
var atlas_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(vertex.position, 1.0);
    out.normal = vertex.normal;
    // Uploads are bottom-up, so data row 0 (v = 0) is the image's bottom row.
    out.uv = vertex.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.3, 1.0, 0.5));
    let ambient = 0.4;
    let diffuse = max(dot(normalize(in.normal), light_dir), 0.0);
    let lighting = ambient + diffuse * 0.6;
    let texel = textureSample(atlas, atlas_sampler, in.uv);
    return vec4<f32>(texel.rgb * lighting, texel.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_declares_both_entry_points() {
        assert!(BATCH_SHADER.contains("fn vs_main"));
        assert!(BATCH_SHADER.contains("fn fs_main"));
        assert!(BATCH_SHADER.contains("@group(1) @binding(1)"));
    }
}
