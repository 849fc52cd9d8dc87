//! WGSL building blocks shared by the generated shaders.
//!
//! Each stage assembles its shader from these pieces with `format!`, so the
//! uniform block, the boundary policy and the hash are written once.
//!
//! # Available Functions
//!
//! - `wrap_position(p: vec2<f32>) -> vec2<f32>` - apply the configured
//!   boundary policy (needs a `uniforms: FrameUniforms` global)
//! - `hash_u32(n: u32) -> u32` - integer hash
//! - `hash_unit(n: u32) -> f32` - hash mapped to `[0, 1]`
//! - `luminance(c: vec3<f32>) -> f32` - perceptual brightness

/// Boundary policy. Mirrors [`kernel::wrap`](crate::kernel::wrap).
pub const WRAP_WGSL: &str = r#"
const WRAP_CLAMPED: u32 = 1u;

fn wrap_position(p: vec2<f32>) -> vec2<f32> {
    let dims = uniforms.canvas;
    if uniforms.wrap_mode == WRAP_CLAMPED {
        return clamp(p, vec2<f32>(0.0), dims - vec2<f32>(1.0));
    }
    let m = p - dims * floor(p / dims);
    let w = select(m, m + dims, m < vec2<f32>(0.0));
    return select(w, vec2<f32>(0.0), (w < vec2<f32>(0.0)) | (w >= dims));
}
"#;

/// Integer hash. Mirrors [`kernel::hash_u32`](crate::kernel::hash_u32).
pub const HASH_WGSL: &str = r#"
fn hash_u32(n: u32) -> u32 {
    var x = n ^ 2747636419u;
    x = x * 2654435769u;
    x = x ^ (x >> 16u);
    x = x * 2654435769u;
    x = x ^ (x >> 16u);
    x = x * 2654435769u;
    return x;
}

fn hash_unit(n: u32) -> f32 {
    return f32(n) / 4294967295.0;
}
"#;

pub const COLOR_WGSL: &str = r#"
fn luminance(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.2126, 0.7152, 0.0722));
}
"#;

/// Full-screen triangle vertex stage with UVs running top-left to
/// bottom-right, matching texel rows.
pub const FULLSCREEN_VS_WGSL: &str = r#"
struct FullscreenOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> FullscreenOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );

    var out: FullscreenOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    out.uv = uvs[vertex_index];
    return out;
}
"#;

/// Declarations for a trail texture bound for sampling at `group`.
pub fn trail_bindings_wgsl(group: u32) -> String {
    format!(
        r#"
@group({group}) @binding(0)
var trail: texture_2d<f32>;
@group({group}) @binding(1)
var trail_sampler: sampler;
"#
    )
}

/// Validates WGSL code using naga.
#[cfg(test)]
pub(crate) fn validate_wgsl(code: &str) -> Result<(), String> {
    let module =
        naga::front::wgsl::parse_str(code).map_err(|e| format!("WGSL parse error: {:?}", e))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(())
}
