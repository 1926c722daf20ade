use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use super::mesh;
use crate::context::{FillMode, RenderContext};
use crate::transform;

/// Per-frame uniform shared by the shadow and forward passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_space: [[f32; 4]; 4],
    /// View-space direction toward the key light, w unused.
    pub light_dir_view: [f32; 4],
    pub light_color: [f32; 4],
    /// View-space point light position, w doubles as the enable flag.
    pub point_light_view: [f32; 4],
    /// x enables fog, y is the density.
    pub fog: [f32; 4],
}

impl FrameUniform {
    pub fn from_context(ctx: &RenderContext) -> Self {
        let view = ctx.camera.view_matrix();
        let light_space =
            super::shadow::light_space_matrix(ctx.camera.target(), ctx.light.rotated_direction());
        Self {
            view: view.to_cols_array_2d(),
            projection: ctx.projection.matrix().to_cols_array_2d(),
            light_space: light_space.to_cols_array_2d(),
            light_dir_view: ctx.light.view_space_direction(view).extend(0.0).into(),
            light_color: ctx.light.color.extend(1.0).into(),
            point_light_view: ctx
                .light
                .view_space_point(view)
                .extend(if ctx.light.point_enabled { 1.0 } else { 0.0 })
                .into(),
            fog: [
                if ctx.fog_enabled { 1.0 } else { 0.0 },
                ctx.fog_density,
                0.0,
                0.0,
            ],
        }
    }
}

/// Per-drawable uniform: transforms, base color and shading flags.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    pub color: [f32; 4],
    /// x skips lighting entirely (the light marker).
    pub flags: [f32; 4],
}

impl ObjectUniform {
    pub fn new(view: Mat4, model: Mat4, color: Vec3, unlit: bool) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(transform::normal_matrix(view, model)),
            color: color.extend(1.0).into(),
            flags: [if unlit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

/// Pads a mat3 to the three-column vec4 layout uniform buffers require.
fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

/// Restricts the wanted polygon-mode features to what the adapter offers.
pub fn optional_polygon_features(available: wgpu::Features) -> wgpu::Features {
    available & (wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::POLYGON_MODE_POINT)
}

/// Lit forward pipelines, one per polygon mode the device supports.
pub struct ForwardPipelines {
    fill: wgpu::RenderPipeline,
    line: Option<wgpu::RenderPipeline>,
    point: Option<wgpu::RenderPipeline>,
}

impl ForwardPipelines {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        frame_layout: &wgpu::BindGroupLayout,
        object_layout: &wgpu::BindGroupLayout,
        shadow_layout: &wgpu::BindGroupLayout,
        features: wgpu::Features,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("forward-shader"),
            source: wgpu::ShaderSource::Wgsl(FORWARD_SHADER.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("forward-pipeline-layout"),
            bind_group_layouts: &[frame_layout, object_layout, shadow_layout],
            push_constant_ranges: &[],
        });

        let build = |label: &str, polygon_mode: wgpu::PolygonMode| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[mesh::vertex_layout(), mesh::instance_layout()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: depth_format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            })
        };

        let fill = build("forward-pipeline-fill", wgpu::PolygonMode::Fill);
        let line = features
            .contains(wgpu::Features::POLYGON_MODE_LINE)
            .then(|| build("forward-pipeline-line", wgpu::PolygonMode::Line));
        let point = features
            .contains(wgpu::Features::POLYGON_MODE_POINT)
            .then(|| build("forward-pipeline-point", wgpu::PolygonMode::Point));

        Self { fill, line, point }
    }

    /// Pipeline for the requested mode, falling back to fill when the device
    /// lacks the matching feature.
    pub fn for_mode(&self, mode: FillMode) -> &wgpu::RenderPipeline {
        match mode {
            FillMode::Fill => &self.fill,
            FillMode::Line => self.line.as_ref().unwrap_or(&self.fill),
            FillMode::Point => self.point.as_ref().unwrap_or(&self.fill),
        }
    }
}

const FORWARD_SHADER: &str = r#"
struct FrameUniform {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    light_space: mat4x4<f32>,
    light_dir_view: vec4<f32>,
    light_color: vec4<f32>,
    point_light_view: vec4<f32>,
    fog: vec4<f32>,
}

struct ObjectUniform {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    flags: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> frame: FrameUniform;

@group(1) @binding(0)
var<uniform> object: ObjectUniform;

@group(2) @binding(0)
var shadow_map: texture_depth_2d;

@group(2) @binding(1)
var shadow_sampler: sampler_comparison;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) drop_offset: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) eye_pos: vec3<f32>,
    @location(1) eye_normal: vec3<f32>,
    @location(2) light_space_pos: vec4<f32>,
}

const AMBIENT: f32 = 0.2;
const SPECULAR_STRENGTH: f32 = 0.5;
const SHININESS: f32 = 32.0;
const FOG_COLOR: vec3<f32> = vec3<f32>(0.5, 0.5, 0.5);

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = vec4<f32>((object.model * vec4<f32>(input.position, 1.0)).xyz + input.drop_offset, 1.0);
    let eye = frame.view * world;
    out.clip_position = frame.projection * eye;
    out.eye_pos = eye.xyz;
    let normal_matrix = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    );
    out.eye_normal = normal_matrix * input.normal;
    out.light_space_pos = frame.light_space * world;
    return out;
}

fn shadow_factor(light_space_pos: vec4<f32>) -> f32 {
    let ndc = light_space_pos.xyz / light_space_pos.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    // Fragments outside the shadow frustum count as lit.
    if (ndc.z > 1.0 || uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0) {
        return 1.0;
    }
    return textureSampleCompare(shadow_map, shadow_sampler, uv, ndc.z);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let base = object.color.rgb;
    if (object.flags.x > 0.5) {
        return vec4<f32>(base, object.color.a);
    }

    let normal = normalize(input.eye_normal);
    let view_dir = normalize(-input.eye_pos);

    let light_dir = normalize(frame.light_dir_view.xyz);
    let diffuse = max(dot(normal, light_dir), 0.0);
    let halfway = normalize(light_dir + view_dir);
    var specular = 0.0;
    if (diffuse > 0.0) {
        specular = pow(max(dot(normal, halfway), 0.0), SHININESS) * SPECULAR_STRENGTH;
    }
    let lit = shadow_factor(input.light_space_pos);
    var color = (AMBIENT + lit * (diffuse + specular)) * frame.light_color.rgb * base;

    if (frame.point_light_view.w > 0.5) {
        let to_light = frame.point_light_view.xyz - input.eye_pos;
        let dist = length(to_light);
        let direction = to_light / dist;
        let attenuation = 1.0 / (1.0 + 0.09 * dist + 0.032 * dist * dist);
        let point_diffuse = max(dot(normal, direction), 0.0);
        let point_halfway = normalize(direction + view_dir);
        let point_specular =
            pow(max(dot(normal, point_halfway), 0.0), SHININESS) * SPECULAR_STRENGTH;
        color += attenuation * (point_diffuse + point_specular) * frame.light_color.rgb * base;
    }

    if (frame.fog.x > 0.5) {
        let eye_dist = length(input.eye_pos);
        let visibility = clamp(exp(-pow(eye_dist * frame.fog.y, 2.0)), 0.0, 1.0);
        color = mix(FOG_COLOR, color, visibility);
    }

    return vec4<f32>(color, object.color.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneSettings;

    #[test]
    fn uniform_sizes_match_the_wgsl_layout() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 256);
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 144);
    }

    #[test]
    fn mat3_padding_keeps_columns() {
        let matrix = Mat3::from_cols(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
        );
        let padded = mat3_to_3x4(matrix);
        assert_eq!(padded[0], [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(padded[1], [4.0, 5.0, 6.0, 0.0]);
        assert_eq!(padded[2], [7.0, 8.0, 9.0, 0.0]);
    }

    #[test]
    fn frame_uniform_mirrors_the_context() {
        let mut ctx = RenderContext::new(&SceneSettings::default());
        ctx.fog_enabled = true;
        ctx.light.point_enabled = true;
        let uniform = FrameUniform::from_context(&ctx);
        assert_eq!(uniform.view, ctx.camera.view_matrix().to_cols_array_2d());
        assert_eq!(
            uniform.projection,
            ctx.projection.matrix().to_cols_array_2d()
        );
        assert_eq!(uniform.fog[0], 1.0);
        assert_eq!(uniform.fog[1], ctx.fog_density);
        assert_eq!(uniform.point_light_view[3], 1.0);
    }

    #[test]
    fn disabled_point_light_zeroes_the_flag() {
        let ctx = RenderContext::new(&SceneSettings::default());
        let uniform = FrameUniform::from_context(&ctx);
        assert_eq!(uniform.point_light_view[3], 0.0);
        assert_eq!(uniform.fog[0], 0.0);
    }

    #[test]
    fn object_uniform_carries_the_normal_matrix() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.5), Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        let model = transform::compose_model(
            Vec3::new(1.0, 0.0, -2.0),
            Vec3::new(0.0, 30.0, 0.0),
            Vec3::new(2.0, 1.0, 0.5),
        );
        let uniform = ObjectUniform::new(view, model, Vec3::ONE, false);
        let expected = mat3_to_3x4(transform::normal_matrix(view, model));
        assert_eq!(uniform.normal, expected);
        assert_eq!(uniform.flags[0], 0.0);
    }

    #[test]
    fn unlit_flag_is_set_for_markers() {
        let uniform = ObjectUniform::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ONE, true);
        assert_eq!(uniform.flags[0], 1.0);
    }

    #[test]
    fn polygon_features_are_clipped_to_whats_available() {
        let all = wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::POLYGON_MODE_POINT;
        assert_eq!(optional_polygon_features(all), all);
        assert_eq!(
            optional_polygon_features(wgpu::Features::POLYGON_MODE_LINE),
            wgpu::Features::POLYGON_MODE_LINE
        );
        assert_eq!(
            optional_polygon_features(wgpu::Features::empty()),
            wgpu::Features::empty()
        );
    }
}
