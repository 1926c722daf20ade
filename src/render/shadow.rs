use glam::{Mat4, Vec3};

use super::mesh;

/// Shadow map edge length in texels.
pub const SHADOW_RESOLUTION: u32 = 2048;

/// Half-width of the orthographic box the light sees.
const LIGHT_EXTENT: f32 = 40.0;
const LIGHT_NEAR: f32 = 0.7;
const LIGHT_FAR: f32 = 200.0;

/// Light-space transform: an orthographic box centered on the camera target,
/// looking back along the rotated light direction.
///
/// `light_direction` is deliberately not normalized; its length sets how far
/// the light eye sits from the target, and with it where the scene falls
/// between the near and far planes.
pub fn light_space_matrix(camera_target: Vec3, light_direction: Vec3) -> Mat4 {
    let projection = Mat4::orthographic_rh(
        -LIGHT_EXTENT,
        LIGHT_EXTENT,
        -LIGHT_EXTENT,
        LIGHT_EXTENT,
        LIGHT_NEAR,
        LIGHT_FAR,
    );
    let view = Mat4::look_at_rh(camera_target + light_direction, camera_target, Vec3::Y);
    projection * view
}

/// Fixed-size offscreen depth target rendered from the light's viewpoint.
pub struct ShadowMap {
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    _texture: wgpu::Texture,
}

impl ShadowMap {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn new(device: &wgpu::Device) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow-map"),
            size: wgpu::Extent3d {
                width: SHADOW_RESOLUTION,
                height: SHADOW_RESOLUTION,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Comparison sampler: the forward pass asks "is this fragment at
        // least as close as the stored depth" and gets a filtered 0..1 back.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            view,
            sampler,
            _texture: texture,
        }
    }
}

/// Depth-only pipeline writing the shadow map. No fragment stage.
pub fn depth_pipeline(
    device: &wgpu::Device,
    frame_layout: &wgpu::BindGroupLayout,
    object_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shadow-shader"),
        source: wgpu::ShaderSource::Wgsl(SHADOW_SHADER.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("shadow-pipeline-layout"),
        bind_group_layouts: &[frame_layout, object_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shadow-pipeline"),
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
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: ShadowMap::FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            // Constant plus slope-scaled bias instead of a shader-side offset.
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: None,
        multiview: None,
        cache: None,
    })
}

const SHADOW_SHADER: &str = r#"
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

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(2) drop_offset: vec3<f32>,
) -> @builtin(position) vec4<f32> {
    let world = vec4<f32>((object.model * vec4<f32>(position, 1.0)).xyz + drop_offset, 1.0);
    return frame.light_space * world;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO_DIRECTION: Vec3 = Vec3::new(-0.16, 6.79, 4.31);

    #[test]
    fn camera_target_projects_to_the_map_center() {
        let target = Vec3::new(0.0, 2.0, 0.0);
        let clip = light_space_matrix(target, DEMO_DIRECTION).project_point3(target);
        assert!(clip.x.abs() < 1e-4);
        assert!(clip.y.abs() < 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn target_depth_matches_the_light_distance() {
        let target = Vec3::new(0.0, 2.0, 0.0);
        let clip = light_space_matrix(target, DEMO_DIRECTION).project_point3(target);
        let expected = (DEMO_DIRECTION.length() - LIGHT_NEAR) / (LIGHT_FAR - LIGHT_NEAR);
        assert!((clip.z - expected).abs() < 1e-4);
    }

    #[test]
    fn points_outside_the_box_fall_off_the_map() {
        // Light straight along +Z tilted up, so world X is light-space right.
        let direction = Vec3::new(0.0, 6.0, 8.0);
        let target = Vec3::ZERO;
        let matrix = light_space_matrix(target, direction);
        let inside = matrix.project_point3(target + Vec3::new(39.0, 0.0, 0.0));
        assert!(inside.x < 1.0);
        let outside = matrix.project_point3(target + Vec3::new(45.0, 0.0, 0.0));
        assert!(outside.x > 1.0);
    }

    #[test]
    fn box_follows_the_camera_target() {
        let a = light_space_matrix(Vec3::ZERO, DEMO_DIRECTION);
        let b = light_space_matrix(Vec3::new(10.0, 0.0, 0.0), DEMO_DIRECTION);
        let probe = Vec3::new(10.0, 2.0, 0.0);
        let from_a = a.project_point3(probe);
        let from_b = b.project_point3(probe);
        // The same world point lands elsewhere once the box re-centers.
        assert!((from_a.x - from_b.x).abs() > 1e-3);
        assert!(from_b.x.abs() < 0.1);
    }
}
