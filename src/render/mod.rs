mod depth_view;
mod forward;
mod mesh;
mod shadow;

pub use forward::{FrameUniform, ObjectUniform};
pub use shadow::{light_space_matrix, SHADOW_RESOLUTION};

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::bytes_of;
use glam::{Mat4, Vec3};
use log::{info, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::context::RenderContext;
use crate::scene::{ObjectRole, SceneAssets};
use crate::transform::compose_model;

use depth_view::DepthViewPass;
use forward::ForwardPipelines;
use mesh::GpuMesh;
use shadow::ShadowMap;

/// Two-pass GPU renderer: a shadow pass into a fixed-size depth map, then a
/// lit forward pass over the window surface. A debug branch replaces the
/// forward pass with a gray-scale view of the shadow map.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    shadow: ShadowMap,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
    depth_pipeline: wgpu::RenderPipeline,
    forward: ForwardPipelines,
    depth_view_pass: DepthViewPass,
    statics: Vec<Drawable>,
    raindrop: Option<Drawable>,
    marker: Option<Drawable>,
    unit_instance: wgpu::Buffer,
    rain_instances: wgpu::Buffer,
    rain_capacity: u32,
}

/// One scene object uploaded to the GPU.
struct Drawable {
    mesh: GpuMesh,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    base_model: Mat4,
    color: Vec3,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window and scene.
    pub async fn new(window: Arc<Window>, assets: &SceneAssets) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("rendering with {}", adapter.get_info().name);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("renderer-device"),
            // Line and point fill are optional extras; run without them
            // rather than fail on devices that lack the features.
            required_features: forward::optional_polygon_features(adapter.features()),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            // The rain advances a fixed step per frame, so pacing to vsync
            // keeps the fall speed steady.
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let shadow = ShadowMap::new(&device);

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(std::mem::size_of::<FrameUniform>() as u64)
                            .unwrap(),
                    ),
                },
                count: None,
            }],
        });

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(std::mem::size_of::<ObjectUniform>() as u64)
                            .unwrap(),
                    ),
                },
                count: None,
            }],
        });

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame-uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame-bind-group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-bind-group"),
            layout: &shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&shadow.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&shadow.sampler),
                },
            ],
        });

        let depth_pipeline = shadow::depth_pipeline(&device, &frame_layout, &object_layout);
        let forward = ForwardPipelines::create(
            &device,
            surface_format,
            DepthBuffer::FORMAT,
            &frame_layout,
            &object_layout,
            &shadow_layout,
            device.features(),
        );
        let depth_view_pass = DepthViewPass::new(&device, surface_format, &shadow.view);

        let unit_instance = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("unit-instance"),
            contents: bytemuck::cast_slice(&[0.0f32; 3]),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let rain_capacity = assets.settings.rain_count as u32;
        let rain_instances = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rain-instances"),
            size: (rain_capacity.max(1) as u64) * 3 * std::mem::size_of::<f32>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut statics = Vec::new();
        let mut raindrop = None;
        let mut marker = None;
        for loaded in &assets.objects {
            let drawable = Drawable::upload(&device, &object_layout, loaded);
            match loaded.object.role {
                ObjectRole::Static => statics.push(drawable),
                ObjectRole::Raindrop => {
                    if raindrop.replace(drawable).is_some() {
                        warn!("multiple raindrop objects; keeping {}", loaded.object.name);
                    }
                }
                ObjectRole::LightMarker => {
                    if marker.replace(drawable).is_some() {
                        warn!(
                            "multiple light-marker objects; keeping {}",
                            loaded.object.name
                        );
                    }
                }
            }
        }

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            shadow,
            frame_buffer,
            frame_bind_group,
            shadow_bind_group,
            depth_pipeline,
            forward,
            depth_view_pass,
            statics,
            raindrop,
            marker,
            unit_instance,
            rain_instances,
            rain_capacity,
        })
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain and window depth buffer to the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Uploads the per-frame and per-object uniforms plus rain instances.
    pub fn update_frame(&self, ctx: &RenderContext) {
        self.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytes_of(&FrameUniform::from_context(ctx)),
        );

        let instances = &ctx.rain.drops()[..ctx.rain.len().min(self.rain_capacity as usize)];
        if !instances.is_empty() {
            self.queue.write_buffer(
                &self.rain_instances,
                0,
                bytemuck::cast_slice(&mesh::pack_instances(instances)),
            );
        }

        let view = ctx.camera.view_matrix();
        for drawable in &self.statics {
            drawable.write_uniform(&self.queue, view, drawable.base_model, false);
        }
        if let Some(drop) = &self.raindrop {
            drop.write_uniform(&self.queue, view, drop.base_model, false);
        }
        if let Some(marker) = &self.marker {
            marker.write_uniform(&self.queue, view, ctx.light.marker_model(), true);
        }
    }

    /// Renders one frame: shadow pass, then either the lit scene or the
    /// depth-map debug view.
    pub fn render(&mut self, ctx: &RenderContext) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        let rain_count = ctx.rain.len().min(self.rain_capacity as usize) as u32;

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow-pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.depth_pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            for drawable in &self.statics {
                drawable.draw(&mut pass, &self.unit_instance, 1);
            }
            // The marker casts no shadow; the rain casts one per drop.
            if let Some(drop) = &self.raindrop {
                if rain_count > 0 {
                    drop.draw(&mut pass, &self.rain_instances, rain_count);
                }
            }
        }

        if ctx.depth_view {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("depth-view-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.set_viewport(&mut pass, ctx);
            self.depth_view_pass.draw(&mut pass);
        } else {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("forward-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.3,
                            g: 0.3,
                            b: 0.3,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.set_viewport(&mut pass, ctx);
            pass.set_pipeline(self.forward.for_mode(ctx.fill_mode));
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_bind_group(2, &self.shadow_bind_group, &[]);
            for drawable in &self.statics {
                drawable.draw(&mut pass, &self.unit_instance, 1);
            }
            if let Some(drop) = &self.raindrop {
                if rain_count > 0 {
                    drop.draw(&mut pass, &self.rain_instances, rain_count);
                }
            }
            if let Some(marker) = &self.marker {
                marker.draw(&mut pass, &self.unit_instance, 1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Applies the context viewport, clamped to the current surface in case a
    /// resize event has not reached the context yet.
    fn set_viewport(&self, pass: &mut wgpu::RenderPass<'_>, ctx: &RenderContext) {
        let width = ctx.viewport.width.min(self.config.width);
        let height = ctx.viewport.height.min(self.config.height);
        if width == 0 || height == 0 {
            return;
        }
        pass.set_viewport(
            ctx.viewport.x as f32,
            ctx.viewport.y as f32,
            width as f32,
            height as f32,
            0.0,
            1.0,
        );
    }
}

impl Drawable {
    fn upload(
        device: &wgpu::Device,
        object_layout: &wgpu::BindGroupLayout,
        loaded: &crate::scene::LoadedObject,
    ) -> Self {
        let mesh = GpuMesh::upload(device, &loaded.mesh, &loaded.object.name);
        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}-uniform", loaded.object.name)),
            size: std::mem::size_of::<ObjectUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}-bind-group", loaded.object.name)),
            layout: object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });
        Self {
            mesh,
            uniform,
            bind_group,
            base_model: compose_model(
                loaded.object.position,
                loaded.object.rotation,
                loaded.object.scale,
            ),
            color: loaded.object.color,
        }
    }

    fn write_uniform(&self, queue: &wgpu::Queue, view: Mat4, model: Mat4, unlit: bool) {
        queue.write_buffer(
            &self.uniform,
            0,
            bytes_of(&ObjectUniform::new(view, model, self.color, unlit)),
        );
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, instances: &wgpu::Buffer, count: u32) {
        pass.set_vertex_buffer(0, self.mesh.vertex.slice(..));
        pass.set_vertex_buffer(1, instances.slice(..));
        pass.set_index_buffer(self.mesh.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.set_bind_group(1, &self.bind_group, &[]);
        pass.draw_indexed(0..self.mesh.index_count, 0, 0..count);
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("window-depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
