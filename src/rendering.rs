//! Rendering system: wgpu device, radial pipeline and the spectrum texture.
//!
//! The spectrum texture is a 1 x bin_count R8Unorm image, written in full
//! once per frame from the latest snapshot and sampled by the fragment
//! shader with linear filtering and edge clamping.

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::params::VisualParams;

/// Errors from the one-time GPU initialization gate
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unsupported rendering surface: {0}")]
    UnsupportedSurface(String),
    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),
}

/// Uniform buffer for the radial shader; layout mirrors `Params`
/// in shader.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ShaderParams {
    pub base_color: [f32; 4],
    pub glow_color: [f32; 4],
    pub ring_color: [f32; 4],
    pub bin_count: f32,
    pub aspect: f32,
    pub remap_steepness: f32,
    pub ring_count: f32,
    pub ring_width: f32,
    pub noise_gate: f32,
    pub tilt_min: f32,
    pub tilt_max: f32,
    pub gain_exponent: f32,
    pub _padding: [f32; 3],
}

impl ShaderParams {
    fn new(visual: &VisualParams, bin_count: u32, aspect: f32) -> Self {
        let rgb1 = |c: [f32; 3]| [c[0], c[1], c[2], 1.0];
        Self {
            base_color: rgb1(visual.base_color),
            glow_color: rgb1(visual.glow_color),
            ring_color: rgb1(visual.ring_color),
            bin_count: bin_count as f32,
            aspect,
            remap_steepness: visual.remap_steepness,
            ring_count: visual.ring_count as f32,
            ring_width: visual.ring_width,
            noise_gate: visual.noise_gate,
            tilt_min: visual.tilt_min,
            tilt_max: visual.tilt_max,
            gain_exponent: visual.gain_exponent,
            _padding: [0.0; 3],
        }
    }
}

/// Fullscreen quad vertex (clip-space position + uv)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    uv: [f32; 2],
}

const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-1.0, -1.0], uv: [0.0, 0.0] },
    Vertex { position: [1.0, -1.0], uv: [1.0, 0.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
    Vertex { position: [-1.0, 1.0], uv: [0.0, 1.0] },
];

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Rendering system managing the wgpu device, pipeline and spectrum texture
pub struct RenderSystem {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    spectrum_texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    uniforms: ShaderParams,
    bin_count: u32,
}

impl RenderSystem {
    /// Create the device, pipeline and the 1 x bin_count spectrum texture.
    /// Called exactly once, after the analyzer has fixed the bin count.
    pub async fn new(
        window: Arc<winit::window::Window>,
        bin_count: u32,
        visual: &VisualParams,
    ) -> Result<Self, RenderError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::UnsupportedSurface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                RenderError::UnsupportedSurface("no suitable GPU adapter".to_string())
            })?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::UnsupportedSurface(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        // Shader validation errors are fatal at startup; capture them with
        // an error scope instead of the global uncaptured handler
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Radial Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });
        if let Some(err) = device.pop_error_scope().await {
            return Err(RenderError::ShaderCompile(err.to_string()));
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let aspect = size.width as f32 / size.height.max(1) as f32;
        let uniforms = ShaderParams::new(visual, bin_count, aspect);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Radial Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let spectrum_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Spectrum Texture"),
            size: wgpu::Extent3d {
                width: bin_count,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D1,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let spectrum_view = spectrum_texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Spectrum Texture View"),
            dimension: Some(wgpu::TextureViewDimension::D1),
            ..Default::default()
        });

        let spectrum_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Spectrum Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Radial Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D1,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Radial Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&spectrum_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&spectrum_sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Radial Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Radial Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                        wgpu::VertexAttribute {
                            offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            spectrum_texture,
            bind_group,
            uniforms,
            bin_count,
        })
    }

    /// Reconfigure the surface and aspect correction after a resize.
    /// Degenerate sizes are ignored; the frame driver skips the draw.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);

        self.uniforms.aspect = width as f32 / height.max(1) as f32;
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[self.uniforms]),
        );
    }

    /// True when the surface currently has a drawable size
    pub fn has_drawable_surface(&self) -> bool {
        self.config.width > 0 && self.config.height > 0
    }

    /// Mirror the latest spectrum snapshot into the GPU texture.
    ///
    /// Full sub-image write every frame; earlier contents are simply
    /// replaced. The following submission in `render` orders the draw
    /// after this write, so the shading stage never observes a torn
    /// or stale snapshot within a frame.
    ///
    /// # Panics
    /// If `snapshot.len()` differs from the allocated bin count.
    pub fn update_spectrum(&self, snapshot: &[u8]) {
        assert_eq!(snapshot.len(), self.bin_count as usize);
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.spectrum_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            snapshot,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.bin_count),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: self.bin_count,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Recover from a lost or outdated surface
    pub fn reconfigure(&self) {
        if self.has_drawable_surface() {
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Draw one fullscreen quad through the radial pipeline and present
    pub fn render(&self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
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

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_params_layout() {
        // Uniform block size must match the WGSL struct (96 bytes,
        // 16-byte aligned)
        assert_eq!(std::mem::size_of::<ShaderParams>(), 96);
        assert_eq!(std::mem::size_of::<ShaderParams>() % 16, 0);
    }

    #[test]
    fn test_shader_params_from_visuals() {
        let visual = VisualParams::default();
        let params = ShaderParams::new(&visual, 1024, 1.5);
        assert_eq!(params.bin_count, 1024.0);
        assert_eq!(params.aspect, 1.5);
        assert_eq!(params.ring_count, 5.0);
        assert_eq!(params.base_color[3], 1.0);
    }
}
