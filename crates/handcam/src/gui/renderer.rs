//! Displays RGBA8 frames in a window with wgpu.

use std::rc::Rc;

use anyhow::anyhow;
use wgpu::*;
use winit::{dpi::PhysicalSize, event_loop::EventLoopWindowTarget, window::WindowBuilder};

use crate::image::Resolution;

/// Matches the memory layout of [`crate::image::Image`].
const FRAME_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// Shared GPU handles, created once by the event loop thread.
pub struct Gpu {
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    pub async fn open() -> anyhow::Result<Self> {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .ok_or_else(|| anyhow!("no graphics adapter found"))?;

        let info = adapter.get_info();
        log::info!("rendering with {} ({:?})", info.name, info.backend);

        // Downlevel limits cap textures at 2048 pixels, too small for some webcams.
        let limits = Limits::downlevel_defaults().using_resolution(adapter.limits());
        let descriptor = DeviceDescriptor {
            label: Some("handcam"),
            features: Features::empty(),
            limits,
        };
        let (device, queue) = adapter.request_device(&descriptor, None).await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// A fixed-size window showing frames of one resolution.
pub struct Window {
    pub(crate) win: Rc<winit::window::Window>,
    resolution: Resolution,
}

impl Window {
    pub fn open<T>(
        event_loop: &EventLoopWindowTarget<T>,
        title: &str,
        resolution: Resolution,
    ) -> anyhow::Result<Self> {
        let size = PhysicalSize::new(resolution.width(), resolution.height());
        let win = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(size)
            .with_resizable(false)
            .build(event_loop)?;
        Ok(Self {
            win: Rc::new(win),
            resolution,
        })
    }
}

/// The texture holding the latest frame, together with the bind group that samples it.
struct FrameTexture {
    texture: Texture,
    bind_group: BindGroup,
}

impl FrameTexture {
    fn new(device: &Device, layout: &BindGroupLayout, res: Resolution) -> Self {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("frame"),
            size: extent(res),
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = device.create_sampler(&SamplerDescriptor::default());
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame"),
            layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&sampler),
                },
            ],
        });

        Self {
            texture,
            bind_group,
        }
    }

    fn resolution(&self) -> Resolution {
        let size = self.texture.size();
        Resolution::new(size.width, size.height)
    }
}

fn extent(res: Resolution) -> Extent3d {
    Extent3d {
        width: res.width(),
        height: res.height(),
        depth_or_array_layers: 1,
    }
}

fn frame_layout(device: &Device) -> BindGroupLayout {
    let texture = BindingType::Texture {
        sample_type: TextureSampleType::Float { filterable: false },
        view_dimension: TextureViewDimension::D2,
        multisampled: false,
    };
    let sampler = BindingType::Sampler(SamplerBindingType::NonFiltering);

    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("frame"),
        entries: &[texture, sampler]
            .into_iter()
            .zip(0..)
            .map(|(ty, binding)| BindGroupLayoutEntry {
                binding,
                visibility: ShaderStages::FRAGMENT,
                ty,
                count: None,
            })
            .collect::<Vec<_>>(),
    })
}

fn fullscreen_pipeline(
    device: &Device,
    target: TextureFormat,
    layout: &BindGroupLayout,
) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("fullscreen"),
        source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("fullscreen"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("fullscreen"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: "vert",
            buffers: &[],
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: "frag",
            targets: &[Some(ColorTargetState::from(target))],
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview: None,
    })
}

/// Renders the latest frame of one window.
pub struct Renderer {
    gpu: Rc<Gpu>,
    surface: Surface,
    config: SurfaceConfiguration,
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    frame: FrameTexture,

    /// Dropped after `surface`, which refers to it.
    window: Window,
}

impl Renderer {
    pub fn new(window: Window, gpu: Rc<Gpu>) -> anyhow::Result<Self> {
        // SAFETY: `window` is a field of the returned renderer and outlives `surface`.
        let surface = unsafe { gpu.instance.create_surface(&*window.win)? };
        let format = surface
            .get_capabilities(&gpu.adapter)
            .formats
            .first()
            .copied()
            .ok_or_else(|| anyhow!("adapter cannot render to window surface"))?;

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: window.resolution.width(),
            height: window.resolution.height(),
            present_mode: PresentMode::Fifo,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: Vec::new(),
        };
        let layout = frame_layout(&gpu.device);
        let pipeline = fullscreen_pipeline(&gpu.device, format, &layout);
        let frame = FrameTexture::new(&gpu.device, &layout, Resolution::new(1, 1));

        let renderer = Self {
            gpu,
            surface,
            config,
            pipeline,
            layout,
            frame,
            window,
        };
        renderer.configure_surface();
        Ok(renderer)
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window.win
    }

    pub fn resolution(&self) -> Resolution {
        self.window.resolution
    }

    /// Uploads a new frame. It is displayed on the next [`Renderer::redraw`].
    pub fn update_texture(&mut self, res: Resolution, data: &[u8]) {
        assert_eq!(res.num_pixels() * 4, data.len() as u64);

        if self.frame.resolution() != res {
            log::trace!("frame texture {:?} -> {:?}", self.frame.resolution(), res);
            self.frame = FrameTexture::new(&self.gpu.device, &self.layout, res);
        }

        self.gpu.queue.write_texture(
            self.frame.texture.as_image_copy(),
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(res.width() * 4),
                rows_per_image: None,
            },
            extent(res),
        );
    }

    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let output = self.acquire()?;
        let target = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("frame"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &target,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Color::BLACK),
                    store: true,
                },
            })],
            depth_stencil_attachment: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.frame.bind_group, &[]);
        pass.draw(0..3, 0..1);
        drop(pass);

        self.gpu.queue.submit([encoder.finish()]);
        output.present();
        Ok(())
    }

    /// Gets the next surface texture, reconfiguring the surface once if it went stale.
    fn acquire(&mut self) -> anyhow::Result<SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(output) => Ok(output),
            Err(e @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("reconfiguring surface: {e}");
                self.configure_surface();
                Ok(self.surface.get_current_texture()?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn configure_surface(&self) {
        let actual = self.window.win.inner_size();
        if (actual.width, actual.height) != (self.config.width, self.config.height) {
            // Some window managers ignore the requested size of non-resizable windows.
            log::warn!(
                "window is {}x{}, but frames are {}",
                actual.width,
                actual.height,
                self.window.resolution,
            );
        }
        log::debug!(
            "configuring {}x{} surface ({:?})",
            self.config.width,
            self.config.height,
            self.config.format,
        );
        self.surface.configure(&self.gpu.device, &self.config);
    }
}
