/*!
The compute-shader dispatcher.

Each [`Dispatcher::submit`] uploads the parameters, the pixel state and the palette,
runs `mandelbrot.wgsl#mandelbrot` once per pixel and copies the pixel state and the
packed colours back through mappable staging buffers. All of these buffers live for
one call only and are destroyed when they drop, on success and on error alike.

WGSL has no 64-bit floats, so every job runs in fixed point.
*/

use std::{iter, mem::size_of, num::NonZeroU64};

use bytemuck::{Pod, Zeroable};
use log::{debug, trace};

use crate::{
    compute,
    device::GpuContext,
    dispatch::Dispatcher,
    error::{Error, Result},
    fixed::FixedPoint,
    kernel::Job,
    pixel::PixelState,
    typed_buffer::{self, Buffer},
};

/// Uniform block of `mandelbrot.wgsl#Params`.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Params {
    origin_re: [u32; 4],
    origin_im: [u32; 4],
    step_re: [u32; 4],
    step_im: [u32; 4],
    horizon_squared: [u32; 4],
    size: [u32; 4],
}

impl Params {
    fn new(job: &Job, palette_len: usize) -> Result<Self> {
        Ok(Params {
            origin_re: transport(&job.grid.origin_re)?,
            origin_im: transport(&job.grid.origin_im)?,
            step_re: transport(&job.grid.step_re)?,
            step_im: transport(&job.grid.step_im)?,
            horizon_squared: transport(&job.horizon_squared_fixed()?)?,
            size: [
                job.size.width,
                job.size.height,
                job.max_iter,
                palette_len as u32,
            ],
        })
    }
}

fn transport(value: &FixedPoint) -> Result<[u32; 4]> {
    let (hi, lo) = value.to_hi_lo()?;
    Ok([(hi >> 32) as u32, hi as u32, (lo >> 32) as u32, lo as u32])
}

pub struct GpuDispatcher {
    context: GpuContext,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl GpuDispatcher {
    /// Opens a device and builds the kernel.
    pub fn new() -> Result<Self> {
        Self::with_context(GpuContext::new()?)
    }

    pub fn with_context(context: GpuContext) -> Result<Self> {
        let device = &context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mandelbrot_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("mandelbrot.wgsl").into()),
        });

        let storage = |binding, read_only, min_binding_size| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mandelbrot_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(size_of::<Params>() as u64),
                    },
                    count: None,
                },
                storage(1, false, NonZeroU64::new(size_of::<PixelState>() as u64)),
                storage(2, true, NonZeroU64::new(size_of::<u32>() as u64)),
                storage(3, false, NonZeroU64::new(size_of::<u32>() as u64)),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mandelbrot_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("mandelbrot_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: "mandelbrot",
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::KernelBuild(error.to_string()));
        }
        debug!("built mandelbrot kernel on {}", context.adapter_info.name);

        Ok(GpuDispatcher {
            context,
            bind_group_layout,
            pipeline,
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.context.adapter_info
    }
}

impl Dispatcher for GpuDispatcher {
    fn name(&self) -> &str {
        "gpu"
    }

    fn supports_native(&self) -> bool {
        false
    }

    fn submit(
        &self,
        job: &Job,
        pixels: &mut [PixelState],
        palette: &[u32],
        output: &mut [u32],
    ) -> Result<()> {
        trace!("begin gpu dispatch");

        let pixel_count = job.size.pixel_count();
        debug_assert_eq!(pixels.len(), pixel_count);
        debug_assert_eq!(output.len(), pixel_count);

        let params = Params::new(job, palette.len())?;
        let (x, y, z) = compute::mandelbrot_dispatch_size(pixel_count)?;
        // Storage bindings can't be empty; the kernel reads `params.size.w`
        // entries at most.
        let palette = if palette.is_empty() { &[0][..] } else { palette };

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let params_buffer: Buffer<Params> = typed_buffer::Builder::from(&[params][..])
            .with_label("params_buffer")
            .with_usage(wgpu::BufferUsages::UNIFORM)
            .create(device);
        let pixel_buffer: Buffer<PixelState> = typed_buffer::Builder::from(&*pixels)
            .with_label("pixel_buffer")
            .with_usage(wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC)
            .create(device);
        let palette_buffer: Buffer<u32> = typed_buffer::Builder::from(palette)
            .with_label("palette_buffer")
            .with_usage(wgpu::BufferUsages::STORAGE)
            .create(device);
        let output_buffer: Buffer<u32> = typed_buffer::Builder::new(pixel_count as u64)
            .with_label("output_buffer")
            .with_usage(wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC)
            .create(device);
        let pixel_staging: Buffer<PixelState> = typed_buffer::Builder::new(pixel_count as u64)
            .with_label("pixel_staging")
            .with_exact_usage(wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST)
            .create(device);
        let output_staging: Buffer<u32> = typed_buffer::Builder::new(pixel_count as u64)
            .with_label("output_staging")
            .with_exact_usage(wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST)
            .create(device);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mandelbrot_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pixel_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: palette_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: output_buffer.as_entire_binding(),
                },
            ],
        });

        let mut command_encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mandelbrot_command_encoder"),
        });
        {
            let mut compute_pass = command_encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("mandelbrot_pass"),
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(x, y, z);
        }
        typed_buffer::copy_buffer_to_buffer(&mut command_encoder, &pixel_buffer, &pixel_staging);
        typed_buffer::copy_buffer_to_buffer(&mut command_encoder, &output_buffer, &output_staging);

        self.context.queue.submit(iter::once(command_encoder.finish()));

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::Dispatch(error.to_string()));
        }

        read_back(device, &pixel_staging, pixels)?;
        read_back(device, &output_staging, output)?;

        trace!("end gpu dispatch");
        Ok(())
    }
}

/// Maps `staging`, waits for the device and copies its contents out.
fn read_back<A: Pod>(device: &wgpu::Device, staging: &Buffer<A>, destination: &mut [A]) -> Result<()> {
    let slice = staging.slice(..);
    let (sender, receiver) = futures_channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    pollster::block_on(receiver)
        .map_err(|_| Error::Dispatch("buffer mapping was cancelled".into()))??;

    {
        let mapped = slice.get_mapped_range();
        destination.copy_from_slice(&mapped);
    }
    staging.unmap();
    Ok(())
}
