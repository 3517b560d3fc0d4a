/*!
Typed `wgpu` buffers.

A [`Buffer<A>`] can only be filled from, and read back as, a slice of `A`s. The
element type is checked by [`bytemuck`] at the casts, so a buffer of
[`PixelState`](crate::pixel::PixelState)s can't be written with palette words.

Buffers are destroyed when dropped, which releases the device memory on every exit
path of a dispatch, including early returns on errors.
*/

use std::{
    marker::PhantomData,
    mem::size_of,
    ops::{Deref, RangeBounds},
};

use wgpu::util::DeviceExt;

pub struct Buffer<A> {
    buffer: wgpu::Buffer,
    len: u64,
    phantom_data: PhantomData<A>,
}

impl<A: bytemuck::Pod> Buffer<A> {
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Number of `A`s.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn byte_size(&self) -> u64 {
        self.len * size_of::<A>() as u64
    }

    pub fn slice<S: RangeBounds<wgpu::BufferAddress>>(&self, bounds: S) -> Slice<A> {
        Slice {
            slice: self.buffer.slice(bounds),
            phantom_data: PhantomData,
        }
    }

    pub fn as_entire_binding(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }

    pub fn unmap(&self) {
        self.buffer.unmap()
    }
}

impl<A> Drop for Buffer<A> {
    fn drop(&mut self) {
        self.buffer.destroy()
    }
}

pub struct Slice<'a, A> {
    slice: wgpu::BufferSlice<'a>,
    phantom_data: PhantomData<A>,
}

impl<'a, A> Slice<'a, A> {
    pub fn map_async(
        &self,
        mode: wgpu::MapMode,
        callback: impl FnOnce(Result<(), wgpu::BufferAsyncError>) + Send + 'static,
    ) {
        self.slice.map_async(mode, callback)
    }

    pub fn get_mapped_range(&self) -> Mapped<'a, A> {
        Mapped {
            view: self.slice.get_mapped_range(),
            phantom_data: PhantomData,
        }
    }
}

/// A mapped buffer range, read as `A`s.
pub struct Mapped<'a, A> {
    view: wgpu::BufferView<'a>,
    phantom_data: PhantomData<A>,
}

impl<'a, A: bytemuck::Pod> Deref for Mapped<'a, A> {
    type Target = [A];

    fn deref(&self) -> &Self::Target {
        bytemuck::cast_slice(&self.view)
    }
}

enum Contents<'a> {
    Contents(&'a [u8], u64),
    Len(u64),
}

pub struct Builder<'a, A> {
    label: Option<&'a str>,
    contents: Contents<'a>,
    usage: wgpu::BufferUsages,
    phantom_data: PhantomData<A>,
}

impl<'a, A: bytemuck::Pod> From<&'a [A]> for Builder<'a, A> {
    fn from(value: &'a [A]) -> Self {
        Self {
            label: None,
            contents: Contents::Contents(bytemuck::cast_slice(value), value.len() as u64),
            usage: wgpu::BufferUsages::COPY_DST,
            phantom_data: PhantomData,
        }
    }
}

impl<'a, A: bytemuck::Pod> Builder<'a, A> {
    /// An uninitialised buffer of `len` elements.
    pub fn new(len: u64) -> Self {
        Self {
            label: None,
            contents: Contents::Len(len),
            usage: wgpu::BufferUsages::COPY_DST,
            phantom_data: PhantomData,
        }
    }

    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_usage(mut self, usage: wgpu::BufferUsages) -> Self {
        self.usage |= usage;
        self
    }

    /// Replaces the default `COPY_DST` usage. Mappable buffers only allow
    /// `MAP_READ | COPY_DST` or `MAP_WRITE | COPY_SRC`.
    pub fn with_exact_usage(mut self, usage: wgpu::BufferUsages) -> Self {
        self.usage = usage;
        self
    }

    pub fn create(self, device: &wgpu::Device) -> Buffer<A> {
        let (buffer, len) = match self.contents {
            Contents::Contents(contents, len) => (
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: self.label,
                    contents,
                    usage: self.usage,
                }),
                len,
            ),
            Contents::Len(len) => (
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: self.label,
                    size: len * size_of::<A>() as u64,
                    usage: self.usage,
                    mapped_at_creation: false,
                }),
                len,
            ),
        };

        Buffer {
            buffer,
            len,
            phantom_data: PhantomData,
        }
    }
}

pub fn copy_buffer_to_buffer<A: bytemuck::Pod>(
    command_encoder: &mut wgpu::CommandEncoder,
    source: &Buffer<A>,
    destination: &Buffer<A>,
) {
    debug_assert_eq!(source.len(), destination.len());
    command_encoder.copy_buffer_to_buffer(
        source.buffer(),
        0,
        destination.buffer(),
        0,
        source.byte_size(),
    )
}
