//! GPU plumbing on wgpu.
//!
//! Blocking device acquisition plus the buffer, layout, and pipeline
//! bookkeeping the runner builds on. Only device operations are
//! asynchronous; they are awaited via pollster before dependent state is
//! read.

pub mod bindings;
pub mod pipeline;

use crate::error::{Error, Result};

/// An acquired device + queue. Everything a runner allocates lives on this
/// context and is never shared across runner instances.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire an adapter and device. Failure is terminal for the session:
    /// it is surfaced once, with guidance, and never retried here.
    pub fn acquire() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| Error::DeviceUnavailable {
            reason: "no adapter found; check that a GPU and current drivers are present \
                     and that the device is not held exclusively by another process"
                .to_string(),
        })?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("kernel-runner"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| Error::DeviceUnavailable {
            reason: e.to_string(),
        })?;
        Ok(Self { device, queue })
    }
}
