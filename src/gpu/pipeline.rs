//! Shader module and compute-pipeline construction.

use tracing::info;

use super::bindings::BindingTable;
use super::GpuContext;
use crate::error::{Error, Result};

/// A compiled build product: module, layouts, pipeline, and the buffer-set
/// fingerprint it was built against. Invalidated whenever the shader
/// source or the buffer set changes; the fingerprint is checked again at
/// dispatch.
pub struct PipelineArtifact {
    pub module: wgpu::ShaderModule,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub pipeline: wgpu::ComputePipeline,
    pub fingerprint: Vec<(String, u32, u32)>,
}

impl PipelineArtifact {
    /// Compile `source` and build a pipeline against the current buffer
    /// set. Compiler errors are terminal for this build and surface as
    /// `Compile`; transcripts are untouched, so a corrected regeneration
    /// can retry the build.
    pub fn compile(
        ctx: &GpuContext,
        source: &str,
        entry_point: &str,
        table: &BindingTable,
    ) -> Result<Self> {
        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("kernel-bindings"),
                    entries: &table.layout_entries(),
                });
        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("kernel-layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        // Validation errors from module or pipeline creation are collected
        // through an error scope instead of tearing down the device.
        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("kernel-module"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("kernel-pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });
        if let Some(err) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(Error::Compile(err.to_string()));
        }

        info!(entry_point, "compute pipeline built");
        Ok(Self {
            module,
            bind_group_layout,
            pipeline_layout,
            pipeline,
            fingerprint: table.fingerprint(),
        })
    }
}
