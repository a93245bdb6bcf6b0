//! The manager tying both halves together: exclusive owner of the device
//! buffers, the translation session, and the current pipeline artifact.
//! One runner per logical builder; every mutating operation takes
//! `&mut self`, so translation and dispatch are externally serialized by
//! the borrow checker.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gpu::bindings::{BindingTable, HostBuffer};
use crate::gpu::pipeline::PipelineArtifact;
use crate::gpu::GpuContext;
use crate::infer::CallArg;
use crate::session::Session;
use crate::types::{ScalarKind, TypeTable, WgslType};

/// A host-mappable readback target. The computation mutates inputs in
/// place; an output is a staging copy of its linked input taken after the
/// dispatch, not a distinct result written by the shader.
struct OutputBinding {
    name: String,
    /// Index into the input registration order this output copies from.
    input_index: usize,
    buffer: wgpu::Buffer,
}

pub struct KernelRunner {
    ctx: GpuContext,
    session: Session,
    table: BindingTable,
    /// Device buffers aligned with `table.inputs()`.
    input_buffers: Vec<wgpu::Buffer>,
    outputs: Vec<OutputBinding>,
    artifact: Option<PipelineArtifact>,
}

impl KernelRunner {
    pub fn new(ctx: GpuContext) -> Self {
        Self::with_session(ctx, Session::new())
    }

    /// Adopt an already-populated translation session.
    pub fn with_session(ctx: GpuContext, session: Session) -> Self {
        Self {
            ctx,
            session,
            table: BindingTable::default(),
            input_buffers: Vec::new(),
            outputs: Vec::new(),
            artifact: None,
        }
    }

    /// Acquire a device and build a runner on it.
    pub fn acquire() -> Result<Self> {
        Ok(Self::new(GpuContext::acquire()?))
    }

    /// Allocate a device-resident storage buffer, write `data` into it
    /// immediately, and assign the next binding index. The element kind is
    /// validated before any state is touched.
    pub fn register_input(&mut self, name: &str, data: &HostBuffer, group: u32) -> Result<u32> {
        let kind = data.element_kind()?;
        let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size: data.byte_len(),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.ctx.queue.write_buffer(&buffer, 0, data.as_bytes());
        let binding = self.table.add_input(name, kind, data.byte_len(), group);
        self.input_buffers.push(buffer);
        self.artifact = None;
        debug!(name, binding, "input buffer registered");
        Ok(binding)
    }

    /// Register a host-mappable output receiving a post-dispatch copy of
    /// the linked input. Fails `UnknownLink` before anything is recorded
    /// if that input was never registered.
    pub fn register_output(&mut self, name: &str, linked: &str, sizing: &HostBuffer) -> Result<()> {
        let input_index = self
            .table
            .position(linked)
            .ok_or_else(|| Error::UnknownLink(linked.to_string()))?;
        let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size: sizing.byte_len(),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.outputs.push(OutputBinding {
            name: name.to_string(),
            input_index,
            buffer,
        });
        self.artifact = None;
        debug!(name, linked, "output buffer registered");
        Ok(())
    }

    // Translation and the correction loop proxy to the session; anything
    // that can change the assembled source drops the current artifact.

    pub fn translate_function(
        &mut self,
        source: &str,
        return_type: WgslType,
        param_types: &[WgslType],
    ) -> Result<String> {
        self.artifact = None;
        self.session
            .translate_function(source, return_type, param_types)
    }

    pub fn translate_function_with_args(
        &mut self,
        source: &str,
        return_type: WgslType,
        args: &[CallArg],
    ) -> Result<String> {
        self.artifact = None;
        self.session
            .translate_function_with_args(source, return_type, args)
    }

    pub fn translate_entry(&mut self, source: &str, workgroup: &[u32]) -> Result<String> {
        self.artifact = None;
        self.session.translate_entry(source, workgroup)
    }

    pub fn list_variables(&self, function: &str) -> Result<&TypeTable> {
        self.session.list_variables(function)
    }

    pub fn submit_edit(&mut self, function: &str, variable: &str, new_type: &str) -> Result<()> {
        self.session.submit_edit(function, variable, new_type)
    }

    /// Regenerate if any edit occurred since the last confirm. A
    /// regeneration invalidates the current pipeline.
    pub fn confirm(&mut self) -> Result<bool> {
        let regenerated = self.session.confirm()?;
        if regenerated {
            self.artifact = None;
        }
        Ok(regenerated)
    }

    /// The current assembled shader source: binding header, helper bodies,
    /// entry point.
    pub fn shader_source(&self) -> String {
        self.session.assemble(&self.table.header())
    }

    /// Assemble and compile the current source against the current buffer
    /// set.
    pub fn build(&mut self) -> Result<()> {
        let entry = self
            .session
            .entry_point()
            .ok_or_else(|| Error::Compile("no compute entry point has been translated".to_string()))?
            .to_string();
        let source = self.shader_source();
        debug!(%source, "compiling assembled shader");
        self.artifact = Some(PipelineArtifact::compile(
            &self.ctx,
            &source,
            &entry,
            &self.table,
        )?);
        Ok(())
    }

    /// Encode one compute pass plus one copy per output (the linked
    /// input's current contents, sized to that input) and submit them as a
    /// single command buffer.
    pub fn dispatch(&mut self, workgroup_counts: [u32; 3]) -> Result<()> {
        let artifact = self.artifact.as_ref().ok_or_else(|| {
            Error::LayoutMismatch("no pipeline built for the current buffer set".to_string())
        })?;
        if artifact.fingerprint != self.table.fingerprint() {
            return Err(Error::LayoutMismatch(
                "buffers were registered after the last build".to_string(),
            ));
        }

        let entries: Vec<wgpu::BindGroupEntry> = self
            .table
            .inputs()
            .iter()
            .zip(&self.input_buffers)
            .map(|(b, buffer)| wgpu::BindGroupEntry {
                binding: b.binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel-bind-group"),
            layout: &artifact.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kernel-encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("kernel-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&artifact.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                workgroup_counts[0],
                workgroup_counts[1],
                workgroup_counts[2],
            );
        }
        for output in &self.outputs {
            let source = &self.input_buffers[output.input_index];
            let len = self.table.inputs()[output.input_index].byte_len;
            encoder.copy_buffer_to_buffer(source, 0, &output.buffer, 0, len);
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        info!(counts = ?workgroup_counts, "dispatch submitted");
        Ok(())
    }

    /// Map each output for read and copy its contents back to the host, in
    /// registration order. Sequencing after submission completion is
    /// guaranteed by the map wait itself.
    pub fn read_back(&mut self) -> Result<Vec<(String, HostBuffer)>> {
        let mut results = Vec::with_capacity(self.outputs.len());
        for output in &self.outputs {
            let kind = self.table.inputs()[output.input_index].kind;
            let slice = output.buffer.slice(..);
            let (tx, rx) = std::sync::mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
            self.ctx.device.poll(wgpu::Maintain::Wait);
            rx.recv()
                .map_err(|_| Error::DeviceUnavailable {
                    reason: "readback channel closed".to_string(),
                })?
                .map_err(|e| Error::DeviceUnavailable {
                    reason: format!("buffer mapping failed: {e}"),
                })?;
            let data = slice.get_mapped_range();
            let host = match kind {
                ScalarKind::F32 => HostBuffer::F32(bytemuck::cast_slice(&data).to_vec()),
                ScalarKind::I32 => HostBuffer::I32(bytemuck::cast_slice(&data).to_vec()),
                ScalarKind::U32 => HostBuffer::U32(bytemuck::cast_slice(&data).to_vec()),
            };
            drop(data);
            output.buffer.unmap();
            results.push((output.name.clone(), host));
        }
        Ok(results)
    }

    /// How many inputs are currently registered.
    pub fn input_count(&self) -> usize {
        self.table.inputs().len()
    }
}
