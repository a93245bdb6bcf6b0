//! Host data and storage-buffer binding bookkeeping.

use crate::error::{Error, Result};
use crate::types::ScalarKind;

/// A CPU-resident numeric buffer in one of the kinds callers supply.
///
/// Only the 32-bit kinds can be registered; the wider kinds exist so that
/// rejecting them is part of the contract rather than a panic.
#[derive(Clone, Debug, PartialEq)]
pub enum HostBuffer {
    F32(Vec<f32>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F64(Vec<f64>),
    I64(Vec<i64>),
}

impl HostBuffer {
    /// The storage element kind, or `UnsupportedType` for non-32-bit kinds.
    pub fn element_kind(&self) -> Result<ScalarKind> {
        match self {
            HostBuffer::F32(_) => Ok(ScalarKind::F32),
            HostBuffer::I32(_) => Ok(ScalarKind::I32),
            HostBuffer::U32(_) => Ok(ScalarKind::U32),
            HostBuffer::F64(_) => Err(Error::UnsupportedType("f64".to_string())),
            HostBuffer::I64(_) => Err(Error::UnsupportedType("i64".to_string())),
        }
    }

    pub fn byte_len(&self) -> u64 {
        match self {
            HostBuffer::F32(v) => (v.len() * 4) as u64,
            HostBuffer::I32(v) => (v.len() * 4) as u64,
            HostBuffer::U32(v) => (v.len() * 4) as u64,
            HostBuffer::F64(v) => (v.len() * 8) as u64,
            HostBuffer::I64(v) => (v.len() * 8) as u64,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            HostBuffer::F32(v) => bytemuck::cast_slice(v),
            HostBuffer::I32(v) => bytemuck::cast_slice(v),
            HostBuffer::U32(v) => bytemuck::cast_slice(v),
            HostBuffer::F64(v) => bytemuck::cast_slice(v),
            HostBuffer::I64(v) => bytemuck::cast_slice(v),
        }
    }
}

/// One registered input: shader-visible name, two-level address, element
/// kind, and byte length. Binding indices are assigned monotonically
/// across all inputs regardless of group and never reused within a build.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ScalarKind,
    pub byte_len: u64,
}

/// Registration-ordered input bindings plus the monotonic index counter.
#[derive(Default, Debug)]
pub struct BindingTable {
    inputs: Vec<BufferBinding>,
    next_binding: u32,
}

impl BindingTable {
    pub fn add_input(&mut self, name: &str, kind: ScalarKind, byte_len: u64, group: u32) -> u32 {
        let binding = self.next_binding;
        self.next_binding += 1;
        self.inputs.push(BufferBinding {
            name: name.to_string(),
            group,
            binding,
            kind,
            byte_len,
        });
        binding
    }

    pub fn inputs(&self) -> &[BufferBinding] {
        &self.inputs
    }

    /// Position of the most recent registration under `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.inputs.iter().rposition(|b| b.name == name)
    }

    /// The binding-declaration header, one line per input in registration
    /// order.
    pub fn header(&self) -> String {
        let mut out = String::new();
        for b in &self.inputs {
            out.push_str(&format!(
                "@group({}) @binding({}) var<storage, read_write> {} : array<{}>;\n",
                b.group, b.binding, b.name, b.kind
            ));
        }
        out
    }

    /// One storage-buffer, compute-visible layout entry per input, in
    /// registration order.
    pub fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        self.inputs
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect()
    }

    /// Order-sensitive identity of the current buffer set. A pipeline
    /// artifact is valid only for the fingerprint it was built against.
    pub fn fingerprint(&self) -> Vec<(String, u32, u32)> {
        self.inputs
            .iter()
            .map(|b| (b.name.clone(), b.group, b.binding))
            .collect()
    }
}
