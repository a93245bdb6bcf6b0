//! Translate restricted numeric kernel functions into WGSL compute
//! shaders and run them on the GPU.
//!
//! The front half tokenizes a function definition, takes (or infers)
//! parameter types, and generates WGSL line by line, keeping a transcript
//! per function so inferred types can be corrected and the shader
//! re-emitted without re-parsing. The back half allocates storage
//! buffers, builds a compute pipeline from the assembled source,
//! dispatches it, and reads results back through staging copies.

pub mod emit;
pub mod error;
pub mod gpu;
pub mod infer;
pub mod runner;
pub mod session;
pub mod span;
pub mod token;
pub mod transcript;
pub mod types;

pub use error::{Error, Result};
pub use gpu::bindings::{BufferBinding, HostBuffer};
pub use gpu::GpuContext;
pub use infer::CallArg;
pub use runner::KernelRunner;
pub use session::Session;
pub use types::{ScalarKind, TypeTable, WgslType};

/// Translate a single helper function to WGSL with declared parameter
/// types, without touching any session state.
pub fn translate(source: &str, return_type: WgslType, param_types: &[WgslType]) -> Result<String> {
    Session::new().translate_function(source, return_type, param_types)
}
