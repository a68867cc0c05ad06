pub mod mesh;

pub use mesh::{BufferHandle, MeshData, NullBackend, RenderBackend};
