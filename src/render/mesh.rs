/// Per-vertex layout of the flat attribute array: position (3), texture
/// (2), face shade (1), sky light (1), block light (1).
pub const FLOATS_PER_VERTEX: usize = 8;

/// Face shade constants in direction order (down, up, north, south, east,
/// west): top faces brightest, bottom darkest, sides in between.
pub const FACE_SHADE: [f32; 6] = [0.5, 1.0, 0.8, 0.8, 0.6, 0.6];

/// Flat vertex/attribute arrays for one chunk, produced by the face-culling
/// pass and consumed by the mesh upload. Four vertices per quad; the index
/// pattern (0,1,2, 2,3,0) is shared across all chunks.
#[derive(Debug, Default, Clone)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub quad_count: usize,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.quad_count = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.quad_count == 0
    }

    /// Appends one quad: four corner positions with shared shade and
    /// per-vertex light.
    pub fn push_quad(
        &mut self,
        pos: &[f32; 12],
        tex: &[f32; 8],
        shade: f32,
        sky: f32,
        block: f32,
    ) {
        for corner in 0..4 {
            self.vertices.extend_from_slice(&[
                pos[corner * 3],
                pos[corner * 3 + 1],
                pos[corner * 3 + 2],
                tex[corner * 2],
                tex[corner * 2 + 1],
                shade,
                sky,
                block,
            ]);
        }
        self.quad_count += 1;
    }

    pub fn vertex_count(&self) -> usize {
        self.quad_count * 4
    }
}

pub type BufferHandle = u32;

/// Seam to the rendering collaborator. The world only ever hands finished
/// attribute arrays across it and frees them on chunk eviction.
pub trait RenderBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> BufferHandle;
    fn free_mesh(&mut self, handle: BufferHandle);
}

/// Backend that only tracks handle lifetimes. Used headless and in tests.
#[derive(Debug, Default)]
pub struct NullBackend {
    next: BufferHandle,
    live: std::collections::HashSet<BufferHandle>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffers(&self) -> usize {
        self.live.len()
    }
}

impl RenderBackend for NullBackend {
    fn upload_mesh(&mut self, _mesh: &MeshData) -> BufferHandle {
        self.next += 1;
        self.live.insert(self.next);
        self.next
    }

    fn free_mesh(&mut self, handle: BufferHandle) {
        if !self.live.remove(&handle) {
            log::warn!("freed unknown mesh buffer {}", handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_quad_layout() {
        let mut mesh = MeshData::new();
        let pos = [0.0; 12];
        let tex = [0.25; 8];
        mesh.push_quad(&pos, &tex, 0.8, 1.0, 0.5);
        assert_eq!(mesh.quad_count, 1);
        assert_eq!(mesh.vertices.len(), 4 * FLOATS_PER_VERTEX);
        assert_eq!(mesh.vertices[5], 0.8);
        assert_eq!(mesh.vertices[6], 1.0);
        assert_eq!(mesh.vertices[7], 0.5);
    }

    #[test]
    fn test_null_backend_tracks_handles() {
        let mut backend = NullBackend::new();
        let a = backend.upload_mesh(&MeshData::new());
        let b = backend.upload_mesh(&MeshData::new());
        assert_ne!(a, b);
        assert_eq!(backend.live_buffers(), 2);
        backend.free_mesh(a);
        assert_eq!(backend.live_buffers(), 1);
    }
}
