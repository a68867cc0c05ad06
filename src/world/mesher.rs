use crate::render::mesh::{MeshData, FACE_SHADE};
use crate::world::block_data::{occludes, BLOCKS};
use crate::world::chunk_coord::ChunkCoord;
use crate::world::core::World;
use crate::world::light::LightChannel;
use crate::world::shape::{NeighborView, ShapeId, DIR_OFFSETS, SHAPES};

impl NeighborView for World {
    fn shape_at(&self, x: i32, y: i32, z: i32) -> ShapeId {
        BLOCKS.shape_of(self.get_block(x, y, z))
    }

    fn solid_at(&self, x: i32, y: i32, z: i32) -> bool {
        BLOCKS.get(self.get_block(x, y, z)).solid
    }
}

impl World {
    /// Face-culling pass: rebuilds the chunk's flat attribute arrays from
    /// current blocks and light. The upload to the render backend happens
    /// separately in `gen_mesh`.
    pub(crate) fn optimize_chunk(&mut self, coord: ChunkCoord) {
        let Some(slot) = self.slot(coord.x(), coord.z()) else {
            return;
        };
        if !self.loaded[slot].generated {
            return;
        }
        let mesh = self.build_chunk_mesh(coord);
        let chunk = &mut self.loaded[slot];
        chunk.mesh = Some(mesh);
        chunk.optimized = true;
    }

    fn build_chunk_mesh(&self, coord: ChunkCoord) -> MeshData {
        let chunk = self
            .chunk_at(coord.x(), coord.z())
            .expect("meshing a windowed chunk");
        let bx = coord.block_x();
        let bz = coord.block_z();
        let mut mesh = MeshData::new();

        for y in 0..=chunk.max_y {
            for x in 0..16 {
                for z in 0..16 {
                    let id = chunk.get_block(x, y, z);
                    if id.is_air() {
                        continue;
                    }
                    let data = BLOCKS.get(id);
                    let wx = bx + x;
                    let wz = bz + z;
                    let shape_id = SHAPES.resolve(BLOCKS.shape_of(id), wx, y, wz, self);
                    let shape = SHAPES.get(shape_id);

                    for dir in 0..6 {
                        let (dx, dy, dz) = DIR_OFFSETS[dir];
                        let (nx, ny, nz) = (wx + dx, y + dy, wz + dz);
                        if shape.cull[dir] != 0 && occludes(self.get_block(nx, ny, nz)) {
                            continue;
                        }
                        let sky = self.get_light_channel(nx, ny, nz, LightChannel::Sky);
                        let glow = self.get_light_channel(nx, ny, nz, LightChannel::Block);
                        let tile = data.textures[dir];
                        let tile_u = (tile % 16) as f32 / 16.0;
                        let tile_v = (tile / 16) as f32 / 16.0;

                        for quad in &shape.quads[dir] {
                            let mut pos = quad.pos;
                            for corner in 0..4 {
                                pos[corner * 3] += wx as f32 + 0.5;
                                pos[corner * 3 + 1] += y as f32 + 0.5;
                                pos[corner * 3 + 2] += wz as f32 + 0.5;
                            }
                            let mut tex = quad.tex;
                            for corner in 0..4 {
                                tex[corner * 2] += tile_u;
                                tex[corner * 2 + 1] += tile_v;
                            }
                            mesh.push_quad(
                                &pos,
                                &tex,
                                FACE_SHADE[dir],
                                sky as f32 / 15.0,
                                glow as f32 / 15.0,
                            );
                        }
                    }
                }
            }
        }
        mesh
    }
}
