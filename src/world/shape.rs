use once_cell::sync::Lazy;

/// Number of texture tiles across the atlas.
const ATLAS_WIDTH: f32 = 16.0;

/// Face direction order used everywhere: matches the quad bucket order of
/// the shape catalog and the save format's section permutations.
pub const DIR_DOWN: usize = 0;
pub const DIR_UP: usize = 1;
pub const DIR_NORTH: usize = 2; // +z
pub const DIR_SOUTH: usize = 3; // -z
pub const DIR_EAST: usize = 4; // +x
pub const DIR_WEST: usize = 5; // -x

/// Unit offsets per face direction, in the order above.
pub const DIR_OFFSETS: [(i32, i32, i32); 6] = [
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, 1),
    (0, 0, -1),
    (1, 0, 0),
    (-1, 0, 0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(pub u16);

/// One textured quad: four corners in block-local space (centered on the
/// block origin, 1 unit per block), atlas-relative texture corners, and
/// bounding extents used for culling and raycasts.
#[derive(Debug, Clone)]
pub struct Quad {
    pub pos: [f32; 12],
    pub tex: [f32; 8],
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Quad {
    fn with_extents(pos: [f32; 12], tex: [f32; 8]) -> Self {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for corner in 0..4 {
            for axis in 0..3 {
                let v = pos[corner * 3 + axis];
                min[axis] = min[axis].min(v);
                max[axis] = max[axis].max(v);
            }
        }
        Quad { pos, tex, min, max }
    }
}

/// How a shape reacts to its neighborhood at mesh time.
#[derive(Debug, Clone)]
pub enum ShapeKind {
    /// Geometry is fixed; the variant table alone handles orientation.
    Static,
    /// Selects one of 16 composed variants from the 4-bit lateral
    /// neighbor-solidity mask.
    Fence,
    /// Substitutes inner/outer corner stairs based on the adjacent stair
    /// orientation along one horizontal axis.
    Stair(StairRule),
}

/// Precomputed corner-substitution rule for one directed stair variant.
#[derive(Debug, Clone, Copy)]
pub struct StairRule {
    pub dx: i32,
    pub dz: i32,
    pub stair_a: ShapeId,
    pub stair_b: ShapeId,
    pub neg_a: ShapeId,
    pub neg_b: ShapeId,
    pub pos_a: ShapeId,
    pub pos_b: ShapeId,
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub name: &'static str,
    /// Quad lists per face direction (down, up, north, south, east, west).
    pub quads: [Vec<Quad>; 6],
    /// Per-direction culling flags. 0 = never culled. For lateral faces the
    /// two low bits carry bottom-half/top-half coverage sensitivity, which
    /// `flip` swaps.
    pub cull: [u8; 6],
    pub rotates: bool,
    pub flips: bool,
    /// Variant table keyed by 3 bits: bit 0 = flip, bits 1-2 = rotation
    /// field. Slots that were not generated point back at the shape itself.
    pub variants: [ShapeId; 8],
    pub kind: ShapeKind,
}

impl Shape {
    pub fn quad_count(&self) -> usize {
        self.quads.iter().map(Vec::len).sum()
    }
}

/// Everything the mesher needs to know about the blocks around a voxel when
/// resolving a context-dependent shape.
pub trait NeighborView {
    fn shape_at(&self, x: i32, y: i32, z: i32) -> ShapeId;
    fn solid_at(&self, x: i32, y: i32, z: i32) -> bool;
}

pub struct ShapeRegistry {
    shapes: Vec<Shape>,
    pub cube: ShapeId,
    pub slab: ShapeId,
    pub stair: ShapeId,
    pub flower: ShapeId,
    pub lantern: ShapeId,
    pub door: ShapeId,
    pub fence: ShapeId,
    pub fence_side: ShapeId,
    pub inner_stairs: ShapeId,
    pub outer_stairs: ShapeId,
    pub player: ShapeId,
    fence_masks: [ShapeId; 16],
}

/// The registry is pure startup-time data; a malformed base shape is a
/// programming error, not a runtime failure.
pub static SHAPES: Lazy<ShapeRegistry> = Lazy::new(ShapeRegistry::build);

struct BaseDef {
    name: &'static str,
    verts: [&'static [[f32; 7]]; 6],
    cull: [u8; 6],
    rotates: bool,
    flips: bool,
}

impl ShapeRegistry {
    pub fn get(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Applies a block's 3-bit orientation key to a shape.
    pub fn variant(&self, id: ShapeId, key: u8) -> ShapeId {
        self.get(id).variants[(key & 7) as usize]
    }

    /// Context-dependent resolution at mesh time: a pure function of the
    /// neighborhood, dispatched on the shape's kind.
    pub fn resolve(
        &self,
        id: ShapeId,
        x: i32,
        y: i32,
        z: i32,
        view: &dyn NeighborView,
    ) -> ShapeId {
        match &self.get(id).kind {
            ShapeKind::Static => id,
            ShapeKind::Fence => {
                let mut mask = 0usize;
                if view.solid_at(x + 1, y, z) {
                    mask |= 8;
                }
                if view.solid_at(x - 1, y, z) {
                    mask |= 4;
                }
                if view.solid_at(x, y, z + 1) {
                    mask |= 2;
                }
                if view.solid_at(x, y, z - 1) {
                    mask |= 1;
                }
                self.fence_masks[mask]
            }
            ShapeKind::Stair(rule) => {
                let n = view.shape_at(x - rule.dx, y, z - rule.dz);
                if n == rule.stair_a {
                    return rule.neg_a;
                }
                if n == rule.stair_b {
                    return rule.neg_b;
                }
                let p = view.shape_at(x + rule.dx, y, z + rule.dz);
                if p == rule.stair_a {
                    return rule.pos_a;
                }
                if p == rule.stair_b {
                    return rule.pos_b;
                }
                id
            }
        }
    }

    fn build() -> ShapeRegistry {
        let mut b = Builder { shapes: Vec::new() };
        let cube = b.add_base(&defs::CUBE);
        let slab = b.add_base(&defs::SLAB);
        let stair = b.add_base(&defs::STAIR);
        let flower = b.add_base(&defs::FLOWER);
        let lantern = b.add_base(&defs::LANTERN);
        let door = b.add_base(&defs::DOOR);
        let fence = b.add_base(&defs::FENCE);
        let fence_side = b.add_base(&defs::FENCE_SIDE);
        let inner_stairs = b.add_base(&defs::INNER_STAIRS);
        let outer_stairs = b.add_base(&defs::OUTER_STAIRS);
        let player = b.add_base(&defs::PLAYER);

        let fence_masks = b.compose_fence_masks(fence, fence_side);
        b.attach_stair_rules(stair, inner_stairs, outer_stairs);
        b.shapes[fence.0 as usize].kind = ShapeKind::Fence;

        ShapeRegistry {
            shapes: b.shapes,
            cube,
            slab,
            stair,
            flower,
            lantern,
            door,
            fence,
            fence_side,
            inner_stairs,
            outer_stairs,
            player,
            fence_masks,
        }
    }
}

struct Builder {
    shapes: Vec<Shape>,
}

impl Builder {
    fn push(&mut self, shape: Shape) -> ShapeId {
        let id = ShapeId(self.shapes.len() as u16);
        self.shapes.push(shape);
        id
    }

    /// Normalizes a base definition and generates its rotation/flip
    /// variants. All variants share one table so chained lookups stay
    /// within the family.
    fn add_base(&mut self, def: &BaseDef) -> ShapeId {
        let base = normalize(def);
        let id = self.push(base);
        let mut variants = [id; 8];

        if def.rotates {
            let r1 = rotate(&self.shapes[id.0 as usize]);
            let v4 = self.push(r1);
            let r2 = rotate(&self.shapes[v4.0 as usize]);
            let v2 = self.push(r2);
            let r3 = rotate(&self.shapes[v2.0 as usize]);
            let v6 = self.push(r3);
            variants[4] = v4;
            variants[2] = v2;
            variants[6] = v6;
        }
        if def.flips {
            let f0 = flip(&self.shapes[id.0 as usize]);
            variants[1] = self.push(f0);
            if def.rotates {
                let f2 = flip(&self.shapes[variants[2].0 as usize]);
                variants[3] = self.push(f2);
                let f4 = flip(&self.shapes[variants[4].0 as usize]);
                variants[5] = self.push(f4);
                let f6 = flip(&self.shapes[variants[6].0 as usize]);
                variants[7] = self.push(f6);
            }
        }
        for v in variants {
            self.shapes[v.0 as usize].variants = variants;
        }
        id
    }

    /// Composes the 16 fence variants: the post plus one rotated side arm
    /// per set bit of the neighbor-solidity mask.
    fn compose_fence_masks(&mut self, fence: ShapeId, fence_side: ShapeId) -> [ShapeId; 16] {
        let side_variants = self.shapes[fence_side.0 as usize].variants;
        let mut masks = [fence; 16];
        for mask in 0..16usize {
            let mut quads = self.shapes[fence.0 as usize].quads.clone();
            for bit in 0..4 {
                if mask & (1 << bit) != 0 {
                    let arm = side_variants[bit * 2];
                    let arm_quads = self.shapes[arm.0 as usize].quads.clone();
                    for dir in 0..6 {
                        quads[dir].extend(arm_quads[dir].iter().cloned());
                    }
                }
            }
            masks[mask] = self.push(Shape {
                name: "fence",
                quads,
                cull: [0; 6],
                rotates: false,
                flips: false,
                variants: [fence; 8],
                kind: ShapeKind::Static,
            });
        }
        masks
    }

    /// The fixed 8-entry corner-substitution table: one rule per directed
    /// stair variant, keyed by the orientation of the stair next to it.
    fn attach_stair_rules(&mut self, stair: ShapeId, inner: ShapeId, outer: ShapeId) {
        let stairs = self.shapes[stair.0 as usize].variants;
        let inner_v = self.shapes[inner.0 as usize].variants;
        let outer_v = self.shapes[outer.0 as usize].variants;
        #[rustfmt::skip]
        let table: [(i32, i32, [usize; 3], [ShapeId; 8], [ShapeId; 8]); 8] = [
            (1, 0, [4, 6, 0], inner_v, outer_v),
            (1, 0, [5, 7, 1], inner_v, outer_v),
            (1, 0, [6, 4, 2], outer_v, inner_v),
            (1, 0, [7, 5, 3], outer_v, inner_v),
            (0, 1, [2, 0, 4], outer_v, inner_v),
            (0, 1, [3, 1, 5], outer_v, inner_v),
            (0, 1, [0, 2, 6], inner_v, outer_v),
            (0, 1, [1, 3, 7], inner_v, outer_v),
        ];
        for (i, (dx, dz, idx, neg, pos)) in table.into_iter().enumerate() {
            let rule = StairRule {
                dx,
                dz,
                stair_a: stairs[idx[0]],
                stair_b: stairs[idx[1]],
                neg_a: neg[idx[0]],
                neg_b: neg[idx[2]],
                pos_a: pos[idx[0]],
                pos_b: pos[idx[2]],
            };
            self.shapes[stairs[i].0 as usize].kind = ShapeKind::Stair(rule);
        }
    }
}

/// Expands a raw `(x, y, z, w, h, tx, ty)` rect into a quad for the given
/// face. The anchor corner carries the top-left of the texture; `w` walks
/// along x (or z for the east/west faces) and `h` along y (or z for the
/// horizontal faces).
fn map_coords(rect: &[f32; 7], face: usize) -> Quad {
    let [x, y, z, w, h, tx, ty] = *rect;
    let tex = [
        (tx + w) / 16.0 / ATLAS_WIDTH,
        ty / 16.0 / ATLAS_WIDTH,
        tx / 16.0 / ATLAS_WIDTH,
        ty / 16.0 / ATLAS_WIDTH,
        tx / 16.0 / ATLAS_WIDTH,
        (ty + h) / 16.0 / ATLAS_WIDTH,
        (tx + w) / 16.0 / ATLAS_WIDTH,
        (ty + h) / 16.0 / ATLAS_WIDTH,
    ];
    let mut pos = [0f32; 12];
    pos[0] = x;
    pos[1] = y;
    pos[2] = z;
    let rest: [f32; 9] = match face {
        DIR_DOWN => [x + w, y, z, x + w, y, z + h, x, y, z + h],
        DIR_UP => [x + w, y, z, x + w, y, z - h, x, y, z - h],
        DIR_NORTH => [x - w, y, z, x - w, y - h, z, x, y - h, z],
        DIR_SOUTH => [x + w, y, z, x + w, y - h, z, x, y - h, z],
        DIR_EAST => [x, y, z + w, x, y - h, z + w, x, y - h, z],
        DIR_WEST => [x, y, z - w, x, y - h, z - w, x, y - h, z],
        _ => unreachable!("face index out of range"),
    };
    pos[3..12].copy_from_slice(&rest);
    for v in pos.iter_mut() {
        *v = (*v - 8.0) / 16.0;
    }
    Quad::with_extents(pos, tex)
}

fn normalize(def: &BaseDef) -> Shape {
    let mut quads: [Vec<Quad>; 6] = Default::default();
    for dir in 0..6 {
        quads[dir] = def.verts[dir]
            .iter()
            .map(|rect| map_coords(rect, dir))
            .collect();
    }
    Shape {
        name: def.name,
        quads,
        cull: def.cull,
        rotates: def.rotates,
        flips: def.flips,
        variants: [ShapeId(0); 8],
        kind: ShapeKind::Static,
    }
}

/// 90-degree clockwise rotation about the vertical axis: every vertex
/// `(x, y, z) -> (z, y, -x)`, horizontal face buckets permuted cyclically
/// (north <- west, west <- south, south <- east, east <- north), and the
/// bottom/top quads' corner order cycled to keep the texture anchor.
pub fn rotate(shape: &Shape) -> Shape {
    let mut quads: [Vec<Quad>; 6] = Default::default();
    for dir in 0..6 {
        quads[dir] = shape.quads[dir]
            .iter()
            .map(|q| {
                let mut pos = [0f32; 12];
                let mut tex = q.tex;
                for k in 0..4 {
                    pos[k * 3] = q.pos[k * 3 + 2];
                    pos[k * 3 + 1] = q.pos[k * 3 + 1];
                    pos[k * 3 + 2] = -q.pos[k * 3];
                }
                if dir == DIR_DOWN {
                    pos.rotate_left(3);
                    tex.rotate_left(2);
                } else if dir == DIR_UP {
                    pos.rotate_right(3);
                    tex.rotate_right(2);
                }
                Quad::with_extents(pos, tex)
            })
            .collect();
    }
    let [down, up, north, south, east, west] = quads;
    let quads = [down, up, west, east, north, south];
    let cull = [
        shape.cull[DIR_DOWN],
        shape.cull[DIR_UP],
        shape.cull[DIR_WEST],
        shape.cull[DIR_EAST],
        shape.cull[DIR_NORTH],
        shape.cull[DIR_SOUTH],
    ];
    Shape {
        name: shape.name,
        quads,
        cull,
        rotates: true,
        flips: shape.flips,
        variants: shape.variants,
        kind: ShapeKind::Static,
    }
}

/// Reflection over the horizontal mid-plane: vertex order reversed (winding
/// flip) with y negated, top/bottom buckets swapped, and the two
/// half-coverage bits of each lateral cull flag exchanged.
pub fn flip(shape: &Shape) -> Shape {
    let mut quads: [Vec<Quad>; 6] = Default::default();
    for dir in 0..6 {
        quads[dir] = shape.quads[dir]
            .iter()
            .map(|q| {
                let mut pos = [0f32; 12];
                for k in 0..4 {
                    let src = 3 - k;
                    pos[k * 3] = q.pos[src * 3];
                    pos[k * 3 + 1] = -q.pos[src * 3 + 1];
                    pos[k * 3 + 2] = q.pos[src * 3 + 2];
                }
                Quad::with_extents(pos, q.tex)
            })
            .collect();
    }
    let [down, up, north, south, east, west] = quads;
    let quads = [up, down, north, south, east, west];
    let swap = |c: u8| (c & 1) << 1 | (c & 2) >> 1;
    let cull = [
        shape.cull[DIR_UP],
        shape.cull[DIR_DOWN],
        swap(shape.cull[DIR_NORTH]),
        swap(shape.cull[DIR_SOUTH]),
        swap(shape.cull[DIR_EAST]),
        swap(shape.cull[DIR_WEST]),
    ];
    Shape {
        name: shape.name,
        quads,
        cull,
        rotates: shape.rotates,
        flips: shape.flips,
        variants: shape.variants,
        kind: ShapeKind::Static,
    }
}

/// The base catalog. Quads are authored in 0-16 local units as
/// `(x, y, z, w, h, tx, ty)`, one list per face direction.
#[rustfmt::skip]
mod defs {
    use super::BaseDef;

    pub static CUBE: BaseDef = BaseDef {
        name: "cube",
        verts: [
            &[[0.0, 0.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 16.0, 16.0, 16.0, 16.0, 0.0, 0.0]],
            &[[16.0, 16.0, 16.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 16.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[16.0, 16.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 16.0, 16.0, 16.0, 16.0, 0.0, 0.0]],
        ],
        cull: [1, 1, 1, 1, 1, 1],
        rotates: true,
        flips: false,
    };

    pub static SLAB: BaseDef = BaseDef {
        name: "slab",
        verts: [
            &[[0.0, 0.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 8.0, 16.0, 16.0, 16.0, 0.0, 0.0]],
            &[[16.0, 8.0, 16.0, 16.0, 8.0, 0.0, 0.0]],
            &[[0.0, 8.0, 0.0, 16.0, 8.0, 0.0, 0.0]],
            &[[16.0, 8.0, 0.0, 16.0, 8.0, 0.0, 0.0]],
            &[[0.0, 8.0, 16.0, 16.0, 8.0, 0.0, 0.0]],
        ],
        cull: [1, 0, 0, 0, 0, 0],
        rotates: false,
        flips: true,
    };

    pub static STAIR: BaseDef = BaseDef {
        name: "stair",
        verts: [
            &[[0.0, 0.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 8.0, 16.0, 8.0, 16.0, 8.0, 0.0], [8.0, 16.0, 16.0, 8.0, 16.0, 0.0, 0.0]],
            &[[8.0, 8.0, 16.0, 8.0, 8.0, 0.0, 0.0], [16.0, 16.0, 16.0, 8.0, 16.0, 0.0, 0.0]],
            &[[0.0, 8.0, 0.0, 8.0, 8.0, 0.0, 0.0], [8.0, 16.0, 0.0, 8.0, 16.0, 0.0, 0.0]],
            &[[16.0, 16.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 8.0, 16.0, 16.0, 8.0, 0.0, 0.0], [8.0, 16.0, 16.0, 16.0, 8.0, 0.0, 0.0]],
        ],
        cull: [1, 0, 0, 0, 1, 0],
        rotates: true,
        flips: true,
    };

    pub static FLOWER: BaseDef = BaseDef {
        name: "flower",
        verts: [
            &[],
            &[],
            &[[16.0, 16.0, 8.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 16.0, 8.0, 16.0, 16.0, 0.0, 0.0]],
            &[[8.0, 16.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[8.0, 16.0, 16.0, 16.0, 16.0, 0.0, 0.0]],
        ],
        cull: [0; 6],
        rotates: false,
        flips: false,
    };

    pub static LANTERN: BaseDef = BaseDef {
        name: "lantern",
        verts: [
            &[[5.0, 1.0, 5.0, 6.0, 6.0, 0.0, 9.0]],
            &[[5.0, 8.0, 11.0, 6.0, 6.0, 0.0, 9.0], [6.0, 10.0, 10.0, 4.0, 4.0, 1.0, 10.0]],
            &[[11.0, 8.0, 11.0, 6.0, 7.0, 0.0, 2.0], [10.0, 10.0, 10.0, 4.0, 2.0, 1.0, 0.0], [9.5, 15.0, 8.0, 3.0, 4.0, 11.0, 1.0]],
            &[[5.0, 8.0, 5.0, 6.0, 7.0, 0.0, 2.0], [6.0, 10.0, 6.0, 4.0, 2.0, 1.0, 0.0], [6.5, 15.0, 8.0, 3.0, 4.0, 11.0, 1.0]],
            &[[11.0, 8.0, 5.0, 6.0, 7.0, 0.0, 2.0], [10.0, 10.0, 6.0, 4.0, 2.0, 1.0, 0.0], [8.0, 16.0, 6.5, 3.0, 6.0, 11.0, 6.0]],
            &[[5.0, 8.0, 11.0, 6.0, 7.0, 0.0, 2.0], [6.0, 10.0, 10.0, 4.0, 2.0, 1.0, 0.0], [8.0, 16.0, 9.5, 3.0, 6.0, 11.0, 6.0]],
        ],
        cull: [0; 6],
        rotates: false,
        flips: false,
    };

    pub static DOOR: BaseDef = BaseDef {
        name: "door",
        verts: [
            &[[0.0, 0.0, 0.0, 3.0, 16.0, 13.0, 0.0]],
            &[[0.0, 16.0, 16.0, 3.0, 16.0, 0.0, 0.0]],
            &[[3.0, 16.0, 16.0, 3.0, 16.0, 0.0, 0.0]],
            &[[0.0, 16.0, 0.0, 3.0, 16.0, 0.0, 0.0]],
            &[[3.0, 16.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 16.0, 16.0, 16.0, 16.0, 0.0, 0.0]],
        ],
        cull: [0; 6],
        rotates: true,
        flips: false,
    };

    pub static FENCE: BaseDef = BaseDef {
        name: "fence",
        verts: [
            &[[6.0, 0.0, 6.0, 4.0, 4.0, 6.0, 6.0]],
            &[[6.0, 16.0, 10.0, 4.0, 4.0, 6.0, 6.0]],
            &[[10.0, 16.0, 10.0, 4.0, 16.0, 6.0, 0.0]],
            &[[6.0, 16.0, 6.0, 4.0, 16.0, 6.0, 0.0]],
            &[[10.0, 16.0, 6.0, 4.0, 16.0, 6.0, 0.0]],
            &[[6.0, 16.0, 10.0, 4.0, 16.0, 6.0, 0.0]],
        ],
        cull: [0; 6],
        rotates: false,
        flips: false,
    };

    pub static FENCE_SIDE: BaseDef = BaseDef {
        name: "fenceSide",
        verts: [
            &[[7.0, 12.0, 0.0, 2.0, 6.0, 7.0, 0.0], [7.0, 6.0, 0.0, 2.0, 6.0, 7.0, 0.0]],
            &[[7.0, 15.0, 6.0, 2.0, 6.0, 7.0, 0.0], [7.0, 9.0, 6.0, 2.0, 6.0, 7.0, 0.0]],
            &[],
            &[[7.0, 15.0, 0.0, 2.0, 3.0, 7.0, 1.0], [7.0, 9.0, 0.0, 2.0, 3.0, 7.0, 7.0]],
            &[[9.0, 15.0, 0.0, 6.0, 3.0, 0.0, 1.0], [9.0, 9.0, 0.0, 6.0, 3.0, 0.0, 7.0]],
            &[[7.0, 15.0, 6.0, 6.0, 3.0, 0.0, 1.0], [7.0, 9.0, 6.0, 6.0, 3.0, 0.0, 7.0]],
        ],
        cull: [0; 6],
        rotates: true,
        flips: false,
    };

    pub static INNER_STAIRS: BaseDef = BaseDef {
        name: "innerStairs",
        verts: [
            &[[0.0, 0.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 8.0, 8.0, 8.0, 8.0, 0.0, 0.0], [8.0, 16.0, 16.0, 8.0, 16.0, 8.0, 0.0], [0.0, 16.0, 16.0, 8.0, 8.0, 0.0, 8.0]],
            &[[16.0, 16.0, 16.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 8.0, 0.0, 16.0, 8.0, 0.0, 8.0], [8.0, 16.0, 0.0, 8.0, 8.0, 8.0, 0.0], [0.0, 16.0, 8.0, 8.0, 8.0, 0.0, 0.0]],
            &[[16.0, 16.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 8.0, 16.0, 16.0, 8.0, 0.0, 8.0], [8.0, 16.0, 8.0, 8.0, 8.0, 0.0, 0.0], [0.0, 16.0, 16.0, 8.0, 8.0, 8.0, 0.0]],
        ],
        cull: [1, 0, 0, 0, 0, 0],
        rotates: true,
        flips: true,
    };

    pub static OUTER_STAIRS: BaseDef = BaseDef {
        name: "outerStairs",
        verts: [
            &[[0.0, 0.0, 0.0, 16.0, 16.0, 0.0, 0.0]],
            &[[0.0, 8.0, 16.0, 16.0, 16.0, 0.0, 0.0], [8.0, 16.0, 16.0, 8.0, 8.0, 8.0, 8.0]],
            &[[16.0, 8.0, 16.0, 16.0, 8.0, 0.0, 0.0], [16.0, 16.0, 16.0, 8.0, 8.0, 0.0, 0.0]],
            &[[0.0, 8.0, 0.0, 16.0, 8.0, 0.0, 0.0], [8.0, 16.0, 8.0, 8.0, 8.0, 8.0, 0.0]],
            &[[16.0, 8.0, 0.0, 16.0, 8.0, 0.0, 0.0], [16.0, 16.0, 8.0, 8.0, 8.0, 0.0, 0.0]],
            &[[0.0, 8.0, 16.0, 16.0, 8.0, 0.0, 0.0], [8.0, 16.0, 16.0, 8.0, 8.0, 8.0, 0.0]],
        ],
        cull: [1, 0, 0, 0, 0, 0],
        rotates: true,
        flips: true,
    };

    pub static PLAYER: BaseDef = BaseDef {
        name: "player",
        verts: [
            &[[4.0, 24.0, 4.0, 8.0, 8.0, 64.0, 0.0], [4.0, 24.0, 4.0, 8.0, 8.0, 192.0, 0.0], [4.0, 12.0, 6.0, 8.0, 4.0, 112.0, 64.0], [4.0, 12.0, 6.0, 8.0, 4.0, 112.0, 128.0], [0.0, 12.0, 6.0, 4.0, 4.0, 160.0, 192.0], [0.0, 12.0, 6.0, 4.0, 4.0, 192.0, 192.0], [12.0, 12.0, 6.0, 4.0, 4.0, 192.0, 64.0], [12.0, 12.0, 6.0, 4.0, 4.0, 192.0, 128.0], [4.0, 0.0, 6.0, 4.0, 4.0, 96.0, 192.0], [4.0, 0.0, 6.0, 4.0, 4.0, 32.0, 192.0], [8.0, 0.0, 6.0, 4.0, 4.0, 32.0, 64.0], [8.0, 0.0, 6.0, 4.0, 4.0, 32.0, 128.0]],
            &[[4.0, 32.0, 12.0, 8.0, 8.0, 32.0, 0.0], [4.0, 32.0, 12.0, 8.0, 8.0, 160.0, 0.0], [4.0, 24.0, 10.0, 8.0, 4.0, 80.0, 64.0], [4.0, 24.0, 10.0, 8.0, 4.0, 80.0, 128.0], [0.0, 24.0, 10.0, 4.0, 4.0, 144.0, 192.0], [0.0, 24.0, 10.0, 4.0, 4.0, 208.0, 192.0], [12.0, 24.0, 10.0, 4.0, 4.0, 176.0, 64.0], [12.0, 24.0, 10.0, 4.0, 4.0, 176.0, 128.0], [4.0, 12.0, 10.0, 4.0, 4.0, 80.0, 192.0], [4.0, 12.0, 10.0, 4.0, 4.0, 16.0, 192.0], [8.0, 12.0, 10.0, 4.0, 4.0, 16.0, 64.0], [8.0, 12.0, 10.0, 4.0, 4.0, 16.0, 128.0]],
            &[[12.0, 32.0, 12.0, 8.0, 8.0, 96.0, 32.0], [12.0, 32.0, 12.0, 8.0, 8.0, 224.0, 32.0], [12.0, 24.0, 10.0, 8.0, 12.0, 128.0, 80.0], [12.0, 24.0, 10.0, 8.0, 12.0, 128.0, 144.0], [4.0, 24.0, 10.0, 4.0, 12.0, 176.0, 208.0], [4.0, 24.0, 10.0, 4.0, 12.0, 240.0, 208.0], [16.0, 24.0, 10.0, 4.0, 12.0, 208.0, 80.0], [16.0, 24.0, 10.0, 4.0, 12.0, 208.0, 144.0], [8.0, 12.0, 10.0, 4.0, 12.0, 112.0, 208.0], [8.0, 12.0, 10.0, 4.0, 12.0, 48.0, 208.0], [12.0, 12.0, 10.0, 4.0, 12.0, 48.0, 80.0], [12.0, 12.0, 10.0, 4.0, 12.0, 48.0, 144.0]],
            &[[4.0, 32.0, 4.0, 8.0, 8.0, 32.0, 32.0], [4.0, 32.0, 4.0, 8.0, 8.0, 160.0, 32.0], [4.0, 24.0, 6.0, 8.0, 12.0, 80.0, 80.0], [4.0, 24.0, 6.0, 8.0, 12.0, 80.0, 144.0], [0.0, 24.0, 6.0, 4.0, 12.0, 144.0, 208.0], [0.0, 24.0, 6.0, 4.0, 12.0, 208.0, 208.0], [12.0, 24.0, 6.0, 4.0, 12.0, 176.0, 80.0], [12.0, 24.0, 6.0, 4.0, 12.0, 176.0, 144.0], [4.0, 12.0, 6.0, 4.0, 12.0, 80.0, 208.0], [4.0, 12.0, 6.0, 4.0, 12.0, 16.0, 208.0], [8.0, 12.0, 6.0, 4.0, 12.0, 16.0, 80.0], [8.0, 12.0, 6.0, 4.0, 12.0, 16.0, 144.0]],
            &[[12.0, 32.0, 4.0, 8.0, 8.0, 64.0, 32.0], [12.0, 32.0, 4.0, 8.0, 8.0, 192.0, 32.0], [12.0, 24.0, 6.0, 4.0, 12.0, 112.0, 80.0], [12.0, 24.0, 6.0, 4.0, 12.0, 112.0, 144.0], [4.0, 24.0, 6.0, 4.0, 12.0, 160.0, 208.0], [4.0, 24.0, 6.0, 4.0, 12.0, 224.0, 208.0], [16.0, 24.0, 6.0, 4.0, 12.0, 192.0, 80.0], [16.0, 24.0, 6.0, 4.0, 12.0, 192.0, 144.0], [8.0, 12.0, 6.0, 4.0, 12.0, 96.0, 208.0], [8.0, 12.0, 6.0, 4.0, 12.0, 32.0, 208.0], [12.0, 12.0, 6.0, 4.0, 12.0, 32.0, 80.0], [12.0, 12.0, 6.0, 4.0, 12.0, 32.0, 144.0]],
            &[[4.0, 32.0, 12.0, 8.0, 8.0, 0.0, 32.0], [4.0, 32.0, 12.0, 8.0, 8.0, 128.0, 32.0], [4.0, 24.0, 10.0, 4.0, 12.0, 64.0, 80.0], [4.0, 24.0, 10.0, 4.0, 12.0, 64.0, 144.0], [0.0, 24.0, 10.0, 4.0, 12.0, 128.0, 208.0], [0.0, 24.0, 10.0, 4.0, 12.0, 192.0, 208.0], [12.0, 24.0, 10.0, 4.0, 12.0, 160.0, 80.0], [12.0, 24.0, 10.0, 4.0, 12.0, 160.0, 144.0], [4.0, 12.0, 10.0, 4.0, 12.0, 64.0, 208.0], [4.0, 12.0, 10.0, 4.0, 12.0, 0.0, 208.0], [8.0, 12.0, 10.0, 4.0, 12.0, 0.0, 80.0], [8.0, 12.0, 10.0, 4.0, 12.0, 0.0, 144.0]],
        ],
        cull: [0; 6],
        rotates: true,
        flips: false,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quads_match(a: &Shape, b: &Shape) -> bool {
        for dir in 0..6 {
            if a.quads[dir].len() != b.quads[dir].len() {
                return false;
            }
            for (qa, qb) in a.quads[dir].iter().zip(&b.quads[dir]) {
                for k in 0..12 {
                    if (qa.pos[k] - qb.pos[k]).abs() > 1e-5 {
                        return false;
                    }
                }
                for k in 0..8 {
                    if (qa.tex[k] - qb.tex[k]).abs() > 1e-5 {
                        return false;
                    }
                }
            }
        }
        a.cull == b.cull
    }

    #[test]
    fn test_four_rotations_return_to_origin() {
        let reg = &*SHAPES;
        for id in [reg.cube, reg.stair, reg.door, reg.fence_side, reg.inner_stairs, reg.outer_stairs] {
            let base = reg.get(id);
            let r = rotate(&rotate(&rotate(&rotate(base))));
            assert!(quads_match(base, &r), "rotate^4 != id for {}", base.name);
        }
    }

    #[test]
    fn test_double_flip_returns_to_origin() {
        let reg = &*SHAPES;
        for id in [reg.slab, reg.stair, reg.inner_stairs, reg.outer_stairs] {
            let base = reg.get(id);
            let f = flip(&flip(base));
            assert!(quads_match(base, &f), "flip^2 != id for {}", base.name);
        }
    }

    #[test]
    fn test_rotation_permutes_cull_flags() {
        let reg = &*SHAPES;
        let stair = reg.get(reg.stair);
        // Base stair culls bottom and east; one rotation moves east to south.
        assert_eq!(stair.cull, [1, 0, 0, 0, 1, 0]);
        let rotated = reg.get(reg.variant(reg.stair, 4));
        assert_eq!(rotated.cull, [1, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_variant_table_shared_within_family() {
        let reg = &*SHAPES;
        let stair = reg.get(reg.stair);
        for key in 0..8u8 {
            let v = reg.variant(reg.stair, key);
            assert_eq!(reg.get(v).variants, stair.variants);
        }
        // Non-rotating, non-flipping shapes always resolve to themselves.
        for key in 0..8u8 {
            assert_eq!(reg.variant(reg.lantern, key), reg.lantern);
        }
        // Slab has only the flipped variant.
        assert_eq!(reg.variant(reg.slab, 0), reg.slab);
        assert_ne!(reg.variant(reg.slab, 1), reg.slab);
    }

    struct FixedView {
        solid: [bool; 4],
        shapes: std::collections::HashMap<(i32, i32, i32), ShapeId>,
        air: ShapeId,
    }

    impl NeighborView for FixedView {
        fn shape_at(&self, x: i32, y: i32, z: i32) -> ShapeId {
            *self.shapes.get(&(x, y, z)).unwrap_or(&self.air)
        }
        fn solid_at(&self, x: i32, _y: i32, z: i32) -> bool {
            match (x, z) {
                (1, 0) => self.solid[0],
                (-1, 0) => self.solid[1],
                (0, 1) => self.solid[2],
                (0, -1) => self.solid[3],
                _ => false,
            }
        }
    }

    #[test]
    fn test_fence_mask_selection() {
        let reg = &*SHAPES;
        let lone = FixedView {
            solid: [false; 4],
            shapes: Default::default(),
            air: reg.cube,
        };
        assert_eq!(reg.resolve(reg.fence, 0, 0, 0, &lone), reg.fence_masks[0]);

        let east_west = FixedView {
            solid: [true, true, false, false],
            shapes: Default::default(),
            air: reg.cube,
        };
        let resolved = reg.resolve(reg.fence, 0, 0, 0, &east_west);
        assert_eq!(resolved, reg.fence_masks[12]);
        // Two arms add geometry on top of the lone post.
        assert!(reg.get(resolved).quad_count() > reg.get(reg.fence_masks[0]).quad_count());
    }

    #[test]
    fn test_stair_corner_substitution() {
        let reg = &*SHAPES;
        let stair0 = reg.variant(reg.stair, 0);
        let rule = match &reg.get(stair0).kind {
            ShapeKind::Stair(rule) => *rule,
            other => panic!("stair kind missing: {:?}", other),
        };
        // A matching stair on the negative side swaps in the corner shape.
        let mut shapes = std::collections::HashMap::new();
        shapes.insert((-rule.dx, 0, -rule.dz), rule.stair_a);
        let view = FixedView {
            solid: [false; 4],
            shapes,
            air: reg.cube,
        };
        assert_eq!(reg.resolve(stair0, 0, 0, 0, &view), rule.neg_a);

        // No stair neighbors: unchanged.
        let empty = FixedView {
            solid: [false; 4],
            shapes: Default::default(),
            air: reg.cube,
        };
        assert_eq!(reg.resolve(stair0, 0, 0, 0, &empty), stair0);
    }

    #[test]
    fn test_quad_extents_inside_unit_block() {
        let reg = &*SHAPES;
        for id in [reg.cube, reg.slab, reg.stair, reg.fence, reg.lantern] {
            for dir in 0..6 {
                for q in &reg.get(id).quads[dir] {
                    for axis in 0..3 {
                        assert!(q.min[axis] >= -0.5 - 1e-6);
                        assert!(q.max[axis] <= 0.5 + 1e-6);
                    }
                }
            }
        }
    }
}
