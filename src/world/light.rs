use crate::world::block_data::BLOCKS;
use crate::world::chunk::MAX_HEIGHT;
use crate::world::chunk_coord::ChunkCoord;
use crate::world::core::World;
use crate::world::shape::DIR_OFFSETS;

/// The two independent 0-15 illumination fields. Rendering reads their max.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightChannel {
    Sky,
    Block,
}

/// Per-level worklist for the retract/reflood protocol: voxels that may
/// re-supply light, indexed by their stored level.
pub(crate) type LevelBuckets = [Vec<(i32, i32, i32)>; 16];

impl World {
    /// Light reads clamp like block reads: above the build height the sky
    /// is fully lit, everywhere else out of range is dark.
    pub fn get_light_channel(&self, x: i32, y: i32, z: i32, channel: LightChannel) -> u8 {
        if y > MAX_HEIGHT {
            return match channel {
                LightChannel::Sky => 15,
                LightChannel::Block => 0,
            };
        }
        if y < 0 {
            return 0;
        }
        match self.chunk_at(x >> 4, z >> 4) {
            Some(chunk) => match channel {
                LightChannel::Sky => chunk.get_sky_light(x & 15, y, z & 15),
                LightChannel::Block => chunk.get_block_light(x & 15, y, z & 15),
            },
            None => 0,
        }
    }

    /// Shading light: `max(sky, block)`.
    pub fn get_light(&self, x: i32, y: i32, z: i32) -> u8 {
        self.get_light_channel(x, y, z, LightChannel::Sky)
            .max(self.get_light_channel(x, y, z, LightChannel::Block))
    }

    pub(crate) fn set_light_channel(&mut self, x: i32, y: i32, z: i32, level: u8, channel: LightChannel) {
        if y < 0 || y > MAX_HEIGHT {
            return;
        }
        if let Some(chunk) = self.chunk_at_mut(x >> 4, z >> 4) {
            match channel {
                LightChannel::Sky => chunk.set_sky_light(x & 15, y, z & 15, level),
                LightChannel::Block => chunk.set_block_light(x & 15, y, z & 15, level),
            }
        }
    }

    fn transparent_at(&self, x: i32, y: i32, z: i32) -> bool {
        BLOCKS.get(self.get_block(x, y, z)).transparent
    }

    fn in_window(&self, x: i32, z: i32) -> bool {
        self.slot(x >> 4, z >> 4).is_some()
    }

    /// Breadth-first flood fill: each frontier ring hands `level` to any
    /// eligible neighbor currently darker, then the ring advances with one
    /// less. Crosses chunk boundaries through the world accessors.
    pub(crate) fn spread_light(
        &mut self,
        seeds: Vec<(i32, i32, i32)>,
        from_level: u8,
        via_transparent: bool,
        channel: LightChannel,
    ) {
        let mut frontier = seeds;
        let mut level = from_level;
        while level > 0 && !frontier.is_empty() {
            let mut next = Vec::new();
            for (x, y, z) in frontier {
                for (dx, dy, dz) in DIR_OFFSETS {
                    let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                    if ny < 0 || ny > MAX_HEIGHT || !self.in_window(nx, nz) {
                        continue;
                    }
                    if via_transparent && !self.transparent_at(nx, ny, nz) {
                        continue;
                    }
                    if self.get_light_channel(nx, ny, nz, channel) < level {
                        self.set_light_channel(nx, ny, nz, level, channel);
                        next.push((nx, ny, nz));
                    }
                }
            }
            frontier = next;
            level -= 1;
        }
    }

    /// Retraction, phase one: walk outward from the removed source zeroing
    /// every voxel whose level could only have come from it (at most one
    /// less per ring). Brighter neighbors are live re-suppliers and go into
    /// the level bucket for the reflood phase.
    pub(crate) fn un_spread_light(
        &mut self,
        seeds: Vec<(i32, i32, i32)>,
        from_level: u8,
        buckets: &mut LevelBuckets,
        channel: LightChannel,
    ) {
        let mut frontier = seeds;
        let mut level = from_level;
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for (x, y, z) in frontier {
                for (dx, dy, dz) in DIR_OFFSETS {
                    let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                    if ny < 0 || ny > MAX_HEIGHT || !self.in_window(nx, nz) {
                        continue;
                    }
                    let l = self.get_light_channel(nx, ny, nz, channel);
                    if l == 0 {
                        continue;
                    }
                    if l <= level {
                        self.set_light_channel(nx, ny, nz, 0, channel);
                        next.push((nx, ny, nz));
                    } else {
                        buckets[l as usize].push((nx, ny, nz));
                    }
                }
            }
            frontier = next;
            level = level.saturating_sub(1);
        }
    }

    /// Retraction, phase two: replay the buckets from the lowest level up.
    /// Every surviving voxel refloods the darkened region; processing low
    /// levels first lets brighter sources overwrite their work.
    pub(crate) fn re_spread_light(&mut self, buckets: &mut LevelBuckets, channel: LightChannel) {
        for level in 1..16u8 {
            let seeds = std::mem::take(&mut buckets[level as usize]);
            if seeds.is_empty() || level < 2 {
                continue;
            }
            let seeds: Vec<_> = seeds
                .into_iter()
                .filter(|&(x, y, z)| self.get_light_channel(x, y, z, channel) == level)
                .collect();
            self.spread_light(seeds, level - 1, true, channel);
        }
    }

    /// The placement/removal light protocol. Runs after the block array has
    /// already been mutated; `emission` is the light level of whichever
    /// block was placed or removed.
    pub fn update_light(&mut self, x: i32, y: i32, z: i32, place: bool, emission: u8) {
        if !self.in_window(x, z) || y < 0 || y > MAX_HEIGHT {
            return;
        }
        let center = self.get_light_channel(x, y, z, LightChannel::Sky);
        let mut blight = self.get_light_channel(x, y, z, LightChannel::Block);

        if !place {
            let up = self.get_light_channel(x, y + 1, z, LightChannel::Sky);
            if up == 15 {
                // Removed under open sky: re-seed the column straight down
                // and flood out from it.
                let mut spread = Vec::new();
                for i in (1..=y).rev() {
                    if self.transparent_at(x, i, z) {
                        self.set_light_channel(x, i, z, 15, LightChannel::Sky);
                        spread.push((x, i, z));
                    } else {
                        break;
                    }
                }
                self.spread_light(spread, 14, true, LightChannel::Sky);
            } else {
                // No sky above: the freed voxel takes max(neighbors) - 1.
                let m = self.neighbor_max(x, y, z, LightChannel::Sky);
                let level = m.saturating_sub(1);
                self.set_light_channel(x, y, z, level, LightChannel::Sky);
                if level > 1 {
                    self.spread_light(vec![(x, y, z)], level - 1, true, LightChannel::Sky);
                }
            }
            if emission == 0 || emission < blight {
                let m = self.neighbor_max(x, y, z, LightChannel::Block);
                blight = m.saturating_sub(1);
                self.set_light_channel(x, y, z, blight, LightChannel::Block);
                if blight > 1 {
                    self.spread_light(vec![(x, y, z)], blight - 1, true, LightChannel::Block);
                }
            }
        } else if center != 0 || blight != 0 {
            // Placed into lit space: retract, then reflood from survivors.
            let mut buckets = LevelBuckets::default();
            let mut spread = vec![(x, y, z)];
            self.set_light_channel(x, y, z, 0, LightChannel::Sky);
            self.set_light_channel(x, y, z, 0, LightChannel::Block);
            if center == 15 {
                for i in (1..y).rev() {
                    if self.transparent_at(x, i, z) {
                        self.set_light_channel(x, i, z, 0, LightChannel::Sky);
                        spread.push((x, i, z));
                    } else {
                        break;
                    }
                }
            }
            self.un_spread_light(spread, center.saturating_sub(1), &mut buckets, LightChannel::Sky);
            self.re_spread_light(&mut buckets, LightChannel::Sky);
            if blight > 0 {
                let mut buckets = LevelBuckets::default();
                self.un_spread_light(
                    vec![(x, y, z)],
                    blight.saturating_sub(1),
                    &mut buckets,
                    LightChannel::Block,
                );
                self.re_spread_light(&mut buckets, LightChannel::Block);
            }
        }

        if place && emission > 0 {
            self.set_light_channel(x, y, z, emission, LightChannel::Block);
            self.spread_light(vec![(x, y, z)], emission - 1, true, LightChannel::Block);
        } else if !place && emission > 0 {
            // The removed block was itself a source: retract its field.
            self.set_light_channel(x, y, z, 0, LightChannel::Block);
            let mut buckets = LevelBuckets::default();
            self.un_spread_light(
                vec![(x, y, z)],
                emission.saturating_sub(1),
                &mut buckets,
                LightChannel::Block,
            );
            self.re_spread_light(&mut buckets, LightChannel::Block);
        }
    }

    fn neighbor_max(&self, x: i32, y: i32, z: i32, channel: LightChannel) -> u8 {
        DIR_OFFSETS
            .iter()
            .map(|&(dx, dy, dz)| self.get_light_channel(x + dx, y + dy, z + dz, channel))
            .max()
            .unwrap_or(0)
    }

    /// Initial light pass for one chunk: sky light seeded at 15 from the
    /// top of the world down to the first non-transparent block per column,
    /// flooded laterally along shadow boundaries; block light seeded from
    /// every emitting block. Idempotent via the lit flag.
    pub(crate) fn fill_light_chunk(&mut self, coord: ChunkCoord) {
        let Some(slot) = self.slot(coord.x(), coord.z()) else {
            return;
        };
        if self.loaded[slot].lit {
            return;
        }
        let bx = coord.block_x();
        let bz = coord.block_z();

        // Column pass: all local, so it runs on the chunk directly.
        let mut stops = [0i32; 256];
        {
            let chunk = &mut self.loaded[slot];
            for x in 0..16 {
                for z in 0..16 {
                    let mut stop = -1;
                    for y in (0..=MAX_HEIGHT).rev() {
                        if BLOCKS.get(chunk.get_block(x, y, z)).transparent {
                            chunk.set_sky_light(x, y, z, 15);
                        } else {
                            stop = y;
                            break;
                        }
                    }
                    stops[(x * 16 + z) as usize] = stop;
                }
            }
        }

        // Lateral pass: only voxels bordering a taller neighbor column can
        // hand light sideways, so the frontier stays small.
        let mut seeds = Vec::new();
        for x in 0..16 {
            for z in 0..16 {
                let wx = bx + x;
                let wz = bz + z;
                let stop = stops[(x * 16 + z) as usize];
                let limit = [
                    self.get_surface_height(wx + 1, wz),
                    self.get_surface_height(wx - 1, wz),
                    self.get_surface_height(wx, wz + 1),
                    self.get_surface_height(wx, wz - 1),
                ]
                .into_iter()
                .max()
                .unwrap_or(0)
                .min(MAX_HEIGHT);
                for y in (stop + 1)..=limit {
                    seeds.push((wx, y, wz));
                }
            }
        }
        self.spread_light(seeds, 14, true, LightChannel::Sky);

        // Block light from emitters.
        let mut emitters = Vec::new();
        {
            let chunk = &self.loaded[slot];
            for y in 0..=chunk.max_y {
                for x in 0..16 {
                    for z in 0..16 {
                        let level = BLOCKS.get(chunk.get_block(x, y, z)).light_level;
                        if level > 0 {
                            emitters.push((bx + x, y, bz + z, level));
                        }
                    }
                }
            }
        }
        for (x, y, z, level) in emitters {
            self.set_light_channel(x, y, z, level, LightChannel::Block);
            if level > 1 {
                self.spread_light(vec![(x, y, z)], level - 1, true, LightChannel::Block);
            }
        }
        self.loaded[slot].lit = true;
    }
}
