use crate::player::Player;
use crate::utils::bits::{BitReader, BitWriter};
use crate::utils::error::{SaveError, SaveResult};
use crate::world::block_id::{EAST, ROTATION_MASK, SOUTH, STAIR, WEST};
use crate::world::chunk_coord::ChunkCoord;
use crate::world::core::{PendingChunk, World};
use crate::world::chunk::CHUNK_VOLUME;
use crate::player::INVENTORY_SIZE;
use std::collections::{BTreeMap, HashMap};

/// Current save format version, packed `major << 16 | minor << 8 | patch`
/// into the 24-bit header field.
pub const SAVE_VERSION: (u8, u8, u8) = (0, 9, 2);

const LEGACY_VERSION: u32 = 0x800;
/// Bit offset of the version field inside the legacy body, measured from
/// the end of the name. Used by the format sniff.
const LEGACY_VERSION_OFFSET: u64 = 287;
/// Smallest possible section header; trailing padding below this is ignored.
const MIN_SECTION_BITS: u64 = 37;

fn packed_version() -> u32 {
    (SAVE_VERSION.0 as u32) << 16 | (SAVE_VERSION.1 as u32) << 8 | SAVE_VERSION.2 as u32
}

/// Pre-0.8.1 saves carried stair rotations in a different order; remap on
/// read so old builds keep their orientation.
fn remap_legacy_stair(id: u16) -> u16 {
    if id & STAIR == 0 {
        return id;
    }
    let rot = id & ROTATION_MASK;
    let id = id ^ rot;
    match rot {
        0 => id | WEST,
        WEST => id | SOUTH,
        SOUTH => id | EAST,
        _ => id,
    }
}

/// Maps a 9-bit in-section index to a chunk voxel index under one of the
/// six axis-order permutations the format allows.
fn section_voxel_index(orientation: u32, index: u32, ox: i32, y0: i32, oz: i32) -> SaveResult<u16> {
    let a = (index >> 6 & 7) as i32;
    let b = (index >> 3 & 7) as i32;
    let c = (index & 7) as i32;
    let (dy, dx, dz) = match orientation {
        0 => (a, b, c),
        1 => (a, c, b),
        2 => (b, a, c),
        3 => (c, a, b),
        4 => (c, b, a),
        5 => (b, c, a),
        _ => {
            return Err(SaveError::MalformedLegacy(format!(
                "bad section orientation {}",
                orientation
            )))
        }
    };
    let voxel = (y0 + dy) * 256 + (ox + dx) * 16 + (oz + dz);
    debug_assert!((voxel as usize) < CHUNK_VOLUME);
    Ok(voxel as u16)
}

/// Encodes one chunk's sparse edits as 8x8x8 sections: per-section palette,
/// orientation (the writer always emits permutation 0), then run-length
/// chains plus trailing single overrides.
fn encode_chunk_edits(block_x: i32, block_z: i32, edits: &[(u16, u16)]) -> Option<BitWriter> {
    if edits.is_empty() {
        return None;
    }
    let mut sections: BTreeMap<(i32, i32, i32), Vec<(u16, u16)>> = BTreeMap::new();
    for &(index, id) in edits {
        let y = (index >> 8) as i32;
        let x = (index as i32 >> 4) & 15;
        let z = index as i32 & 15;
        let key = (y >> 3, x >> 3, z >> 3);
        let sec_index = (((y & 7) << 6) | ((x & 7) << 3) | (z & 7)) as u16;
        sections.entry(key).or_default().push((sec_index, id));
    }

    let mut w = BitWriter::new();
    for ((sy, sx, sz), mut cells) in sections {
        cells.sort_unstable();
        let mut palette: Vec<u16> = Vec::new();
        for &(_, id) in &cells {
            if !palette.contains(&id) {
                palette.push(id);
            }
        }
        let palette_bits = BitWriter::bits(palette.len() as u32);

        w.add((block_x / 8 + sx) as i64, 16);
        w.add(sy as i64, 5);
        w.add((block_z / 8 + sz) as i64, 16);
        w.add(palette.len() as i64, 9);
        for &id in &palette {
            w.add(id as i64, 16);
        }
        w.add(0, 3);

        // Maximal chains of consecutive indices; lone cells are singles.
        let mut chains: Vec<&[(u16, u16)]> = Vec::new();
        let mut start = 0;
        for i in 1..=cells.len() {
            if i == cells.len() || cells[i].0 != cells[i - 1].0 + 1 {
                chains.push(&cells[start..i]);
                start = i;
            }
        }
        let (runs, singles): (Vec<&[(u16, u16)]>, Vec<&[(u16, u16)]>) =
            chains.iter().copied().partition(|c| c.len() > 1);

        w.add(runs.len() as i64, 8);
        w.add(singles.len() as i64, 9);
        for chain in runs {
            // Split the chain into same-value stretches.
            let mut value_runs: Vec<(u16, u32)> = Vec::new();
            for &(_, id) in chain.iter() {
                match value_runs.last_mut() {
                    Some((last, len)) if *last == id => *len += 1,
                    _ => value_runs.push((id, 1)),
                }
            }
            let len_bits = value_runs
                .iter()
                .map(|&(_, len)| BitWriter::bits(len))
                .max()
                .unwrap_or(0);
            w.add(chain[0].0 as i64, 9);
            w.add(value_runs.len() as i64, 9);
            w.add(len_bits as i64, 4);
            for (id, len) in value_runs {
                let pidx = palette.iter().position(|&p| p == id).unwrap();
                w.add((len - 1) as i64, len_bits);
                w.add(pidx as i64, palette_bits);
            }
        }
        for single in singles {
            let (index, id) = single[0];
            let pidx = palette.iter().position(|&p| p == id).unwrap();
            w.add(index as i64, 9);
            w.add(pidx as i64, palette_bits);
        }
    }
    Some(w)
}

impl World {
    /// Serializes world metadata, player state, inventory, every loaded
    /// chunk's edit diff, and the still-buffered edits of chunks outside
    /// the window, as one bit-packed stream.
    pub fn get_save_data(&self, player: &Player) -> Vec<u8> {
        let mut w = BitWriter::new();
        let name: Vec<u8> = self.name.bytes().take(255).collect();
        w.add(name.len() as i64, 8);
        for b in name {
            w.add(b as i64, 8);
        }
        w.add(SAVE_VERSION.0 as i64, 8);
        w.add(SAVE_VERSION.1 as i64, 8);
        w.add(SAVE_VERSION.2 as i64, 8);
        w.add(self.seed as i64, 32);
        w.add(self.tick_count as i64, 32);
        w.add(player.pos.x.round() as i64, 20);
        w.add((player.pos.y.round() as i64).min(511), 9);
        w.add(player.pos.z.round() as i64, 20);
        w.add((player.rx * 100.0).round() as i64, 11);
        w.add((player.ry * 100.0).round() as i64, 11);
        w.add(player.flying as i64, 1);
        w.add(player.spectator as i64, 1);
        w.add(self.superflat as i64, 1);
        w.add(self.caves as i64, 1);
        w.add(self.details as i64, 1);
        w.add(self.rivers as i64, 1);
        for slot in 0..INVENTORY_SIZE {
            match player.inventory.items[slot] {
                Some(item) => {
                    w.add(item.id.0 as i64, 16);
                    w.add(item.stack.saturating_sub(1) as i64, 6);
                }
                None => {
                    w.add(0, 16);
                    w.add(0, 6);
                }
            }
        }
        w.add(player.inventory.hotbar_index as i64, 4);

        for chunk in &self.loaded {
            let edits = chunk.diff_edits();
            if let Some(sub) = encode_chunk_edits(chunk.coord.block_x(), chunk.coord.block_z(), &edits)
            {
                w.append(&sub);
            }
        }
        let mut pending: Vec<(&ChunkCoord, &PendingChunk)> = self.load_from.iter().collect();
        pending.sort_by_key(|(coord, _)| **coord);
        for (coord, chunk) in pending {
            let mut edits: Vec<(u16, u16)> = chunk.edits.iter().map(|(&i, &v)| (i, v)).collect();
            edits.sort_unstable();
            if let Some(sub) = encode_chunk_edits(coord.block_x(), coord.block_z(), &edits) {
                w.append(&sub);
            }
        }
        w.into_bytes()
    }

    /// Inverse of `get_save_data`, also accepting the legacy binary
    /// version. On error the world under construction should be discarded
    /// by the caller; no loaded-chunk state is touched until parsing
    /// succeeds past the header.
    pub fn load_save(&mut self, data: &[u8], player: &mut Player) -> SaveResult<()> {
        let mut r = BitReader::new(data);
        let name_len = r.read(8)?;
        let mut name = String::with_capacity(name_len as usize);
        for _ in 0..name_len {
            name.push(r.read(8)? as u8 as char);
        }

        // The legacy format keeps its version field deep in the body;
        // peek there before committing to a layout.
        let body_start = r.position();
        let legacy = {
            r.skip(LEGACY_VERSION_OFFSET);
            let v = if r.remaining_bits() >= 24 { r.read(24)? } else { 0 };
            r.seek(body_start);
            v == LEGACY_VERSION
        };

        self.name = name;
        if legacy {
            self.load_legacy_body(&mut r, player)?;
        } else {
            self.load_current_body(&mut r, player)?;
        }

        // A freshly loaded save owns the window; everything re-enters the
        // pipeline from the pending edits.
        self.loaded.clear();
        self.lwidth = 0;
        self.reset_window();
        Ok(())
    }

    /// Delimited base-36 legacy format, read-only support.
    pub fn load_old_save(&mut self, text: &str, player: &mut Player) -> SaveResult<()> {
        let malformed = |what: &str| SaveError::MalformedLegacy(what.to_string());
        let int = |s: &str| {
            i64::from_str_radix(s.trim(), 36)
                .map_err(|_| SaveError::MalformedLegacy(format!("bad base-36 number {:?}", s)))
        };
        let mut parts = text.split(';');
        self.name = parts.next().ok_or_else(|| malformed("missing name"))?.to_string();
        let seed = int(parts.next().ok_or_else(|| malformed("missing seed"))?)? as u32;

        let player_part = parts.next().ok_or_else(|| malformed("missing player"))?;
        let fields: Vec<i64> = player_part.split(',').map(int).collect::<SaveResult<_>>()?;
        if fields.len() < 6 {
            return Err(malformed("short player record"));
        }
        player.pos.x = fields[0] as f32;
        player.pos.y = fields[1] as f32;
        player.pos.z = fields[2] as f32;
        player.rx = fields[3] as f32 / 100.0;
        player.ry = fields[4] as f32 / 100.0;
        let options = fields[5];
        player.flying = options & 1 != 0;
        self.superflat = options >> 1 & 1 != 0;
        player.spectator = options >> 2 & 1 != 0;
        self.caves = options >> 3 & 1 != 0;
        self.details = options >> 4 & 1 != 0;
        self.rivers = false;

        let _version = parts.next().ok_or_else(|| malformed("missing version"))?;
        let palette: Vec<u16> = parts
            .next()
            .ok_or_else(|| malformed("missing palette"))?
            .split(',')
            .map(|s| int(s).map(|v| v as u16))
            .collect::<SaveResult<_>>()?;

        let mut chunks: HashMap<ChunkCoord, PendingChunk> = HashMap::new();
        for segment in parts.filter(|s| !s.is_empty()) {
            let mut values = segment.split(',');
            let cx = int(values.next().ok_or_else(|| malformed("missing chunk x"))?)? as i32;
            let cy = int(values.next().ok_or_else(|| malformed("missing chunk y"))?)? as i32;
            let cz = int(values.next().ok_or_else(|| malformed("missing chunk z"))?)? as i32;
            let entry = chunks.entry(ChunkCoord::new(cx, cz)).or_default();
            for value in values {
                let block = int(value)?;
                let pid = (block >> 12) as usize;
                let x = (block >> 8 & 15) as i32;
                let y = (block >> 4 & 15) as i32;
                let z = (block & 15) as i32;
                let id = *palette.get(pid).ok_or(SaveError::PaletteIndex {
                    index: pid,
                    size: palette.len(),
                })?;
                let index = (cy * 16 + y) * 256 + x * 16 + z;
                if (0..CHUNK_VOLUME as i32).contains(&index) {
                    entry.edits.insert(index as u16, remap_legacy_stair(id));
                }
            }
        }
        self.load_from = chunks;
        self.set_seed(seed);
        self.loaded.clear();
        self.lwidth = 0;
        self.reset_window();
        Ok(())
    }

    fn load_current_body(&mut self, r: &mut BitReader, player: &mut Player) -> SaveResult<()> {
        let version = r.read(24)?;
        if version <= LEGACY_VERSION {
            return Err(SaveError::UnsupportedVersion(version));
        }
        if version > packed_version() {
            log::warn!(
                "save claims format {}.{}.{}, newer than this build",
                version >> 16,
                version >> 8 & 0xFF,
                version & 0xFF
            );
        }
        let seed = r.read(32)?;
        self.tick_count = r.read(32)?;
        player.pos.x = r.read_signed(20)? as f32;
        player.pos.y = r.read(9)? as f32;
        player.pos.z = r.read_signed(20)? as f32;
        player.rx = r.read_signed(11)? as f32 / 100.0;
        player.ry = r.read_signed(11)? as f32 / 100.0;
        player.flying = r.read_bool()?;
        player.spectator = r.read_bool()?;
        self.superflat = r.read_bool()?;
        self.caves = r.read_bool()?;
        self.details = r.read_bool()?;
        self.rivers = r.read_bool()?;
        player.inventory.items = [None; INVENTORY_SIZE];
        for slot in 0..INVENTORY_SIZE {
            let id = r.read(16)? as u16;
            let stack = r.read(6)? as u8 + 1;
            player.inventory.set_slot(slot, crate::world::block_id::BlockId(id), stack);
        }
        player.inventory.hotbar_index = r.read(4)? as u8;

        self.loaded_version = Some((
            (version >> 16) as u8,
            (version >> 8 & 0xFF) as u8,
            (version & 0xFF) as u8,
        ));
        log::info!(
            "loading save '{}' (format {}.{}.{}, seed {})",
            self.name,
            version >> 16,
            version >> 8 & 0xFF,
            version & 0xFF,
            seed
        );
        self.load_from = read_sections(r, None)?;
        self.set_seed(seed);
        Ok(())
    }

    fn load_legacy_body(&mut self, r: &mut BitReader, player: &mut Player) -> SaveResult<()> {
        let seed = r.read(32)?;
        self.tick_count = r.read(32)?;
        player.pos.x = r.read_signed(20)? as f32;
        player.pos.y = r.read(8)? as f32;
        player.pos.z = r.read_signed(20)? as f32;
        player.rx = r.read_signed(11)? as f32 / 100.0;
        player.ry = r.read_signed(11)? as f32 / 100.0;
        player.inventory.items = [None; INVENTORY_SIZE];
        for slot in 0..9 {
            let id = r.read(16)? as u16;
            player.inventory.set_slot(slot, crate::world::block_id::BlockId(id), 1);
        }
        player.inventory.hotbar_index = r.read(4)? as u8;
        player.flying = r.read_bool()?;
        player.spectator = r.read_bool()?;
        self.superflat = r.read_bool()?;
        self.caves = r.read_bool()?;
        self.details = r.read_bool()?;
        self.rivers = false;
        self.loaded_version = Some((0, 8, 0));

        r.skip(24);
        let palette_len = r.read(16)?;
        let mut palette = Vec::with_capacity(palette_len as usize);
        for _ in 0..palette_len {
            palette.push(remap_legacy_stair(r.read(16)? as u16));
        }
        r.skip(32);
        log::info!("loading legacy save '{}' (format 0.8.0)", self.name);
        self.load_from = read_sections(r, Some(&palette))?;
        self.set_seed(seed);
        Ok(())
    }
}

/// Parses chunk sections until the stream tail. A global palette means the
/// legacy layout; otherwise each section carries its own.
fn read_sections(
    r: &mut BitReader,
    global_palette: Option<&[u16]>,
) -> SaveResult<HashMap<ChunkCoord, PendingChunk>> {
    let mut chunks: HashMap<ChunkCoord, PendingChunk> = HashMap::new();
    while r.remaining_bits() > MIN_SECTION_BITS {
        let x8 = r.read_signed(16)? * 8;
        let y0 = (r.read(5)? * 8) as i32;
        let z8 = r.read_signed(16)? * 8;

        let own_palette;
        let palette: &[u16] = match global_palette {
            Some(p) => p,
            None => {
                let len = r.read(9)?;
                let mut p = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    p.push(r.read(16)? as u16);
                }
                own_palette = p;
                &own_palette
            }
        };
        let palette_bits = BitWriter::bits(palette.len() as u32);
        let orientation = r.read(3)?;

        let cx = x8 >> 4;
        let cz = z8 >> 4;
        let ox = if x8 != cx * 16 { 8 } else { 0 };
        let oz = if z8 != cz * 16 { 8 } else { 0 };
        let entry = chunks.entry(ChunkCoord::new(cx, cz)).or_default();

        let runs = r.read(8)?;
        let singles = r.read(9)?;
        for _ in 0..runs {
            let mut index = r.read(9)?;
            let types = r.read(9)?;
            let len_bits = r.read(4)?;
            for _ in 0..types {
                let chain = r.read(len_bits)? + 1;
                let pidx = r.read(palette_bits)? as usize;
                let id = *palette.get(pidx).ok_or(SaveError::PaletteIndex {
                    index: pidx,
                    size: palette.len(),
                })?;
                for _ in 0..chain {
                    let voxel = section_voxel_index(orientation, index, ox, y0, oz)?;
                    entry.edits.insert(voxel, id);
                    index += 1;
                }
            }
        }
        for _ in 0..singles {
            let index = r.read(9)?;
            let pidx = r.read(palette_bits)? as usize;
            let id = *palette.get(pidx).ok_or(SaveError::PaletteIndex {
                index: pidx,
                size: palette.len(),
            })?;
            let voxel = section_voxel_index(orientation, index, ox, y0, oz)?;
            entry.edits.insert(voxel, id);
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::chunk::voxel_index;

    #[test]
    fn test_section_round_trip_runs_and_singles() {
        // A long same-value run, a mixed-value chain, and isolated cells.
        let mut edits: Vec<(u16, u16)> = Vec::new();
        for z in 0..8 {
            edits.push((voxel_index(0, 0, z) as u16, 1));
        }
        edits.push((voxel_index(2, 0, 0) as u16, 4));
        edits.push((voxel_index(2, 0, 1) as u16, 5));
        edits.push((voxel_index(2, 0, 2) as u16, 5));
        edits.push((voxel_index(9, 200, 9) as u16, 7));
        edits.sort_unstable();

        let w = encode_chunk_edits(-32, 48, &edits).unwrap();
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        let chunks = read_sections(&mut r, None).unwrap();
        let pending = &chunks[&ChunkCoord::new(-2, 3)];
        assert_eq!(pending.edits.len(), edits.len());
        for (index, id) in edits {
            assert_eq!(pending.edits[&index], id, "index {}", index);
        }
    }

    #[test]
    fn test_all_orientations_decode() {
        // The writer emits orientation 0 only, but the reader must accept
        // every permutation; verify they all land inside the chunk and are
        // distinct mappings.
        let mut seen = std::collections::HashSet::new();
        for orientation in 0..6 {
            let v = section_voxel_index(orientation, 0b101_010_011, 8, 64, 0).unwrap();
            assert!((v as usize) < CHUNK_VOLUME);
            seen.insert(v);
        }
        assert!(seen.len() > 1);
        assert!(section_voxel_index(6, 0, 0, 0, 0).is_err());
    }

    #[test]
    fn test_legacy_stair_remap() {
        use crate::world::block_id::{EAST, SOUTH, STAIR, WEST};
        let base = 5u16 | STAIR;
        assert_eq!(remap_legacy_stair(base), base | WEST);
        assert_eq!(remap_legacy_stair(base | WEST), base | SOUTH);
        assert_eq!(remap_legacy_stair(base | SOUTH), base | EAST);
        assert_eq!(remap_legacy_stair(base | EAST), base);
        // Non-stairs pass through untouched.
        assert_eq!(remap_legacy_stair(5 | WEST), 5 | WEST);
    }

    #[test]
    fn test_truncated_stream_is_an_error_not_corruption() {
        let mut edits = vec![(voxel_index(0, 10, 0) as u16, 3)];
        edits.push((voxel_index(1, 10, 0) as u16, 3));
        let w = encode_chunk_edits(0, 0, &edits).unwrap();
        let bytes = w.into_bytes();
        // Chop the stream mid-section.
        let truncated = &bytes[..bytes.len() / 2];
        let mut r = BitReader::new(truncated);
        assert!(read_sections(&mut r, None).is_err());
    }
}
