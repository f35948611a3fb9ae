//! Texture cache.
//!
//! Source textures are identified by their source-memory address and
//! mapped to target texture names through an open-addressed table. Target
//! texture memory is far smaller than the working set of a busy scene, so
//! residency is managed FIFO: when an allocation fails, the oldest
//! resident texture is deleted and the allocation retried. Evicted entries
//! keep their table slot (address → identity must stay stable) but lose
//! their name until the next resolve re-uploads them.
//!
//! Texel uploads are queued rather than performed inline; target texture
//! memory is only writable while the rasterizer is idle, so the queue is
//! drained at the frame boundary (or synchronously when it fills).

use thiserror::Error;

use crate::gbi;
use crate::state::RenderState;
use crate::target::{Rasterizer, TexFormat, TextureName};

/// Identity table size. Probing masks with this, so it must stay a power
/// of two.
pub const CACHE_SLOTS: usize = 2048;

/// Queued uploads before a forced synchronous flush.
pub const UPLOAD_QUEUE_CAP: usize = 128;

#[derive(Debug, Error)]
pub enum TextureError {
    /// Allocation failed with nothing left to evict.
    #[error("texture memory exhausted with no resident textures to evict")]
    MemoryExhausted,
}

#[derive(Clone, Copy)]
struct Entry {
    /// Source address; zero marks an empty slot.
    addr: u32,
    /// Target name; zero while evicted.
    name: TextureName,
    format: TexFormat,
    size_x: u8,
    size_y: u8,
}

const EMPTY: Entry = Entry {
    addr: 0,
    name: 0,
    format: TexFormat::None,
    size_x: 0,
    size_y: 0,
};

struct PendingUpload {
    name: TextureName,
    addr: u32,
    len: usize,
}

pub struct TextureCache {
    entries: Box<[Entry; CACHE_SLOTS]>,
    /// Eviction ring holding the table index of every resident texture,
    /// oldest first. Blank-mapped entries never enter it, so its length
    /// always equals the resident count.
    fifo: Box<[u16; CACHE_SLOTS]>,
    fifo_pop: usize,
    fifo_push: usize,
    queue: Vec<PendingUpload>,
    /// Placeholder bound for unsupported formats and untextured draws.
    blank: TextureName,
    /// Mid-frame flushes forced by a full queue (diagnostics).
    pub forced_flushes: u32,
}

impl TextureCache {
    /// `blank` must be a zero-sized texture already allocated on the
    /// target; the cache hands it out but never deletes it.
    pub fn new(blank: TextureName) -> Self {
        TextureCache {
            entries: Box::new([EMPTY; CACHE_SLOTS]),
            fifo: Box::new([0; CACHE_SLOTS]),
            fifo_pop: 0,
            fifo_push: 0,
            queue: Vec::with_capacity(UPLOAD_QUEUE_CAP),
            blank,
            forced_flushes: 0,
        }
    }

    pub fn blank(&self) -> TextureName {
        self.blank
    }

    /// Look up the latched texture image and bind it, creating and
    /// uploading it on first sight and re-uploading it after eviction.
    /// Falls back to the blank texture when the format is unsupported or
    /// target memory cannot hold the image at all.
    pub fn resolve<R: Rasterizer>(
        &mut self,
        raster: &mut R,
        source: &[u8],
        state: &RenderState,
    ) -> TextureName {
        let addr = state.texture_addr;
        let mut index = (addr as usize >> 5) & (CACHE_SLOTS - 1);
        while self.entries[index].addr != addr && self.entries[index].addr != 0 {
            index = (index + 1) & (CACHE_SLOTS - 1);
        }

        if self.entries[index].addr == addr && addr != 0 {
            let name = self.entries[index].name;
            if name != 0 {
                raster.bind_texture(name);
                return name;
            }
            // Evicted; allocate a fresh name and re-upload.
            let name = raster.gen_texture();
            self.entries[index].name = name;
            return self.make_resident(raster, source, index);
        }

        // First sight of this address.
        let format = match state.texture_format {
            gbi::G_IM_FMT_RGBA => TexFormat::Rgba16,
            gbi::G_IM_FMT_IA => TexFormat::IntensityAlpha,
            other => {
                log::debug!("unsupported texture format {} at {:#010X}", other, addr);
                self.entries[index] = Entry {
                    addr,
                    name: self.blank,
                    ..EMPTY
                };
                raster.bind_texture(self.blank);
                return self.blank;
            }
        };

        let width = u32::from(state.texture_row_size) << (4 - state.texture_bit_width);
        let texels = (u32::from(state.texture_byte_size) << 1) >> state.texture_bit_width;
        if width == 0 || texels == 0 {
            log::warn!("degenerate texture at {:#010X}, using blank", addr);
            raster.bind_texture(self.blank);
            return self.blank;
        }

        self.entries[index] = Entry {
            addr,
            name: raster.gen_texture(),
            format,
            size_x: size_class(width),
            size_y: size_class(texels / width),
        };
        self.make_resident(raster, source, index)
    }

    /// Allocate target memory for `entries[index]` (evicting as needed),
    /// queue its texel upload, bind it and push it onto the eviction ring.
    fn make_resident<R: Rasterizer>(
        &mut self,
        raster: &mut R,
        source: &[u8],
        index: usize,
    ) -> TextureName {
        let entry = self.entries[index];
        match self.alloc_with_eviction(raster, &entry) {
            Ok(()) => {}
            Err(err) => {
                log::error!("{err}");
                self.entries[index].name = self.blank;
                raster.bind_texture(self.blank);
                return self.blank;
            }
        }

        if self.queue.len() == UPLOAD_QUEUE_CAP {
            self.forced_flushes += 1;
            self.flush_uploads(raster, source);
        }
        self.queue.push(PendingUpload {
            name: entry.name,
            addr: entry.addr,
            len: texel_bytes(entry.format, entry.size_x, entry.size_y),
        });

        self.fifo[self.fifo_push] = index as u16;
        self.fifo_push = (self.fifo_push + 1) & (CACHE_SLOTS - 1);

        raster.bind_texture(entry.name);
        entry.name
    }

    fn alloc_with_eviction<R: Rasterizer>(
        &mut self,
        raster: &mut R,
        entry: &Entry,
    ) -> Result<(), TextureError> {
        while !raster.alloc_texture(entry.name, entry.format, entry.size_x, entry.size_y) {
            if self.fifo_pop == self.fifo_push {
                raster.delete_texture(entry.name);
                return Err(TextureError::MemoryExhausted);
            }
            let victim = self.fifo[self.fifo_pop] as usize;
            self.fifo_pop = (self.fifo_pop + 1) & (CACHE_SLOTS - 1);
            raster.delete_texture(self.entries[victim].name);
            self.entries[victim].name = 0;
        }
        Ok(())
    }

    /// Drain the upload queue into target memory. Called at the frame
    /// boundary, and synchronously when the queue fills mid-frame.
    pub fn flush_uploads<R: Rasterizer>(&mut self, raster: &mut R, source: &[u8]) {
        for upload in self.queue.drain(..) {
            let start = upload.addr as usize;
            let end = start.saturating_add(upload.len).min(source.len());
            if start >= end {
                continue;
            }
            raster.upload_texture(upload.name, &source[start..end]);
        }
    }

    pub fn pending_uploads(&self) -> usize {
        self.queue.len()
    }

    pub fn resident_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.addr != 0 && e.name != 0 && e.name != self.blank)
            .count()
    }

    fn fifo_len(&self) -> usize {
        (self.fifo_push + CACHE_SLOTS - self.fifo_pop) & (CACHE_SLOTS - 1)
    }
}

/// Smallest target size class covering `dim` texels: class `n` holds
/// `8 << n`.
fn size_class(dim: u32) -> u8 {
    let mut n = 0;
    while dim > 8 << n {
        n += 1;
    }
    n
}

fn texel_bytes(format: TexFormat, size_x: u8, size_y: u8) -> usize {
    let texels = 1usize << (size_x + size_y + 6);
    match format {
        TexFormat::Rgba16 => texels << 1,
        _ => texels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{latch_rgba_texture, Call, TestRasterizer};

    fn latched(addr: u32, row: u32, texels: u32) -> RenderState {
        let mut state = RenderState::new();
        latch_rgba_texture(&mut state, addr, row, texels);
        state
    }

    #[test]
    fn size_classes_round_up_to_target_dimensions() {
        assert_eq!(size_class(8), 0);
        assert_eq!(size_class(9), 1);
        assert_eq!(size_class(32), 2);
        assert_eq!(size_class(33), 3);
        assert_eq!(size_class(1024), 7);
    }

    #[test]
    fn resolve_is_idempotent_per_address() {
        let mut raster = TestRasterizer::new();
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x10000];
        let state = latched(0x4000, 32, 32 * 32);

        let first = cache.resolve(&mut raster, &source, &state);
        let second = cache.resolve(&mut raster, &source, &state);

        assert_eq!(first, second);
        assert_ne!(first, cache.blank());
        assert_eq!(cache.pending_uploads(), 1);
        assert_eq!(cache.resident_count(), 1);
    }

    #[test]
    fn distinct_addresses_get_distinct_textures() {
        let mut raster = TestRasterizer::new();
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x10000];

        let a = cache.resolve(&mut raster, &source, &latched(0x4000, 32, 32 * 32));
        let b = cache.resolve(&mut raster, &source, &latched(0x8000, 32, 32 * 32));

        assert_ne!(a, b);
        assert_eq!(cache.resident_count(), 2);
    }

    #[test]
    fn colliding_addresses_probe_to_free_slots() {
        let mut raster = TestRasterizer::new();
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x100000];

        // Addresses 0x10000 apart land on the same table slot.
        let a = cache.resolve(&mut raster, &source, &latched(0x4000, 32, 32 * 32));
        let b = cache.resolve(&mut raster, &source, &latched(0x14000, 32, 32 * 32));
        let a2 = cache.resolve(&mut raster, &source, &latched(0x4000, 32, 32 * 32));

        assert_ne!(a, b);
        assert_eq!(a, a2);
    }

    #[test]
    fn eviction_is_oldest_first() {
        // Budget fits exactly two 32x32 RGBA textures (2 KiB each).
        let mut raster = TestRasterizer::with_vram(4096);
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x100000];

        let a = cache.resolve(&mut raster, &source, &latched(0x4000, 32, 32 * 32));
        let _b = cache.resolve(&mut raster, &source, &latched(0x8000, 32, 32 * 32));
        let _c = cache.resolve(&mut raster, &source, &latched(0xC000, 32, 32 * 32));

        assert!(raster
            .calls
            .iter()
            .any(|c| matches!(c, Call::DeleteTexture(n) if *n == a)));
        assert_eq!(cache.resident_count(), 2);
    }

    #[test]
    fn evicted_texture_is_reuploaded_on_next_resolve() {
        let mut raster = TestRasterizer::with_vram(4096);
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x100000];

        let a = cache.resolve(&mut raster, &source, &latched(0x4000, 32, 32 * 32));
        cache.resolve(&mut raster, &source, &latched(0x8000, 32, 32 * 32));
        cache.resolve(&mut raster, &source, &latched(0xC000, 32, 32 * 32));

        // `a` was evicted; resolving it again allocates a new name and
        // queues a fresh upload.
        let a2 = cache.resolve(&mut raster, &source, &latched(0x4000, 32, 32 * 32));
        assert_ne!(a, a2);
        assert_ne!(a2, cache.blank());
        assert_eq!(cache.pending_uploads(), 4);
        assert_eq!(cache.resident_count(), 2);
    }

    #[test]
    fn unsupported_format_maps_to_blank_permanently() {
        let mut raster = TestRasterizer::new();
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x10000];

        let mut state = latched(0x4000, 32, 32 * 32);
        state.texture_format = 2; // color-index, not supported

        let name = cache.resolve(&mut raster, &source, &state);
        assert_eq!(name, cache.blank());
        assert_eq!(cache.pending_uploads(), 0);
        assert_eq!(cache.resident_count(), 0);

        // The mapping is remembered; no retry.
        let gens_before = raster.calls.len();
        assert_eq!(cache.resolve(&mut raster, &source, &state), cache.blank());
        assert_eq!(
            raster.calls[gens_before..]
                .iter()
                .filter(|c| !matches!(c, Call::BindTexture(_)))
                .count(),
            0
        );
    }

    #[test]
    fn full_queue_forces_synchronous_flush() {
        let mut raster = TestRasterizer::new();
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x800000];

        // 8x8 RGBA textures at distinct addresses; two past the cap.
        for k in 0..(UPLOAD_QUEUE_CAP as u32 + 2) {
            let state = latched(0x10000 + k * 0x200, 8, 8 * 8);
            cache.resolve(&mut raster, &source, &state);
        }

        assert_eq!(cache.forced_flushes, 1);
        assert_eq!(raster.uploads.len(), UPLOAD_QUEUE_CAP);
        assert_eq!(cache.pending_uploads(), 2);

        cache.flush_uploads(&mut raster, &source);
        assert_eq!(raster.uploads.len(), UPLOAD_QUEUE_CAP + 2);
        assert_eq!(cache.pending_uploads(), 0);
    }

    #[test]
    fn upload_length_covers_the_padded_image() {
        let mut raster = TestRasterizer::new();
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x10000];

        // 24 texels wide rounds up to the 32-class; upload covers the
        // whole padded allocation.
        let state = latched(0x4000, 24, 24 * 24);
        cache.resolve(&mut raster, &source, &state);
        cache.flush_uploads(&mut raster, &source);

        assert_eq!(raster.uploads.len(), 1);
        assert_eq!(raster.uploads[0].1, 32 * 32 * 2);
    }

    #[test]
    fn resident_count_tracks_fifo_length() {
        let mut raster = TestRasterizer::with_vram(8192);
        let mut cache = TextureCache::new(raster.gen_texture());
        let source = vec![0u8; 0x100000];

        for k in 0..12 {
            let state = latched(0x4000 + k * 0x1000, 32, 32 * 32);
            cache.resolve(&mut raster, &source, &state);
            assert_eq!(cache.resident_count(), cache.fifo_len());
        }
    }
}
