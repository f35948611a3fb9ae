//! Shared test doubles: a recording rasterizer with a bounded texture
//! memory model, plus helpers for building command lists and vertex data
//! in source-memory images.

use std::collections::HashMap;

use crate::target::{
    M4x4, MatrixMode, Overlay, ProjectedVertex, Rasterizer, Sprite, TexFormat, TextureName,
    VideoSync,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    MatrixMode(MatrixMode),
    LoadMatrix(M4x4),
    MultMatrix(M4x4),
    LoadIdentity,
    PushMatrix,
    PopMatrix(i32),
    RotationRead,
    Begin,
    Color(u8, u8, u8),
    TexCoord(i16, i16),
    Vertex(i16, i16, i16),
    PositionTest(i16, i16, i16),
    BindTexture(TextureName),
    DeleteTexture(TextureName),
    TexParams(u32),
    PolyFmt(u32),
    Viewport(u8, u8, u8, u8),
    FlushManualSort,
    FogEnable(bool),
    FogShift(u32),
    FogOffset(i32),
    FogColor(u8, u8, u8, u8),
}

pub struct TestRasterizer {
    pub calls: Vec<Call>,
    /// Texture memory budget in bytes; allocations past it fail.
    pub vram_budget: usize,
    pub vram_used: usize,
    allocs: HashMap<TextureName, usize>,
    formats: HashMap<TextureName, TexFormat>,
    next_name: TextureName,
    pub bound: TextureName,
    pub uploads: Vec<(TextureName, usize)>,
    /// Returned as the Z component of every position test.
    pub projected_z: i32,
    pub fog_table: [u8; 32],
}

impl TestRasterizer {
    pub fn new() -> Self {
        Self::with_vram(usize::MAX)
    }

    pub fn with_vram(budget: usize) -> Self {
        Self {
            calls: Vec::new(),
            vram_budget: budget,
            vram_used: 0,
            allocs: HashMap::new(),
            formats: HashMap::new(),
            next_name: 1,
            bound: 0,
            uploads: Vec::new(),
            projected_z: 0x100,
            fog_table: [0; 32],
        }
    }

    pub fn position_of(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn vertices_sent(&self) -> usize {
        self.count(|c| matches!(c, Call::Vertex(..)))
    }
}

fn texel_bytes(format: TexFormat, size_x: u8, size_y: u8) -> usize {
    let texels = 1usize << (size_x + size_y + 6);
    match format {
        TexFormat::None => 0,
        TexFormat::Rgba16 => texels * 2,
        TexFormat::IntensityAlpha => texels,
    }
}

impl Rasterizer for TestRasterizer {
    fn matrix_mode(&mut self, mode: MatrixMode) {
        self.calls.push(Call::MatrixMode(mode));
    }

    fn load_matrix(&mut self, m: &M4x4) {
        self.calls.push(Call::LoadMatrix(*m));
    }

    fn mult_matrix(&mut self, m: &M4x4) {
        self.calls.push(Call::MultMatrix(*m));
    }

    fn load_identity(&mut self) {
        self.calls.push(Call::LoadIdentity);
    }

    fn push_matrix(&mut self) {
        self.calls.push(Call::PushMatrix);
    }

    fn pop_matrix(&mut self, count: i32) {
        self.calls.push(Call::PopMatrix(count));
    }

    fn modelview_rotation(&mut self) -> [i32; 9] {
        self.calls.push(Call::RotationRead);
        // Identity rotation in 20.12.
        let mut m = [0; 9];
        m[0] = 1 << 12;
        m[4] = 1 << 12;
        m[8] = 1 << 12;
        m
    }

    fn begin_triangles(&mut self) {
        self.calls.push(Call::Begin);
    }

    fn color(&mut self, r: u8, g: u8, b: u8) {
        self.calls.push(Call::Color(r, g, b));
    }

    fn tex_coord(&mut self, s: i16, t: i16) {
        self.calls.push(Call::TexCoord(s, t));
    }

    fn vertex(&mut self, x: i16, y: i16, z: i16) {
        self.calls.push(Call::Vertex(x, y, z));
    }

    fn position_test(&mut self, x: i16, y: i16, z: i16) -> ProjectedVertex {
        self.calls.push(Call::PositionTest(x, y, z));
        ProjectedVertex {
            x: i32::from(x),
            y: i32::from(y),
            z: self.projected_z,
            w: 1 << 12,
        }
    }

    fn gen_texture(&mut self) -> TextureName {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    fn delete_texture(&mut self, name: TextureName) {
        self.calls.push(Call::DeleteTexture(name));
        if let Some(size) = self.allocs.remove(&name) {
            self.vram_used -= size;
        }
        self.formats.remove(&name);
    }

    fn bind_texture(&mut self, name: TextureName) {
        self.calls.push(Call::BindTexture(name));
        self.bound = name;
    }

    fn alloc_texture(
        &mut self,
        name: TextureName,
        format: TexFormat,
        size_x: u8,
        size_y: u8,
    ) -> bool {
        let size = texel_bytes(format, size_x, size_y);
        if self.vram_used + size > self.vram_budget {
            return false;
        }
        self.vram_used += size;
        self.allocs.insert(name, size);
        self.formats.insert(name, format);
        true
    }

    fn upload_texture(&mut self, name: TextureName, data: &[u8]) {
        self.uploads.push((name, data.len()));
    }

    fn tex_params(&mut self, params: u32) {
        self.calls.push(Call::TexParams(params));
    }

    fn bound_format(&self) -> TexFormat {
        self.formats
            .get(&self.bound)
            .copied()
            .unwrap_or(TexFormat::None)
    }

    fn poly_fmt(&mut self, fmt: u32) {
        self.calls.push(Call::PolyFmt(fmt));
    }

    fn viewport(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) {
        self.calls.push(Call::Viewport(x1, y1, x2, y2));
    }

    fn flush_manual_sort(&mut self) {
        self.calls.push(Call::FlushManualSort);
    }

    fn fog_density(&mut self, index: usize, density: u8) {
        self.fog_table[index] = density;
    }

    fn fog_shift(&mut self, shift: u32) {
        self.calls.push(Call::FogShift(shift));
    }

    fn fog_offset(&mut self, offset: i32) {
        self.calls.push(Call::FogOffset(offset));
    }

    fn fog_color(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.calls.push(Call::FogColor(r, g, b, a));
    }

    fn fog_enable(&mut self, enabled: bool) {
        self.calls.push(Call::FogEnable(enabled));
    }
}

/// Video sync double: boundaries elapse only when `wait_for_boundary`
/// blocks, unless pre-seeded.
pub struct TestVideo {
    pub elapsed: u32,
    pub waits: u32,
}

impl TestVideo {
    pub fn new() -> Self {
        Self {
            elapsed: 0,
            waits: 0,
        }
    }
}

impl VideoSync for TestVideo {
    fn boundaries_elapsed(&self) -> u32 {
        self.elapsed
    }

    fn wait_for_boundary(&mut self) {
        self.waits += 1;
        self.elapsed += 1;
    }

    fn reset_boundaries(&mut self) {
        self.elapsed = 0;
    }
}

pub struct TestOverlay {
    pub updates: Vec<(usize, Sprite)>,
}

impl TestOverlay {
    pub fn new() -> Self {
        Self {
            updates: Vec::new(),
        }
    }
}

impl Overlay for TestOverlay {
    fn update_sprite(&mut self, index: usize, sprite: &Sprite) {
        self.updates.push((index, *sprite));
    }
}

// ─── Source-memory builders ───────────────────────────────────

/// Growable big-endian source-memory image.
pub struct SourceMem {
    pub bytes: Vec<u8>,
}

impl SourceMem {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn put_u32(&mut self, addr: u32, val: u32) {
        let i = addr as usize;
        self.bytes[i..i + 4].copy_from_slice(&val.to_be_bytes());
    }

    /// Write a command list at `addr`; each entry is one (w0, w1) pair.
    pub fn put_dl(&mut self, addr: u32, words: &[(u32, u32)]) {
        for (k, (w0, w1)) in words.iter().enumerate() {
            self.put_u32(addr + 8 * k as u32, *w0);
            self.put_u32(addr + 8 * k as u32 + 4, *w1);
        }
    }

    /// Write one 16-byte vertex record.
    #[allow(clippy::too_many_arguments)]
    pub fn put_vertex(
        &mut self,
        addr: u32,
        pos: [i16; 3],
        texcoord: [i16; 2],
        color: [u8; 3],
        alpha: u8,
    ) {
        let i = addr as usize;
        self.bytes[i..i + 2].copy_from_slice(&pos[0].to_be_bytes());
        self.bytes[i + 2..i + 4].copy_from_slice(&pos[1].to_be_bytes());
        self.bytes[i + 4..i + 6].copy_from_slice(&pos[2].to_be_bytes());
        self.bytes[i + 8..i + 10].copy_from_slice(&texcoord[0].to_be_bytes());
        self.bytes[i + 10..i + 12].copy_from_slice(&texcoord[1].to_be_bytes());
        self.bytes[i + 12] = color[0];
        self.bytes[i + 13] = color[1];
        self.bytes[i + 14] = color[2];
        self.bytes[i + 15] = alpha;
    }
}

// ─── Command-word encoders (inverse of the gbi decoders) ──────

pub fn enc_vtx(count: u32, end: u32, addr: u32) -> (u32, u32) {
    (
        (u32::from(crate::gbi::G_VTX) << 24) | (count << 12) | (end << 1),
        addr,
    )
}

pub fn enc_tri1(a: u32, b: u32, c: u32) -> (u32, u32) {
    (
        (u32::from(crate::gbi::G_TRI1) << 24) | (a * 2) << 16 | (b * 2) << 8 | (c * 2),
        0,
    )
}

pub fn enc_tri2(i: [u32; 6]) -> (u32, u32) {
    (
        (u32::from(crate::gbi::G_TRI2) << 24) | (i[0] * 2) << 16 | (i[1] * 2) << 8 | (i[2] * 2),
        (i[3] * 2) << 16 | (i[4] * 2) << 8 | (i[5] * 2),
    )
}

pub fn enc_end() -> (u32, u32) {
    (u32::from(crate::gbi::G_ENDDL) << 24, 0)
}

pub fn enc_settimg(format: u8, bit_width: u8, addr: u32) -> (u32, u32) {
    (
        (u32::from(crate::gbi::G_SETTIMG) << 24)
            | (u32::from(format) << 21)
            | (u32::from(bit_width) << 19),
        addr,
    )
}

pub fn enc_settile(format: u8, bit_width: u8, row_size: u32, tile: u32) -> (u32, u32) {
    (
        (u32::from(crate::gbi::G_SETTILE) << 24)
            | (u32::from(format) << 21)
            | (u32::from(bit_width) << 19)
            | (row_size << 9),
        tile << 24,
    )
}

pub fn enc_loadblock(texels_minus_one: u32, tile: u32) -> (u32, u32) {
    (
        u32::from(crate::gbi::G_LOADBLOCK) << 24,
        (tile << 24) | (texels_minus_one << 12),
    )
}

pub fn enc_combine_textured_shaded() -> (u32, u32) {
    use crate::gbi::*;
    (
        (u32::from(G_SETCOMBINE) << 24)
            | (u32::from(G_CCMUX_TEXEL0) << 20)
            | (u32::from(G_CCMUX_SHADE) << 15),
        u32::from(G_CCMUX_SHADE) << 15,
    )
}

pub fn enc_geometrymode(clear: u32, set: u32) -> (u32, u32) {
    (
        (u32::from(crate::gbi::G_GEOMETRYMODE) << 24) | (!clear & 0x00FF_FFFF),
        set,
    )
}

/// Latch a texture image of `texels` 16-bit RGBA texels, `row` texels per
/// row, through the state handlers directly (bypassing the interpreter).
pub fn latch_rgba_texture(state: &mut crate::state::RenderState, addr: u32, row: u32, texels: u32) {
    let (w0, w1) = enc_settimg(crate::gbi::G_IM_FMT_RGBA, crate::gbi::G_IM_SIZ_16B, addr);
    state.set_texture_image(w0, w1);
    let (w0, w1) = enc_settile(
        crate::gbi::G_IM_FMT_RGBA,
        crate::gbi::G_IM_SIZ_16B,
        row / 4,
        crate::gbi::G_TX_RENDERTILE,
    );
    state.set_tile(w0, w1);
    let (_, w1) = enc_loadblock(texels - 1, crate::gbi::G_TX_LOADTILE);
    state.load_block(w1);
}
