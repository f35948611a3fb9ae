//! Target-hardware collaborator interfaces.
//!
//! The translation layer never touches the rasterizer, the video timing
//! hardware or the overlay sprites directly; it drives them through these
//! traits. Coordinate conventions follow the target: vertex components are
//! 4.12 signed fixed point, texture coordinates 12.4, matrices 20.12.

/// Handle to a target-resident texture. Zero is reserved for "no texture
/// allocated" (an evicted cache entry).
pub type TextureName = u32;

/// Texel formats the target can hold. The source pipeline's RGBA and
/// intensity-alpha images are converted to these at asset build time;
/// everything else renders through the reserved blank texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexFormat {
    /// No texel data; sampling yields untextured pixels.
    None,
    /// 16-bit RGBA, 1-bit alpha.
    Rgba16,
    /// 8-bit intensity with 5-bit alpha.
    IntensityAlpha,
}

/// Which matrix stack subsequent matrix operations address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixMode {
    Projection,
    ModelView,
}

/// Column-major 4x4 matrix in the target's 20.12 fixed-point convention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct M4x4(pub [i32; 16]);

impl M4x4 {
    /// Diagonal matrix; the workhorse of the W-rescale and depth-hijack
    /// tricks, which smuggle coordinates through scale matrices.
    pub fn diagonal(x: i32, y: i32, z: i32, w: i32) -> Self {
        let mut m = [0i32; 16];
        m[0] = x;
        m[5] = y;
        m[10] = z;
        m[15] = w;
        M4x4(m)
    }
}

/// Result of the position-query mechanism: a vertex projected through the
/// current matrix stacks without being submitted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectedVertex {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub w: i32,
}

/// Polygon attribute word encoding (target convention).
pub mod poly {
    /// Draw back faces.
    pub const CULL_BACK: u32 = 1 << 6;
    /// Draw front faces.
    pub const CULL_FRONT: u32 = 1 << 7;
    /// Draw both faces.
    pub const CULL_NONE: u32 = CULL_BACK | CULL_FRONT;
    /// Depth-equal test for coplanar decal surfaces.
    pub const DECAL: u32 = 1 << 14;
    /// Per-polygon fog.
    pub const FOG: u32 = 1 << 15;

    /// 5-bit polygon alpha (31 = opaque).
    pub fn alpha(a: u32) -> u32 {
        a << 16
    }

    /// 6-bit polygon id controlling transparent-overlap resolution.
    pub fn id(id: u32) -> u32 {
        id << 24
    }
}

/// Texture parameter word encoding (target convention).
pub mod texparam {
    pub const WRAP_S: u32 = 1 << 16;
    pub const FLIP_S: u32 = 1 << 18;
    pub const WRAP_T: u32 = 1 << 17;
    pub const FLIP_T: u32 = 1 << 19;
}

/// The target 3D engine.
///
/// Matrix and primitive calls mirror the hardware command port; texture
/// calls cover name allocation, target-memory residency and texel upload
/// separately so the cache can retry allocation under pressure. Any bank
/// reconfiguration needed to make texture memory writable during
/// `upload_texture` is the implementation's own business.
pub trait Rasterizer {
    fn matrix_mode(&mut self, mode: MatrixMode);
    fn load_matrix(&mut self, m: &M4x4);
    fn mult_matrix(&mut self, m: &M4x4);
    fn load_identity(&mut self);
    fn push_matrix(&mut self);
    fn pop_matrix(&mut self, count: i32);
    /// Row-major 3x3 rotation part of the current modelview matrix, 20.12.
    fn modelview_rotation(&mut self) -> [i32; 9];

    /// Begin a triangle run; ended implicitly by state changes.
    fn begin_triangles(&mut self);
    fn color(&mut self, r: u8, g: u8, b: u8);
    fn tex_coord(&mut self, s: i16, t: i16);
    fn vertex(&mut self, x: i16, y: i16, z: i16);
    /// Project a position through the current stacks without emitting it.
    fn position_test(&mut self, x: i16, y: i16, z: i16) -> ProjectedVertex;

    fn gen_texture(&mut self) -> TextureName;
    fn delete_texture(&mut self, name: TextureName);
    fn bind_texture(&mut self, name: TextureName);
    /// Reserve target memory for a `8 << size_x` by `8 << size_y` texture.
    /// Returns false when texture memory is exhausted.
    fn alloc_texture(&mut self, name: TextureName, format: TexFormat, size_x: u8, size_y: u8)
        -> bool;
    /// Copy texel data into the memory reserved for `name`.
    fn upload_texture(&mut self, name: TextureName, data: &[u8]);
    fn tex_params(&mut self, params: u32);
    /// Format of the currently bound texture.
    fn bound_format(&self) -> TexFormat;

    fn poly_fmt(&mut self, fmt: u32);
    fn viewport(&mut self, x1: u8, y1: u8, x2: u8, y2: u8);
    /// Present the frame's polygon list with manual translucency sorting.
    fn flush_manual_sort(&mut self);

    fn fog_density(&mut self, index: usize, density: u8);
    fn fog_shift(&mut self, shift: u32);
    fn fog_offset(&mut self, offset: i32);
    fn fog_color(&mut self, r: u8, g: u8, b: u8, a: u8);
    fn fog_enable(&mut self, enabled: bool);
}

/// Frame-boundary signal source. The boundary counter increments once per
/// hardware frame; the controller reads it for pacing and resets it after
/// each presented frame.
pub trait VideoSync {
    fn boundaries_elapsed(&self) -> u32;
    /// Block until the next frame boundary.
    fn wait_for_boundary(&mut self);
    fn reset_boundaries(&mut self);
}

/// One 2D overlay sprite, positioned by the embedder and published to the
/// overlay hardware once per frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sprite {
    pub x: i16,
    pub y: i16,
    pub pressed: bool,
    pub vflip: bool,
}

/// The 2D overlay collaborator.
pub trait Overlay {
    fn update_sprite(&mut self, index: usize, sprite: &Sprite);
}
