//! Render state derived from the command stream.
//!
//! Tracks the source pipeline's configuration words (geometry mode, the
//! two other-mode halves), the combiner approximation flags, colors, the
//! texture-image latch feeding the texture cache, fog parameters with
//! their once-per-frame lock, and the bookkeeping for the two matrix/depth
//! workarounds. Persists across frames except for the fields
//! [`RenderState::frame_reset`] names.

use crate::gbi::{self};

/// RGBA color as carried by set-color commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn from_word(w1: u32) -> Self {
        let [r, g, b, a] = gbi::decode_color(w1);
        Color { r, g, b, a }
    }
}

/// Synthetic depth counter start: the full far range, scaled by 6 so six
/// decrements (one 2D quad as two triangles) move one depth unit.
pub const Z_DEPTH_START: i32 = 0x1000 * 6;

/// Where the synthetic depth jumps once 3D drawing begins: a reserved
/// near range with room for 128 foreground quads.
pub const Z_DEPTH_FOREGROUND: i32 = (128 - 0x1000) * 6;

pub struct RenderState {
    // ─── Source configuration words ───
    pub geometry_mode: u32,
    pub other_mode_l: u32,
    pub other_mode_h: u32,

    // ─── Combiner approximation ───
    pub use_vertex_color: bool,
    pub use_texture: bool,
    pub use_env_color: bool,
    pub use_env_alpha: bool,

    // ─── Colors ───
    pub fill_color: Color,
    pub fog_color: Color,
    pub env_color: Color,

    // ─── Target polygon attributes ───
    /// Accumulated culling/decal bits; alpha and id are merged per draw.
    pub poly_attr: u32,
    /// Advanced on every combiner change to separate transparent objects.
    pub polygon_id: u32,
    pub tex_params: u32,

    // ─── Texture image latch (consumed by the cache on resolve) ───
    pub texture_addr: u32,
    pub texture_format: u8,
    pub texture_bit_width: u8,
    pub texture_row_size: u16,
    pub texture_byte_size: u16,
    pub texture_scale_s: u16,
    pub texture_scale_t: u16,
    /// Set when the latched image changed since the last bind.
    pub texture_dirty: bool,
    /// Set when a light direction or the modelview matrix changed;
    /// transformed light vectors are recomputed on the next lit load.
    pub lights_dirty: bool,

    // ─── Fog (locked after two distinct configurations per frame) ───
    pub fog_status: u8,
    pub fog_min: u16,
    pub fog_max: u16,

    // ─── Depth/matrix workarounds ───
    /// Modelview currently carries the W-rescale multiply.
    pub shrunk: bool,
    /// No depth-tested draw has happened yet this frame.
    pub background: bool,
    /// Strictly decreasing synthetic Z for depth-untested content.
    pub z_depth: i32,

    // ─── Render target addresses (clear-to-self detection only) ───
    pub z_image: u32,
    pub c_image: u32,

    // ─── Texture rectangle staging ───
    pub rdphalf_1: u32,
    pub texrect: (u32, u32),
}

impl RenderState {
    pub fn new() -> Self {
        Self {
            geometry_mode: 0,
            other_mode_l: 0,
            other_mode_h: 0,
            use_vertex_color: false,
            use_texture: false,
            use_env_color: false,
            use_env_alpha: false,
            fill_color: Color::default(),
            fog_color: Color::default(),
            env_color: Color::default(),
            poly_attr: crate::target::poly::CULL_NONE,
            polygon_id: 0,
            tex_params: 0,
            texture_addr: 0,
            texture_format: 0,
            texture_bit_width: 0,
            texture_row_size: 0,
            texture_byte_size: 0,
            texture_scale_s: 0,
            texture_scale_t: 0,
            texture_dirty: true,
            lights_dirty: true,
            fog_status: 0,
            fog_min: 0,
            fog_max: 0,
            shrunk: false,
            background: true,
            z_depth: Z_DEPTH_START,
            z_image: 0,
            c_image: 0,
            rdphalf_1: 0,
            texrect: (0, 0),
        }
    }

    /// Per-frame reset. Everything else persists across frames.
    pub fn frame_reset(&mut self) {
        self.background = true;
        self.z_depth = Z_DEPTH_START;
        self.fog_status = 0;
    }

    /// G_GEOMETRYMODE: clear then set mode bits, re-deriving the target
    /// culling attributes.
    pub fn set_geometry_mode(&mut self, w0: u32, w1: u32) {
        let cmd = gbi::decode_geometry_mode(w0, w1);
        self.geometry_mode = (self.geometry_mode & cmd.keep_mask) | cmd.set_bits;

        use crate::target::poly;
        self.poly_attr |= poly::CULL_NONE;
        if self.geometry_mode & gbi::G_CULL_FRONT != 0 {
            self.poly_attr &= !poly::CULL_BACK;
        }
        if self.geometry_mode & gbi::G_CULL_BACK != 0 {
            self.poly_attr &= !poly::CULL_FRONT;
        }
    }

    /// G_SETOTHERMODE_L: patch a bit range of the low configuration word.
    pub fn set_other_mode_l(&mut self, w0: u32, w1: u32) {
        let p = gbi::decode_othermode(w0, w1);
        self.other_mode_l = (self.other_mode_l & !p.mask) | p.bits;
    }

    /// G_SETOTHERMODE_H: patch a bit range of the high configuration word.
    pub fn set_other_mode_h(&mut self, w0: u32, w1: u32) {
        let p = gbi::decode_othermode(w0, w1);
        self.other_mode_h = (self.other_mode_h & !p.mask) | p.bits;
    }

    /// G_SETCOMBINE: approximate the `(A - B) * C + D` combiner with the
    /// flag set the draw path consumes. The target blends far less freely
    /// than the source; these four flags reproduce the patterns the source
    /// content actually uses.
    pub fn set_combine(&mut self, w0: u32, w1: u32) {
        use crate::target::poly;
        let c = gbi::decode_combine(w0, w1);

        self.use_env_color =
            c.c_color == gbi::G_CCMUX_ENVIRONMENT || c.d_color == gbi::G_CCMUX_ENVIRONMENT;
        self.use_env_alpha =
            c.c_alpha == gbi::G_ACMUX_ENVIRONMENT || c.d_alpha == gbi::G_ACMUX_ENVIRONMENT;
        self.use_vertex_color = !self.use_env_color
            && (c.a_color == gbi::G_CCMUX_SHADE
                || c.b_color == gbi::G_CCMUX_SHADE
                || c.c_color == gbi::G_CCMUX_SHADE
                || c.d_color == gbi::G_CCMUX_SHADE);
        self.use_texture = c.a_color == gbi::G_CCMUX_TEXEL0
            || c.b_color == gbi::G_CCMUX_TEXEL0
            || c.c_color == gbi::G_CCMUX_TEXEL0
            || c.d_color == gbi::G_CCMUX_TEXEL0;

        if c.b_color == c.d_color {
            self.poly_attr |= poly::DECAL;
            // A primitive-colored decal cannot be blended on the target;
            // drop the texture rather than draw it wrong.
            if c.a_color == gbi::G_CCMUX_PRIMITIVE {
                self.use_texture = false;
            }
        } else {
            self.poly_attr &= !poly::DECAL;
        }

        // The target refuses to draw transparent pixels over transparent
        // pixels sharing a polygon id. Cycling the id on combiner changes
        // approximates object boundaries well enough to keep separate
        // objects blending while same-object overlap stays suppressed.
        self.polygon_id = (self.polygon_id + 1) & 0x3F;
    }

    /// G_TEXTURE: texture coordinate scale factors.
    pub fn set_texture_scale(&mut self, w1: u32) {
        self.texture_scale_s = (w1 >> 16) as u16;
        self.texture_scale_t = (w1 >> 0) as u16;
    }

    /// G_SETTILE: latch the render tile's format and wrap/mirror flags.
    pub fn set_tile(&mut self, w0: u32, w1: u32) {
        use crate::target::texparam;
        let t = gbi::decode_tile(w0, w1);
        if t.tile != gbi::G_TX_RENDERTILE {
            return;
        }

        self.texture_format = t.format;
        self.texture_bit_width = t.bit_width;
        self.texture_row_size = t.row_size;

        self.tex_params = 0;
        if t.cm_s & gbi::G_TX_CLAMP == 0 {
            self.tex_params |= texparam::WRAP_S;
            if t.cm_s & gbi::G_TX_MIRROR != 0 {
                self.tex_params |= texparam::FLIP_S;
            }
        }
        if t.cm_t & gbi::G_TX_CLAMP == 0 {
            self.tex_params |= texparam::WRAP_T;
            if t.cm_t & gbi::G_TX_MIRROR != 0 {
                self.tex_params |= texparam::FLIP_T;
            }
        }
    }

    /// G_LOADBLOCK: latch the texture's size in source memory, in bytes.
    pub fn load_block(&mut self, w1: u32) {
        let b = gbi::decode_load_block(w1);
        if b.tile != gbi::G_TX_LOADTILE {
            return;
        }
        self.texture_byte_size = match self.texture_bit_width {
            gbi::G_IM_SIZ_4B => b.texels >> 1,
            gbi::G_IM_SIZ_16B => b.texels << 1,
            _ => b.texels,
        };
    }

    /// G_SETTIMG: latch the source texture address and mark the cache
    /// lookup dirty.
    pub fn set_texture_image(&mut self, w0: u32, w1: u32) {
        let f = gbi::decode_image_format(w0);
        self.texture_addr = w1;
        self.texture_format = f.format;
        self.texture_bit_width = f.bit_width;
        self.texture_dirty = true;
    }

    pub fn set_fill_color(&mut self, w1: u32) {
        self.fill_color = Color::from_word(w1);
    }

    /// Fog color respects the per-frame fog lock.
    pub fn set_fog_color(&mut self, w1: u32) {
        if self.fog_status < 2 {
            self.fog_color = Color::from_word(w1);
        }
    }

    pub fn set_env_color(&mut self, w1: u32) {
        self.env_color = Color::from_word(w1);
    }

    /// G_MW_FOG: derive min/max fog depths (0..1000 range) from the
    /// source multiplier/offset pair.
    ///
    /// Fog may be reconfigured twice per frame, then freezes. The target
    /// renders a single fog per frame; when authored content layers two
    /// fogs, the second configuration is the one worth keeping, and later
    /// writes would degrade it.
    pub fn set_fog_params(&mut self, w1: u32) {
        if self.fog_status >= 2 {
            return;
        }
        let f = gbi::decode_fog(w1);
        if f.mul == 0 {
            return;
        }
        let mul = i32::from(f.mul);
        let ofs = i32::from(f.ofs);
        let min = (500 - ofs * 500 / mul) as u16;
        let max = (128000 / mul) as u16 + min;

        if self.fog_status == 0 || self.fog_min != min || self.fog_max != max {
            self.fog_status += 1;
            self.fog_min = min;
            self.fog_max = max;
        }
    }

    /// G_SETZIMG / G_SETCIMG: recorded only to detect fills aimed at the
    /// depth buffer (the source's way of clearing it).
    pub fn set_z_image(&mut self, w1: u32) {
        self.z_image = w1;
    }

    pub fn set_c_image(&mut self, w1: u32) {
        self.c_image = w1;
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new()
    }
}
