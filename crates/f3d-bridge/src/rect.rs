//! Screen-space rectangles and the viewport.
//!
//! Rectangles arrive in 10.2 screen coordinates against a 320x240 frame
//! and are drawn as two triangles under identity matrix stacks, scaled to
//! the -1..1 clip range. Both kinds ride the synthetic depth counter, so
//! later rectangles land on top of earlier ones.

use crate::gbi;
use crate::mem;
use crate::state::RenderState;
use crate::target::{poly, MatrixMode, Rasterizer};
use crate::texture::TextureCache;

const SCREEN_W: i32 = 320;
const SCREEN_H: i32 = 240;

/// G_RDPHALF_2 completes a pending G_TEXRECT: the rectangle corners were
/// latched earlier, the upper-left texture coordinate sits in the first
/// half-word, and `w1` carries the per-pixel coordinate steps.
pub fn texture_rect<R: Rasterizer>(
    state: &mut RenderState,
    textures: &mut TextureCache,
    raster: &mut R,
    source: &[u8],
    w1: u32,
) {
    let alpha = if state.use_env_alpha {
        u32::from(state.env_color.a) >> 3
    } else {
        31
    };
    if alpha == 0 {
        return;
    }

    raster.matrix_mode(MatrixMode::ModelView);
    raster.push_matrix();
    raster.load_identity();
    raster.matrix_mode(MatrixMode::Projection);
    raster.push_matrix();
    raster.load_identity();

    if state.texture_dirty {
        textures.resolve(raster, source, state);
        raster.tex_params(state.tex_params);
        state.texture_dirty = false;
    }

    raster.poly_fmt(poly::CULL_NONE | poly::alpha(alpha));
    raster.begin_triangles();

    // Copy mode draws one pixel larger and steps its S coordinate with
    // two extra fractional bits.
    let copy = state.other_mode_h & (3 << gbi::G_MDSFT_CYCLETYPE) == gbi::G_CYC_COPY;

    if state.use_env_color && !copy {
        let c = state.env_color;
        raster.color(c.r, c.g, c.b);
    } else {
        raster.color(0xFF, 0xFF, 0xFF);
    }

    let r = gbi::decode_rect(state.texrect.0, state.texrect.1);
    let (x1, y1) = (r.x1, r.y1);
    let x2 = r.x2 + if copy { 1 << 2 } else { 0 };
    let y2 = r.y2 + if copy { 1 << 2 } else { 0 };

    let s1 = (((state.rdphalf_1 >> 16) & 0xFFFF) >> 1) as i16;
    let t1 = ((state.rdphalf_1 & 0xFFFF) >> 1) as i16;
    let dsdx = ((w1 >> 16) & 0xFFFF) as i32;
    let dtdy = (w1 & 0xFFFF) as i32;
    let s2 = s1 + ((dsdx * (x2 - x1)) >> if copy { 10 } else { 8 }) as i16;
    let t2 = t1 + ((dtdy * (y2 - y1)) >> 8) as i16;

    let x1 = to_clip_x(x1);
    let y1 = to_clip_y(y1);
    let x2 = to_clip_x(x2);
    let y2 = to_clip_y(y2);

    raster.tex_coord(s1, t1);
    raster.vertex(x1, y1, next_z(state));
    raster.tex_coord(s1, t2);
    raster.vertex(x1, y2, next_z(state));
    raster.tex_coord(s2, t1);
    raster.vertex(x2, y1, next_z(state));

    raster.tex_coord(s2, t1);
    raster.vertex(x2, y1, next_z(state));
    raster.tex_coord(s1, t2);
    raster.vertex(x1, y2, next_z(state));
    raster.tex_coord(s2, t2);
    raster.vertex(x2, y2, next_z(state));

    raster.pop_matrix(1);
    raster.matrix_mode(MatrixMode::ModelView);
    raster.pop_matrix(1);
}

/// G_FILLRECT: an untextured rectangle in the fill color. A fill aimed at
/// the depth buffer is the source's depth clear and is skipped.
pub fn fill_rect<R: Rasterizer>(
    state: &mut RenderState,
    textures: &mut TextureCache,
    raster: &mut R,
    w0: u32,
    w1: u32,
) {
    if state.c_image == state.z_image {
        return;
    }

    let alpha = u32::from(state.fill_color.a) >> 3;
    if alpha == 0 {
        return;
    }

    raster.matrix_mode(MatrixMode::ModelView);
    raster.push_matrix();
    raster.load_identity();
    raster.matrix_mode(MatrixMode::Projection);
    raster.push_matrix();
    raster.load_identity();

    raster.bind_texture(textures.blank());
    state.texture_dirty = true;

    raster.poly_fmt(poly::CULL_NONE | poly::alpha(alpha));
    raster.begin_triangles();
    let c = state.fill_color;
    raster.color(c.r, c.g, c.b);

    // The rectangle covers its lower-right edge pixels too.
    let r = gbi::decode_rect(w0, w1);
    let x1 = to_clip_x(r.x1);
    let y1 = to_clip_y(r.y1);
    let x2 = to_clip_x(r.x2 + (1 << 2));
    let y2 = to_clip_y(r.y2 + (1 << 2));

    raster.vertex(x1, y1, next_z(state));
    raster.vertex(x1, y2, next_z(state));
    raster.vertex(x2, y1, next_z(state));

    raster.vertex(x2, y1, next_z(state));
    raster.vertex(x1, y2, next_z(state));
    raster.vertex(x2, y2, next_z(state));

    raster.matrix_mode(MatrixMode::Projection);
    raster.pop_matrix(1);
    raster.matrix_mode(MatrixMode::ModelView);
    raster.pop_matrix(1);
}

/// G_MV_VIEWPORT: scale the source viewport (halves, 2-bit fractions)
/// onto the target's 256x192 screen.
pub fn set_viewport<R: Rasterizer>(raster: &mut R, source: &[u8], addr: u32) {
    let vscale_x = i32::from(mem::read_i16(source, addr));
    let vscale_y = i32::from(mem::read_i16(source, addr + 2));
    let vtrans_x = i32::from(mem::read_i16(source, addr + 8));
    let vtrans_y = i32::from(mem::read_i16(source, addr + 10));

    let x2 = (vscale_x >> 1) * 255 / 320;
    let x1 = ((vtrans_x >> 1) * 255 / 320 - x2) >> 1;
    let y2 = (vscale_y >> 1) * 191 / 240;
    let y1 = ((vtrans_y >> 1) * 191 / 240 - y2) >> 1;

    raster.viewport(x1 as u8, y1 as u8, x2 as u8, y2 as u8);
}

fn to_clip_x(x: i32) -> i16 {
    (x * (2 << 12) / (SCREEN_W << 2) - (1 << 12)) as i16
}

fn to_clip_y(y: i32) -> i16 {
    -(y * (2 << 12) / (SCREEN_H << 2) - (1 << 12)) as i16
}

fn next_z(state: &mut RenderState) -> i16 {
    state.z_depth -= 1;
    (state.z_depth / 6) as i16
}
