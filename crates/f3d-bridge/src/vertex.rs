//! Vertex pipeline: the 16-slot vertex buffer, software lighting, and the
//! batched draw paths with their depth workarounds.
//!
//! The target cannot disable depth testing, cannot bias depth for decals,
//! and normalizes nothing for its hardware lights. Depth-untested content
//! is drawn with a strictly decreasing synthetic Z (painter's order),
//! decal surfaces are reprojected with a small Z offset, and lighting runs
//! in software at vertex load time.

use crate::gbi;
use crate::matrix;
use crate::mem;
use crate::state::{RenderState, Z_DEPTH_FOREGROUND};
use crate::target::{poly, M4x4, MatrixMode, Rasterizer, TexFormat};
use crate::texture::TextureCache;

/// Triangles are accumulated until a state-changing command or this many
/// vertices force a draw.
pub const BATCH_SIZE: usize = 96;

pub const VERTEX_SLOTS: usize = 16;

const MAX_LIGHTS: usize = 8;

/// One vertex as loaded from source memory: 4.12 position, 12.4 texture
/// coordinates, and a color whose bytes double as the normal for lit
/// geometry (lighting overwrites them with the computed color).
#[derive(Clone, Copy, Default)]
pub struct Vertex {
    pub position: [i16; 3],
    pub texcoord: [i16; 2],
    pub cn: [u8; 4],
}

impl Vertex {
    fn normal(&self) -> [i32; 3] {
        [
            i32::from(self.cn[0] as i8),
            i32::from(self.cn[1] as i8),
            i32::from(self.cn[2] as i8),
        ]
    }
}

/// A light slot. Slots 0 and 1 hold the lookat vectors (texgen), the
/// ambient light sits one past the last diffuse slot.
#[derive(Clone, Copy, Default)]
struct Light {
    dir: [i8; 3],
    color: [u8; 3],
    /// Direction transformed by the modelview rotation and normalized,
    /// 4.12. Rebuilt lazily when a light or the modelview changes.
    vec: [i32; 3],
}

pub struct VertexPipeline {
    slots: [Vertex; VERTEX_SLOTS],
    lights: [Light; MAX_LIGHTS],
    num_lights: usize,
    batch: [u8; BATCH_SIZE],
    batch_count: usize,
}

impl VertexPipeline {
    pub fn new() -> Self {
        VertexPipeline {
            slots: [Vertex::default(); VERTEX_SLOTS],
            lights: [Light::default(); MAX_LIGHTS],
            num_lights: 2,
            batch: [0; BATCH_SIZE],
            batch_count: 0,
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    /// G_VTX: copy vertices into the buffer, lighting them on the way in
    /// when the geometry mode asks for it.
    pub fn load_vertices<R: Rasterizer>(
        &mut self,
        state: &mut RenderState,
        raster: &mut R,
        source: &[u8],
        w0: u32,
        w1: u32,
    ) {
        let cmd = gbi::decode_vtx(w0, w1);
        let first = cmd.end.saturating_sub(cmd.count);

        for k in 0..cmd.count {
            let slot = first + k;
            if slot >= VERTEX_SLOTS {
                break;
            }
            let base = cmd.addr + 16 * k as u32;
            self.slots[slot] = Vertex {
                position: [
                    mem::read_i16(source, base),
                    mem::read_i16(source, base + 2),
                    mem::read_i16(source, base + 4),
                ],
                texcoord: [
                    mem::read_i16(source, base + 8),
                    mem::read_i16(source, base + 10),
                ],
                cn: [
                    mem::read_u8(source, base + 12),
                    mem::read_u8(source, base + 13),
                    mem::read_u8(source, base + 14),
                    mem::read_u8(source, base + 15),
                ],
            };
        }

        if state.geometry_mode & gbi::G_LIGHTING != 0 {
            if state.lights_dirty {
                self.transform_lights(raster);
                state.lights_dirty = false;
            }
            self.light_vertices(state, first, cmd.count);
        }
    }

    /// Rotate every light direction into eye space and normalize it. The
    /// hardware transform skips normalization, which is why this runs in
    /// software.
    fn transform_lights<R: Rasterizer>(&mut self, raster: &mut R) {
        let m = raster.modelview_rotation();

        for light in self.lights.iter_mut().take(self.num_lights) {
            let d = [
                i32::from(light.dir[0]),
                i32::from(light.dir[1]),
                i32::from(light.dir[2]),
            ];
            let mut v = [
                (d[0] * m[0] + d[1] * m[1] + d[2] * m[2]) >> 7,
                (d[0] * m[3] + d[1] * m[4] + d[2] * m[5]) >> 7,
                (d[0] * m[6] + d[1] * m[7] + d[2] * m[8]) >> 7,
            ];

            let s = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]) >> 8;
            if s > 0 {
                let s = isqrt((s as i64) << 16) as i32;
                for c in v.iter_mut() {
                    *c = (*c << 16) / s;
                }
            }
            light.vec = v;
        }
    }

    fn light_vertices(&mut self, state: &RenderState, first: usize, count: usize) {
        let lights = self.lights;
        let ambient = lights[self.num_lights.min(MAX_LIGHTS - 1)];

        for slot in first..(first + count).min(VERTEX_SLOTS) {
            let v = &mut self.slots[slot];
            let n = v.normal();

            let mut r = u32::from(ambient.color[0]);
            let mut g = u32::from(ambient.color[1]);
            let mut b = u32::from(ambient.color[2]);

            // Slots 0 and 1 are the lookat vectors, not diffuse lights.
            for light in &lights[2..self.num_lights] {
                let intensity =
                    (light.vec[0] * n[0] + light.vec[1] * n[1] + light.vec[2] * n[2]) >> 7;
                if intensity > 0 {
                    let intensity = intensity as u32;
                    r += (intensity * u32::from(light.color[0])) >> 12;
                    g += (intensity * u32::from(light.color[1])) >> 12;
                    b += (intensity * u32::from(light.color[2])) >> 12;
                }
            }

            // Spherical texture coordinates from the lookat vectors.
            if state.geometry_mode & gbi::G_TEXTURE_GEN != 0 {
                let l0 = lights[0].vec;
                let l1 = lights[1].vec;
                v.texcoord[0] =
                    (((l1[0] * n[0] + l1[1] * n[1] + l1[2] * n[2]) >> 5) + (1 << 14)) as i16;
                v.texcoord[1] =
                    (((l0[0] * n[0] + l0[1] * n[1] + l0[2] * n[2]) >> 5) + (1 << 14)) as i16;
            }

            v.cn[0] = r.min(0xFF) as u8;
            v.cn[1] = g.min(0xFF) as u8;
            v.cn[2] = b.min(0xFF) as u8;
        }
    }

    /// G_MW_NUMLIGHT: diffuse light count, plus the two lookat slots.
    pub fn set_num_lights(&mut self, w1: u32) {
        self.num_lights = ((w1 as usize / 24) + 2).min(MAX_LIGHTS - 1);
    }

    /// G_MV_LIGHT: one light record (color bytes, then a signed direction
    /// at offset 8). Rewriting an unchanged direction must not dirty the
    /// lights; content re-sends them constantly.
    pub fn set_light(&mut self, state: &mut RenderState, w0: u32, source: &[u8], addr: u32) {
        let index = (((w0 >> 8) & 0xFF) / 3) as usize;
        if index >= MAX_LIGHTS {
            return;
        }
        let light = &mut self.lights[index];

        if index >= 2 {
            light.color = [
                mem::read_u8(source, addr),
                mem::read_u8(source, addr + 1),
                mem::read_u8(source, addr + 2),
            ];
        }

        if index < self.num_lights {
            let dir = [
                mem::read_i8(source, addr + 8),
                mem::read_i8(source, addr + 9),
                mem::read_i8(source, addr + 10),
            ];
            if dir != light.dir {
                light.dir = dir;
                state.lights_dirty = true;
            }
        }
    }

    /// G_TRI1: batch one triangle.
    pub fn batch_tri1(&mut self, w0: u32) {
        for index in gbi::decode_tri1(w0) {
            self.push_index(index);
        }
    }

    /// G_TRI2: batch two triangles.
    pub fn batch_tri2(&mut self, w0: u32, w1: u32) {
        for index in gbi::decode_tri2(w0, w1) {
            self.push_index(index);
        }
    }

    fn push_index(&mut self, index: usize) {
        if self.batch_count < BATCH_SIZE {
            self.batch[self.batch_count] = (index & (VERTEX_SLOTS - 1)) as u8;
            self.batch_count += 1;
        }
    }

    /// Draw and clear the accumulated batch.
    pub fn draw_batch<R: Rasterizer>(
        &mut self,
        state: &mut RenderState,
        textures: &mut TextureCache,
        raster: &mut R,
        source: &[u8],
    ) {
        let count = self.batch_count;
        self.batch_count = 0;
        if count == 0 {
            return;
        }

        // One alpha per polygon on the target, taken from the first
        // vertex; zero alpha draws wireframe there, so discard instead.
        let first = self.slots[self.batch[0] as usize];
        let alpha = if state.other_mode_l & gbi::BLEND_A_MEM != 0 {
            31
        } else {
            u32::from(if state.use_env_alpha {
                state.env_color.a
            } else {
                first.cn[3]
            }) >> 3
        };
        if alpha == 0 {
            return;
        }

        // The target cannot filter; nudging coordinates by half a texel
        // keeps textures from sitting visibly off where filtering was
        // expected.
        let tex_ofs = if state.other_mode_h & (3 << gbi::G_MDSFT_TEXTFILT) == gbi::G_TF_POINT {
            0
        } else {
            1 << 4
        };

        if state.use_env_color {
            let c = state.env_color;
            raster.color(c.r, c.g, c.b);
        } else if !state.use_vertex_color {
            raster.color(0xFF, 0xFF, 0xFF);
        }

        if !state.use_texture {
            raster.bind_texture(textures.blank());
            state.texture_dirty = true;
        } else if state.texture_dirty {
            textures.resolve(raster, source, state);
            raster.tex_params(state.tex_params);
            state.texture_dirty = false;
        }

        if state.geometry_mode & gbi::G_ZBUFFER != 0 {
            self.draw_depth_tested(state, raster, count, alpha, tex_ofs);
        } else {
            self.draw_depth_untested(state, raster, count, alpha, tex_ofs);
        }
    }

    fn draw_depth_tested<R: Rasterizer>(
        &mut self,
        state: &mut RenderState,
        raster: &mut R,
        count: usize,
        alpha: u32,
        tex_ofs: i32,
    ) {
        let mut fmt = state.poly_attr | poly::alpha(alpha) | poly::id(state.polygon_id);
        // Fog also covers translucent intensity-alpha textures, which
        // otherwise pop against fogged geometry behind them.
        if state.geometry_mode & gbi::G_FOG != 0
            || (raster.bound_format() == TexFormat::IntensityAlpha && alpha < 31)
        {
            fmt |= poly::FOG;
        }
        raster.poly_fmt(fmt);
        raster.begin_triangles();

        matrix::ensure_w_rescale(state, raster);

        if state.other_mode_l & gbi::ZMODE_DEC == gbi::ZMODE_DEC {
            // Decal surfaces fight their backing polygon; reproject each
            // vertex and pull it slightly toward the camera.
            for k in 0..count {
                let v = self.slots[self.batch[k] as usize];
                self.send_attributes(state, raster, &v, tex_ofs);
                let p = raster.position_test(v.position[0], v.position[1], v.position[2]);
                send_hijacked(raster, p.x, p.y, p.z - (3 << 4), p.w);
            }
        } else {
            for k in 0..count {
                let v = self.slots[self.batch[k] as usize];
                self.send_attributes(state, raster, &v, tex_ofs);
                raster.vertex(v.position[0], v.position[1], v.position[2]);
            }
        }

        // First depth-tested draw of the frame: background 2D layers are
        // done, so move the synthetic depth in front of the scene.
        if state.background {
            state.z_depth = Z_DEPTH_FOREGROUND;
            state.background = false;
        }
    }

    fn draw_depth_untested<R: Rasterizer>(
        &mut self,
        state: &mut RenderState,
        raster: &mut R,
        count: usize,
        alpha: u32,
        tex_ofs: i32,
    ) {
        raster.poly_fmt(state.poly_attr | poly::alpha(alpha) | poly::id(state.polygon_id));
        raster.begin_triangles();

        // Depth-untested content expects multiplication by an unscaled W;
        // instead of shrinking W, enlarge the other rows for the duration
        // of this batch.
        let enlarge = M4x4::diagonal(
            1 << 24,
            1 << 24,
            1 << 24,
            1 << if state.shrunk { 24 } else { 12 },
        );
        raster.matrix_mode(MatrixMode::ModelView);
        raster.push_matrix();
        raster.mult_matrix(&enlarge);

        for k in 0..count {
            let v = self.slots[self.batch[k] as usize];
            self.send_attributes(state, raster, &v, tex_ofs);
            let p = raster.position_test(v.position[0], v.position[1], v.position[2]);

            // Depth testing cannot be turned off; a strictly decreasing Z
            // keeps later polygons on top.
            state.z_depth -= 1;
            send_hijacked(raster, p.x, p.y, (state.z_depth / 6) << 4, p.w);
        }

        raster.pop_matrix(1);
    }

    fn send_attributes<R: Rasterizer>(
        &self,
        state: &RenderState,
        raster: &mut R,
        v: &Vertex,
        tex_ofs: i32,
    ) {
        if state.use_vertex_color && !state.use_env_color {
            raster.color(v.cn[0], v.cn[1], v.cn[2]);
        }
        if state.use_texture {
            let s = ((i32::from(v.texcoord[0]) * i32::from(state.texture_scale_s)) >> 17) + tex_ofs;
            let t = ((i32::from(v.texcoord[1]) * i32::from(state.texture_scale_t)) >> 17) + tex_ofs;
            raster.tex_coord(s as i16, t as i16);
        }
    }
}

impl Default for VertexPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Emit a vertex whose projected coordinates are already known. The
/// target offers no way to set W directly, so the coordinates ride in on
/// a scale matrix applied to an all-ones vertex, under identity stacks.
pub(crate) fn send_hijacked<R: Rasterizer>(raster: &mut R, x: i32, y: i32, z: i32, w: i32) {
    raster.matrix_mode(MatrixMode::ModelView);
    raster.push_matrix();
    raster.load_identity();
    raster.matrix_mode(MatrixMode::Projection);
    raster.push_matrix();
    raster.load_matrix(&M4x4::diagonal(x, y, z, w));
    raster.vertex(1 << 12, 1 << 12, 1 << 12);
    raster.pop_matrix(1);
    raster.matrix_mode(MatrixMode::ModelView);
    raster.pop_matrix(1);
}

fn isqrt(v: i64) -> i64 {
    if v <= 0 {
        return 0;
    }
    let mut x = v as u64;
    let mut result = 0u64;
    let mut bit = 1u64 << 62;
    while bit > x {
        bit >>= 2;
    }
    while bit != 0 {
        if x >= result + bit {
            x -= result + bit;
            result = (result >> 1) + bit;
        } else {
            result >>= 1;
        }
        bit >>= 2;
    }
    result as i64
}
