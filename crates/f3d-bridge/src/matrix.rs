//! Matrix command handling.
//!
//! Source matrices arrive split as sixteen 16-bit integer parts followed by
//! sixteen 16-bit fractional parts (16.16 fixed point). The target works in
//! 20.12, so modelview matrices are shifted on load; projection matrices
//! are kept at full precision and compensated with a pre-scale when
//! multiplied.
//!
//! The W-rescale trick: source vertices expect W to pass through as 1,
//! while the target's convention puts 1 at `1 << 12`. Multiplying the
//! modelview by [`W_RESCALE`] once per frame fixes every subsequent
//! vertex; the multiply is reverted before any further modelview multiply
//! so matrix math keeps working.

use crate::gbi;
use crate::mem;
use crate::state::RenderState;
use crate::target::{M4x4, MatrixMode, Rasterizer};

/// Scales X/Y/Z by `1 << 12` while leaving W alone, net effect: W shrinks
/// relative to the other components.
pub const W_RESCALE: M4x4 = M4x4([
    1 << 12, 0, 0, 0, //
    0, 1 << 12, 0, 0, //
    0, 0, 1 << 12, 0, //
    0, 0, 0, 1 << 0,
]);

/// Inverse of [`W_RESCALE`] up to the common 20.12 scale.
const W_RESCALE_REVERT: M4x4 = M4x4([
    1 << 12, 0, 0, 0, //
    0, 1 << 12, 0, 0, //
    0, 0, 1 << 12, 0, //
    0, 0, 0, 1 << 24,
]);

/// Brings a full-precision projection matrix into multiplication range.
const PROJECTION_PRESCALE: M4x4 = M4x4([
    1 << 8, 0, 0, 0, //
    0, 1 << 8, 0, 0, //
    0, 0, 1 << 8, 0, //
    0, 0, 0, 1 << 8,
]);

/// G_MTX: load or multiply one of the two matrix stacks.
pub fn load_matrix<R: Rasterizer>(
    state: &mut RenderState,
    raster: &mut R,
    source: &[u8],
    w0: u32,
    w1: u32,
) {
    let cmd = gbi::decode_mtx(w0, w1);
    let mut m = read_matrix(source, cmd.addr);

    if cmd.params & gbi::G_MTX_PROJECTION != 0 {
        raster.matrix_mode(MatrixMode::Projection);

        if cmd.params & gbi::G_MTX_LOAD != 0 {
            raster.load_matrix(&m);
        } else {
            // The projection matrix is kept with 16-bit fractionals to
            // preserve precision; scale it down so the multiply lands in
            // the target's 12-bit convention.
            raster.mult_matrix(&PROJECTION_PRESCALE);
            raster.mult_matrix(&m);
        }
    } else {
        raster.matrix_mode(MatrixMode::ModelView);

        if cmd.params & gbi::G_MTX_PUSH != 0 {
            raster.push_matrix();
        }

        // 16.16 → 20.12 for the modelview stack.
        for v in m.0.iter_mut() {
            *v >>= 4;
        }

        if cmd.params & gbi::G_MTX_LOAD != 0 {
            raster.load_matrix(&m);
        } else {
            if state.shrunk {
                raster.mult_matrix(&W_RESCALE_REVERT);
            }
            raster.mult_matrix(&m);
        }

        state.shrunk = false;
        state.lights_dirty = true;
    }
}

/// G_POPMTX: pop modelview matrices (the stream counts in 64-byte units).
pub fn pop_matrix<R: Rasterizer>(raster: &mut R, w1: u32) {
    raster.matrix_mode(MatrixMode::ModelView);
    raster.pop_matrix((w1 / 64) as i32);
}

/// Apply the W-rescale multiply once per frame, lazily, on the first
/// depth-tested draw.
pub fn ensure_w_rescale<R: Rasterizer>(state: &mut RenderState, raster: &mut R) {
    if !state.shrunk {
        raster.matrix_mode(MatrixMode::ModelView);
        raster.mult_matrix(&W_RESCALE);
        state.shrunk = true;
    }
}

/// Assemble a 16.16 matrix from its split integer/fraction halves.
fn read_matrix(source: &[u8], addr: u32) -> M4x4 {
    let mut m = [0i32; 16];
    for (k, v) in m.iter_mut().enumerate() {
        let int = i32::from(mem::read_i16(source, addr + 2 * k as u32));
        let frac = i32::from(mem::read_u16(source, addr + 32 + 2 * k as u32));
        *v = (int << 16) | frac;
    }
    M4x4(m)
}
