//! Frame controller: runs one display list per frame, finalizes fog,
//! publishes the overlay sprites, drains the texture upload queue and
//! paces presentation to every second frame boundary.

use crate::context::Context;
use crate::interp;
use crate::state::RenderState;
use crate::target::{Overlay, Rasterizer, Sprite, VideoSync};

/// Overlay sprite slots.
pub const C_LEFT: usize = 0;
pub const C_RIGHT: usize = 1;
pub const STICK: usize = 2;
pub const STICK_BASE_1: usize = 3;
pub const STICK_BASE_2: usize = 4;
pub const STICK_BASE_3: usize = 5;
pub const STICK_BASE_4: usize = 6;
pub const MAX_SPRITES: usize = 7;

/// Frame boundaries per presented frame (half the hardware rate).
const FRAME_BOUNDARIES: u32 = 2;

pub struct FrameController {
    /// Overlay sprites; the embedder moves them, the controller publishes
    /// them once per frame.
    pub sprites: [Sprite; MAX_SPRITES],
}

impl FrameController {
    pub fn new() -> Self {
        let mut sprites = [Sprite::default(); MAX_SPRITES];
        sprites[C_LEFT] = sprite(0, 128, false);
        sprites[C_RIGHT] = sprite(192, 128, true);
        sprites[STICK] = sprite(96, 64, false);
        sprites[STICK_BASE_1] = sprite(64, 32, false);
        sprites[STICK_BASE_2] = sprite(64, 96, false);
        sprites[STICK_BASE_3] = sprite(128, 32, true);
        sprites[STICK_BASE_4] = sprite(128, 96, true);
        FrameController { sprites }
    }

    /// Interpret and present one frame's display list.
    pub fn render_frame<R, V, O>(
        &mut self,
        ctx: &mut Context,
        raster: &mut R,
        video: &mut V,
        overlay: &mut O,
        source: &[u8],
        list: u32,
    ) where
        R: Rasterizer,
        V: VideoSync,
        O: Overlay,
    {
        ctx.state.frame_reset();

        interp::execute(
            &mut ctx.state,
            &mut ctx.vertices,
            &mut ctx.textures,
            raster,
            source,
            list,
        );
        raster.flush_manual_sort();

        if ctx.state.fog_status != 0 {
            apply_fog(&ctx.state, raster);
        } else {
            raster.fog_enable(false);
        }

        for (index, sprite) in self.sprites.iter().enumerate() {
            overlay.update_sprite(index, sprite);
        }

        // Texture memory is only writable between frames; everything the
        // interpreter queued goes out now.
        ctx.textures.flush_uploads(raster, source);

        // Pace to every second boundary; a slow frame already crossed
        // them and continues immediately.
        while video.boundaries_elapsed() < FRAME_BOUNDARIES {
            video.wait_for_boundary();
        }
        video.reset_boundaries();
    }
}

impl Default for FrameController {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate the frame's locked fog range into the target's 32-step
/// density ramp.
fn apply_fog<R: Rasterizer>(state: &RenderState, raster: &mut R) {
    let span = (i32::from(state.fog_max) - i32::from(state.fog_min)).max(1);

    // Largest depth shift whose fog band still covers the span.
    let mut shift = 0;
    let mut band = 500;
    while band >= span {
        shift += 1;
        band >>= 1;
    }

    let inc = ((((128 * 1000) << 1) / (span * 32)) + 1) >> (shift + 1);
    let mut density = 0;
    for step in 0..32 {
        raster.fog_density(step, density as u8);
        density += inc;
        if density > 127 {
            density = 127;
        }
    }

    raster.fog_shift(shift);
    raster.fog_offset(i32::from(state.fog_min) * 0x7FFF / 1000 - (0x400 >> shift));
    let c = state.fog_color;
    raster.fog_color(c.r >> 3, c.g >> 3, c.b >> 3, c.a >> 3);
    raster.fog_enable(true);
}

fn sprite(x: i16, y: i16, vflip: bool) -> Sprite {
    Sprite {
        x,
        y,
        pressed: false,
        vflip,
    }
}
