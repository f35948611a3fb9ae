//! Display list interpreter.
//!
//! Walks a command list from source memory, batching triangles and
//! dispatching everything else to the state, matrix, texture and
//! rectangle handlers. Batches are drawn whenever a non-triangle command
//! arrives or the batch nears capacity, so state changes always apply to
//! whole batches.

use crate::gbi;
use crate::matrix;
use crate::mem;
use crate::rect;
use crate::state::RenderState;
use crate::target::Rasterizer;
use crate::texture::TextureCache;
use crate::vertex::{VertexPipeline, BATCH_SIZE};

/// Display list call depth. Authored content nests a handful of levels;
/// anything deeper is a corrupt pointer chain.
const CALL_DEPTH: usize = 32;

/// Commands executed per frame before bailing out of a runaway list.
const MAX_COMMANDS: usize = 1 << 20;

/// Interpret the display list at `list` until its terminating end
/// command.
pub fn execute<R: Rasterizer>(
    state: &mut RenderState,
    vertices: &mut VertexPipeline,
    textures: &mut TextureCache,
    raster: &mut R,
    source: &[u8],
    list: u32,
) {
    let mut stack: Vec<u32> = Vec::with_capacity(CALL_DEPTH);
    let mut pc = list;

    for _ in 0..MAX_COMMANDS {
        let w0 = mem::read_u32(source, pc);
        let w1 = mem::read_u32(source, pc + 4);
        let opcode = gbi::opcode(w0);

        // Draw the batched triangles before anything that could change
        // their state, and before the batch runs out of room.
        if (opcode != gbi::G_TRI1 && opcode != gbi::G_TRI2 && vertices.batch_count() > 0)
            || vertices.batch_count() > BATCH_SIZE - 6
        {
            vertices.draw_batch(state, textures, raster, source);
        }

        match opcode {
            gbi::G_VTX => vertices.load_vertices(state, raster, source, w0, w1),
            gbi::G_TRI1 => vertices.batch_tri1(w0),
            gbi::G_TRI2 => vertices.batch_tri2(w0, w1),
            gbi::G_TEXTURE => state.set_texture_scale(w1),
            gbi::G_POPMTX => matrix::pop_matrix(raster, w1),
            gbi::G_GEOMETRYMODE => state.set_geometry_mode(w0, w1),
            gbi::G_MTX => matrix::load_matrix(state, raster, source, w0, w1),

            gbi::G_MOVEWORD => match ((w0 >> 16) & 0xFF) as u8 {
                gbi::G_MW_NUMLIGHT => vertices.set_num_lights(w1),
                gbi::G_MW_FOG => state.set_fog_params(w1),
                gbi::G_MW_CLIP | gbi::G_MW_PERSPNORM => {}
                index => log::debug!("unhandled moveword index {index:#04X}"),
            },
            gbi::G_MOVEMEM => match (w0 & 0xFF) as u8 {
                gbi::G_MV_VIEWPORT => rect::set_viewport(raster, source, w1),
                gbi::G_MV_LIGHT => vertices.set_light(state, w0, source, w1),
                index => log::debug!("unhandled movemem index {index:#04X}"),
            },

            gbi::G_RDPHALF_1 => state.rdphalf_1 = w1,
            gbi::G_SETOTHERMODE_L => state.set_other_mode_l(w0, w1),
            gbi::G_SETOTHERMODE_H => state.set_other_mode_h(w0, w1),
            gbi::G_TEXRECT => state.texrect = (w0, w1),
            gbi::G_RDPHALF_2 => rect::texture_rect(state, textures, raster, source, w1),
            gbi::G_LOADBLOCK => state.load_block(w1),
            gbi::G_SETTILE => state.set_tile(w0, w1),
            gbi::G_FILLRECT => rect::fill_rect(state, textures, raster, w0, w1),
            gbi::G_SETFILLCOLOR => state.set_fill_color(w1),
            gbi::G_SETFOGCOLOR => state.set_fog_color(w1),
            gbi::G_SETENVCOLOR => state.set_env_color(w1),
            gbi::G_SETCOMBINE => state.set_combine(w0, w1),
            gbi::G_SETTIMG => state.set_texture_image(w0, w1),
            gbi::G_SETZIMG => state.set_z_image(w1),
            gbi::G_SETCIMG => state.set_c_image(w1),

            // Rasterizer syncs and commands with no counterpart here.
            gbi::G_NOOP
            | gbi::G_RDPLOADSYNC
            | gbi::G_RDPPIPESYNC
            | gbi::G_RDPTILESYNC
            | gbi::G_RDPFULLSYNC
            | gbi::G_SETSCISSOR
            | gbi::G_SETTILESIZE
            | gbi::G_SETBLENDCOLOR
            | gbi::G_SETPRIMCOLOR
            | gbi::G_LOADTILE => {}

            gbi::G_DL => {
                let cmd = gbi::decode_dl(w0, w1);
                if !cmd.branch {
                    if stack.len() < CALL_DEPTH {
                        stack.push(pc + 8);
                    } else {
                        log::warn!("display list call depth exceeded at {pc:#010X}");
                        return;
                    }
                }
                pc = cmd.addr;
                continue;
            }
            gbi::G_ENDDL => match stack.pop() {
                Some(ret) => {
                    pc = ret;
                    continue;
                }
                None => return,
            },

            other => {
                log::debug!(
                    "unsupported command {:#04X} ({})",
                    other,
                    gbi::opcode_name(other)
                );
            }
        }

        pc += 8;
    }

    log::warn!("display list at {list:#010X} exceeded the command limit");
}
