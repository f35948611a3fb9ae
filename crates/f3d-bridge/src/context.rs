//! Shared interpreter context: render state, vertex pipeline and texture
//! cache, created once against a rasterizer and reused every frame.

use crate::state::RenderState;
use crate::target::{Rasterizer, TexFormat};
use crate::texture::TextureCache;
use crate::vertex::VertexPipeline;

pub struct Context {
    pub state: RenderState,
    pub vertices: VertexPipeline,
    pub textures: TextureCache,
}

impl Context {
    /// Allocates the reserved blank texture on the target before any
    /// display list runs.
    pub fn new<R: Rasterizer>(raster: &mut R) -> Self {
        let blank = raster.gen_texture();
        raster.bind_texture(blank);
        raster.alloc_texture(blank, TexFormat::None, 0, 0);

        Context {
            state: RenderState::new(),
            vertices: VertexPipeline::new(),
            textures: TextureCache::new(blank),
        }
    }
}
