//! GBI — Graphics Binary Interface.
//!
//! Display list command formats for the source microcode. Each command is
//! 64 bits (two 32-bit words); the upper byte of the first word identifies
//! the command. Field extraction for every opcode lives here so the
//! encodings stay centralized and testable instead of being scattered as
//! ad hoc shifts across the handlers.

// ─── Geometry/RSP opcodes ───

pub const G_NOOP: u8 = 0x00;
pub const G_VTX: u8 = 0x01; // Load Vertices
pub const G_TRI1: u8 = 0x05; // Draw 1 Triangle
pub const G_TRI2: u8 = 0x06; // Draw 2 Triangles
pub const G_TEXTURE: u8 = 0xD7; // Set Texture scale
pub const G_POPMTX: u8 = 0xD8; // Pop Matrix Stack
pub const G_GEOMETRYMODE: u8 = 0xD9; // Set/Clear Geometry Mode flags
pub const G_MTX: u8 = 0xDA; // Load Matrix
pub const G_MOVEWORD: u8 = 0xDB; // Move Word to microcode memory
pub const G_MOVEMEM: u8 = 0xDC; // Move Memory block
pub const G_DL: u8 = 0xDE; // Branch/Call Display List
pub const G_ENDDL: u8 = 0xDF; // End Display List
pub const G_RDPHALF_1: u8 = 0xE1; // Rasterizer half word 1 (texrect coords)
pub const G_RDPHALF_2: u8 = 0xF1; // Rasterizer half word 2 (triggers texrect)

// ─── Rasterizer-state opcodes (passed through to the RDP) ───

pub const G_SETCIMG: u8 = 0xFF; // Set Color Image (framebuffer)
pub const G_SETZIMG: u8 = 0xFE; // Set Z Image (depth buffer)
pub const G_SETTIMG: u8 = 0xFD; // Set Texture Image source
pub const G_SETCOMBINE: u8 = 0xFC; // Set Color Combiner mode
pub const G_SETENVCOLOR: u8 = 0xFB;
pub const G_SETPRIMCOLOR: u8 = 0xFA;
pub const G_SETBLENDCOLOR: u8 = 0xF9;
pub const G_SETFOGCOLOR: u8 = 0xF8;
pub const G_SETFILLCOLOR: u8 = 0xF7;
pub const G_FILLRECT: u8 = 0xF6;
pub const G_SETTILE: u8 = 0xF5;
pub const G_LOADTILE: u8 = 0xF4;
pub const G_LOADBLOCK: u8 = 0xF3;
pub const G_SETTILESIZE: u8 = 0xF2;
pub const G_SETSCISSOR: u8 = 0xED;
pub const G_RDPFULLSYNC: u8 = 0xE9;
pub const G_RDPTILESYNC: u8 = 0xE8;
pub const G_RDPPIPESYNC: u8 = 0xE7;
pub const G_RDPLOADSYNC: u8 = 0xE6;
pub const G_TEXRECT: u8 = 0xE4;
pub const G_SETOTHERMODE_H: u8 = 0xE3;
pub const G_SETOTHERMODE_L: u8 = 0xE2;

// ─── Geometry mode bits ───

pub const G_ZBUFFER: u32 = 1 << 0;
pub const G_CULL_FRONT: u32 = 1 << 9;
pub const G_CULL_BACK: u32 = 1 << 10;
pub const G_FOG: u32 = 1 << 16;
pub const G_LIGHTING: u32 = 1 << 17;
pub const G_TEXTURE_GEN: u32 = 1 << 18;

// ─── Other-mode bits ───

/// Texture filter field of other-mode-high (2 bits at shift 12).
pub const G_MDSFT_TEXTFILT: u32 = 12;
pub const G_TF_POINT: u32 = 0;
/// Cycle type field of other-mode-high (2 bits at shift 20).
pub const G_MDSFT_CYCLETYPE: u32 = 20;
pub const G_CYC_COPY: u32 = 2 << G_MDSFT_CYCLETYPE;
/// Z mode field of other-mode-low; both bits set = decal surface.
pub const ZMODE_DEC: u32 = 3 << 10;
/// Blender "source alpha from memory" bit in other-mode-low. Polygons
/// drawn with this blend mode are opaque regardless of vertex alpha.
pub const BLEND_A_MEM: u32 = 1 << 18;

// ─── Moveword indices ───

pub const G_MW_NUMLIGHT: u8 = 0x02;
pub const G_MW_CLIP: u8 = 0x04;
pub const G_MW_FOG: u8 = 0x08;
pub const G_MW_PERSPNORM: u8 = 0x0E;

// ─── Movemem indices ───

pub const G_MV_VIEWPORT: u8 = 0x08;
pub const G_MV_LIGHT: u8 = 0x0A;

// ─── Texture image formats and bit widths ───

pub const G_IM_FMT_RGBA: u8 = 0;
pub const G_IM_FMT_IA: u8 = 3;
pub const G_IM_SIZ_4B: u8 = 0;
pub const G_IM_SIZ_16B: u8 = 2;

// ─── Tile indices and clamp/mirror flags ───

pub const G_TX_RENDERTILE: u32 = 0;
pub const G_TX_LOADTILE: u32 = 7;
pub const G_TX_MIRROR: u8 = 1;
pub const G_TX_CLAMP: u8 = 2;

// ─── Matrix parameters ───

pub const G_MTX_PUSH: u32 = 0x01;
pub const G_MTX_LOAD: u32 = 0x02;
pub const G_MTX_PROJECTION: u32 = 0x04;

// ─── Color combiner operands ───

pub const G_CCMUX_TEXEL0: u8 = 1;
pub const G_CCMUX_PRIMITIVE: u8 = 3;
pub const G_CCMUX_SHADE: u8 = 4;
pub const G_CCMUX_ENVIRONMENT: u8 = 5;
pub const G_ACMUX_ENVIRONMENT: u8 = 5;

/// Opcode byte of a command word pair.
#[inline]
pub fn opcode(w0: u32) -> u8 {
    (w0 >> 24) as u8
}

/// G_VTX: `w0 = [01][count:8 << 12][end*2:8]`, `w1 = address`.
/// `end` is the slot one past the last written vertex.
pub struct VtxCmd {
    pub count: usize,
    pub end: usize,
    pub addr: u32,
}

pub fn decode_vtx(w0: u32, w1: u32) -> VtxCmd {
    VtxCmd {
        count: ((w0 >> 12) & 0xFF) as usize,
        end: (((w0 >> 0) & 0xFF) >> 1) as usize,
        addr: w1,
    }
}

/// G_TRI1: three vertex slot indices packed as `index * 2` bytes in w0.
pub fn decode_tri1(w0: u32) -> [usize; 3] {
    [
        (((w0 >> 16) & 0xFF) >> 1) as usize,
        (((w0 >> 8) & 0xFF) >> 1) as usize,
        (((w0 >> 0) & 0xFF) >> 1) as usize,
    ]
}

/// G_TRI2: six indices, three per word.
pub fn decode_tri2(w0: u32, w1: u32) -> [usize; 6] {
    let a = decode_tri1(w0);
    let b = decode_tri1(w1);
    [a[0], a[1], a[2], b[0], b[1], b[2]]
}

/// G_SETOTHERMODE_L / _H: `w0 = [op][00][shift:8][bits-1:8]`, `w1 = data`.
/// Returns the mask of affected bits and the new bits, pre-masked.
pub struct OtherModePatch {
    pub mask: u32,
    pub bits: u32,
}

pub fn decode_othermode(w0: u32, w1: u32) -> OtherModePatch {
    let bits = ((w0 >> 0) & 0xFF) + 1;
    let shift = 32 - ((w0 >> 8) & 0xFF) - bits;
    let mask = (((1u64 << bits) - 1) as u32) << shift;
    OtherModePatch {
        mask,
        bits: w1 & mask,
    }
}

/// G_GEOMETRYMODE: `w0` carries the keep-mask (complement of cleared
/// bits), `w1` the bits to set.
pub struct GeometryModeCmd {
    pub keep_mask: u32,
    pub set_bits: u32,
}

pub fn decode_geometry_mode(w0: u32, w1: u32) -> GeometryModeCmd {
    GeometryModeCmd {
        keep_mask: w0,
        set_bits: w1,
    }
}

/// G_MTX parameter byte. The push flag is stored inverted in the stream.
pub struct MtxCmd {
    pub params: u32,
    pub addr: u32,
}

pub fn decode_mtx(w0: u32, w1: u32) -> MtxCmd {
    MtxCmd {
        params: (w0 & 0xFF) ^ G_MTX_PUSH,
        addr: w1,
    }
}

/// G_SETCOMBINE operand fields of the `(A - B) * C + D` formula. Only the
/// operands the emulation inspects are extracted.
pub struct CombineCmd {
    pub a_color: u8,
    pub b_color: u8,
    pub c_color: u8,
    pub d_color: u8,
    pub c_alpha: u8,
    pub d_alpha: u8,
}

pub fn decode_combine(w0: u32, w1: u32) -> CombineCmd {
    CombineCmd {
        a_color: ((w0 >> 20) & 0x0F) as u8,
        b_color: ((w1 >> 28) & 0x0F) as u8,
        c_color: ((w0 >> 15) & 0x1F) as u8,
        d_color: ((w1 >> 15) & 0x07) as u8,
        c_alpha: ((w0 >> 9) & 0x07) as u8,
        d_alpha: ((w1 >> 9) & 0x07) as u8,
    }
}

/// G_SETTIMG / G_SETTILE format fields.
pub struct ImageFormat {
    pub format: u8,
    pub bit_width: u8,
}

pub fn decode_image_format(w0: u32) -> ImageFormat {
    ImageFormat {
        format: ((w0 >> 21) & 0x07) as u8,
        bit_width: ((w0 >> 19) & 0x03) as u8,
    }
}

/// G_SETTILE: format latch plus clamp/mirror flags for both axes.
pub struct TileCmd {
    pub tile: u32,
    pub format: u8,
    pub bit_width: u8,
    pub row_size: u16,
    pub cm_s: u8,
    pub cm_t: u8,
}

pub fn decode_tile(w0: u32, w1: u32) -> TileCmd {
    TileCmd {
        tile: (w1 >> 24) & 0x07,
        format: ((w0 >> 21) & 0x07) as u8,
        bit_width: ((w0 >> 19) & 0x03) as u8,
        row_size: ((w0 >> 9) & 0x1FF) as u16,
        cm_s: ((w1 >> 8) & 0x03) as u8,
        cm_t: ((w1 >> 18) & 0x03) as u8,
    }
}

/// G_LOADBLOCK: tile index and texel count (stored minus one).
pub struct LoadBlockCmd {
    pub tile: u32,
    pub texels: u16,
}

pub fn decode_load_block(w1: u32) -> LoadBlockCmd {
    LoadBlockCmd {
        tile: (w1 >> 24) & 0x07,
        texels: (((w1 >> 12) & 0xFFF) + 1) as u16,
    }
}

/// Rectangle corners in 10.2 screen coordinates. G_TEXRECT and G_FILLRECT
/// put the lower-right corner in w0 and the upper-left in w1.
pub struct RectCmd {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

pub fn decode_rect(w0: u32, w1: u32) -> RectCmd {
    RectCmd {
        x1: ((w1 >> 12) & 0xFFF) as i32,
        y1: ((w1 >> 0) & 0xFFF) as i32,
        x2: ((w0 >> 12) & 0xFFF) as i32,
        y2: ((w0 >> 0) & 0xFFF) as i32,
    }
}

/// RGBA bytes of a set-color word.
pub fn decode_color(w1: u32) -> [u8; 4] {
    w1.to_be_bytes()
}

/// G_MW_FOG payload: signed multiplier and offset halves.
pub struct FogCmd {
    pub mul: i16,
    pub ofs: i16,
}

pub fn decode_fog(w1: u32) -> FogCmd {
    FogCmd {
        mul: (w1 >> 16) as i16,
        ofs: (w1 >> 0) as i16,
    }
}

/// G_DL: branch flag distinguishes a tail jump from a call with return.
pub struct DlCmd {
    pub branch: bool,
    pub addr: u32,
}

pub fn decode_dl(w0: u32, w1: u32) -> DlCmd {
    DlCmd {
        branch: w0 & (1 << 16) != 0,
        addr: w1,
    }
}

/// Look up a human-readable name for an opcode (diagnostics only).
pub fn opcode_name(cmd: u8) -> &'static str {
    match cmd {
        G_NOOP => "G_NOOP",
        G_VTX => "G_VTX",
        G_TRI1 => "G_TRI1",
        G_TRI2 => "G_TRI2",
        G_TEXTURE => "G_TEXTURE",
        G_POPMTX => "G_POPMTX",
        G_GEOMETRYMODE => "G_GEOMETRYMODE",
        G_MTX => "G_MTX",
        G_MOVEWORD => "G_MOVEWORD",
        G_MOVEMEM => "G_MOVEMEM",
        G_DL => "G_DL",
        G_ENDDL => "G_ENDDL",
        G_RDPHALF_1 => "G_RDPHALF_1",
        G_RDPHALF_2 => "G_RDPHALF_2",
        G_SETOTHERMODE_L => "G_SETOTHERMODE_L",
        G_SETOTHERMODE_H => "G_SETOTHERMODE_H",
        G_TEXRECT => "G_TEXRECT",
        G_RDPLOADSYNC => "G_RDPLOADSYNC",
        G_RDPPIPESYNC => "G_RDPPIPESYNC",
        G_RDPTILESYNC => "G_RDPTILESYNC",
        G_RDPFULLSYNC => "G_RDPFULLSYNC",
        G_SETSCISSOR => "G_SETSCISSOR",
        G_SETTILESIZE => "G_SETTILESIZE",
        G_LOADBLOCK => "G_LOADBLOCK",
        G_LOADTILE => "G_LOADTILE",
        G_SETTILE => "G_SETTILE",
        G_FILLRECT => "G_FILLRECT",
        G_SETFILLCOLOR => "G_SETFILLCOLOR",
        G_SETFOGCOLOR => "G_SETFOGCOLOR",
        G_SETBLENDCOLOR => "G_SETBLENDCOLOR",
        G_SETPRIMCOLOR => "G_SETPRIMCOLOR",
        G_SETENVCOLOR => "G_SETENVCOLOR",
        G_SETCOMBINE => "G_SETCOMBINE",
        G_SETTIMG => "G_SETTIMG",
        G_SETZIMG => "G_SETZIMG",
        G_SETCIMG => "G_SETCIMG",
        _ => "???",
    }
}
