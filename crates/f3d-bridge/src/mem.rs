//! Big-endian reads from source memory. Out-of-range reads return zero;
//! authored content never depends on them, but a corrupt list pointer must
//! not take the process down.

pub fn read_u32(mem: &[u8], addr: u32) -> u32 {
    let i = addr as usize;
    if i + 4 > mem.len() {
        return 0;
    }
    u32::from_be_bytes([mem[i], mem[i + 1], mem[i + 2], mem[i + 3]])
}

pub fn read_u16(mem: &[u8], addr: u32) -> u16 {
    let i = addr as usize;
    if i + 2 > mem.len() {
        return 0;
    }
    u16::from_be_bytes([mem[i], mem[i + 1]])
}

pub fn read_i16(mem: &[u8], addr: u32) -> i16 {
    read_u16(mem, addr) as i16
}

pub fn read_u8(mem: &[u8], addr: u32) -> u8 {
    mem.get(addr as usize).copied().unwrap_or(0)
}

pub fn read_i8(mem: &[u8], addr: u32) -> i8 {
    read_u8(mem, addr) as i8
}
