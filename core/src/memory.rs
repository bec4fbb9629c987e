use proc_bitfield::bitfield;

use crate::peripheral::Peripheral;

/// Total FLASH capacity in bytes, as on the ATtiny85.
pub const FLASH_SIZE: usize = 8 * 1024;

/// FLASH capacity in 16-bit words.
pub const FLASH_WORDS: usize = FLASH_SIZE / 2;

/// PC is word-addressed and masked to this many bits on every write (§3.1, §3.3).
pub const PC_MASK: u16 = (FLASH_WORDS - 1) as u16;

/// SRAM capacity in bytes, as on the ATtiny85.
pub const SRAM_SIZE: usize = 512;

/// EEPROM capacity in bytes, as on the ATtiny85.
pub const EEPROM_SIZE: usize = 512;

/// Number of general-purpose registers.
const GPR_COUNT: usize = 32;

/// Number of I/O registers in the unified data-memory overlay.
const IO_COUNT: usize = 64;

/// I/O offset (within the 64-register I/O bank) of the stack pointer's low byte.
const SP_LO: u16 = 0x3D;
/// I/O offset of the stack pointer's high byte.
const SP_HI: u16 = 0x3E;
/// I/O offset of the packed status register.
const SREG_OFFSET: u16 = 0x3F;

/// Byte offset of the I/O bank within the unified data-memory address space.
const IO_BASE: u16 = GPR_COUNT as u16;
/// Byte offset of SRAM within the unified data-memory address space.
const SRAM_BASE: u16 = IO_BASE + IO_COUNT as u16;

/// Total size of the unified data-memory address space. Every address handed to
/// `data_get`/`data_set` is first reduced modulo this (§3.2), which places it inside
/// one of the three mapped regions by construction.
const DATA_MEM_SIZE: u16 = SRAM_BASE + SRAM_SIZE as u16;

/// Debug-only early warning threshold for the stack pointer (§3.3, §7e). Not an
/// enforced invariant — just a warning below this point in debug builds.
const SP_LOW_WATER_MARK: u16 = GPR_COUNT as u16 + IO_COUNT as u16;

bitfield! {
    /// The packed status register, bit order I,T,H,S,V,N,Z,C from MSB to LSB (§3.3).
    #[derive(Clone, Copy, Eq, PartialEq)]
    pub struct Sreg(pub u8): Debug, FromRaw, IntoRaw, DerefRaw {
        /// Carry flag.
        pub c: bool @ 0,
        /// Zero flag.
        pub z: bool @ 1,
        /// Negative flag.
        pub n: bool @ 2,
        /// Two's-complement overflow flag.
        pub v: bool @ 3,
        /// Sign flag, N xor V.
        pub s: bool @ 4,
        /// Half-carry flag.
        pub h: bool @ 5,
        /// Transfer (bit-copy) flag used by BLD/BST.
        pub t: bool @ 6,
        /// Global interrupt enable. Storage only; this model never services
        /// interrupts.
        pub i: bool @ 7,
    }
}

impl Default for Sreg {
    fn default() -> Self {
        Self(0)
    }
}

/// The architectural memory state of the simulated core: FLASH, SRAM, EEPROM, general
/// registers, the I/O register file (including SP and the packed SREG), and the
/// unified data-memory view over the first three of those.
pub struct Memory {
    pub flash: Vec<u16>,
    pub sram: Vec<u8>,
    pub eeprom: Vec<u8>,
    pub regs: [u8; GPR_COUNT],
    pub io: [u8; IO_COUNT],
    pub sreg: Sreg,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            flash: vec![0; FLASH_WORDS],
            sram: vec![0; SRAM_SIZE],
            eeprom: vec![0; EEPROM_SIZE],
            regs: [0; GPR_COUNT],
            io: [0; IO_COUNT],
            sreg: Sreg::default(),
        }
    }

    /// Load a raw program image into FLASH, little-endian word packing (§3.4, §6).
    /// Excess bytes are ignored; missing bytes leave the remainder zeroed.
    pub fn load_program(&mut self, bytes: &[u8]) {
        for (i, word) in self.flash.iter_mut().enumerate() {
            let lo = bytes.get(2 * i).copied().unwrap_or(0);
            let hi = bytes.get(2 * i + 1).copied().unwrap_or(0);
            *word = u16::from_le_bytes([lo, hi]);
        }
    }

    pub fn prog_word(&self, addr: u16) -> u16 {
        self.flash[addr as usize % FLASH_WORDS]
    }

    pub fn set_prog_word(&mut self, addr: u16, value: u16) {
        let len = self.flash.len();
        self.flash[addr as usize % len] = value;
    }

    /// Byte access into FLASH; little-endian within the word (§3.3).
    pub fn prog_byte(&self, addr: u16) -> u8 {
        let word = self.prog_word(addr >> 1);
        (word >> (8 * (addr & 1))) as u8
    }

    /// Read from the unified data-memory map (§3.2), notifying `peripheral` around
    /// I/O-range accesses. The hooks receive the raw I/O address (i.e. `addr - 32`,
    /// matching the datasheet's I/O-address-space numbering), not the unified address.
    pub fn data_get(&mut self, addr: u16, peripheral: &mut dyn Peripheral) -> u8 {
        let addr = addr % DATA_MEM_SIZE;
        let is_io = (IO_BASE..SRAM_BASE).contains(&addr);
        let io_addr = addr.wrapping_sub(IO_BASE);

        if is_io {
            peripheral.pre_get(io_addr);
        }

        let value = if addr < IO_BASE {
            self.regs[addr as usize]
        } else if is_io {
            let offset = addr - IO_BASE;
            if offset == SREG_OFFSET {
                self.sreg.0
            } else {
                self.io[offset as usize]
            }
        } else {
            self.sram[(addr - SRAM_BASE) as usize]
        };

        if is_io {
            peripheral.post_get(io_addr, value);
        }

        value
    }

    /// Write to the unified data-memory map (§3.2), notifying `peripheral` around
    /// I/O-range accesses with the raw I/O address (see [`Memory::data_get`]). A write
    /// to the SREG address unpacks into individual flags.
    pub fn data_set(&mut self, addr: u16, value: u8, peripheral: &mut dyn Peripheral) {
        let addr = addr % DATA_MEM_SIZE;
        let is_io = (IO_BASE..SRAM_BASE).contains(&addr);
        let io_addr = addr.wrapping_sub(IO_BASE);

        if is_io {
            peripheral.pre_set(io_addr, value);
        }

        if addr < IO_BASE {
            self.regs[addr as usize] = value;
        } else if is_io {
            let offset = addr - IO_BASE;
            if offset == SREG_OFFSET {
                self.sreg = Sreg(value);
            } else {
                self.io[offset as usize] = value;
            }
        } else {
            self.sram[(addr - SRAM_BASE) as usize] = value;
        }

        if is_io {
            peripheral.post_set(io_addr, value);
        }
    }

    pub fn sp(&self) -> u16 {
        u16::from_le_bytes([self.io[SP_LO as usize], self.io[SP_HI as usize]])
    }

    pub fn set_sp(&mut self, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.io[SP_LO as usize] = lo;
        self.io[SP_HI as usize] = hi;

        if cfg!(debug_assertions) && value < SP_LOW_WATER_MARK {
            log::warn!("stack pointer {value:#06X} crossed the low-water mark");
        }
    }

    /// Stack grows downward. Byte push writes at `SP`, then decrements.
    pub fn push8(&mut self, value: u8, peripheral: &mut dyn Peripheral) {
        let sp = self.sp();
        self.data_set(sp, value, peripheral);
        self.set_sp(sp.wrapping_sub(1));
    }

    /// Inverse of `push8`: increments first, then reads.
    pub fn pop8(&mut self, peripheral: &mut dyn Peripheral) -> u8 {
        let sp = self.sp().wrapping_add(1);
        self.set_sp(sp);
        self.data_get(sp, peripheral)
    }

    /// 16-bit push is big-endian in memory: low byte at `SP`, high byte at `SP-1`,
    /// `SP -= 2` (§4.1). This is the inverse of `pop16` and must be preserved exactly
    /// for interoperability with compiled code.
    pub fn push16(&mut self, value: u16, peripheral: &mut dyn Peripheral) {
        let [lo, hi] = value.to_le_bytes();
        let sp = self.sp();
        self.data_set(sp, lo, peripheral);
        self.data_set(sp.wrapping_sub(1), hi, peripheral);
        self.set_sp(sp.wrapping_sub(2));
    }

    pub fn pop16(&mut self, peripheral: &mut dyn Peripheral) -> u16 {
        let sp = self.sp();
        let hi = self.data_get(sp.wrapping_add(1), peripheral);
        let lo = self.data_get(sp.wrapping_add(2), peripheral);
        self.set_sp(sp.wrapping_add(2));
        u16::from_le_bytes([lo, hi])
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
