mod exec;
mod flags;

use avrsim_opcodes::{decode, Instr};
use thiserror::Error;

use crate::memory::{Memory, PC_MASK};
use crate::peripheral::{NullPeripheral, Peripheral};

/// Failure loading a program image (§7a). Short reads (§7b) are not an error — they
/// leave the remainder of FLASH zeroed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read program image: {0}")]
    Io(#[from] std::io::Error),
}

/// The full architectural state of a simulated core, plus the cycle driver that
/// advances it (§3.1, §4.4).
pub struct Machine {
    pub pc: u16,
    /// Latched by CPSE/SBRC/SBRS/SBIC/SBIS; suppresses the *next* cycle's semantic
    /// effects while still consuming its word(s) (§3.1).
    pub skip: bool,
    pub memory: Memory,
    pub peripheral: Box<dyn Peripheral>,
}

impl Machine {
    /// A zero-initialized machine with no peripheral observer attached (§3.4).
    pub fn new() -> Self {
        Self {
            pc: 0,
            skip: false,
            memory: Memory::new(),
            peripheral: Box::new(NullPeripheral),
        }
    }

    pub fn with_peripheral(peripheral: Box<dyn Peripheral>) -> Self {
        Self {
            peripheral,
            ..Self::new()
        }
    }

    /// Load a raw program image and reset PC/SKIP (§3.4).
    pub fn load(&mut self, bytes: &[u8]) {
        log::debug!(
            "loading {} byte program image ({} bytes of FLASH available)",
            bytes.len(),
            crate::memory::FLASH_SIZE
        );
        self.memory.load_program(bytes);
        self.pc = 0;
        self.skip = false;
    }

    /// Build a machine from a program image read from `path` (§6).
    ///
    /// Opens, reads, and drops the file within this call, so the handle is released
    /// on every exit path including a read failure (§5).
    pub fn from_image_file(path: &std::path::Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path)?;
        let mut machine = Self::new();
        machine.load(&bytes);
        Ok(machine)
    }

    /// Run one fetch/decode/execute cycle (§4.4).
    pub fn cycle(&mut self) {
        // Peripheral pre-tick. The observer only gets `&self` — it can inspect state
        // but not mutate it directly; state changes happen through the data-memory
        // hooks during execution.
        let mut peripheral = std::mem::replace(&mut self.peripheral, Box::new(NullPeripheral));
        peripheral.pre_tick(self);

        let op = self.memory.prog_word(self.pc);
        self.pc = (self.pc.wrapping_add(1)) & PC_MASK;

        if self.skip {
            self.skip = false;
            if is_two_word(op) {
                self.pc = (self.pc.wrapping_add(1)) & PC_MASK;
            }
        } else {
            let instr = decode(op);
            log::trace!("{:#06X}: {instr}", self.pc.wrapping_sub(1) & PC_MASK);
            exec::execute(instr, self, peripheral.as_mut());
        }

        peripheral.post_tick(self);
        self.peripheral = peripheral;
    }

    /// Run cycles until one leaves PC unchanged — the idiomatic halt on this
    /// architecture is `1: rjmp 1b` (§4.6).
    pub fn run_until_halt(&mut self) {
        loop {
            let last = self.pc;
            self.cycle();
            if self.pc == last {
                break;
            }
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

/// LDS/STS are the only two-word forms retained on this core (multi-word CALL/JMP are
/// out of scope, §1). A faithful SKIP must consume both words of a skipped two-word
/// instruction, not just the first (§9).
fn is_two_word(op: u16) -> bool {
    matches!(decode(op), Instr::Lds { .. } | Instr::Sts { .. })
}
