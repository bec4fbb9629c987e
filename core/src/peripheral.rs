use std::io::Write;

use crate::machine::Machine;

/// Lower bound (inclusive) of the USI register window used by [`UsiShiftOut`].
const USI_WINDOW_LO: u16 = 0x0D;
/// Upper bound (inclusive) of the USI register window.
///
/// The reference implementation this simulator is modeled on guards with
/// `address <= 0x10 || address >= 0x0D`, which is tautologically true for every
/// address. The intended guard is the range below.
const USI_WINDOW_HI: u16 = 0x10;

/// Observer hooks around data-memory accesses and cycle boundaries (§6, §9).
///
/// All methods default to doing nothing, so an observer only needs to override the
/// hooks it cares about. Hooks run synchronously on the cycle driver's call stack and
/// must not suspend (§5).
pub trait Peripheral {
    /// Called before an I/O-range `data_get`, with the raw I/O address (i.e. the
    /// unified data-memory address minus 32 — `Memory`'s I/O bank base), matching the
    /// datasheet's I/O-address-space numbering.
    fn pre_get(&mut self, _addr: u16) {}
    /// Called after an I/O-range `data_get`, with the value that was read.
    fn post_get(&mut self, _addr: u16, _value: u8) {}
    /// Called before an I/O-range `data_set`, with the value about to be written.
    fn pre_set(&mut self, _addr: u16, _value: u8) {}
    /// Called after an I/O-range `data_set`.
    fn post_set(&mut self, _addr: u16, _value: u8) {}
    /// Called at the start of every cycle, before fetch.
    fn pre_tick(&mut self, _machine: &Machine) {}
    /// Called at the end of every cycle.
    fn post_tick(&mut self, _machine: &Machine) {}
}

/// A [`Peripheral`] that does nothing; the default when no observer is registered.
pub struct NullPeripheral;

impl Peripheral for NullPeripheral {}

/// Reference peripheral: models a USI configured for shift-out. Watches writes to the
/// USI register window and, after every eight observed clock pulses, emits the
/// accumulated byte to stdout as a character.
///
/// State (bit counter, shift buffer) lives on this instance, not as process-wide
/// globals (§9) — a second `UsiShiftOut` would track its own count independently.
#[derive(Default)]
pub struct UsiShiftOut {
    shift_register: u8,
    bit_count: u8,
}

impl UsiShiftOut {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_window(addr: u16) -> bool {
        (USI_WINDOW_LO..=USI_WINDOW_HI).contains(&addr)
    }
}

impl Peripheral for UsiShiftOut {
    fn post_set(&mut self, addr: u16, value: u8) {
        if !Self::in_window(addr) {
            return;
        }

        self.shift_register = value;
        self.bit_count += 1;

        if self.bit_count >= 8 {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(&[self.shift_register]);
            let _ = stdout.flush();
            self.bit_count = 0;
        }
    }
}
