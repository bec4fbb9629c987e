//! Instruction semantics (§4.5). One executor per decoded [`Instr`] variant, operating
//! on the already-fetched-and-PC-advanced [`Machine`] (§4.4): every branch/jump offset
//! here is relative to `m.pc` *after* the fetch increment, matching real AVR timing.

use avrsim_opcodes::Instr;

use super::flags::{add_flags, logic_flags, sub_flags};
use crate::memory::{Sreg, PC_MASK};
use crate::peripheral::Peripheral;
use crate::Machine;

pub fn execute(instr: Instr, m: &mut Machine, peripheral: &mut dyn Peripheral) {
    match instr {
        Instr::Add { d, r } => {
            let (dv, rv) = (reg(m, d), reg(m, r));
            let result = dv.wrapping_add(rv);
            apply_arith_flags(m, add_flags(dv, rv, result));
            set_reg(m, d, result);
        }
        Instr::Adc { d, r } => {
            let (dv, rv) = (reg(m, d), reg(m, r));
            let carry_in = m.memory.sreg.c() as u8;
            let result = dv.wrapping_add(rv).wrapping_add(carry_in);
            apply_arith_flags(m, add_flags(dv, rv, result));
            set_reg(m, d, result);
        }
        Instr::Sub { d, r } => {
            let (dv, rv) = (reg(m, d), reg(m, r));
            let result = dv.wrapping_sub(rv);
            apply_arith_flags(m, sub_flags(dv, rv, result));
            set_reg(m, d, result);
        }
        Instr::Sbc { d, r } => {
            let (dv, rv) = (reg(m, d), reg(m, r));
            let borrow_in = m.memory.sreg.c() as u8;
            let result = dv.wrapping_sub(rv).wrapping_sub(borrow_in);
            sticky_sub_flags(m, dv, rv, result);
            set_reg(m, d, result);
        }
        Instr::Subi { d, k } => {
            let dv = reg(m, d);
            let result = dv.wrapping_sub(k);
            apply_arith_flags(m, sub_flags(dv, k, result));
            set_reg(m, d, result);
        }
        Instr::Sbci { d, k } => {
            let dv = reg(m, d);
            let borrow_in = m.memory.sreg.c() as u8;
            let result = dv.wrapping_sub(k).wrapping_sub(borrow_in);
            sticky_sub_flags(m, dv, k, result);
            set_reg(m, d, result);
        }
        Instr::Cp { d, r } => {
            let (dv, rv) = (reg(m, d), reg(m, r));
            let result = dv.wrapping_sub(rv);
            apply_arith_flags(m, sub_flags(dv, rv, result));
        }
        Instr::Cpc { d, r } => {
            let (dv, rv) = (reg(m, d), reg(m, r));
            let borrow_in = m.memory.sreg.c() as u8;
            let result = dv.wrapping_sub(rv).wrapping_sub(borrow_in);
            sticky_sub_flags(m, dv, rv, result);
        }
        Instr::Cpi { d, k } => {
            let dv = reg(m, d);
            let result = dv.wrapping_sub(k);
            apply_arith_flags(m, sub_flags(dv, k, result));
        }
        Instr::And { d, r } => {
            let result = reg(m, d) & reg(m, r);
            apply_logic_flags(m, result);
            set_reg(m, d, result);
        }
        Instr::Andi { d, k } => {
            let result = reg(m, d) & k;
            apply_logic_flags(m, result);
            set_reg(m, d, result);
        }
        Instr::Or { d, r } => {
            let result = reg(m, d) | reg(m, r);
            apply_logic_flags(m, result);
            set_reg(m, d, result);
        }
        Instr::Ori { d, k } => {
            let result = reg(m, d) | k;
            apply_logic_flags(m, result);
            set_reg(m, d, result);
        }
        Instr::Eor { d, r } => {
            let result = reg(m, d) ^ reg(m, r);
            apply_logic_flags(m, result);
            set_reg(m, d, result);
        }
        Instr::Com { d } => {
            let result = !reg(m, d);
            apply_logic_flags(m, result);
            m.memory.sreg.set_c(true);
            set_reg(m, d, result);
        }
        Instr::Neg { d } => {
            let dv = reg(m, d);
            let result = 0u8.wrapping_sub(dv);
            apply_arith_flags(m, sub_flags(0, dv, result));
            set_reg(m, d, result);
        }
        Instr::Swap { d } => {
            let dv = reg(m, d);
            set_reg(m, d, (dv << 4) | (dv >> 4));
        }
        Instr::Inc { d } => {
            let dv = reg(m, d);
            let result = dv.wrapping_add(1);
            let v = dv == 0x7F;
            apply_incdec_flags(m, result, v);
            set_reg(m, d, result);
        }
        Instr::Dec { d } => {
            let dv = reg(m, d);
            let result = dv.wrapping_sub(1);
            let v = dv == 0x80;
            apply_incdec_flags(m, result, v);
            set_reg(m, d, result);
        }
        Instr::Asr { d } => {
            let dv = reg(m, d);
            let result = (dv >> 1) | (dv & 0x80);
            let c = dv & 1 != 0;
            apply_shift_flags(m, result, c);
            set_reg(m, d, result);
        }
        Instr::Lsr { d } => {
            let dv = reg(m, d);
            let result = dv >> 1;
            let c = dv & 1 != 0;
            apply_shift_flags(m, result, c);
            set_reg(m, d, result);
        }
        Instr::Ror { d } => {
            let dv = reg(m, d);
            let carry_in = m.memory.sreg.c() as u8;
            let result = (dv >> 1) | (carry_in << 7);
            let c = dv & 1 != 0;
            apply_shift_flags(m, result, c);
            set_reg(m, d, result);
        }
        Instr::Mov { d, r } => set_reg(m, d, reg(m, r)),
        Instr::Movw { d, r } => {
            m.memory.regs[d as usize] = m.memory.regs[r as usize];
            m.memory.regs[d as usize + 1] = m.memory.regs[r as usize + 1];
        }
        Instr::Ldi { d, k } => set_reg(m, d, k),

        Instr::Bset { s } => set_sreg_bit(m, s, true),
        Instr::Bclr { s } => set_sreg_bit(m, s, false),
        Instr::Bld { d, b } => {
            let t = m.memory.sreg.t();
            let dv = reg(m, d);
            let result = if t { dv | (1 << b) } else { dv & !(1 << b) };
            set_reg(m, d, result);
        }
        Instr::Bst { d, b } => {
            let bit = (reg(m, d) >> b) & 1 != 0;
            m.memory.sreg.set_t(bit);
        }

        Instr::Brbs { k, s } => {
            if (m.memory.sreg.0 >> s) & 1 != 0 {
                branch(m, k);
            }
        }
        Instr::Brbc { k, s } => {
            if (m.memory.sreg.0 >> s) & 1 == 0 {
                branch(m, k);
            }
        }
        Instr::Rjmp { k } => m.pc = m.pc.wrapping_add(k as u16) & PC_MASK,
        Instr::Rcall { k } => {
            m.memory.push16(m.pc, peripheral);
            m.pc = m.pc.wrapping_add(k as u16) & PC_MASK;
        }
        Instr::Ret => m.pc = m.memory.pop16(peripheral) & PC_MASK,
        Instr::Reti => {
            m.pc = m.memory.pop16(peripheral) & PC_MASK;
            m.memory.sreg.set_i(true);
        }
        Instr::Ijmp => m.pc = z(m) & PC_MASK,
        Instr::Icall => {
            m.memory.push16(m.pc, peripheral);
            m.pc = z(m) & PC_MASK;
        }

        Instr::Cpse { d, r } => {
            if reg(m, d) == reg(m, r) {
                m.skip = true;
            }
        }
        Instr::Sbrc { d, b } => {
            if (reg(m, d) >> b) & 1 == 0 {
                m.skip = true;
            }
        }
        Instr::Sbrs { d, b } => {
            if (reg(m, d) >> b) & 1 != 0 {
                m.skip = true;
            }
        }
        Instr::Sbic { a, b } => {
            let v = m.memory.data_get(io_addr(a), peripheral);
            if (v >> b) & 1 == 0 {
                m.skip = true;
            }
        }
        Instr::Sbis { a, b } => {
            let v = m.memory.data_get(io_addr(a), peripheral);
            if (v >> b) & 1 != 0 {
                m.skip = true;
            }
        }
        Instr::Sbi { a, b } => {
            let addr = io_addr(a);
            let v = m.memory.data_get(addr, peripheral) | (1 << b);
            m.memory.data_set(addr, v, peripheral);
        }
        Instr::Cbi { a, b } => {
            let addr = io_addr(a);
            let v = m.memory.data_get(addr, peripheral) & !(1 << b);
            m.memory.data_set(addr, v, peripheral);
        }
        Instr::In { d, a } => {
            let v = m.memory.data_get(io_addr(a), peripheral);
            set_reg(m, d, v);
        }
        Instr::Out { r, a } => {
            let v = reg(m, r);
            m.memory.data_set(io_addr(a), v, peripheral);
        }

        Instr::LdX { d } => {
            let v = m.memory.data_get(x(m), peripheral);
            set_reg(m, d, v);
        }
        Instr::LdXInc { d } => {
            let addr = x(m);
            let v = m.memory.data_get(addr, peripheral);
            set_x(m, addr.wrapping_add(1));
            set_reg(m, d, v);
        }
        Instr::LdXDec { d } => {
            let addr = x(m).wrapping_sub(1);
            set_x(m, addr);
            let v = m.memory.data_get(addr, peripheral);
            set_reg(m, d, v);
        }
        Instr::LdY { d } => {
            let v = m.memory.data_get(y(m), peripheral);
            set_reg(m, d, v);
        }
        Instr::LdYInc { d } => {
            let addr = y(m);
            let v = m.memory.data_get(addr, peripheral);
            set_y(m, addr.wrapping_add(1));
            set_reg(m, d, v);
        }
        Instr::LdYDec { d } => {
            let addr = y(m).wrapping_sub(1);
            set_y(m, addr);
            let v = m.memory.data_get(addr, peripheral);
            set_reg(m, d, v);
        }
        Instr::LdZ { d } => {
            let v = m.memory.data_get(z(m), peripheral);
            set_reg(m, d, v);
        }
        Instr::LdZInc { d } => {
            let addr = z(m);
            let v = m.memory.data_get(addr, peripheral);
            set_z(m, addr.wrapping_add(1));
            set_reg(m, d, v);
        }
        Instr::LdZDec { d } => {
            let addr = z(m).wrapping_sub(1);
            set_z(m, addr);
            let v = m.memory.data_get(addr, peripheral);
            set_reg(m, d, v);
        }
        Instr::LddY { d, q } => {
            let v = m.memory.data_get(y(m).wrapping_add(q as u16), peripheral);
            set_reg(m, d, v);
        }
        Instr::LddZ { d, q } => {
            let v = m.memory.data_get(z(m).wrapping_add(q as u16), peripheral);
            set_reg(m, d, v);
        }

        Instr::StX { r } => {
            let v = reg(m, r);
            m.memory.data_set(x(m), v, peripheral);
        }
        Instr::StXInc { r } => {
            let addr = x(m);
            let v = reg(m, r);
            m.memory.data_set(addr, v, peripheral);
            set_x(m, addr.wrapping_add(1));
        }
        Instr::StXDec { r } => {
            let addr = x(m).wrapping_sub(1);
            set_x(m, addr);
            let v = reg(m, r);
            m.memory.data_set(addr, v, peripheral);
        }
        Instr::StY { r } => {
            let v = reg(m, r);
            m.memory.data_set(y(m), v, peripheral);
        }
        Instr::StYInc { r } => {
            let addr = y(m);
            let v = reg(m, r);
            m.memory.data_set(addr, v, peripheral);
            set_y(m, addr.wrapping_add(1));
        }
        Instr::StYDec { r } => {
            let addr = y(m).wrapping_sub(1);
            set_y(m, addr);
            let v = reg(m, r);
            m.memory.data_set(addr, v, peripheral);
        }
        Instr::StZ { r } => {
            let v = reg(m, r);
            m.memory.data_set(z(m), v, peripheral);
        }
        Instr::StZInc { r } => {
            let addr = z(m);
            let v = reg(m, r);
            m.memory.data_set(addr, v, peripheral);
            set_z(m, addr.wrapping_add(1));
        }
        Instr::StZDec { r } => {
            let addr = z(m).wrapping_sub(1);
            set_z(m, addr);
            let v = reg(m, r);
            m.memory.data_set(addr, v, peripheral);
        }
        Instr::StdY { r, q } => {
            let v = reg(m, r);
            m.memory
                .data_set(y(m).wrapping_add(q as u16), v, peripheral);
        }
        Instr::StdZ { r, q } => {
            let v = reg(m, r);
            m.memory
                .data_set(z(m).wrapping_add(q as u16), v, peripheral);
        }

        Instr::Lds { d } => {
            let addr = m.memory.prog_word(m.pc);
            m.pc = m.pc.wrapping_add(1) & PC_MASK;
            let v = m.memory.data_get(addr, peripheral);
            set_reg(m, d, v);
        }
        Instr::Sts { r } => {
            let addr = m.memory.prog_word(m.pc);
            m.pc = m.pc.wrapping_add(1) & PC_MASK;
            let v = reg(m, r);
            m.memory.data_set(addr, v, peripheral);
        }

        Instr::Push { r } => {
            let v = reg(m, r);
            m.memory.push8(v, peripheral);
        }
        Instr::Pop { d } => {
            let v = m.memory.pop8(peripheral);
            set_reg(m, d, v);
        }

        Instr::Lpm { d } => {
            let v = m.memory.prog_byte(z(m));
            set_reg(m, d, v);
        }
        Instr::LpmInc { d } => {
            let addr = z(m);
            let v = m.memory.prog_byte(addr);
            set_z(m, addr.wrapping_add(1));
            set_reg(m, d, v);
        }

        Instr::Nop | Instr::Sleep | Instr::Wdr => {}
        Instr::Break => log::trace!("BREAK at {:#06X}", m.pc),
        Instr::Unknown { op } => log::warn!("unimplemented opcode {op:#06X} treated as no-op"),
    }
}

fn reg(m: &Machine, index: u8) -> u8 {
    m.memory.regs[index as usize]
}

fn set_reg(m: &mut Machine, index: u8, value: u8) {
    m.memory.regs[index as usize] = value;
}

fn x(m: &Machine) -> u16 {
    u16::from_le_bytes([m.memory.regs[26], m.memory.regs[27]])
}

fn set_x(m: &mut Machine, value: u16) {
    let [lo, hi] = value.to_le_bytes();
    m.memory.regs[26] = lo;
    m.memory.regs[27] = hi;
}

fn y(m: &Machine) -> u16 {
    u16::from_le_bytes([m.memory.regs[28], m.memory.regs[29]])
}

fn set_y(m: &mut Machine, value: u16) {
    let [lo, hi] = value.to_le_bytes();
    m.memory.regs[28] = lo;
    m.memory.regs[29] = hi;
}

fn z(m: &Machine) -> u16 {
    u16::from_le_bytes([m.memory.regs[30], m.memory.regs[31]])
}

fn set_z(m: &mut Machine, value: u16) {
    let [lo, hi] = value.to_le_bytes();
    m.memory.regs[30] = lo;
    m.memory.regs[31] = hi;
}

/// I/O address `a` (0..=63) maps into unified data memory at `a + 32` (§3.2).
fn io_addr(a: u8) -> u16 {
    a as u16 + 32
}

fn branch(m: &mut Machine, k: i8) {
    m.pc = m.pc.wrapping_add(k as i16 as u16) & PC_MASK;
}

fn set_sreg_bit(m: &mut Machine, s: u8, value: bool) {
    let mask = 1u8 << s;
    if value {
        m.memory.sreg.0 |= mask;
    } else {
        m.memory.sreg.0 &= !mask;
    }
}

/// Copy the arithmetic flags (H, S, V, N, Z, C) into the machine's SREG, leaving T and
/// I untouched — no instruction in this set derives T or I from an ALU result.
fn apply_arith_flags(m: &mut Machine, flags: Sreg) {
    m.memory.sreg.set_h(flags.h());
    m.memory.sreg.set_v(flags.v());
    m.memory.sreg.set_c(flags.c());
    m.memory.sreg.set_n(flags.n());
    m.memory.sreg.set_z(flags.z());
    m.memory.sreg.set_s(flags.s());
}

/// SBC/SBCI/CPC clear Z on a nonzero result but never *set* it purely from the result:
/// a zero result only keeps Z set if it was already set before the operation (§4.5).
fn sticky_sub_flags(m: &mut Machine, d: u8, r: u8, result: u8) {
    let flags = sub_flags(d, r, result);
    let prior_z = m.memory.sreg.z();
    apply_arith_flags(m, flags);
    m.memory.sreg.set_z((result == 0) && prior_z);
}

fn apply_logic_flags(m: &mut Machine, result: u8) {
    let (n, z, v, s) = logic_flags(result);
    m.memory.sreg.set_n(n);
    m.memory.sreg.set_z(z);
    m.memory.sreg.set_v(v);
    m.memory.sreg.set_s(s);
}

/// INC/DEC leave C untouched; V is the single case (0x7F->0x80 or 0x80->0x7F) supplied
/// by the caller, since it isn't derivable from the result alone here.
fn apply_incdec_flags(m: &mut Machine, result: u8, v: bool) {
    let n = result & 0x80 != 0;
    let z = result == 0;
    let s = n ^ v;
    m.memory.sreg.set_n(n);
    m.memory.sreg.set_z(z);
    m.memory.sreg.set_v(v);
    m.memory.sreg.set_s(s);
}

/// Shared tail for ASR/LSR/ROR: all three only differ in how `result` and the carry-out
/// `c` are produced, and agree on N/V/S/Z/C from there.
fn apply_shift_flags(m: &mut Machine, result: u8, c: bool) {
    let n = result & 0x80 != 0;
    let z = result == 0;
    let v = n ^ c;
    let s = n ^ v;
    m.memory.sreg.set_n(n);
    m.memory.sreg.set_z(z);
    m.memory.sreg.set_v(v);
    m.memory.sreg.set_c(c);
    m.memory.sreg.set_s(s);
}
