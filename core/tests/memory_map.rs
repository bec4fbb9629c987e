use avrsim::{Memory, NullPeripheral, Sreg};

#[test]
fn sreg_pack_unpack_round_trips_every_byte_value() {
    for raw in 0u16..=255 {
        let sreg = Sreg(raw as u8);
        assert_eq!(sreg.0, raw as u8);
    }
}

#[test]
fn data_set_then_data_get_round_trips_across_every_mapped_region() {
    let mut mem = Memory::new();
    let mut peripheral = NullPeripheral;

    // GP registers: 0x00..0x1F
    for addr in [0x00u16, 0x01, 0x1F] {
        mem.data_set(addr, 0x42, &mut peripheral);
        assert_eq!(mem.data_get(addr, &mut peripheral), 0x42);
    }

    // I/O registers: 0x20..0x5F, excluding SREG at 0x5F (special-cased below)
    for addr in [0x20u16, 0x3C, 0x5E] {
        mem.data_set(addr, 0x99, &mut peripheral);
        assert_eq!(mem.data_get(addr, &mut peripheral), 0x99);
    }

    // SRAM
    for addr in [0x60u16, 0x100, 0x25F] {
        mem.data_set(addr, 0x77, &mut peripheral);
        assert_eq!(mem.data_get(addr, &mut peripheral), 0x77);
    }
}

#[test]
fn sreg_address_reads_back_the_packed_flags() {
    let mut mem = Memory::new();
    let mut peripheral = NullPeripheral;

    mem.data_set(0x5F, 0b1010_0101, &mut peripheral);
    assert_eq!(mem.data_get(0x5F, &mut peripheral), 0b1010_0101);
    assert_eq!(mem.sreg.0, 0b1010_0101);
}

#[test]
fn stack_round_trip_restores_sp() {
    let mut mem = Memory::new();
    let mut peripheral = NullPeripheral;
    mem.set_sp(0x200);

    mem.push8(0xAB, &mut peripheral);
    assert_eq!(mem.pop8(&mut peripheral), 0xAB);
    assert_eq!(mem.sp(), 0x200);

    mem.push16(0xBEEF, &mut peripheral);
    assert_eq!(mem.pop16(&mut peripheral), 0xBEEF);
    assert_eq!(mem.sp(), 0x200);
}

#[test]
fn push16_is_big_endian_in_memory() {
    let mut mem = Memory::new();
    let mut peripheral = NullPeripheral;
    mem.set_sp(0x200);

    mem.push16(0x1234, &mut peripheral);

    // High byte at SP-1 (the lower address after the push), low byte at the
    // original SP.
    assert_eq!(mem.data_get(0x200, &mut peripheral), 0x34);
    assert_eq!(mem.data_get(0x1FF, &mut peripheral), 0x12);
    assert_eq!(mem.sp(), 0x1FE);
}

#[test]
fn prog_byte_is_little_endian_within_the_word() {
    let mut mem = Memory::new();
    mem.set_prog_word(0, 0x4433);
    assert_eq!(mem.prog_byte(0), 0x33);
    assert_eq!(mem.prog_byte(1), 0x44);
}
