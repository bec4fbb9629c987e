pub mod machine;
pub mod memory;
pub mod peripheral;

pub use machine::{LoadError, Machine};
pub use memory::{Memory, Sreg, EEPROM_SIZE, FLASH_SIZE, FLASH_WORDS, PC_MASK, SRAM_SIZE};
pub use peripheral::{NullPeripheral, Peripheral, UsiShiftOut};
