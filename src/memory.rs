//! Flat 64KB address space with optional memory-mapped peripherals.

use std::fmt;
use std::ops::RangeInclusive;

/// The 8080 can address 64KB of memory.
pub const MEMORY_SIZE: usize = 0x10000;

/// Peripheral mapped over a range of addresses.
///
/// Addresses passed to the device are offsets from the start of its range, so the same
/// device can be mapped anywhere. Handlers must return promptly and must not call back
/// into the CPU.
pub trait Device {
    fn read(&self, offset: u16) -> u8;
    fn write(&mut self, offset: u16, value: u8);
}

/// Error returned when a device cannot be mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Range overlaps one that is already mapped.
    Overlap {
        new: RangeInclusive<u16>,
        existing: RangeInclusive<u16>,
    },
}

impl std::error::Error for MapError {}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Overlap { new, existing } => write!(
                f,
                "device range 0x{:04X}-0x{:04X} overlaps mapped range 0x{:04X}-0x{:04X}",
                new.start(),
                new.end(),
                existing.start(),
                existing.end()
            ),
        }
    }
}

struct Mapping {
    range: RangeInclusive<u16>,
    device: Box<dyn Device>,
}

/// Byte-addressable memory. Every address is valid; 16-bit accesses are little-endian and
/// wrap from `0xFFFF` to `0x0000`.
pub struct Memory {
    data: Box<[u8; MEMORY_SIZE]>,
    devices: Vec<Mapping>,
}

impl Memory {
    pub fn new() -> Self {
        let data: Box<[u8; MEMORY_SIZE]> = vec![0u8; MEMORY_SIZE]
            .into_boxed_slice()
            .try_into()
            .unwrap_or_else(|_| unreachable!("buffer has exactly MEMORY_SIZE bytes"));
        Memory {
            data,
            devices: Vec::new(),
        }
    }

    /// Create memory holding `image` from address 0.
    pub fn with_image(image: &[u8]) -> Self {
        let mut mem = Memory::new();
        mem.load(0, image);
        mem
    }

    /// Copy `bytes` into plain storage starting at `addr`, wrapping at the top of memory.
    ///
    /// Mapped devices are bypassed; this is how images are placed before a run.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            let addr = addr.wrapping_add(i as u16);
            self.data[addr as usize] = *byte;
        }
    }

    /// Route accesses to `range` through `device` instead of plain storage.
    pub fn map_device(
        &mut self,
        range: RangeInclusive<u16>,
        device: Box<dyn Device>,
    ) -> Result<(), MapError> {
        for mapping in &self.devices {
            let existing = &mapping.range;
            if range.start() <= existing.end() && existing.start() <= range.end() {
                return Err(MapError::Overlap {
                    new: range,
                    existing: existing.clone(),
                });
            }
        }
        self.devices.push(Mapping { range, device });
        Ok(())
    }

    fn device(&self, addr: u16) -> Option<(&dyn Device, u16)> {
        for mapping in &self.devices {
            if mapping.range.contains(&addr) {
                return Some((mapping.device.as_ref(), addr - mapping.range.start()));
            }
        }
        None
    }

    fn device_mut(&mut self, addr: u16) -> Option<(&mut dyn Device, u16)> {
        for mapping in &mut self.devices {
            if mapping.range.contains(&addr) {
                let offset = addr - mapping.range.start();
                return Some((mapping.device.as_mut(), offset));
            }
        }
        None
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match self.device(addr) {
            Some((device, offset)) => device.read(offset),
            None => self.data[addr as usize],
        }
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        match self.device_mut(addr) {
            Some((device, offset)) => device.write(offset, value),
            None => self.data[addr as usize] = value,
        }
    }

    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr);
        let hi = self.read_byte(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    pub fn write_word(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(addr, lo);
        self.write_byte(addr.wrapping_add(1), hi);
    }

    /// Plain storage, ignoring mapped devices.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Records writes and answers reads with the offset.
    struct Probe {
        writes: Rc<RefCell<Vec<(u16, u8)>>>,
    }

    impl Device for Probe {
        fn read(&self, offset: u16) -> u8 {
            offset as u8
        }

        fn write(&mut self, offset: u16, value: u8) {
            self.writes.borrow_mut().push((offset, value));
        }
    }

    #[test]
    fn word_access_is_little_endian() {
        let mut mem = Memory::new();
        mem.write_word(0x1000, 0xBEEF);
        assert_eq!(mem.read_byte(0x1000), 0xEF);
        assert_eq!(mem.read_byte(0x1001), 0xBE);
        assert_eq!(mem.read_word(0x1000), 0xBEEF);
    }

    #[test]
    fn word_access_wraps() {
        let mut mem = Memory::new();
        mem.write_word(0xFFFF, 0x1234);
        assert_eq!(mem.read_byte(0xFFFF), 0x34);
        assert_eq!(mem.read_byte(0x0000), 0x12);
        assert_eq!(mem.read_word(0xFFFF), 0x1234);
    }

    #[test]
    fn load_places_image() {
        let mem = Memory::with_image(&[0x3E, 0x01, 0x76]);
        assert_eq!(&mem.as_slice()[..3], &[0x3E, 0x01, 0x76]);
        assert_eq!(mem.read_byte(3), 0x00);
    }

    #[test]
    fn device_takes_precedence() {
        let writes = Rc::new(RefCell::new(Vec::new()));
        let mut mem = Memory::new();
        mem.write_byte(0x2401, 0x55);
        mem.map_device(
            0x2400..=0x3FFF,
            Box::new(Probe {
                writes: writes.clone(),
            }),
        )
        .unwrap();

        assert_eq!(mem.read_byte(0x2401), 0x01);
        mem.write_byte(0x2410, 0xAA);
        assert_eq!(*writes.borrow(), vec![(0x10, 0xAA)]);
        // Storage under the device is untouched
        assert_eq!(mem.as_slice()[0x2410], 0x00);
        // Outside the range plain storage is used
        mem.write_byte(0x4000, 0x77);
        assert_eq!(mem.read_byte(0x4000), 0x77);
    }

    #[test]
    fn overlapping_devices_rejected() {
        let writes = Rc::new(RefCell::new(Vec::new()));
        let mut mem = Memory::new();
        mem.map_device(0x1000..=0x1FFF, Box::new(Probe { writes: writes.clone() }))
            .unwrap();
        let err = mem
            .map_device(0x1FFF..=0x2FFF, Box::new(Probe { writes }))
            .unwrap_err();
        assert_eq!(
            err,
            MapError::Overlap {
                new: 0x1FFF..=0x2FFF,
                existing: 0x1000..=0x1FFF
            }
        );
    }
}
