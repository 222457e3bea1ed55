//! Port-mapped I/O used by `IN` and `OUT`.

use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;

type Reader = Box<dyn FnMut() -> u8>;
type Writer = Box<dyn FnMut(u8)>;

/// Handlers for the 256 input and 256 output ports.
///
/// A port with no handler is not wired to anything; accessing it is an execution error.
#[derive(Default)]
pub struct IoBus {
    readers: FxHashMap<u8, Reader>,
    writers: FxHashMap<u8, Writer>,
}

impl IoBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any earlier reader for `port`.
    pub fn register_reader(&mut self, port: u8, reader: impl FnMut() -> u8 + 'static) {
        self.readers.insert(port, Box::new(reader));
    }

    /// Replaces any earlier writer for `port`.
    pub fn register_writer(&mut self, port: u8, writer: impl FnMut(u8) + 'static) {
        self.writers.insert(port, Box::new(writer));
    }

    /// `None` if nothing answers on `port`.
    pub fn read(&mut self, port: u8) -> Option<u8> {
        self.readers.get_mut(&port).map(|reader| reader())
    }

    /// `false` if nothing listens on `port`.
    pub fn write(&mut self, port: u8, value: u8) -> bool {
        match self.writers.get_mut(&port) {
            Some(writer) => {
                writer(value);
                true
            }
            None => false,
        }
    }
}

/// Dedicated bit-shift register found in 8080 arcade boards.
///
/// The CPU writes bytes into a 16-bit window and reads back 8 bits at a chosen offset,
/// which saves the cost of multi-bit shifts in software.
#[derive(Clone, Copy, Default, Debug)]
pub struct Shifter {
    value: u16,
    offset: u8,
}

impl Shifter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the low 3 bits are used.
    pub fn set_offset(&mut self, offset: u8) {
        self.offset = offset & 0b111;
    }

    /// Shift a new byte into the top of the window.
    pub fn push(&mut self, value: u8) {
        self.value = (self.value >> 8) | ((value as u16) << 8);
    }

    pub fn result(&self) -> u8 {
        (self.value >> (8 - self.offset)) as u8
    }

    /// Wire the shifter onto `bus` using the given ports.
    pub fn attach(self, bus: &mut IoBus, offset_port: u8, data_port: u8, result_port: u8) {
        let shifter = Rc::new(RefCell::new(self));

        let dev = shifter.clone();
        bus.register_writer(offset_port, move |value| dev.borrow_mut().set_offset(value));
        let dev = shifter.clone();
        bus.register_writer(data_port, move |value| dev.borrow_mut().push(value));
        bus.register_reader(result_port, move || shifter.borrow().result());
    }
}
