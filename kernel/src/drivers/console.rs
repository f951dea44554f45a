//! Multi-console layer over the single physical VGA framebuffer.
//!
//! Exposes `putchar`/`clear`/`switch(n)` per spec §6. Twelve virtual
//! consoles are kept as offscreen [`vga::Snapshot`]s; only the active one is
//! mirrored to the real hardware buffer at any time, following the
//! `tty_switch` behavior in the reference implementation this was distilled
//! from (switching clears and repaints rather than scrolling content in).

use core::{fmt, sync::atomic::{AtomicUsize, Ordering}};

use spin::Mutex;

use crate::arch::x86_64::vga::{self, Snapshot};

pub const NUM_CONSOLES: usize = 12;

static CONSOLES: Mutex<[Snapshot; NUM_CONSOLES]> = Mutex::new([Snapshot::blank(); NUM_CONSOLES]);
static ACTIVE: AtomicUsize = AtomicUsize::new(0);

const INPUT_BUFFER_SIZE: usize = 256;

struct InputRing {
    buf: [u8; INPUT_BUFFER_SIZE],
    head: usize,
    tail: usize,
}

impl InputRing {
    const fn new() -> Self {
        Self {
            buf: [0; INPUT_BUFFER_SIZE],
            head: 0,
            tail: 0,
        }
    }

    fn push(&mut self, byte: u8) {
        let next = (self.head + 1) % INPUT_BUFFER_SIZE;
        if next == self.tail {
            return; // full, drop
        }
        self.buf[self.head] = byte;
        self.head = next;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.head == self.tail {
            return None;
        }
        let byte = self.buf[self.tail];
        self.tail = (self.tail + 1) % INPUT_BUFFER_SIZE;
        Some(byte)
    }
}

static INPUT: Mutex<InputRing> = Mutex::new(InputRing::new());

/// Called from the keyboard interrupt handler with a decoded ASCII byte.
pub fn push_input_byte(byte: u8) {
    INPUT.lock().push(byte);
    putchar(byte);
}

/// Non-blocking read of one decoded key byte, used by `sys_read` on fd 0.
pub fn read_input_byte() -> Option<u8> {
    INPUT.lock().pop()
}

pub fn active() -> usize {
    ACTIVE.load(Ordering::Relaxed)
}

pub fn putchar(byte: u8) {
    vga::WRITER.lock().write_byte(byte);
}

pub fn clear() {
    vga::WRITER.lock().clear();
    let active = active();
    CONSOLES.lock()[active] = vga::WRITER.lock().dump();
}

/// Switch the active text console. `n` outside `0..NUM_CONSOLES` is ignored.
pub fn switch(n: usize) {
    if n >= NUM_CONSOLES {
        return;
    }
    let current = active();
    if n == current {
        return;
    }
    let snapshot = vga::WRITER.lock().dump();
    CONSOLES.lock()[current] = snapshot;
    ACTIVE.store(n, Ordering::Relaxed);
    let restore = CONSOLES.lock()[n];
    vga::WRITER.lock().load(&restore);
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    use x86_64::instructions::interrupts;

    interrupts::without_interrupts(|| {
        vga::WRITER
            .lock()
            .write_fmt(args)
            .expect("console write_fmt failed");
    });
}
