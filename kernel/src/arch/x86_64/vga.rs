//! VGA text-mode framebuffer at physical `0xB8000`.
//!
//! Low-level cell writer plus the hardware cursor ports (`0x3D4`/`0x3D5`).
//! [`crate::drivers::console`] layers the multi-console `switch(n)` API on
//! top of this.

use core::{fmt, ptr::write_volatile};

use lazy_static::lazy_static;
use spin::Mutex;
use x86_64::instructions::port::Port;

pub const BUFFER_WIDTH: usize = 80;
pub const BUFFER_HEIGHT: usize = 25;

/// Default cell attribute: light gray on black.
pub const DEFAULT_ATTR: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ScreenChar(u16);

impl ScreenChar {
    pub const fn new(ascii: u8, attr: u8) -> Self {
        ScreenChar(((attr as u16) << 8) | ascii as u16)
    }

    pub const fn blank() -> Self {
        Self::new(b' ', DEFAULT_ATTR)
    }
}

#[repr(transparent)]
pub struct Buffer {
    chars: [[ScreenChar; BUFFER_WIDTH]; BUFFER_HEIGHT],
}

pub struct Writer {
    column_position: usize,
    row_position: usize,
    attr: u8,
    buffer: &'static mut Buffer,
}

impl Writer {
    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            b'\r' => self.column_position = 0,
            byte => {
                if self.column_position >= BUFFER_WIDTH {
                    self.new_line();
                }
                let row = self.row_position;
                let col = self.column_position;
                let cell = ScreenChar::new(byte, self.attr);
                // SAFETY: row < BUFFER_HEIGHT and col < BUFFER_WIDTH by the
                // bounds check above and new_line's invariant; 0xb8000 is
                // identity-mapped MMIO, write_volatile prevents the store
                // from being optimized away.
                unsafe {
                    write_volatile(&mut self.buffer.chars[row][col], cell);
                }
                self.column_position += 1;
            }
        }
        self.update_cursor();
    }

    fn new_line(&mut self) {
        if self.row_position + 1 < BUFFER_HEIGHT {
            self.row_position += 1;
        } else {
            for row in 1..BUFFER_HEIGHT {
                for col in 0..BUFFER_WIDTH {
                    // SAFETY: row/col bounded by the loop ranges, within buffer.
                    let ch = unsafe { core::ptr::read_volatile(&self.buffer.chars[row][col]) };
                    unsafe {
                        write_volatile(&mut self.buffer.chars[row - 1][col], ch);
                    }
                }
            }
            self.clear_row(BUFFER_HEIGHT - 1);
        }
        self.column_position = 0;
    }

    fn clear_row(&mut self, row: usize) {
        let blank = ScreenChar::blank();
        for col in 0..BUFFER_WIDTH {
            // SAFETY: row passed by caller is always < BUFFER_HEIGHT, col < BUFFER_WIDTH.
            unsafe {
                write_volatile(&mut self.buffer.chars[row][col], blank);
            }
        }
    }

    pub fn clear(&mut self) {
        for row in 0..BUFFER_HEIGHT {
            self.clear_row(row);
        }
        self.row_position = 0;
        self.column_position = 0;
        self.update_cursor();
    }

    pub fn write_string(&mut self, s: &str) {
        for byte in s.bytes() {
            match byte {
                0x20..=0x7e | b'\n' | b'\r' | 0x08 => self.write_byte(byte),
                _ => self.write_byte(0xfe),
            }
        }
    }

    fn update_cursor(&self) {
        let pos = (self.row_position * BUFFER_WIDTH + self.column_position) as u16;
        // SAFETY: 0x3D4/0x3D5 are the standard VGA CRT controller index/data
        // ports; this sequence is the documented way to set the cursor location.
        unsafe {
            let mut index: Port<u8> = Port::new(0x3D4);
            let mut data: Port<u8> = Port::new(0x3D5);
            index.write(0x0F);
            data.write((pos & 0xFF) as u8);
            index.write(0x0E);
            data.write((pos >> 8) as u8);
        }
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}

/// A full copy of one screen's worth of cells plus cursor position, used to
/// save/restore a virtual console's content across [`crate::drivers::console::switch`].
#[derive(Clone, Copy)]
pub struct Snapshot {
    cells: [[ScreenChar; BUFFER_WIDTH]; BUFFER_HEIGHT],
    row: usize,
    col: usize,
}

impl Snapshot {
    pub const fn blank() -> Self {
        Self {
            cells: [[ScreenChar::blank(); BUFFER_WIDTH]; BUFFER_HEIGHT],
            row: 0,
            col: 0,
        }
    }
}

impl Writer {
    /// Copy the live hardware screen out into a `Snapshot`.
    pub fn dump(&self) -> Snapshot {
        let mut cells = [[ScreenChar::blank(); BUFFER_WIDTH]; BUFFER_HEIGHT];
        for row in 0..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                // SAFETY: row/col bounded by the loop ranges, within buffer.
                cells[row][col] = unsafe { core::ptr::read_volatile(&self.buffer.chars[row][col]) };
            }
        }
        Snapshot {
            cells,
            row: self.row_position,
            col: self.column_position,
        }
    }

    /// Write a `Snapshot` back into the live hardware screen.
    pub fn load(&mut self, snapshot: &Snapshot) {
        for row in 0..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                // SAFETY: row/col bounded by the loop ranges, within buffer.
                unsafe {
                    write_volatile(&mut self.buffer.chars[row][col], snapshot.cells[row][col]);
                }
            }
        }
        self.row_position = snapshot.row;
        self.column_position = snapshot.col;
        self.update_cursor();
    }
}

lazy_static! {
    pub static ref WRITER: Mutex<Writer> = Mutex::new(Writer {
        column_position: 0,
        row_position: 0,
        attr: DEFAULT_ATTR,
        // SAFETY: 0xb8000 is the well-known physical address of the VGA text
        // buffer, identity-mapped by the kernel's initial page tables. The
        // buffer has static lifetime and all access goes through this Mutex.
        buffer: unsafe { &mut *(0xb8000 as *mut Buffer) },
    });
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    use x86_64::instructions::interrupts;

    interrupts::without_interrupts(|| {
        WRITER.lock().write_fmt(args).expect("VGA write_fmt failed");
    });
}
