//! x86_64 architecture support: GDT, IDT, PIC, PIT, serial/VGA output, I/O
//! port primitives.

pub mod context;
pub mod entry;
pub mod gdt;
pub mod idt;
pub mod pic;
pub mod pit;
pub mod serial;
pub mod vga;
