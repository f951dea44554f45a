//! Early architecture bring-up: runs before the rest of the kernel (memory,
//! process, scheduler) is touched.

use super::{gdt, idt, pic, pit};
use crate::println;

/// GDT, IDT, PIC remap, PIT programming. Interrupts remain disabled on
/// return; the caller enables them once the rest of boot has completed.
pub fn init() {
    gdt::init();
    idt::init();
    pic::init();
    pit::init(pit::DEFAULT_FREQUENCY_HZ);
    log::info!(
        "arch: GDT/IDT installed, PIC remapped, timer at {} Hz",
        pit::DEFAULT_FREQUENCY_HZ
    );
}

pub fn panic_handler(info: &core::panic::PanicInfo) -> ! {
    println!("KERNEL PANIC: {}", info);
    loop {
        x86_64::instructions::hlt();
    }
}
