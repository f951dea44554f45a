//! 8259 PIC remap. Rewrites master/slave vector bases to 0x20/0x28 before
//! interrupts are enabled, per spec.

use pic8259::ChainedPics;
use spin::Mutex;

pub const PIC_1_OFFSET: u8 = 0x20;
pub const PIC_2_OFFSET: u8 = 0x28;

pub const TIMER_INTERRUPT_ID: u8 = PIC_1_OFFSET;
pub const KEYBOARD_INTERRUPT_ID: u8 = PIC_1_OFFSET + 1;

pub static PICS: Mutex<ChainedPics> =
    // SAFETY: PIC_1_OFFSET/PIC_2_OFFSET (0x20/0x28) lie in the range the
    // IDT reserves for hardware interrupts and do not collide with any CPU
    // exception vector.
    unsafe { Mutex::new(ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET)) };

/// Remap the PIC vector bases. Must run before `sti`.
pub fn init() {
    // SAFETY: called once during boot before interrupts are enabled; the
    // PIC is not concurrently accessed at this point.
    unsafe {
        PICS.lock().initialize();
    }
}

pub fn notify_end_of_interrupt(interrupt_id: u8) {
    // SAFETY: interrupt_id is a vector this module owns (timer or keyboard);
    // sending EOI after servicing it is required by the 8259 protocol.
    unsafe {
        PICS.lock().notify_end_of_interrupt(interrupt_id);
    }
}
