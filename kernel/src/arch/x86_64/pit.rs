//! Programmable Interval Timer, ports `0x43`/`0x40`.

use x86_64::instructions::port::Port;

/// PIT input clock frequency in Hz.
const PIT_BASE_FREQUENCY: u32 = 1_193_180;

/// Default tick rate: 1 kHz.
pub const DEFAULT_FREQUENCY_HZ: u32 = 1000;

/// Program the PIT to fire at `frequency_hz`, channel 0, mode 3 (square wave).
pub fn init(frequency_hz: u32) {
    let divisor = PIT_BASE_FREQUENCY / frequency_hz;
    // SAFETY: 0x43 (mode/command) and 0x40 (channel 0 data) are the
    // standard 8253/8254 PIT ports; writing the command byte then the
    // 16-bit divisor low/high is the documented programming sequence.
    unsafe {
        let mut command: Port<u8> = Port::new(0x43);
        let mut channel0: Port<u8> = Port::new(0x40);
        command.write(0x36u8);
        channel0.write((divisor & 0xFF) as u8);
        channel0.write(((divisor >> 8) & 0xFF) as u8);
    }
}
