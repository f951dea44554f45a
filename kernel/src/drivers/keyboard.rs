//! PS/2 keyboard driver.
//!
//! Decodes scancodes via the `pc_keyboard` crate (ScancodeSet1, US 104-key
//! layout), tracks modifier state, and handles the Ctrl+Alt+F1..F10 console
//! switch hotkey before handing printable characters to the console.

use core::sync::atomic::{AtomicU8, Ordering};

use lazy_static::lazy_static;
use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, Keyboard, ScancodeSet1};
use spin::Mutex;

use crate::drivers::console;

pub const MOD_SHIFT: u8 = 0x01;
pub const MOD_CTRL: u8 = 0x02;
pub const MOD_ALT: u8 = 0x04;

static MODIFIER_STATE: AtomicU8 = AtomicU8::new(0);

/// Scancode range for the Ctrl+Alt+F1..F10 console-switch hotkey, per spec §4.7.
const FKEY_SWITCH_RANGE: core::ops::RangeInclusive<u8> = 0x3B..=0x44;

lazy_static! {
    static ref KEYBOARD: Mutex<Keyboard<layouts::Us104Key, ScancodeSet1>> = Mutex::new(
        Keyboard::new(ScancodeSet1::new(), layouts::Us104Key, HandleControl::MapLettersToUnicode)
    );
}

pub fn get_modifiers() -> u8 {
    MODIFIER_STATE.load(Ordering::Relaxed)
}

fn update_modifier(bit: u8, down: bool) {
    if down {
        MODIFIER_STATE.fetch_or(bit, Ordering::Relaxed);
    } else {
        MODIFIER_STATE.fetch_and(!bit, Ordering::Relaxed);
    }
}

/// Handle a raw scancode read from port 0x60 inside IRQ1. Must not block.
pub fn handle_scancode(scancode: u8) {
    let modifiers = get_modifiers();
    if modifiers & MOD_CTRL != 0
        && modifiers & MOD_ALT != 0
        && FKEY_SWITCH_RANGE.contains(&scancode)
        && scancode & 0x80 == 0
    {
        console::switch((scancode - *FKEY_SWITCH_RANGE.start()) as usize);
        return;
    }

    let mut kb = KEYBOARD.lock();
    let Ok(Some(key_event)) = kb.add_byte(scancode) else {
        return;
    };

    let is_down = key_event.state == pc_keyboard::KeyState::Down;
    match key_event.code {
        KeyCode::LShift | KeyCode::RShift => update_modifier(MOD_SHIFT, is_down),
        KeyCode::LControl | KeyCode::RControl => update_modifier(MOD_CTRL, is_down),
        KeyCode::LAlt | KeyCode::RAltGr => update_modifier(MOD_ALT, is_down),
        _ => {}
    }

    if let Some(DecodedKey::Unicode(ch)) = kb.process_keyevent(key_event) {
        if ch.is_ascii() {
            console::push_input_byte(ch as u8);
        }
    }
}
