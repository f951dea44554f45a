//! Raw 4-level page table structures (spec §4.2): PML4 → PDP → PD → PT,
//! each a 512-entry, 4 KiB-aligned table indexed by 9 bits of the virtual
//! address. Wraps the `x86_64` crate's entry/flags types rather than
//! reinventing them; what this module owns is the walk itself and the
//! physical-memory-offset translation needed to dereference a table given
//! only its physical address.

use x86_64::structures::paging::{PageTable, PageTableFlags};

use super::{PhysAddr, VirtAddr, PAGE_SIZE};

/// Offset at which the bootloader identity-maps all physical memory into
/// the kernel's address space. Every physical frame holding a page table
/// is dereferenced through this window rather than a recursive mapping.
pub static PHYS_MEM_OFFSET: crate::sync::GlobalState<u64> = crate::sync::GlobalState::new();

pub fn set_physical_memory_offset(offset: u64) {
    PHYS_MEM_OFFSET.init(offset);
}

fn phys_to_virt(addr: PhysAddr) -> *mut PageTable {
    phys_to_virt_addr(addr) as *mut PageTable
}

/// Translate a physical address to the kernel virtual address it's
/// reachable at through the physical-memory offset window. Used by code
/// that needs to write arbitrary bytes into a freshly allocated frame
/// (ELF segment loading, argv copy-in) rather than walk it as a table.
pub fn phys_to_virt_addr(addr: PhysAddr) -> u64 {
    addr.as_u64() + PHYS_MEM_OFFSET.with(|v| *v)
}

/// Borrow the page table living at `addr` for the duration of the closure.
///
/// # Safety
/// `addr` must be a 4 KiB-aligned physical address of a live page table
/// frame, and no other code may concurrently mutate the same table.
pub unsafe fn with_table<R>(addr: PhysAddr, f: impl FnOnce(&mut PageTable) -> R) -> R {
    let ptr = phys_to_virt(addr);
    f(&mut *ptr)
}

/// Flags for a present, kernel-writable, non-executable leaf mapping; the
/// default for freshly mapped data pages.
pub fn kernel_rw_flags() -> PageTableFlags {
    PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::NO_EXECUTE
}

/// Flags for a present, user-accessible, writable leaf mapping.
pub fn user_rw_flags() -> PageTableFlags {
    PageTableFlags::PRESENT
        | PageTableFlags::WRITABLE
        | PageTableFlags::USER_ACCESSIBLE
        | PageTableFlags::NO_EXECUTE
}

/// Flags for an intermediate (PML4/PDP/PD) table entry pointing at another
/// table. Always present+writable+user so the leaf entry's own flags are
/// the ones that actually restrict access.
pub fn intermediate_flags() -> PageTableFlags {
    PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE
}

pub const fn page_aligned(addr: u64) -> bool {
    addr % PAGE_SIZE as u64 == 0
}

pub const fn pt_index(va: VirtAddr, level: u8) -> usize {
    match level {
        4 => va.pml4_index() as usize,
        3 => va.pdp_index() as usize,
        2 => va.pd_index() as usize,
        1 => va.pt_index() as usize,
        _ => panic!("invalid page table level"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_aligned_rejects_misaligned() {
        assert!(page_aligned(0x1000));
        assert!(!page_aligned(0x1001));
    }

    #[test]
    fn pt_index_selects_expected_level() {
        let va = VirtAddr::new((5u64 << 12) | (6u64 << 21) | (7u64 << 30) | (8u64 << 39));
        assert_eq!(pt_index(va, 1), 5);
        assert_eq!(pt_index(va, 2), 6);
        assert_eq!(pt_index(va, 3), 7);
        assert_eq!(pt_index(va, 4), 8);
    }
}
