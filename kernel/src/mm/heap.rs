//! Kernel heap. `alloc::*` collections (`Vec`, `BTreeMap`, `Box`, ...) used
//! throughout the process table, VFS and scheduler all bottom out here.
//!
//! On bare metal the global allocator is a `linked_list_allocator` free-list
//! heap seeded from a fixed virtual range mapped through the VMM. Under
//! `cfg(test)` (host builds, no bootloader, no VMM) it falls back to the
//! system allocator so unit tests can run without a kernel underneath them.

use linked_list_allocator::LockedHeap;

use super::vmm::PageFlags;
use super::{VirtAddr, PAGE_SIZE, PFA, VMM};

/// Virtual range the heap lives in, chosen well clear of the kernel image
/// and the physical memory offset-mapping window.
pub const HEAP_START: u64 = 0xFFFF_FF00_0000_0000;
pub const HEAP_SIZE: usize = 16 * 1024 * 1024;

#[cfg(not(test))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Map and hand `HEAP_SIZE` bytes starting at `HEAP_START` to the bare-metal
/// allocator. Must run once, after the VMM and PFA are both initialized and
/// before the first `alloc`/`Box`/`Vec` use.
#[cfg(not(test))]
pub fn init() {
    let space = VMM.with(|vmm| vmm.kernel_address_space());
    let pages = HEAP_SIZE / PAGE_SIZE;

    for i in 0..pages {
        let virt = VirtAddr::new(HEAP_START + (i * PAGE_SIZE) as u64);
        let phys = PFA
            .with(|pfa| pfa.alloc_frames(1))
            .expect("out of memory mapping kernel heap");
        VMM.with(|vmm| vmm.map(space, virt, phys, PageFlags::WRITABLE))
            .expect("failed to map kernel heap page");
    }

    // SAFETY: the range [HEAP_START, HEAP_START + HEAP_SIZE) was just
    // mapped read/write above and is otherwise unused.
    unsafe {
        ALLOCATOR.lock().init(HEAP_START as *mut u8, HEAP_SIZE);
    }
}

/// Host test builds have no bootloader-mapped memory and no VMM; they run
/// against the process's ordinary heap instead.
#[cfg(test)]
pub fn init() {}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use alloc::vec::Vec;

    #[test]
    fn heap_allocations_work_under_the_test_allocator() {
        let mut v: Vec<u32> = Vec::new();
        for i in 0..1000 {
            v.push(i);
        }
        assert_eq!(v.len(), 1000);
        assert_eq!(v[999], 999);
    }
}
