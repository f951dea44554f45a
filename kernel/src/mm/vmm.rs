//! Virtual memory manager (spec §4.2): one PML4 per address space, created
//! and torn down per process, mapping and unmapping individual 4 KiB pages.
//!
//! Grounded on `create_address_space`/`destroy_address_space`/`map_page`/
//! `unmap_page`/`virt_to_phys` from the source kernel, reimplemented atop
//! the `x86_64` crate's table/flag types instead of raw struct offsets.

use x86_64::structures::paging::PageTableFlags;

use super::page_table::{self, intermediate_flags};
use super::{PhysAddr, VirtAddr, PAGE_SIZE, PFA};
use crate::error::{KernelError, KernelResult};

bitflags::bitflags! {
    /// Caller-facing mapping permissions; translated to [`PageTableFlags`]
    /// at the leaf entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const WRITABLE = 1 << 0;
        const USER     = 1 << 1;
        const EXECUTE  = 1 << 2;
    }
}

impl PageFlags {
    fn to_leaf_flags(self) -> PageTableFlags {
        let mut flags = PageTableFlags::PRESENT;
        if self.contains(PageFlags::WRITABLE) {
            flags |= PageTableFlags::WRITABLE;
        }
        if self.contains(PageFlags::USER) {
            flags |= PageTableFlags::USER_ACCESSIBLE;
        }
        if !self.contains(PageFlags::EXECUTE) {
            flags |= PageTableFlags::NO_EXECUTE;
        }
        flags
    }
}

/// One address space: just the physical address of its PML4. Everything
/// else is reached by walking from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    pml4: PhysAddr,
}

impl AddressSpace {
    pub fn pml4_phys(&self) -> PhysAddr {
        self.pml4
    }
}

pub struct Vmm {
    kernel_pml4: PhysAddr,
}

impl Vmm {
    /// Build the VMM over whatever PML4 is already loaded in `CR3` at boot
    /// (the bootloader's own mapping), rather than constructing a fresh one.
    #[cfg(not(test))]
    pub fn bootstrap() -> Self {
        let (frame, _) = x86_64::registers::control::Cr3::read();
        Self {
            kernel_pml4: PhysAddr::new(frame.start_address().as_u64()),
        }
    }

    /// Host test builds never run in ring 0, so reading CR3 would fault;
    /// tests that need a `Vmm` but never walk a real table construct one
    /// this way instead.
    #[cfg(test)]
    pub fn bootstrap() -> Self {
        Self {
            kernel_pml4: PhysAddr::new(0),
        }
    }

    pub fn kernel_address_space(&self) -> AddressSpace {
        AddressSpace {
            pml4: self.kernel_pml4,
        }
    }

    /// Load `space`'s PML4 into `CR3`, switching the currently active
    /// address space. Called by the scheduler on every `Runnable ->
    /// Running` transition.
    ///
    /// # Safety
    /// `space` must own a complete, valid PML4 (kernel high-half entries
    /// present); switching address spaces mid-instruction-stream is only
    /// sound at a well-defined context-switch point.
    #[cfg(not(test))]
    pub unsafe fn activate(&self, space: AddressSpace) {
        use x86_64::registers::control::{Cr3, Cr3Flags};
        use x86_64::structures::paging::PhysFrame;

        let frame = PhysFrame::containing_address(x86_64::PhysAddr::new(space.pml4.as_u64()));
        Cr3::write(frame, Cr3Flags::empty());
    }

    #[cfg(test)]
    pub unsafe fn activate(&self, _space: AddressSpace) {}

    /// Allocate a fresh, zeroed PML4 and copy in the kernel's own high-half
    /// entries (indices 256..512, per the canonical higher-half split) so
    /// every address space shares one kernel mapping.
    pub fn new_address_space(&self) -> KernelResult<AddressSpace> {
        let new_pml4 = PFA.with(|pfa| pfa.alloc_zeroed_frame())?;

        // SAFETY: both frames were just allocated/are the live kernel PML4;
        // no other code holds a reference to the new table yet.
        unsafe {
            page_table::with_table(self.kernel_pml4, |kernel_table| {
                page_table::with_table(new_pml4, |new_table| {
                    for i in 256..512 {
                        new_table[i] = kernel_table[i].clone();
                    }
                })
            });
        }

        Ok(AddressSpace { pml4: new_pml4 })
    }

    /// Free every frame an address space's own page tables occupy (not the
    /// frames they map, which callers must unmap explicitly first) and the
    /// PML4 itself. The shared kernel half (indices 256..512) is never
    /// walked, since those tables belong to every address space.
    pub fn destroy_address_space(&self, space: AddressSpace) {
        if space.pml4 == self.kernel_pml4 {
            return;
        }
        // SAFETY: space is being destroyed by its sole owner and no
        // process is scheduled on it anymore.
        unsafe {
            page_table::with_table(space.pml4, |pml4_table| {
                for entry in pml4_table.iter_mut().take(256) {
                    if entry.is_unused() {
                        continue;
                    }
                    let pdp_phys = PhysAddr::new(entry.addr().as_u64());
                    free_table_tree(pdp_phys, 3);
                    entry.set_unused();
                }
            });
        }
        PFA.with(|pfa| pfa.free_frame(space.pml4));
    }

    /// Map one 4 KiB page, allocating any missing intermediate tables.
    /// Fails with [`KernelError::InvalidArgument`] if either address isn't
    /// page-aligned.
    pub fn map(
        &self,
        space: AddressSpace,
        virt: VirtAddr,
        phys: PhysAddr,
        flags: PageFlags,
    ) -> KernelResult<()> {
        if !virt.is_aligned(PAGE_SIZE as u64) || !phys.is_aligned(PAGE_SIZE as u64) {
            return Err(KernelError::InvalidArgument);
        }

        let leaf_flags = flags.to_leaf_flags();

        // SAFETY: space.pml4 is a live page table frame; intermediate
        // tables are allocated zeroed and only ever linked in here.
        unsafe {
            let pdp_phys = next_level(space.pml4, virt.pml4_index() as usize)?;
            let pd_phys = next_level(pdp_phys, virt.pdp_index() as usize)?;
            let pt_phys = next_level(pd_phys, virt.pd_index() as usize)?;

            page_table::with_table(pt_phys, |pt| {
                let entry = &mut pt[virt.pt_index() as usize];
                entry.set_addr(
                    x86_64::PhysAddr::new(phys.as_u64()),
                    leaf_flags,
                );
            });
        }
        Ok(())
    }

    /// Remove a single page's leaf mapping. Returns the physical frame that
    /// was mapped there so the caller can decide whether to free it.
    pub fn unmap(&self, space: AddressSpace, virt: VirtAddr) -> KernelResult<PhysAddr> {
        // SAFETY: walking an existing, live address space's own tables.
        unsafe {
            let pdp_phys = existing_next_level(space.pml4, virt.pml4_index() as usize)?;
            let pd_phys = existing_next_level(pdp_phys, virt.pdp_index() as usize)?;
            let pt_phys = existing_next_level(pd_phys, virt.pd_index() as usize)?;

            page_table::with_table(pt_phys, |pt| {
                let entry = &mut pt[virt.pt_index() as usize];
                if entry.is_unused() {
                    return Err(KernelError::InvalidArgument);
                }
                let frame = PhysAddr::new(entry.addr().as_u64());
                entry.set_unused();
                x86_64::instructions::tlb::flush(x86_64::VirtAddr::new(virt.as_u64()));
                Ok(frame)
            })
        }
    }

    /// Resolve a virtual address to its backing physical address, without
    /// modifying the mapping. `None` if any level along the walk is absent.
    pub fn translate(&self, space: AddressSpace, virt: VirtAddr) -> Option<PhysAddr> {
        // SAFETY: walking an existing, live address space's own tables.
        unsafe {
            let pdp_phys = existing_next_level(space.pml4, virt.pml4_index() as usize).ok()?;
            let pd_phys = existing_next_level(pdp_phys, virt.pdp_index() as usize).ok()?;
            let pt_phys = existing_next_level(pd_phys, virt.pd_index() as usize).ok()?;
            page_table::with_table(pt_phys, |pt| {
                let entry = &pt[virt.pt_index() as usize];
                if entry.is_unused() {
                    None
                } else {
                    Some(PhysAddr::new(entry.addr().as_u64() + virt.page_offset()))
                }
            })
        }
    }
}

/// Walk to the next-level table under `table_phys[index]`, allocating and
/// linking a fresh zeroed table if the entry is absent.
///
/// # Safety
/// `table_phys` must be a live, 4 KiB-aligned page table frame.
unsafe fn next_level(table_phys: PhysAddr, index: usize) -> KernelResult<PhysAddr> {
    page_table::with_table(table_phys, |table| {
        let entry = &mut table[index];
        if entry.is_unused() {
            let child = PFA.with(|pfa| pfa.alloc_zeroed_frame())?;
            entry.set_addr(x86_64::PhysAddr::new(child.as_u64()), intermediate_flags());
            Ok(child)
        } else {
            Ok(PhysAddr::new(entry.addr().as_u64()))
        }
    })
}

/// Same walk as [`next_level`] but fails rather than allocating when the
/// entry is absent; used by unmap/translate, which must not create
/// mappings as a side effect of looking one up.
///
/// # Safety
/// `table_phys` must be a live, 4 KiB-aligned page table frame.
unsafe fn existing_next_level(table_phys: PhysAddr, index: usize) -> KernelResult<PhysAddr> {
    page_table::with_table(table_phys, |table| {
        let entry = &table[index];
        if entry.is_unused() {
            Err(KernelError::InvalidArgument)
        } else {
            Ok(PhysAddr::new(entry.addr().as_u64()))
        }
    })
}

/// Recursively free every table in the subtree rooted at `table_phys`,
/// down to but not including leaf data frames (those are the caller's).
///
/// # Safety
/// `table_phys` must own no entries shared with another address space.
unsafe fn free_table_tree(table_phys: PhysAddr, level: u8) {
    if level > 1 {
        page_table::with_table(table_phys, |table| {
            for entry in table.iter() {
                if !entry.is_unused() {
                    free_table_tree(PhysAddr::new(entry.addr().as_u64()), level - 1);
                }
            }
        });
    }
    PFA.with(|pfa| pfa.free_frame(table_phys));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_flags_translate_defaults_to_no_execute() {
        let flags = PageFlags::WRITABLE.to_leaf_flags();
        assert!(flags.contains(PageTableFlags::PRESENT));
        assert!(flags.contains(PageTableFlags::WRITABLE));
        assert!(flags.contains(PageTableFlags::NO_EXECUTE));
        assert!(!flags.contains(PageTableFlags::USER_ACCESSIBLE));
    }

    #[test]
    fn execute_flag_clears_no_execute() {
        let flags = (PageFlags::WRITABLE | PageFlags::EXECUTE).to_leaf_flags();
        assert!(!flags.contains(PageTableFlags::NO_EXECUTE));
    }
}
