//! ELF64 loader (spec §4.5 Exec). Walks `PT_LOAD` program headers and
//! copies each segment's file bytes into freshly mapped pages, zero-filling
//! the bss tail. Also installs argv on the new user stack, copying the
//! *string bytes* themselves rather than just the pointer table (Open
//! Question 1: the source copies pointers into the old image, which is a
//! dangling reference once that image goes away).

extern crate alloc;
use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::mm::page_table::phys_to_virt_addr;
use crate::mm::vmm::{AddressSpace, PageFlags, Vmm};
use crate::mm::{VirtAddr, PAGE_SIZE};

const ELF_MAGIC: u32 = 0x464C_457F;
const PT_LOAD: u32 = 1;
const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

pub struct LoadedImage {
    pub entry: u64,
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(buf[off..off + 2].try_into().unwrap())
}

/// Parse `image` as a 64-bit little-endian ELF and map every `PT_LOAD`
/// segment into `space`. Other segment types (`PT_DYNAMIC`, `PT_NOTE`, ...)
/// are ignored per spec.
pub fn load(vmm: &Vmm, space: AddressSpace, image: &[u8]) -> KernelResult<LoadedImage> {
    if image.len() < EHDR_SIZE || read_u32(image, 0) != ELF_MAGIC {
        return Err(KernelError::NotExecutable);
    }

    let e_entry = read_u64(image, 24);
    let e_phoff = read_u64(image, 32) as usize;
    let e_phentsize = read_u16(image, 54) as usize;
    let e_phnum = read_u16(image, 56) as usize;

    for i in 0..e_phnum {
        let off = e_phoff + i * e_phentsize;
        if off + PHDR_SIZE > image.len() {
            return Err(KernelError::NotExecutable);
        }
        let phdr = &image[off..off + PHDR_SIZE];
        if read_u32(phdr, 0) != PT_LOAD {
            continue;
        }

        let p_offset = read_u64(phdr, 8) as usize;
        let p_vaddr = read_u64(phdr, 16);
        let p_filesz = read_u64(phdr, 32) as usize;
        let p_memsz = read_u64(phdr, 40) as usize;

        if p_offset + p_filesz > image.len() {
            return Err(KernelError::NotExecutable);
        }
        load_segment(
            vmm,
            space,
            p_vaddr,
            &image[p_offset..p_offset + p_filesz],
            p_memsz,
        )?;
    }

    Ok(LoadedImage { entry: e_entry })
}

fn load_segment(
    vmm: &Vmm,
    space: AddressSpace,
    vaddr: u64,
    filedata: &[u8],
    memsz: usize,
) -> KernelResult<()> {
    let page_mask = PAGE_SIZE as u64 - 1;
    let start_page = vaddr & !page_mask;
    let end_page = (vaddr + memsz as u64 + page_mask) & !page_mask;
    let num_pages = ((end_page - start_page) / PAGE_SIZE as u64) as usize;

    for i in 0..num_pages {
        let page_vaddr = start_page + (i as u64) * PAGE_SIZE as u64;
        let phys = crate::mm::PFA.with(|pfa| pfa.alloc_zeroed_frame())?;
        vmm.map(
            space,
            VirtAddr::new(page_vaddr),
            phys,
            PageFlags::WRITABLE | PageFlags::USER | PageFlags::EXECUTE,
        )?;

        let page_end_vaddr = page_vaddr + PAGE_SIZE as u64;
        let copy_start = vaddr.max(page_vaddr);
        let copy_end = (vaddr + filedata.len() as u64).min(page_end_vaddr);
        if copy_end > copy_start {
            let dst_off = (copy_start - page_vaddr) as usize;
            let src_off = (copy_start - vaddr) as usize;
            let len = (copy_end - copy_start) as usize;
            let dst_base = phys_to_virt_addr(phys) as *mut u8;
            // SAFETY: phys was just allocated and zeroed, mapped nowhere
            // else; dst_off + len <= PAGE_SIZE by construction above.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    filedata[src_off..].as_ptr(),
                    dst_base.add(dst_off),
                    len,
                );
            }
        }
    }
    Ok(())
}

/// Map one fresh page below `stack_top`, write `argv`'s string bytes and a
/// `{argc, argv[0..argc], NULL}` pointer table into it, and return the
/// stack pointer the new process should start with (pointing at `argc`).
pub fn install_argv(
    vmm: &Vmm,
    space: AddressSpace,
    stack_top: VirtAddr,
    argv: &[&[u8]],
) -> KernelResult<u64> {
    let page_virt = VirtAddr::new(stack_top.as_u64() - PAGE_SIZE as u64);
    let phys = crate::mm::PFA.with(|pfa| pfa.alloc_zeroed_frame())?;
    vmm.map(space, page_virt, phys, PageFlags::WRITABLE | PageFlags::USER)?;

    let page_base_virt = phys_to_virt_addr(phys);
    let mut cursor = PAGE_SIZE as u64;
    let mut ptrs = Vec::with_capacity(argv.len());

    for arg in argv.iter().rev() {
        let len = arg.len() + 1;
        cursor -= len as u64;
        let dst = (page_base_virt + cursor) as *mut u8;
        // SAFETY: page_base_virt+cursor stays within the freshly mapped,
        // zeroed page; len <= PAGE_SIZE is the caller's responsibility for
        // any individual argv entry.
        unsafe {
            core::ptr::copy_nonoverlapping(arg.as_ptr(), dst, arg.len());
            *dst.add(arg.len()) = 0;
        }
        ptrs.push(page_virt.as_u64() + cursor);
    }
    ptrs.reverse();

    let ptr_table_bytes = (ptrs.len() as u64 + 2) * 8;
    cursor = cursor.saturating_sub(ptr_table_bytes) & !0xF;

    let table_virt = page_base_virt + cursor;
    // SAFETY: table_virt..table_virt+ptr_table_bytes is within the same
    // mapped page and does not overlap the string bytes written above,
    // since cursor only decreases.
    unsafe {
        core::ptr::write(table_virt as *mut u64, ptrs.len() as u64);
        for (i, p) in ptrs.iter().enumerate() {
            core::ptr::write((table_virt + 8 + (i as u64) * 8) as *mut u64, *p);
        }
        core::ptr::write(
            (table_virt + 8 + (ptrs.len() as u64) * 8) as *mut u64,
            0u64,
        );
    }

    Ok(page_virt.as_u64() + cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let vmm = Vmm::bootstrap();
        let space = vmm.kernel_address_space();
        let junk = [0u8; 64];
        assert_eq!(load(&vmm, space, &junk), Err(KernelError::NotExecutable));
    }

    #[test]
    fn rejects_truncated_header() {
        let vmm = Vmm::bootstrap();
        let space = vmm.kernel_address_space();
        let short = [0x7f, b'E', b'L', b'F'];
        assert_eq!(load(&vmm, space, &short), Err(KernelError::NotExecutable));
    }
}
