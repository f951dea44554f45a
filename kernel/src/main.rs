//! Kernel entry point. Bootloader handoff through the `bootloader_api`
//! crate, then the boot sequence from spec §2: console clear, PIC remap,
//! IDT install, timer programmed to 1 kHz, syscall table populated, bus
//! enumeration, filesystem registration, interrupts on, idle loop.

#![no_std]
#![no_main]

extern crate alloc;

use bootloader_api::config::{BootloaderConfig, Mapping};
use bootloader_api::{entry_point, BootInfo};

use bxkernel::{arch, drivers, fs, mm, println, process, sched, syscall};

/// Identity-maps all physical memory into the kernel's address space at a
/// bootloader-chosen offset; `mm::page_table` needs this to dereference
/// page-table frames by physical address.
pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config
};

entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    drivers::console::clear();
    println!("bxkernel booting");
    bxkernel::klog::init(log::LevelFilter::Info);

    arch::x86_64::entry::init();

    let phys_mem_offset = boot_info
        .physical_memory_offset
        .into_option()
        .expect("bootloader did not map physical memory");
    mm::page_table::set_physical_memory_offset(phys_mem_offset);

    let usable_regions: alloc::vec::Vec<(u64, u64)> = boot_info
        .memory_regions
        .iter()
        .filter(|r| r.kind == bootloader_api::info::MemoryRegionKind::Usable)
        .map(|r| (r.start, r.end))
        .collect();
    mm::init(&usable_regions);
    mm::heap::init();

    fs::init();

    let kernel_space = mm::VMM.with(|vmm| vmm.kernel_address_space());
    process::table::PROCESS_TABLE.init(process::table::ProcessTable::new());
    let idle_pid = process::table::PROCESS_TABLE.with(|t| t.spawn_kernel_idle(kernel_space));
    log::info!("process: kernel idle process spawned as pid {idle_pid}");

    let devices = drivers::pci::scan();
    println!("pci: {} device(s) found", devices.len());

    // Force the syscall table to build now rather than on first dispatch,
    // so a misconfigured table fails loudly at boot instead of mid-syscall.
    let table_len = syscall::table::SYSCALL_TABLE.get().len();
    log::info!("syscall: table populated ({table_len} slots)");

    x86_64::instructions::interrupts::enable();
    println!("bxkernel ready");

    loop {
        mm::VMM.with(|vmm| sched::yield_now(vmm));
        x86_64::instructions::hlt();
    }
}
