//! Smoke test: boots the kernel under QEMU far enough to bring up memory
//! management, the VFS, and the process table, then exits with a QEMU
//! status code instead of returning. Run with `cargo test --features
//! qemu-exit --test basic_boot` under a `bootimage runner`/QEMU harness.

#![no_std]
#![no_main]

extern crate alloc;

use bootloader_api::config::{BootloaderConfig, Mapping};
use bootloader_api::{entry_point, BootInfo};

use bxkernel::test_framework::{exit_qemu, test_panic_handler, QemuExitCode};
use bxkernel::{mm, process, serial_println};

pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config
};

entry_point!(kernel_test_main, config = &BOOTLOADER_CONFIG);

fn kernel_test_main(boot_info: &'static mut BootInfo) -> ! {
    serial_println!("Starting basic boot tests...");

    bxkernel::arch::x86_64::entry::init();

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

    test_pfa_and_vmm_are_initialized();
    test_vfs_mounts_root_filesystems();
    test_process_table_has_idle_process();

    serial_println!("All tests passed!");
    exit_qemu(QemuExitCode::Success)
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    test_panic_handler(info)
}

fn test_pfa_and_vmm_are_initialized() {
    serial_println!("test_pfa_and_vmm_are_initialized...");
    assert!(mm::PFA.is_initialized());
    assert!(mm::VMM.is_initialized());
    serial_println!("[ok]");
}

fn test_vfs_mounts_root_filesystems() {
    serial_println!("test_vfs_mounts_root_filesystems...");
    bxkernel::fs::init();
    assert!(bxkernel::fs::VFS.is_initialized());
    serial_println!("[ok]");
}

fn test_process_table_has_idle_process() {
    serial_println!("test_process_table_has_idle_process...");
    let kernel_space = mm::VMM.with(|vmm| vmm.kernel_address_space());
    process::table::PROCESS_TABLE.init(process::table::ProcessTable::new());
    let idle_pid =
        process::table::PROCESS_TABLE.with(|t| t.spawn_kernel_idle(kernel_space));
    process::table::PROCESS_TABLE.with(|t| {
        assert!(t.get(idle_pid).is_ok());
    });
    serial_println!("[ok]");
}
