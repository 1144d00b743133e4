use bit_field::BitField;
use log::LevelFilter;

use crate::cpu::Address;

/// Number of priority bits implemented by the NVIC. Priorities live in the
/// high bits of each 8-bit priority field.
pub const NVIC_PRIO_BITS: usize = 3;

/// The lowest interrupt priority. PendSV and SysTick run here so that a
/// context switch never preempts another handler.
pub const LOWEST_INTERRUPT_PRIORITY: u8 = 0xFF;

/// The highest logical priority from which an interrupt handler may call
/// into the kernel.
pub const MAX_SYSCALL_LOGICAL_PRIORITY: u8 = 5;

/// The BASEPRI value written when entering a critical section.
///
/// Interrupts at this priority or below (numerically greater or equal) are
/// masked; anything above it keeps running and must never touch scheduler
/// state.
pub const MAX_SYSCALL_INTERRUPT_PRIORITY: u32 =
    (MAX_SYSCALL_LOGICAL_PRIORITY as u32) << (8 - NVIC_PRIO_BITS);

// BASEPRI == 0 disables masking entirely.
const _: () = assert!(MAX_SYSCALL_INTERRUPT_PRIORITY != 0);
const _: () = assert!(MAX_SYSCALL_INTERRUPT_PRIORITY <= 0xFF);

/// Whether the target has a single-precision FPU whose callee-saved
/// registers must follow a task across a switch.
pub const FPU_PRESENT: bool = cfg!(target_abi = "eabihf");

/// Address of the Vector Table Offset Register.
pub const VTOR: Address = 0xE000_ED08;

/// The log level installed by [`crate::init`].
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Extracts the logical priority from an 8-bit priority field.
pub fn logical_priority(value: u32) -> u8 {
    value.get_bits(8 - NVIC_PRIO_BITS..8) as u8
}
