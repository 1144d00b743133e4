//! The handlers as they run on the core.
//!
//! `PendSV` and `SVCall` replace the default handlers of the vector table.
//! The kernel provides `port_task_switch_context` and `port_svc_dispatch`.

use core::{arch::global_asm, convert::Infallible};

use syscall::START_SCHEDULER;

use super::{prepare_start, StartError, CURRENT_TCB};
use crate::{
    config::{FPU_PRESENT, MAX_SYSCALL_INTERRUPT_PRIORITY, VTOR},
    cpu::Hardware,
};

global_asm!(
    include_str!("portasm.S"),
    current_tcb = sym CURRENT_TCB,
    switch_context = sym port_task_switch_context,
    svc_dispatch = sym port_svc_dispatch,
    max_syscall_priority = const MAX_SYSCALL_INTERRUPT_PRIORITY,
    start_scheduler = const START_SCHEDULER,
    vtor = const VTOR,
    fpu = const FPU_PRESENT as u32,
);

extern "C" {
    /// Selects the next task by rewriting [`CURRENT_TCB`]. Runs with
    /// BASEPRI at the syscall ceiling.
    fn port_task_switch_context();

    /// Decodes the supervisor call whose exception frame is at
    /// `caller_sp` and returns to the caller through that frame.
    fn port_svc_dispatch(caller_sp: *mut u32);

    fn port_start_first_task() -> !;
    fn port_restore_first_task() -> !;
}

/// Starts the task the kernel placed in [`CURRENT_TCB`]. Only returns on
/// error.
pub fn start_scheduler() -> Result<Infallible, StartError> {
    prepare_start(&mut Hardware, &CURRENT_TCB)?;
    unsafe { port_start_first_task() }
}

/// Enters the first task.
///
/// # Safety
///
/// Only `port_svc_dispatch` may call this, for the start-scheduler call.
pub unsafe fn restore_context_of_first_task() -> ! {
    port_restore_first_task()
}
