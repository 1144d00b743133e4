//! The scheduler port for ARMv8-M Mainline without TrustZone.
//!
//! Every routine here is a short register transaction. The exception
//! handlers (`PendSV`, `SVCall`) and the first-task bootstrap exist twice:
//! as assembly in `portasm.S` for the target, and as Rust functions generic
//! over [`Machine`](crate::cpu::Machine) that perform the same sequence step
//! for step. The privilege and interrupt-mask primitives are plain Rust on
//! top of [`Registers`](crate::cpu::Registers).
//!
//! The external scheduler owns [`CURRENT_TCB`]. The port only ever reads
//! its first word, the saved top of stack of the running task.

use core::{
    fmt,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};

use log::trace;

pub use self::{
    context::{pend_sv_handler, ContextFrame, ExceptionFrame, FpContext},
    mask::{clear_interrupt_mask, interrupt_free, set_interrupt_mask, CriticalSection},
    privilege::{is_privileged, raise_privilege, reset_privilege, with_privilege},
    start::{prepare_start, restore_context_of_first_task, start_first_task, start_scheduler},
    svc::svc_handler,
};
use crate::cpu::{exception_number, Address, Registers};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod armv8m;
mod context;
mod mask;
mod privilege;
mod start;
mod svc;

/// The slot naming the running task's control block.
///
/// `tcb` must stay the first field: the assembly handlers load it through
/// the address of [`CURRENT_TCB`].
#[repr(C)]
pub struct CurrentTask {
    /* 0 */ tcb:      AtomicU32,
    /* 4 */ launched: AtomicBool,
}

impl CurrentTask {
    pub const fn new() -> Self {
        Self { tcb: AtomicU32::new(0), launched: AtomicBool::new(false) }
    }

    /// The control block address, or `None` while no task was chosen.
    pub fn get(&self) -> Option<Address> {
        match self.tcb.load(Ordering::Acquire) {
            0 => None,
            tcb => Some(tcb),
        }
    }

    pub fn set(&self, tcb: Address) {
        self.tcb.store(tcb, Ordering::Release);
    }

    pub fn clear(&self) {
        self.tcb.store(0, Ordering::Release);
    }

    /// Whether the scheduler has been started on this slot.
    pub fn launched(&self) -> bool {
        self.launched.load(Ordering::Acquire)
    }
}

impl Default for CurrentTask {
    fn default() -> Self {
        Self::new()
    }
}

pub static CURRENT_TCB: CurrentTask = CurrentTask::new();

/// Picks the next task to run by rewriting the current-task slot.
///
/// On the target this is the kernel's `port_task_switch_context`.
pub trait TaskSelector {
    fn select_next(&mut self);
}

impl<F: FnMut()> TaskSelector for F {
    fn select_next(&mut self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// The scheduler has not chosen a first task.
    NoCurrentTask,
    AlreadyStarted,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::NoCurrentTask => write!(f, "no task selected to run first"),
            StartError::AlreadyStarted => write!(f, "the scheduler is already running"),
        }
    }
}

/// Parks the core. Interrupts stay as they are; nothing after this runs.
pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Requests a context switch once no other handler is active.
pub fn yield_now<R: Registers + ?Sized>(cpu: &mut R) {
    trace!("yield");
    cpu.pend_sv();
    cpu.dsb();
    cpu.isb();
}

/// Whether an exception handler is running.
pub fn is_inside_interrupt<R: Registers + ?Sized>(cpu: &R) -> bool {
    exception_number(cpu.ipsr()) != 0
}
