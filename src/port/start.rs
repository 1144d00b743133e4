use core::sync::atomic::Ordering;

use log::{error, info};
use syscall::START_SCHEDULER;

use super::{context::ContextFrame, CurrentTask, StartError};
use crate::{
    config::LOWEST_INTERRUPT_PRIORITY,
    cpu::{Control, ExcReturn, Machine, Registers, SystemHandler, WORD},
};

/// Checks that the scheduler can start on `current` and configures the
/// handlers it needs. Succeeds at most once per slot.
pub fn prepare_start<R: Registers + ?Sized>(cpu: &mut R, current: &CurrentTask) -> Result<(), StartError> {
    let Some(tcb) = current.get() else {
        return Err(StartError::NoCurrentTask);
    };
    if current.launched.swap(true, Ordering::AcqRel) {
        return Err(StartError::AlreadyStarted);
    }

    // A context switch must never preempt another handler.
    unsafe {
        cpu.set_handler_priority(SystemHandler::PendSV, LOWEST_INTERRUPT_PRIORITY);
        cpu.set_handler_priority(SystemHandler::SysTick, LOWEST_INTERRUPT_PRIORITY);
    }

    info!("starting scheduler, first task {:#010x}", tcb);
    Ok(())
}

/// Starts the first task. Returns once the supervisor call that restores
/// it has been issued.
pub fn start_scheduler<M: Machine + ?Sized>(cpu: &mut M, current: &CurrentTask) -> Result<(), StartError> {
    prepare_start(cpu, current)?;
    // The main stack holds nothing worth keeping once the scheduler runs.
    unsafe { start_first_task(cpu) };
    Ok(())
}

/// Resets MSP to its initial value from the vector table, enables
/// interrupts and issues the start-scheduler supervisor call.
///
/// # Safety
///
/// Every frame on the main stack is discarded. Call once, from thread mode,
/// after [`prepare_start`].
pub unsafe fn start_first_task<M: Machine + ?Sized>(cpu: &mut M) {
    let vector_table = cpu.vector_table();
    let initial_msp = cpu.read_word(vector_table);
    cpu.set_msp(initial_msp);
    cpu.enable_interrupts();
    cpu.enable_fault_interrupts();
    cpu.dsb();
    cpu.isb();
    cpu.supervisor_call(START_SCHEDULER);
}

/// Enters the task in `current` from the start-scheduler supervisor call.
///
/// The task's stack must hold the frames built for a new task: a context
/// frame with no FP context, directly over a standard exception frame.
/// Its r4-r11 words are skipped, so a task that has already been switched
/// out cannot be entered this way.
///
/// # Safety
///
/// Must run inside the SVCall handler, on the main stack.
pub unsafe fn restore_context_of_first_task<M: Machine + ?Sized>(cpu: &mut M, current: &CurrentTask) {
    let Some(tcb) = current.get() else {
        error!("no first task to restore");
        cpu.halt()
    };

    let top = cpu.read_word(tcb);
    let psplim = cpu.read_word(top);
    let exc_return = ExcReturn::from_bits_retain(cpu.read_word(top + WORD));

    cpu.set_psplim(psplim);
    cpu.set_control(Control::SPSEL);
    cpu.set_psp(top + ContextFrame::SIZE);
    cpu.isb();
    cpu.set_basepri(0);
    cpu.exception_return(exc_return);
}
