use log::{error, trace};

use super::CurrentTask;
use crate::cpu::{Address, Machine};

/// The SVCall bridge: hands the caller's stacked frame to `dispatch`.
///
/// The frame is on PSP when EXC_RETURN bit 2 is set, otherwise on MSP.
/// `dispatch` owns the way back to the caller, normally the exception
/// return through that frame.
///
/// # Safety
///
/// Must run as the SVCall exception.
pub unsafe fn svc_handler<M, D>(cpu: &mut M, current: &CurrentTask, dispatch: D)
where
    M: Machine + ?Sized,
    D: FnOnce(&mut M, Address),
{
    if current.get().is_none() {
        error!("supervisor call without a current task");
        cpu.halt()
    }

    let caller_sp = if cpu.exc_return().uses_process_stack() {
        cpu.psp()
    } else {
        cpu.msp()
    };
    trace!("svc, caller frame at {:#010x}", caller_sp);
    dispatch(cpu, caller_sp)
}
