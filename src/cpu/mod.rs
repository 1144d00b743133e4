//! Access to the processor state the port layer manipulates.
//!
//! [`Registers`] covers the special registers reachable from Rust through
//! `mrs`/`msr` and the system control block. [`Machine`] adds the state
//! only an exception handler without a compiler prologue can reach: LR on
//! exception entry, the callee-saved register file, raw stack memory and
//! the exception return itself. On silicon the handlers in `portasm.S`
//! are the implementation of that contract; the routines in
//! [`crate::port`] perform the same sequences against any `Machine`.

pub use self::registers::{exception_number, Control, ExcReturn, SystemHandler};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::hardware::Hardware;

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod hardware;
mod registers;

/// A 32-bit address in the processor's memory map.
pub type Address = u32;

/// The size of one stacked word.
pub const WORD: Address = 4;

pub trait Registers {
    fn control(&self) -> Control;

    /// # Safety
    ///
    /// Changes the privilege level and the active stack of thread mode.
    unsafe fn set_control(&mut self, control: Control);

    fn basepri(&self) -> u32;

    /// # Safety
    ///
    /// Lowering BASEPRI ends any critical section the caller is inside.
    unsafe fn set_basepri(&mut self, value: u32);

    fn psp(&self) -> Address;

    /// # Safety
    ///
    /// The address must point into a stack owned by the task about to run.
    unsafe fn set_psp(&mut self, sp: Address);

    fn psplim(&self) -> Address;

    /// # Safety
    ///
    /// A limit above PSP faults on the next push.
    unsafe fn set_psplim(&mut self, limit: Address);

    fn msp(&self) -> Address;

    /// # Safety
    ///
    /// Discards every frame on the current main stack.
    unsafe fn set_msp(&mut self, sp: Address);

    fn ipsr(&self) -> u32;

    /// The Vector Table Offset Register.
    fn vector_table(&self) -> Address;

    /// Data synchronization barrier.
    fn dsb(&mut self);

    /// Instruction synchronization barrier.
    fn isb(&mut self);

    /// `cpsie i`
    ///
    /// # Safety
    ///
    /// Interrupt handlers may run as soon as this returns.
    unsafe fn enable_interrupts(&mut self);

    /// `cpsie f`
    ///
    /// # Safety
    ///
    /// See [`Registers::enable_interrupts`].
    unsafe fn enable_fault_interrupts(&mut self);

    /// Sets PendSV pending (ICSR.PENDSVSET).
    fn pend_sv(&mut self);

    /// # Safety
    ///
    /// Priorities decide which handlers may preempt the kernel.
    unsafe fn set_handler_priority(&mut self, handler: SystemHandler, priority: u8);
}

pub trait Machine: Registers {
    /// LR on exception entry.
    fn exc_return(&self) -> ExcReturn;

    /// r4-r11.
    fn callee_saved(&self) -> [u32; 8];

    /// # Safety
    ///
    /// Replaces registers the interrupted code expects preserved.
    unsafe fn set_callee_saved(&mut self, regs: [u32; 8]);

    /// s16-s31.
    fn fp_callee_saved(&self) -> [u32; 16];

    /// # Safety
    ///
    /// See [`Machine::set_callee_saved`].
    unsafe fn set_fp_callee_saved(&mut self, regs: [u32; 16]);

    /// # Safety
    ///
    /// The address must be word aligned and mapped.
    unsafe fn read_word(&self, addr: Address) -> u32;

    /// # Safety
    ///
    /// The address must be word aligned and mapped, and nothing else may be
    /// using it.
    unsafe fn write_word(&mut self, addr: Address, value: u32);

    /// `bx lr` with an EXC_RETURN value: unstacks the hardware frame and
    /// resumes the mode and stack it names.
    ///
    /// # Safety
    ///
    /// The selected stack must hold a valid exception frame.
    unsafe fn exception_return(&mut self, exc_return: ExcReturn);

    /// Executes `svc #number`.
    fn supervisor_call(&mut self, number: u8);

    /// Stops this core for good.
    fn halt(&mut self) -> ! {
        crate::port::halt()
    }
}
