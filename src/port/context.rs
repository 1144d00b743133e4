//! Saving and restoring a task's register file on its own stack.
//!
//! A suspended task's process stack ends with, from its saved top of stack
//! upwards:
//!
//! ```text
//!   [ContextFrame]   PSPLIM, EXC_RETURN, r4-r11          (pushed by PendSV)
//!   [FpContext]      s16-s31, extended frames only       (pushed by PendSV)
//!   [ExceptionFrame] r0-r3, r12, lr, pc, xPSR            (pushed by hardware)
//! ```
//!
//! Save and restore mirror each other exactly (`stmdb` / `ldmia`), so the
//! frame layout is defined once here and shared by the handler, the first
//! task restore and whoever builds a new task's stack.

use log::{error, trace};

use super::{CurrentTask, TaskSelector};
use crate::{
    config::MAX_SYSCALL_INTERRUPT_PRIORITY,
    cpu::{Address, ExcReturn, Machine, WORD},
};

/// The software-saved part of a task context.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContextFrame {
    /* 0 */ pub psplim:     u32,
    /* 4 */ pub exc_return: u32,
    /* 8 */ pub r4_r11:     [u32; 8],
}

impl ContextFrame {
    pub const WORDS: usize = 10;
    pub const SIZE: Address = Self::WORDS as Address * WORD;

    pub fn new(psplim: Address, exc_return: ExcReturn, r4_r11: [u32; 8]) -> Self {
        Self { psplim, exc_return: exc_return.bits(), r4_r11 }
    }

    pub fn exc_return(&self) -> ExcReturn {
        ExcReturn::from_bits_retain(self.exc_return)
    }

    pub fn to_words(&self) -> [u32; Self::WORDS] {
        let mut words = [0; Self::WORDS];
        words[0] = self.psplim;
        words[1] = self.exc_return;
        words[2..].copy_from_slice(&self.r4_r11);
        words
    }

    pub fn from_words(words: [u32; Self::WORDS]) -> Self {
        let mut r4_r11 = [0; 8];
        r4_r11.copy_from_slice(&words[2..]);
        Self { psplim: words[0], exc_return: words[1], r4_r11 }
    }

    /// # Safety
    ///
    /// `at` must be the saved top of stack of a suspended task.
    pub unsafe fn load<M: Machine + ?Sized>(cpu: &M, at: Address) -> Self {
        Self::from_words(read_words(cpu, at))
    }

    /// # Safety
    ///
    /// The frame is written to `at..at + SIZE`, which must belong to the
    /// task's stack.
    pub unsafe fn store<M: Machine + ?Sized>(&self, cpu: &mut M, at: Address) {
        write_words(cpu, at, &self.to_words());
    }
}

/// The callee-saved floating-point registers.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FpContext {
    pub s16_s31: [u32; 16],
}

impl FpContext {
    pub const SIZE: Address = 16 * WORD;

    /// # Safety
    ///
    /// See [`ContextFrame::load`].
    pub unsafe fn load<M: Machine + ?Sized>(cpu: &M, at: Address) -> Self {
        Self { s16_s31: read_words(cpu, at) }
    }

    /// # Safety
    ///
    /// See [`ContextFrame::store`].
    pub unsafe fn store<M: Machine + ?Sized>(&self, cpu: &mut M, at: Address) {
        write_words(cpu, at, &self.s16_s31);
    }
}

/// The registers the processor stacks on exception entry.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionFrame {
    /* 0x00 */ pub r0:   u32,
    /* 0x04 */ pub r1:   u32,
    /* 0x08 */ pub r2:   u32,
    /* 0x0c */ pub r3:   u32,
    /* 0x10 */ pub r12:  u32,
    /* 0x14 */ pub lr:   u32,
    /* 0x18 */ pub pc:   u32,
    /* 0x1c */ pub xpsr: u32,
}

impl ExceptionFrame {
    pub const WORDS: usize = 8;
    pub const SIZE: Address = Self::WORDS as Address * WORD;

    /// An extended frame adds s0-s15, FPSCR and one reserved word.
    pub const EXTENDED_WORDS: usize = Self::WORDS + 18;
    pub const EXTENDED_SIZE: Address = Self::EXTENDED_WORDS as Address * WORD;

    /// xPSR with only the Thumb bit set, as a new task starts.
    pub const INITIAL_XPSR: u32 = 1 << 24;

    pub fn to_words(&self) -> [u32; Self::WORDS] {
        [self.r0, self.r1, self.r2, self.r3, self.r12, self.lr, self.pc, self.xpsr]
    }

    pub fn from_words(words: [u32; Self::WORDS]) -> Self {
        let [r0, r1, r2, r3, r12, lr, pc, xpsr] = words;
        Self { r0, r1, r2, r3, r12, lr, pc, xpsr }
    }

    /// # Safety
    ///
    /// `at` must be the stack pointer the exception was taken on.
    pub unsafe fn load<M: Machine + ?Sized>(cpu: &M, at: Address) -> Self {
        Self::from_words(read_words(cpu, at))
    }

    /// # Safety
    ///
    /// See [`ContextFrame::store`].
    pub unsafe fn store<M: Machine + ?Sized>(&self, cpu: &mut M, at: Address) {
        write_words(cpu, at, &self.to_words());
    }
}

unsafe fn read_words<M: Machine + ?Sized, const N: usize>(cpu: &M, at: Address) -> [u32; N] {
    let mut words = [0; N];
    for (i, word) in words.iter_mut().enumerate() {
        *word = cpu.read_word(at + i as Address * WORD);
    }
    words
}

unsafe fn write_words<M: Machine + ?Sized>(cpu: &mut M, at: Address, words: &[u32]) {
    for (i, word) in words.iter().enumerate() {
        cpu.write_word(at + i as Address * WORD, *word);
    }
}

/// The PendSV handler: switches from the current task to whichever task
/// `selector` leaves in `current`.
///
/// # Safety
///
/// Must run as the PendSV exception taken from a task: LR holds EXC_RETURN
/// and PSP points at the hardware-stacked frame of the task in `current`.
pub unsafe fn pend_sv_handler<M, S>(cpu: &mut M, current: &CurrentTask, selector: &mut S)
where
    M: Machine + ?Sized,
    S: TaskSelector + ?Sized,
{
    let Some(tcb) = current.get() else {
        error!("context switch without a current task");
        cpu.halt()
    };

    let exc_return = cpu.exc_return();
    let mut top = cpu.psp();
    if exc_return.has_fp_context() {
        top -= FpContext::SIZE;
        FpContext { s16_s31: cpu.fp_callee_saved() }.store(cpu, top);
    }
    top -= ContextFrame::SIZE;
    ContextFrame::new(cpu.psplim(), exc_return, cpu.callee_saved()).store(cpu, top);
    cpu.write_word(tcb, top);
    trace!("saved task {:#010x}, top of stack {:#010x}", tcb, top);

    cpu.set_basepri(MAX_SYSCALL_INTERRUPT_PRIORITY);
    cpu.dsb();
    cpu.isb();
    selector.select_next();
    cpu.set_basepri(0);

    let Some(tcb) = current.get() else {
        error!("no task selected to run next");
        cpu.halt()
    };

    let mut top = cpu.read_word(tcb);
    let frame = ContextFrame::load(&*cpu, top);
    top += ContextFrame::SIZE;
    cpu.set_callee_saved(frame.r4_r11);

    let exc_return = frame.exc_return();
    if exc_return.has_fp_context() {
        let fp = FpContext::load(&*cpu, top);
        top += FpContext::SIZE;
        cpu.set_fp_callee_saved(fp.s16_s31);
    }

    cpu.set_psplim(frame.psplim);
    cpu.set_psp(top);
    trace!("resuming task {:#010x}, top of stack {:#010x}", tcb, top);
    cpu.exception_return(exc_return);
}
