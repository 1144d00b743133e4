use bit_field::BitField;
use bitflags::bitflags;

bitflags! {
    /// The CONTROL special register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Thread mode is unprivileged.
        const NPRIV = 1 << 0;
        /// Thread mode runs on the process stack.
        const SPSEL = 1 << 1;
        /// A floating-point context is active.
        const FPCA  = 1 << 2;
        /// The floating-point context belongs to the secure state.
        const SFPA  = 1 << 3;
    }
}

bitflags! {
    /// The EXC_RETURN value held in LR while an exception is active.
    ///
    /// Bits not named here are reserved and must be preserved, so values
    /// are always built with `from_bits_retain`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExcReturn: u32 {
        /// The exception was taken to the secure state.
        const ES    = 1 << 0;
        /// Return to the process stack.
        const SPSEL = 1 << 2;
        /// Return to thread mode.
        const MODE  = 1 << 3;
        /// Standard (integer only) frame. Clear for an extended FP frame.
        const FTYPE = 1 << 4;
        /// Default callee register stacking.
        const DCRS  = 1 << 5;
        /// The registers were stacked by the secure state.
        const S     = 1 << 6;
    }
}

impl ExcReturn {
    /// Return to thread mode on the process stack, integer frame.
    pub const THREAD_PSP: Self = Self::from_bits_retain(0xFFFF_FFBC);

    /// Return to thread mode on the main stack, integer frame.
    pub const THREAD_MSP: Self = Self::from_bits_retain(0xFFFF_FFB8);

    /// Return to handler mode, integer frame.
    pub const HANDLER_MSP: Self = Self::from_bits_retain(0xFFFF_FFB0);

    /// Whether the interrupted code was using the process stack.
    pub fn uses_process_stack(self) -> bool {
        self.contains(Self::SPSEL)
    }

    pub fn returns_to_thread(self) -> bool {
        self.contains(Self::MODE)
    }

    /// Whether the hardware stacked an extended frame, in which case the
    /// callee-saved FP registers belong to the task too.
    pub fn has_fp_context(self) -> bool {
        !self.contains(Self::FTYPE)
    }

    /// Same return, with the frame type switched to extended (`true`) or
    /// standard (`false`).
    pub fn with_fp_context(self, fp: bool) -> Self {
        let mut value = self;
        value.set(Self::FTYPE, !fp);
        value
    }
}

/// System handlers whose priority the port configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemHandler {
    SVCall,
    PendSV,
    SysTick,
}

impl SystemHandler {
    /// The exception number reported in IPSR while the handler runs.
    pub const fn exception_number(self) -> u32 {
        match self {
            SystemHandler::SVCall => 11,
            SystemHandler::PendSV => 14,
            SystemHandler::SysTick => 15,
        }
    }
}

/// The active exception number held in IPSR[8:0]. Zero in thread mode.
pub fn exception_number(ipsr: u32) -> u32 {
    ipsr.get_bits(0..9)
}
