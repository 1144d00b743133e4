//! Supervisor-call numbers shared by the port layer and the kernel's
//! system-call dispatcher.
//!
//! The immediate of an `svc` instruction is a single byte. Numbers below
//! `100` are reserved for the kernel's own system-call table; the port
//! layer owns the range starting at `100`.
#![no_std]

use core::fmt;

/// Starts the scheduler by restoring the first task's context.
pub const START_SCHEDULER: u8 = 102;

/// Raises the privilege of the calling task.
pub const RAISE_PRIVILEGE: u8 = 103;

/// Returns from a system call executed on the system-call stack.
pub const SYSTEM_CALL_EXIT: u8 = 104;

/// Requests a context switch.
pub const YIELD: u8 = 105;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvcNumber {
    StartScheduler = START_SCHEDULER,
    RaisePrivilege = RAISE_PRIVILEGE,
    SystemCallExit = SYSTEM_CALL_EXIT,
    Yield          = YIELD,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownSvc(pub u8);

impl fmt::Display for UnknownSvc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown supervisor call: {}", self.0)
    }
}

impl TryFrom<u8> for SvcNumber {
    type Error = UnknownSvc;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            START_SCHEDULER => Ok(SvcNumber::StartScheduler),
            RAISE_PRIVILEGE => Ok(SvcNumber::RaisePrivilege),
            SYSTEM_CALL_EXIT => Ok(SvcNumber::SystemCallExit),
            YIELD => Ok(SvcNumber::Yield),
            other => Err(UnknownSvc(other)),
        }
    }
}

impl From<SvcNumber> for u8 {
    fn from(number: SvcNumber) -> Self {
        number as u8
    }
}
