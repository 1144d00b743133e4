//! Scheduler port for ARMv8-M Mainline (Cortex-M33) without TrustZone.
//!
//! See [`port`] for the context switch and the primitives around it, and
//! [`cpu`] for the register interface they are written against.
#![cfg_attr(not(test), no_std)]

#[cfg(all(target_arch = "arm", target_os = "none"))]
use log::{info, SetLoggerError};

pub mod config;
pub mod console;
pub mod cpu;
#[cfg(all(target_arch = "arm", target_os = "none"))]
mod lang_items;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod logger;
pub mod port;

/// Installs the ITM logger and reports the interrupt configuration.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn init() -> Result<(), SetLoggerError> {
    logger::init(config::LOG_LEVEL)?;
    info!(
        "port ready: syscall ceiling {:#04x} (logical {}), fpu context {}",
        config::MAX_SYSCALL_INTERRUPT_PRIORITY,
        config::MAX_SYSCALL_LOGICAL_PRIORITY,
        config::FPU_PRESENT,
    );
    Ok(())
}
