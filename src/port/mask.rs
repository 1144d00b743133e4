use core::ops::{Deref, DerefMut};

use crate::{config::MAX_SYSCALL_INTERRUPT_PRIORITY, cpu::Registers};

/// Raises BASEPRI to the syscall ceiling and returns the previous value.
///
/// Hand the result to [`clear_interrupt_mask`] to leave the critical
/// section. Never returns zero while already inside one.
pub fn set_interrupt_mask<R: Registers + ?Sized>(cpu: &mut R) -> u32 {
    let saved = cpu.basepri();
    // A stricter floor is relaxed to the ceiling until restored.
    unsafe { cpu.set_basepri(MAX_SYSCALL_INTERRUPT_PRIORITY) };
    cpu.dsb();
    cpu.isb();
    saved
}

/// Writes `saved` back to BASEPRI.
///
/// # Safety
///
/// `saved` must come from the matching [`set_interrupt_mask`]. Passing
/// zero from inside a nested section unmasks the outer one.
pub unsafe fn clear_interrupt_mask<R: Registers + ?Sized>(cpu: &mut R, saved: u32) {
    cpu.set_basepri(saved);
    cpu.dsb();
    cpu.isb();
}

/// A BASEPRI critical section, left when dropped.
///
/// The guard borrows the registers mutably and hands them back through
/// `Deref`, so a nested section is entered through the outer guard.
pub struct CriticalSection<'a, R: Registers + ?Sized> {
    cpu:   &'a mut R,
    saved: u32,
}

impl<'a, R: Registers + ?Sized> CriticalSection<'a, R> {
    pub fn enter(cpu: &'a mut R) -> Self {
        let saved = set_interrupt_mask(cpu);
        Self { cpu, saved }
    }

    /// BASEPRI as it was before this section.
    pub fn saved_mask(&self) -> u32 {
        self.saved
    }
}

impl<R: Registers + ?Sized> Deref for CriticalSection<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &*self.cpu
    }
}

impl<R: Registers + ?Sized> DerefMut for CriticalSection<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut *self.cpu
    }
}

impl<R: Registers + ?Sized> Drop for CriticalSection<'_, R> {
    fn drop(&mut self) {
        unsafe { clear_interrupt_mask(&mut *self.cpu, self.saved) };
    }
}

/// Runs `f` with kernel-aware interrupts masked.
pub fn interrupt_free<R, T, F>(cpu: &mut R, f: F) -> T
where
    R: Registers + ?Sized,
    F: FnOnce(&mut R) -> T,
{
    let mut section = CriticalSection::enter(cpu);
    f(&mut *section)
}
