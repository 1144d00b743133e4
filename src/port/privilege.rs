use log::trace;

use crate::cpu::{Control, Registers};

/// Whether thread mode runs privileged (CONTROL.nPRIV clear).
pub fn is_privileged<R: Registers + ?Sized>(cpu: &R) -> bool {
    !cpu.control().contains(Control::NPRIV)
}

/// Clears CONTROL.nPRIV.
///
/// # Safety
///
/// Grants the caller full access to the processor. Only the kernel's
/// raise-privilege supervisor call and code that is already privileged
/// may reach this.
pub unsafe fn raise_privilege<R: Registers + ?Sized>(cpu: &mut R) {
    let control = cpu.control().difference(Control::NPRIV);
    cpu.set_control(control);
}

/// Sets CONTROL.nPRIV. Thread mode stays unprivileged until an exception
/// handler raises it again.
pub fn reset_privilege<R: Registers + ?Sized>(cpu: &mut R) {
    let control = cpu.control().union(Control::NPRIV);
    // Dropping privilege cannot widen what the caller may do.
    unsafe { cpu.set_control(control) };
}

/// Runs `f` privileged, then puts the privilege level back the way it was.
///
/// # Safety
///
/// See [`raise_privilege`].
pub unsafe fn with_privilege<R, T, F>(cpu: &mut R, f: F) -> T
where
    R: Registers + ?Sized,
    F: FnOnce(&mut R) -> T,
{
    let was_privileged = is_privileged(cpu);
    if !was_privileged {
        trace!("raising privilege");
        raise_privilege(cpu);
    }

    let result = f(cpu);

    if !was_privileged {
        reset_privilege(cpu);
    }
    result
}
