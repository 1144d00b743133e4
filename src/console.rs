//! Text output over ITM stimulus port 0.

use core::fmt::{self, Write};

use spin::Mutex;

use crate::{
    cpu::Registers,
    port::{interrupt_free, is_inside_interrupt},
};

/// Writes `args` to `out` without ever spinning on `out` from a handler.
///
/// Thread-mode callers take the lock inside an [`interrupt_free`] section,
/// so handlers below the syscall ceiling cannot preempt the holder. BASEPRI
/// writes are ignored in unprivileged thread mode, and handlers above the
/// ceiling are never masked, so a handler can still find the lock held. It
/// then drops its output.
///
/// Returns whether `args` was written.
pub fn write_guarded<R, W>(cpu: &mut R, out: &Mutex<W>, args: fmt::Arguments) -> bool
where
    R: Registers + ?Sized,
    W: Write,
{
    if is_inside_interrupt(cpu) {
        return match out.try_lock() {
            Some(mut out) => out.write_fmt(args).is_ok(),
            None => false,
        };
    }
    interrupt_free(cpu, |_| out.lock().write_fmt(args).is_ok())
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod itm_stdout {
    use core::fmt::{self, Write};

    use cortex_m::{itm, peripheral::Peripherals};
    use spin::Mutex;

    use crate::cpu::Hardware;

    struct Stdout;

    impl Write for Stdout {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            // The ITM is only ever written from here, under `STDOUT`.
            let mut itm = unsafe { Peripherals::steal().ITM };
            itm::write_str(&mut itm.stim[0], s);
            Ok(())
        }
    }

    static STDOUT: Mutex<Stdout> = Mutex::new(Stdout);

    /// Prints formatted string by [`core::format_args!`].
    pub fn _print(args: fmt::Arguments) {
        let _ = super::write_guarded(&mut Hardware, &STDOUT, args);
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::itm_stdout::_print;

#[macro_export]
macro_rules! print {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::_print(format_args!($fmt $(, $($arg)+)?));
    }
}

#[macro_export]
macro_rules! println {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::_print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?));
    }
}
