use core::panic::PanicInfo;

use log::error;

use crate::port::halt;

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    if let Some(location) = info.location() {
        error!("[panic] at {}:{} {}", location.file(), location.line(), info.message());
    } else {
        error!("[panic] {}", info.message());
    }
    halt()
}
