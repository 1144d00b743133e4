use core::arch::asm;

use cortex_m::{
    asm as barrier,
    interrupt,
    peripheral::{scb, Peripherals, SCB},
    register::{self, control},
};

use super::{Address, Control, Registers, SystemHandler};

/// The registers of the core this code runs on.
pub struct Hardware;

impl From<SystemHandler> for scb::SystemHandler {
    fn from(handler: SystemHandler) -> Self {
        match handler {
            SystemHandler::SVCall => scb::SystemHandler::SVCall,
            SystemHandler::PendSV => scb::SystemHandler::PendSV,
            SystemHandler::SysTick => scb::SystemHandler::SysTick,
        }
    }
}

impl Registers for Hardware {
    fn control(&self) -> Control {
        Control::from_bits_retain(control::read().bits())
    }

    unsafe fn set_control(&mut self, value: Control) {
        control::write(control::Control::from_bits(value.bits()));
    }

    fn basepri(&self) -> u32 {
        register::basepri::read() as u32
    }

    unsafe fn set_basepri(&mut self, value: u32) {
        register::basepri::write(value as u8);
    }

    fn psp(&self) -> Address {
        register::psp::read()
    }

    unsafe fn set_psp(&mut self, sp: Address) {
        register::psp::write(sp);
    }

    fn psplim(&self) -> Address {
        register::psplim::read()
    }

    unsafe fn set_psplim(&mut self, limit: Address) {
        register::psplim::write(limit);
    }

    fn msp(&self) -> Address {
        register::msp::read()
    }

    unsafe fn set_msp(&mut self, sp: Address) {
        register::msp::write(sp);
    }

    fn ipsr(&self) -> u32 {
        let ipsr: u32;
        unsafe {
            asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            )
        }
        ipsr
    }

    fn vector_table(&self) -> Address {
        unsafe { (*SCB::PTR).vtor.read() }
    }

    fn dsb(&mut self) {
        barrier::dsb();
    }

    fn isb(&mut self) {
        barrier::isb();
    }

    unsafe fn enable_interrupts(&mut self) {
        interrupt::enable();
    }

    unsafe fn enable_fault_interrupts(&mut self) {
        asm!("cpsie f", options(nomem, nostack, preserves_flags));
    }

    fn pend_sv(&mut self) {
        SCB::set_pendsv();
    }

    unsafe fn set_handler_priority(&mut self, handler: SystemHandler, priority: u8) {
        let mut peripherals = Peripherals::steal();
        peripherals.SCB.set_priority(handler.into(), priority);
    }
}
