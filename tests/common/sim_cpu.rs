use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use spin::Mutex;
use yeli_port::{
    cpu::{Address, Control, ExcReturn, Machine, Registers, SystemHandler, WORD},
    port::ExceptionFrame,
};

/// Something the simulated core did that a test may care about the order
/// of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    BasePri(u32),
    Control(u32),
    Msp(Address),
    Dsb,
    Isb,
    EnableInterrupts,
    EnableFaults,
    PendSv,
    Select,
    Svc(u8),
    Dispatch(Address),
    ExceptionReturn(u32),
    /// A word written through [`Machine`] to a watched address, a task's
    /// saved top of stack.
    TopOfStack(Address, u32),
}

/// A handle that records into a core's event log from outside the core,
/// e.g. from a task selector.
#[derive(Clone)]
pub struct Tracer(Arc<Mutex<Vec<Event>>>);

impl Tracer {
    pub fn record(&self, event: Event) {
        self.0.lock().push(event);
    }
}

type SvcHook = Box<dyn FnMut(&mut SimCpu, u8) + Send>;

/// A Cortex-M33 core reduced to what the port touches: the register file,
/// the special registers, word-addressed memory and exception entry and
/// return.
pub struct SimCpu {
    /// r0-r12
    pub r:    [u32; 13],
    pub lr:   u32,
    pub pc:   u32,
    pub xpsr: u32,
    /// s0-s31
    pub s:    [u32; 32],

    pub control:   Control,
    pub basepri:   u32,
    pub primask:   bool,
    pub faultmask: bool,
    pub psp:       Address,
    pub psplim:    Address,
    pub msp:       Address,
    pub vtor:      Address,

    pub pendsv_pending: bool,
    pub priorities:     HashMap<SystemHandler, u8>,
    pub last_svc:       Option<u8>,

    active:   Vec<u32>,
    memory:   HashMap<Address, u32>,
    watched:  HashSet<Address>,
    accesses: Arc<AtomicUsize>,
    halted:   Arc<AtomicBool>,
    events:   Arc<Mutex<Vec<Event>>>,
    svc_hook: Option<SvcHook>,
}

impl SimCpu {
    /// A core fresh out of reset: privileged thread mode on MSP.
    pub fn new() -> Self {
        Self {
            r:              [0; 13],
            lr:             0xFFFF_FFFF,
            pc:             0,
            xpsr:           ExceptionFrame::INITIAL_XPSR,
            s:              [0; 32],
            control:        Control::empty(),
            basepri:        0,
            primask:        false,
            faultmask:      false,
            psp:            0,
            psplim:         0,
            msp:            0,
            vtor:           0,
            pendsv_pending: false,
            priorities:     HashMap::new(),
            last_svc:       None,
            active:         Vec::new(),
            memory:         HashMap::new(),
            watched:        HashSet::new(),
            accesses:       Arc::new(AtomicUsize::new(0)),
            halted:         Arc::new(AtomicBool::new(false)),
            events:         Arc::new(Mutex::new(Vec::new())),
            svc_hook:       None,
        }
    }

    /// Reads memory without counting it as an access by the code under test.
    pub fn peek(&self, addr: Address) -> u32 {
        assert_eq!(addr % WORD, 0, "unaligned read at {:#010x}", addr);
        match self.memory.get(&addr) {
            Some(value) => *value,
            None => panic!("read of unmapped memory at {:#010x}", addr),
        }
    }

    pub fn poke(&mut self, addr: Address, value: u32) {
        assert_eq!(addr % WORD, 0, "unaligned write at {:#010x}", addr);
        self.memory.insert(addr, value);
    }

    pub fn peek_words<const N: usize>(&self, addr: Address) -> [u32; N] {
        let mut words = [0; N];
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.peek(addr + i as Address * WORD);
        }
        words
    }

    pub fn poke_words(&mut self, addr: Address, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.poke(addr + i as Address * WORD, *word);
        }
    }

    /// Records [`Event::TopOfStack`] for writes to `tcb` made through
    /// [`Machine`].
    pub fn watch(&mut self, tcb: Address) {
        self.watched.insert(tcb);
    }

    /// Memory accesses made through [`Machine`].
    pub fn accesses(&self) -> Arc<AtomicUsize> {
        self.accesses.clone()
    }

    pub fn halted(&self) -> Arc<AtomicBool> {
        self.halted.clone()
    }

    pub fn tracer(&self) -> Tracer {
        Tracer(self.events.clone())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear_events(&mut self) {
        self.events.lock().clear();
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    /// Installs what runs when the core takes SVCall.
    pub fn on_svc<F>(&mut self, hook: F)
    where
        F: FnMut(&mut SimCpu, u8) + Send + 'static,
    {
        self.svc_hook = Some(Box::new(hook));
    }

    pub fn in_thread_mode(&self) -> bool {
        self.active.is_empty()
    }

    /// The stack pointer in use right now.
    pub fn sp(&self) -> Address {
        if self.in_thread_mode() && self.control.contains(Control::SPSEL) {
            self.psp
        } else {
            self.msp
        }
    }

    fn set_sp(&mut self, on_psp: bool, sp: Address) {
        if on_psp {
            self.psp = sp;
        } else {
            self.msp = sp;
        }
    }

    /// Takes exception `number`: stacks the caller's frame the way the
    /// hardware does, loads EXC_RETURN into LR and runs `handler`.
    pub fn take_exception<F>(&mut self, number: u32, handler: F)
    where
        F: FnOnce(&mut SimCpu),
    {
        let from_thread = self.in_thread_mode();
        let on_psp = from_thread && self.control.contains(Control::SPSEL);
        let extended = self.control.contains(Control::FPCA);

        let size = if extended { ExceptionFrame::EXTENDED_SIZE } else { ExceptionFrame::SIZE };
        let sp = self.sp() - size;
        let frame = ExceptionFrame {
            r0:   self.r[0],
            r1:   self.r[1],
            r2:   self.r[2],
            r3:   self.r[3],
            r12:  self.r[12],
            lr:   self.lr,
            pc:   self.pc,
            xpsr: self.xpsr,
        };
        self.poke_words(sp, &frame.to_words());
        if extended {
            let s0_s15: Vec<u32> = self.s[..16].to_vec();
            self.poke_words(sp + ExceptionFrame::SIZE, &s0_s15);
            // FPSCR and the reserved word.
            self.poke_words(sp + ExceptionFrame::SIZE + 16 * WORD, &[0, 0]);
        }
        self.set_sp(on_psp, sp);

        let mut exc_return = ExcReturn::HANDLER_MSP;
        exc_return.set(ExcReturn::MODE, from_thread);
        exc_return.set(ExcReturn::SPSEL, on_psp);
        self.lr = exc_return.with_fp_context(extended).bits();

        self.control.remove(Control::FPCA);
        self.active.push(number);
        handler(self);
    }

    /// The number of the exception the core is handling, if any.
    pub fn active_exception(&self) -> Option<u32> {
        self.active.last().copied()
    }
}

impl Default for SimCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers for SimCpu {
    fn control(&self) -> Control {
        self.control
    }

    unsafe fn set_control(&mut self, control: Control) {
        self.record(Event::Control(control.bits()));
        self.control = control;
    }

    fn basepri(&self) -> u32 {
        self.basepri
    }

    unsafe fn set_basepri(&mut self, value: u32) {
        self.record(Event::BasePri(value));
        self.basepri = value;
    }

    fn psp(&self) -> Address {
        self.psp
    }

    unsafe fn set_psp(&mut self, sp: Address) {
        self.psp = sp;
    }

    fn psplim(&self) -> Address {
        self.psplim
    }

    unsafe fn set_psplim(&mut self, limit: Address) {
        self.psplim = limit;
    }

    fn msp(&self) -> Address {
        self.msp
    }

    unsafe fn set_msp(&mut self, sp: Address) {
        self.record(Event::Msp(sp));
        self.msp = sp;
    }

    fn ipsr(&self) -> u32 {
        self.active_exception().unwrap_or(0)
    }

    fn vector_table(&self) -> Address {
        self.vtor
    }

    fn dsb(&mut self) {
        self.record(Event::Dsb);
    }

    fn isb(&mut self) {
        self.record(Event::Isb);
    }

    unsafe fn enable_interrupts(&mut self) {
        self.record(Event::EnableInterrupts);
        self.primask = false;
    }

    unsafe fn enable_fault_interrupts(&mut self) {
        self.record(Event::EnableFaults);
        self.faultmask = false;
    }

    fn pend_sv(&mut self) {
        self.record(Event::PendSv);
        self.pendsv_pending = true;
    }

    unsafe fn set_handler_priority(&mut self, handler: SystemHandler, priority: u8) {
        self.priorities.insert(handler, priority);
    }
}

impl Machine for SimCpu {
    fn exc_return(&self) -> ExcReturn {
        ExcReturn::from_bits_retain(self.lr)
    }

    fn callee_saved(&self) -> [u32; 8] {
        let mut regs = [0; 8];
        regs.copy_from_slice(&self.r[4..12]);
        regs
    }

    unsafe fn set_callee_saved(&mut self, regs: [u32; 8]) {
        self.r[4..12].copy_from_slice(&regs);
    }

    fn fp_callee_saved(&self) -> [u32; 16] {
        let mut regs = [0; 16];
        regs.copy_from_slice(&self.s[16..]);
        regs
    }

    unsafe fn set_fp_callee_saved(&mut self, regs: [u32; 16]) {
        self.s[16..].copy_from_slice(&regs);
    }

    unsafe fn read_word(&self, addr: Address) -> u32 {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        self.peek(addr)
    }

    unsafe fn write_word(&mut self, addr: Address, value: u32) {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.watched.contains(&addr) {
            self.record(Event::TopOfStack(addr, value));
        }
        self.poke(addr, value);
    }

    unsafe fn exception_return(&mut self, exc_return: ExcReturn) {
        self.record(Event::ExceptionReturn(exc_return.bits()));
        assert!(self.active.pop().is_some(), "exception return outside a handler");

        let on_psp = exc_return.uses_process_stack();
        let sp = if on_psp { self.psp } else { self.msp };
        let frame = ExceptionFrame::from_words(self.peek_words(sp));
        self.r[..4].copy_from_slice(&[frame.r0, frame.r1, frame.r2, frame.r3]);
        self.r[12] = frame.r12;
        self.lr = frame.lr;
        self.pc = frame.pc;
        self.xpsr = frame.xpsr;

        let extended = exc_return.has_fp_context();
        let size = if extended {
            let s0_s15: [u32; 16] = self.peek_words(sp + ExceptionFrame::SIZE);
            self.s[..16].copy_from_slice(&s0_s15);
            ExceptionFrame::EXTENDED_SIZE
        } else {
            ExceptionFrame::SIZE
        };
        self.set_sp(on_psp, sp + size);

        if exc_return.returns_to_thread() {
            self.control.set(Control::SPSEL, on_psp);
            self.control.set(Control::FPCA, extended);
        }
    }

    fn supervisor_call(&mut self, number: u8) {
        self.record(Event::Svc(number));
        self.last_svc = Some(number);
        // The stacked return address is the instruction after `svc`.
        self.pc += 2;

        let mut hook = match self.svc_hook.take() {
            Some(hook) => hook,
            None => panic!("svc #{} with no handler installed", number),
        };
        self.take_exception(SystemHandler::SVCall.exception_number(), |cpu| hook(cpu, number));
        self.svc_hook = Some(hook);
    }

    fn halt(&mut self) -> ! {
        self.halted.store(true, Ordering::SeqCst);
        loop {
            std::thread::park();
        }
    }
}
