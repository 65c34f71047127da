//! The runtime aggregate: code space, net graph, scopes, threads,
//! scheduler, and diagnostics in one context object.
//!
//! Everything is single-threaded and cooperative. There is one running
//! thread at a time; net propagation happens synchronously inside the
//! scheduler event that caused it.

use crate::array::ArrayArena;
use crate::code::{CodeAddr, CodeSpace, VpiCallId};
use crate::debug::ExecTraceOptions;
use crate::error::{Diagnostics, LoadError};
use crate::exec::{Thread, ThreadArena, ThreadId, ThreadState};
use crate::net::{NetArena, NetId, NetPtr, NodeFun};
use crate::object::ObjectRef;
use crate::schedule::{SchedEvent, Scheduler};
use crate::scope::{ContextId, ContextSlot, ScopeArena, ScopeId};
use crate::vcd::VcdWriter;
use crate::vector4::Vector4;
use std::rc::Rc;

/// Why [`Runtime::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// `$finish` was called.
    Finished,
    /// `$stop` was called; the wheel still holds events.
    Stopped,
    /// The event wheel drained.
    Drained,
}

/// A registered VPI callable, invoked by the `vpi_call` opcode.
pub trait VpiCall {
    fn call(&self, rt: &mut Runtime, thread: ThreadId);
}

impl<F: Fn(&mut Runtime, ThreadId)> VpiCall for F {
    fn call(&self, rt: &mut Runtime, thread: ThreadId) {
        self(rt, thread)
    }
}

pub struct Runtime {
    pub(crate) code: CodeSpace,
    pub(crate) nets: NetArena,
    pub(crate) arrays: ArrayArena,
    pub(crate) scopes: ScopeArena,
    pub(crate) threads: ThreadArena,
    pub(crate) sched: Scheduler,
    pub(crate) diags: Diagnostics,
    pub(crate) trace: ExecTraceOptions,
    pub(crate) vpi_calls: Vec<Rc<dyn VpiCall>>,
    pub(crate) running: Option<ThreadId>,
    pub(crate) vcd: Option<VcdWriter>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("time", &self.sched.time())
            .field("nets", &self.nets.len())
            .field("scopes", &self.scopes.len())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Runtime {
            code: CodeSpace::default(),
            nets: NetArena::new(),
            arrays: ArrayArena::new(),
            scopes: ScopeArena::new(),
            threads: ThreadArena::new(),
            sched: Scheduler::new(),
            diags: Diagnostics::new(),
            trace: ExecTraceOptions::default(),
            vpi_calls: Vec::new(),
            running: None,
            vcd: None,
        }
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    // ── construction surface (elaboration time) ─────────────

    pub fn nets(&self) -> &NetArena {
        &self.nets
    }

    pub fn nets_mut(&mut self) -> &mut NetArena {
        &mut self.nets
    }

    pub fn scopes(&self) -> &ScopeArena {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeArena {
        &mut self.scopes
    }

    pub fn arrays(&self) -> &ArrayArena {
        &self.arrays
    }

    pub fn arrays_mut(&mut self) -> &mut ArrayArena {
        &mut self.arrays
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diags
    }

    /// Install the loaded code space. The code is read-only afterwards.
    pub fn install_code(&mut self, code: CodeSpace) {
        self.code = code;
    }

    pub fn register_vpi_call(&mut self, call: Rc<dyn VpiCall>) -> VpiCallId {
        self.vpi_calls.push(call);
        VpiCallId(self.vpi_calls.len() as u32 - 1)
    }

    /// Declare a signal net inside a scope, for name lookup and dumping.
    pub fn declare_signal(&mut self, scope: ScopeId, net: NetId) {
        self.scopes.scope_mut(scope).nets.push(net);
    }

    /// Push every constant driver's value through its links. Called once
    /// at the end of elaboration, before the first run.
    pub fn propagate_initial(&mut self) {
        for idx in 0..self.nets.len() {
            let net = NetId(idx as u32);
            if let NodeFun::Const(value) = &self.nets.node(net).fun {
                let value = value.clone();
                self.propagate_value(net, value);
            }
        }
    }

    /// Bootstrap a root thread (an `initial`/`always` process) at `addr`.
    /// The thread is scheduled at time zero.
    pub fn spawn_root(&mut self, addr: CodeAddr, scope: ScopeId) -> ThreadId {
        let tid = self.threads.alloc(Thread::new(addr, scope));
        self.scopes.scope_mut(scope).threads.insert(tid);
        self.schedule_thread(tid, 0, false);
        tid
    }

    // ── name lookup ─────────────────────────────────────────

    /// Resolve `scope_path.signal_name` to a net id.
    pub fn signal(&self, path: &str) -> Result<NetId, LoadError> {
        let (scope_path, name) = match path.rsplit_once('.') {
            Some(pair) => pair,
            None => {
                return Err(LoadError::UnknownSignal {
                    path: path.to_string(),
                })
            }
        };
        let scope = self
            .scopes
            .by_path(scope_path)
            .ok_or_else(|| LoadError::UnknownScope {
                path: scope_path.to_string(),
            })?;
        self.scopes
            .scope(scope)
            .nets
            .iter()
            .copied()
            .find(|id| self.nets.node(*id).name.as_deref() == Some(name))
            .ok_or_else(|| LoadError::UnknownSignal {
                path: path.to_string(),
            })
    }

    // ── value access (testbench / VPI surface) ──────────────

    pub fn now(&self) -> u64 {
        self.sched.time()
    }

    /// Observable value of a signal, outside any thread context.
    pub fn read_vec4(&self, net: NetId) -> Vector4 {
        self.signal_vec4(net)
    }

    pub fn read_real(&self, net: NetId) -> f64 {
        self.nets.read_real(net)
    }

    pub fn read_str(&self, net: NetId) -> String {
        self.nets.read_str(net)
    }

    pub fn read_obj(&self, net: NetId) -> ObjectRef {
        self.nets.read_obj(net)
    }

    /// Poke a signal from outside the simulation (test benches). Runs the
    /// resulting propagation synchronously.
    pub fn set_vec4(&mut self, net: NetId, value: Vector4) {
        self.send_vec4(NetPtr::new(net, 0), value);
    }

    pub fn set_real(&mut self, net: NetId, value: f64) {
        self.send_real(NetPtr::new(net, 0), value);
    }

    // ── the main loop ───────────────────────────────────────

    /// Drain scheduled events until `$finish`, `$stop`, or an empty wheel.
    pub fn run(&mut self) -> RunOutcome {
        loop {
            if self.sched.is_finished() {
                return RunOutcome::Finished;
            }
            if self.sched.is_stopped() {
                return RunOutcome::Stopped;
            }
            let Some(ev) = self.sched.next_event() else {
                return RunOutcome::Drained;
            };
            self.dispatch_event(ev);
        }
    }

    /// Run until simulation time would pass `limit`; events at `limit`
    /// itself still execute.
    pub fn run_to_time(&mut self, limit: u64) -> RunOutcome {
        loop {
            if self.sched.is_finished() {
                return RunOutcome::Finished;
            }
            if self.sched.is_stopped() {
                return RunOutcome::Stopped;
            }
            match self.sched.next_time() {
                Some(t) if t <= limit => {
                    let ev = self.sched.next_event().expect("populated slot");
                    self.dispatch_event(ev);
                }
                _ => return RunOutcome::Drained,
            }
        }
    }

    /// Process exit status: 0 on normal termination, nonzero once the
    /// diagnostic error count passes its threshold.
    pub fn exit_status(&self) -> i32 {
        if self.diags.over_threshold() {
            1
        } else {
            0
        }
    }

    fn dispatch_event(&mut self, ev: SchedEvent) {
        if self.trace.scheduler {
            eprintln!("[{}] {:?}", self.sched.time(), ev);
        }
        match ev {
            SchedEvent::RunThread(tid) => {
                if self.threads.is_live(tid) {
                    self.run_thread(tid);
                }
            }
            SchedEvent::AssignVec4 {
                ptr,
                base,
                vwid,
                value,
            } => {
                if base == 0 && value.len() as u32 == vwid {
                    self.send_vec4(ptr, value);
                } else {
                    self.send_vec4_pv(ptr, value, base as usize, vwid as usize);
                }
            }
            SchedEvent::AssignReal { ptr, value } => self.send_real(ptr, value),
            SchedEvent::AssignStr { ptr, value } => self.send_str(ptr, value),
            SchedEvent::AssignObj { ptr, value } => self.send_obj(ptr, value),
            SchedEvent::AssignArrayVec4 { array, adr, value } => {
                self.arrays.array_mut(array).set_vec4(adr, &value);
            }
            SchedEvent::AssignArrayReal { array, adr, value } => {
                self.arrays.array_mut(array).set_real(adr, value);
            }
            SchedEvent::RunUFunc(net) => self.run_ufunc(net),
            SchedEvent::DelThread(tid) => self.threads.free(tid),
        }
    }

    // ── scheduling helpers ──────────────────────────────────

    pub(crate) fn schedule_thread(&mut self, tid: ThreadId, delay: u64, push_front: bool) {
        let thr = self.threads.get_mut(tid);
        debug_assert!(!thr.is_scheduled);
        thr.is_scheduled = true;
        self.sched
            .schedule_active(SchedEvent::RunThread(tid), delay, push_front);
    }

    /// Capture a slice of the issuing thread's bit space by value and
    /// enqueue it as a non-blocking update.
    pub(crate) fn schedule_assign_plucked_vector(
        &mut self,
        ptr: NetPtr,
        delay: u64,
        value: Vector4,
    ) {
        let vwid = value.len() as u32;
        self.sched.schedule_nba(
            SchedEvent::AssignVec4 {
                ptr,
                base: 0,
                vwid,
                value,
            },
            delay,
        );
    }

    pub(crate) fn schedule_assign_vector(
        &mut self,
        ptr: NetPtr,
        base: usize,
        vwid: usize,
        value: Vector4,
        delay: u64,
    ) {
        self.sched.schedule_nba(
            SchedEvent::AssignVec4 {
                ptr,
                base: base as u32,
                vwid: vwid as u32,
                value,
            },
            delay,
        );
    }

    // ── thread execution ────────────────────────────────────

    /// Fetch/dispatch loop for one thread. Runs until a handler yields.
    pub(crate) fn run_thread(&mut self, tid: ThreadId) {
        {
            let thr = self.threads.get_mut(tid);
            thr.is_scheduled = false;
        }
        let prev_running = self.running;
        self.running = Some(tid);

        loop {
            let pc = self.threads.get(tid).pc;
            let Some(op) = self.code.op(pc) else {
                // A null program counter marks a zombie: it waits here
                // until a parent reaps it.
                self.reap_zombie(tid);
                break;
            };
            self.threads.get_mut(tid).pc = CodeAddr(pc.0 + 1);
            if self.trace.opcodes {
                eprintln!("thread {:?} @{}: {:?}", tid, pc.0, op);
            }
            if !self.execute_op(tid, op) {
                break;
            }
        }

        self.running = prev_running;
    }

    // ── net propagation ─────────────────────────────────────

    /// Deliver a full vector value to a net port and propagate.
    pub(crate) fn send_vec4(&mut self, ptr: NetPtr, value: Vector4) {
        let node = self.nets.node_mut(ptr.net);
        match &mut node.fun {
            NodeFun::Sig4(sig) => {
                let value = value.coerced(sig.width, false);
                match ptr.port {
                    0 => {
                        if sig.is_cassigned() {
                            // Bits under a continuous assign ignore the
                            // write; only static signals can be cassigned.
                            sig.write_procedural(&value);
                        } else {
                            self.store_sig4(ptr.net, value);
                        }
                        self.propagate_vec4(ptr.net);
                    }
                    1 => {
                        sig.set_cassign(&value);
                        self.propagate_vec4(ptr.net);
                    }
                    _ => {}
                }
            }
            NodeFun::Event(ev) => {
                let bit = value.value(0);
                if ev.sample(ptr.port, bit) {
                    self.trigger_event(ptr.net);
                }
            }
            NodeFun::Gate(gate) => {
                let idx = (ptr.port as usize).min(gate.inputs.len() - 1);
                gate.inputs[idx] = value.coerced(gate.width, false);
                let out = gate.compute();
                self.propagate_value(ptr.net, out);
            }
            NodeFun::Arith(arith) => {
                let idx = (ptr.port as usize).min(1);
                arith.inputs[idx] = value.coerced(arith.width, false);
                let out = arith.compute();
                self.propagate_value(ptr.net, out);
            }
            NodeFun::UFunc(fun) => {
                let idx = (ptr.port as usize).min(fun.inputs.len().saturating_sub(1));
                fun.inputs[idx] = value;
                if !fun.scheduled {
                    fun.scheduled = true;
                    self.sched.schedule_active(SchedEvent::RunUFunc(ptr.net), 0, false);
                }
            }
            NodeFun::Const(_) | NodeFun::SigReal(_) | NodeFun::SigStr(_) | NodeFun::SigObj(_) => {}
        }
    }

    /// Deliver a part-select write: splice `value` at `base` within the
    /// signal. Out-of-range bits are discarded.
    pub(crate) fn send_vec4_pv(&mut self, ptr: NetPtr, value: Vector4, base: usize, vwid: usize) {
        let cur = self.signal_vec4_raw(ptr.net);
        let mut full = if cur.len() == vwid {
            cur
        } else {
            let mut v = cur;
            v.resize(vwid);
            v
        };
        full.set_vec(base, &value);
        self.send_vec4(NetPtr::new(ptr.net, ptr.port), full);
    }

    pub(crate) fn send_real(&mut self, ptr: NetPtr, value: f64) {
        let node = self.nets.node_mut(ptr.net);
        match &mut node.fun {
            NodeFun::SigReal(sig) => match ptr.port {
                0 => {
                    if sig.continuous {
                        return;
                    }
                    self.store_sig_real(ptr.net, value);
                    self.propagate_real(ptr.net);
                }
                1 => {
                    sig.continuous = true;
                    sig.cassign_value = value;
                    self.propagate_real(ptr.net);
                }
                _ => {}
            },
            NodeFun::Event(ev) => {
                if ev.sample(ptr.port, crate::logic::Bit4::One) {
                    self.trigger_event(ptr.net);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn send_str(&mut self, ptr: NetPtr, value: String) {
        let ctx = self.write_context();
        let node = self.nets.node_mut(ptr.net);
        if let NodeFun::SigStr(sig) = &mut node.fun {
            match (sig.context_idx, ctx) {
                (Some(idx), Some(ctx)) => {
                    self.scopes.context_mut(ctx).slots[idx as usize] = ContextSlot::Str(value);
                }
                _ => sig.value = value,
            }
            self.propagate_str(ptr.net);
        }
    }

    pub(crate) fn send_obj(&mut self, ptr: NetPtr, value: ObjectRef) {
        let ctx = self.write_context();
        let node = self.nets.node_mut(ptr.net);
        if let NodeFun::SigObj(sig) = &mut node.fun {
            match (sig.context_idx, ctx) {
                (Some(idx), Some(ctx)) => {
                    self.scopes.context_mut(ctx).slots[idx as usize] = ContextSlot::Obj(value);
                }
                _ => sig.value = value,
            }
        }
    }

    /// Store a vector into signal state, honoring automatic contexts.
    fn store_sig4(&mut self, net: NetId, value: Vector4) {
        let ctx = self.write_context();
        let node = self.nets.node_mut(net);
        if let NodeFun::Sig4(sig) = &mut node.fun {
            match (sig.context_idx, ctx) {
                (Some(idx), Some(ctx)) => {
                    self.scopes.context_mut(ctx).slots[idx as usize] = ContextSlot::Vec4(value);
                }
                _ => sig.value = value,
            }
        }
    }

    fn store_sig_real(&mut self, net: NetId, value: f64) {
        let ctx = self.write_context();
        let node = self.nets.node_mut(net);
        if let NodeFun::SigReal(sig) = &mut node.fun {
            match (sig.context_idx, ctx) {
                (Some(idx), Some(ctx)) => {
                    self.scopes.context_mut(ctx).slots[idx as usize] = ContextSlot::Real(value);
                }
                _ => sig.value = value,
            }
        }
    }

    /// Push the observable value of `net` to every downstream port.
    pub(crate) fn propagate_vec4(&mut self, net: NetId) {
        let value = self.signal_vec4(net);
        self.propagate_value(net, value);
    }

    fn propagate_value(&mut self, net: NetId, value: Vector4) {
        let links = self.nets.node(net).links.clone();
        for dst in links {
            self.send_vec4(dst, value.clone());
        }
        if let Some(vcd) = &mut self.vcd {
            vcd.note_change(net);
        }
    }

    pub(crate) fn propagate_real(&mut self, net: NetId) {
        let value = self.nets.read_real(net);
        let links = self.nets.node(net).links.clone();
        for dst in links {
            self.send_real(dst, value);
        }
    }

    /// String changes only matter to event destinations.
    pub(crate) fn propagate_str(&mut self, net: NetId) {
        let links = self.nets.node(net).links.clone();
        for dst in links {
            if let NodeFun::Event(ev) = &mut self.nets.node_mut(dst.net).fun {
                if ev.sample(dst.port, crate::logic::Bit4::One) {
                    self.trigger_event(dst.net);
                }
            }
        }
    }

    /// Wake everything attached to an event: waiting threads, pending
    /// event-controlled assigns, and chained event nodes.
    pub(crate) fn trigger_event(&mut self, net: NetId) {
        let (waiting, ready) = {
            let node = self.nets.node_mut(net);
            let NodeFun::Event(ev) = &mut node.fun else {
                return;
            };
            let waiting = std::mem::take(&mut ev.waiting);
            let mut ready = Vec::new();
            ev.evctl.retain_mut(|pending| {
                pending.count -= 1;
                if pending.count == 0 {
                    ready.push(pending.event.clone());
                    false
                } else {
                    true
                }
            });
            (waiting, ready)
        };

        for tid in waiting {
            if !self.threads.is_live(tid) {
                continue;
            }
            let thr = self.threads.get_mut(tid);
            debug_assert!(matches!(thr.state, ThreadState::WaitingOnEvent(_)));
            thr.state = ThreadState::Running;
            self.schedule_thread(tid, 0, false);
        }
        for ev in ready {
            self.sched.schedule_nba(ev, 0);
        }

        // Event chains (an OR of events) propagate the trigger.
        let links = self.nets.node(net).links.clone();
        for dst in links {
            if let NodeFun::Event(ev) = &mut self.nets.node_mut(dst.net).fun {
                if ev.sample(dst.port, crate::logic::Bit4::One) {
                    self.trigger_event(dst.net);
                }
            }
        }
    }

    // ── signal reads, context-aware ─────────────────────────

    /// The raw (unfiltered) value of a signal as the running thread sees
    /// it.
    pub(crate) fn signal_vec4_raw(&self, net: NetId) -> Vector4 {
        let node = self.nets.node(net);
        match &node.fun {
            NodeFun::Sig4(sig) => match (sig.context_idx, self.read_context()) {
                (Some(idx), Some(ctx)) => {
                    match &self.scopes.context(ctx).slots[idx as usize] {
                        ContextSlot::Vec4(v) => v.clone(),
                        _ => Vector4::new(sig.width),
                    }
                }
                _ => sig.resolved(),
            },
            _ => self.nets.read_vec4(net),
        }
    }

    /// The observable value: the raw value seen through the force filter.
    pub(crate) fn signal_vec4(&self, net: NetId) -> Vector4 {
        let raw = self.signal_vec4_raw(net);
        match &self.nets.node(net).fil {
            Some(fil) => fil.filtered(&raw),
            None => raw,
        }
    }

    pub(crate) fn signal_str(&self, net: NetId) -> String {
        let node = self.nets.node(net);
        match &node.fun {
            NodeFun::SigStr(sig) => match (sig.context_idx, self.read_context()) {
                (Some(idx), Some(ctx)) => match &self.scopes.context(ctx).slots[idx as usize] {
                    ContextSlot::Str(s) => s.clone(),
                    _ => String::new(),
                },
                _ => sig.value.clone(),
            },
            _ => String::new(),
        }
    }

    /// Top of the running thread's write-context stack.
    pub(crate) fn write_context(&self) -> Option<ContextId> {
        let tid = self.running?;
        self.threads.get(tid).wt_stack.last().copied()
    }

    /// Top of the running thread's read-context stack.
    pub(crate) fn read_context(&self) -> Option<ContextId> {
        let tid = self.running?;
        let thr = self.threads.get(tid);
        thr.rd_stack.last().copied().or_else(|| thr.wt_stack.last().copied())
    }

    // ── user functions in the net graph ─────────────────────

    /// Run a user-function call site: marshal cached inputs onto the
    /// function ports, execute the body to completion, read the result,
    /// and propagate it downstream.
    pub(crate) fn run_ufunc(&mut self, net: NetId) {
        let (core_id, inputs) = {
            let NodeFun::UFunc(fun) = &mut self.nets.node_mut(net).fun else {
                return;
            };
            fun.scheduled = false;
            (fun.core, fun.inputs.clone())
        };
        let core = self.code.ufunc(core_id).clone();
        let result = self.exec_ufunc_core(&core, &inputs);
        self.propagate_value(net, result);
    }

    /// Shared body of the `.ufunc` node and the `exec_ufunc` opcode.
    pub(crate) fn exec_ufunc_core(
        &mut self,
        core: &crate::code::UFuncCore,
        inputs: &[Vector4],
    ) -> Vector4 {
        let automatic = self.scopes.scope(core.scope).is_automatic;
        let ctx = automatic.then(|| self.scopes.alloc_context(core.scope));

        // Marshal the input values onto the port signals atomically.
        for (port, value) in core.ports.iter().zip(inputs) {
            self.write_port_signal(*port, value, ctx);
        }

        // Functions cannot block, so the child runs to completion here.
        let tid = self.threads.alloc(Thread::new(core.code, core.scope));
        self.scopes.scope_mut(core.scope).threads.insert(tid);
        if let Some(ctx) = ctx {
            let thr = self.threads.get_mut(tid);
            thr.wt_stack.push(ctx);
            thr.rd_stack.push(ctx);
        }
        self.run_thread(tid);

        let result = self.read_port_signal(core.result, ctx);

        if let Some(ctx) = ctx {
            self.scopes.free_context(core.scope, ctx);
        }
        result
    }

    fn write_port_signal(&mut self, net: NetId, value: &Vector4, ctx: Option<ContextId>) {
        let node = self.nets.node_mut(net);
        if let NodeFun::Sig4(sig) = &mut node.fun {
            let value = value.coerced(sig.width, false);
            match (sig.context_idx, ctx) {
                (Some(idx), Some(ctx)) => {
                    self.scopes.context_mut(ctx).slots[idx as usize] = ContextSlot::Vec4(value);
                }
                _ => sig.value = value,
            }
        }
    }

    fn read_port_signal(&self, net: NetId, ctx: Option<ContextId>) -> Vector4 {
        let node = self.nets.node(net);
        match &node.fun {
            NodeFun::Sig4(sig) => match (sig.context_idx, ctx) {
                (Some(idx), Some(ctx)) => match &self.scopes.context(ctx).slots[idx as usize] {
                    ContextSlot::Vec4(v) => v.clone(),
                    _ => Vector4::new(sig.width),
                },
                _ => sig.value.clone(),
            },
            _ => Vector4::new(0),
        }
    }

    // ── VCD ─────────────────────────────────────────────────

    /// Attach a VCD writer over the declared signals and emit the header.
    pub fn attach_vcd<P: AsRef<std::path::Path>>(&mut self, path: P) -> std::io::Result<()> {
        let writer = VcdWriter::new(path, &self.scopes, &self.nets)?;
        self.vcd = Some(writer);
        Ok(())
    }

    /// Dump pending value changes at the current time.
    pub fn dump_vcd(&mut self) -> std::io::Result<()> {
        let time = self.sched.time();
        if let Some(mut vcd) = self.vcd.take() {
            let res = vcd.dump(time, |net| self.signal_vec4(net));
            self.vcd = Some(vcd);
            res
        } else {
            Ok(())
        }
    }
}

/// Fluent construction in the shape of the simulator builder the rest of
/// the API follows: pick options first, then populate the empty runtime.
#[derive(Default)]
pub struct RuntimeBuilder {
    trace: ExecTraceOptions,
    vcd_path: Option<std::path::PathBuf>,
    echo_diagnostics: bool,
    error_threshold: Option<usize>,
}

impl RuntimeBuilder {
    pub fn trace(mut self, trace: ExecTraceOptions) -> Self {
        self.trace = trace;
        self
    }

    pub fn trace_opcodes(mut self) -> Self {
        self.trace.opcodes = true;
        self
    }

    pub fn trace_scheduler(mut self) -> Self {
        self.trace.scheduler = true;
        self
    }

    /// Enable VCD dumping to the specified file.
    pub fn vcd<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.vcd_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn echo_diagnostics(mut self, echo: bool) -> Self {
        self.echo_diagnostics = echo;
        self
    }

    pub fn error_threshold(mut self, threshold: usize) -> Self {
        self.error_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> Runtime {
        let mut rt = Runtime::new();
        rt.trace = self.trace;
        rt.diags.set_echo(self.echo_diagnostics);
        if let Some(threshold) = self.error_threshold {
            rt.diags.error_threshold = threshold;
        }
        if let Some(path) = self.vcd_path {
            // Header emission is deferred until signals exist; attach
            // after elaboration when possible.
            let _ = rt.attach_vcd(path);
        }
        rt
    }
}
