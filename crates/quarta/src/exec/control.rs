//! Timing, wait, and external-call opcode handlers.

use super::{ThreadId, ThreadState};
use crate::code::VpiCallId;
use crate::net::{NetId, NodeFun};
use crate::runtime::Runtime;

impl Runtime {
    /// Suspend the thread and reschedule it after `delay` time units.
    pub(crate) fn op_delay(&mut self, tid: ThreadId, delay: u64) -> bool {
        self.schedule_thread(tid, delay, false);
        false
    }

    /// Park the thread on an event's wait list.
    pub(crate) fn op_wait(&mut self, tid: ThreadId, net: NetId) -> bool {
        let thr = self.threads.get_mut(tid);
        debug_assert!(!thr.waiting_for_event());
        thr.state = ThreadState::WaitingOnEvent(net);
        match &mut self.nets.node_mut(net).fun {
            NodeFun::Event(ev) => ev.waiting.push(tid),
            other => {
                debug_assert!(false, "%wait target is not an event functor: {other:?}");
            }
        }
        false
    }

    /// Invoke a registered VPI callable. A `$stop` from the callback
    /// reschedules this thread at time zero and yields, so the caller's
    /// outer loop can inspect the flag; `$finish` just yields.
    pub(crate) fn op_vpi_call(&mut self, tid: ThreadId, call: VpiCallId) -> bool {
        let callable = self.vpi_calls[call.0 as usize].clone();
        callable.call(self, tid);

        if self.sched.is_stopped() {
            if !self.sched.is_finished() {
                self.schedule_thread(tid, 0, false);
            }
            return false;
        }
        !self.sched.is_finished()
    }

    /// Run a user-function call site inline: the buffered inputs on the
    /// `.ufunc` node are marshalled to the function ports, the body runs
    /// to completion, and the result propagates from the node.
    pub(crate) fn op_exec_ufunc(&mut self, tid: ThreadId, net: NetId) -> bool {
        debug_assert!(self.threads.get(tid).children.is_empty());
        // Continuous assignments only occur in static scopes, so the
        // caller carries no context of its own here.
        debug_assert!(self.threads.get(tid).wt_stack.is_empty());
        self.run_ufunc(net);
        true
    }
}
