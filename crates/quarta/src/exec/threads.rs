//! The fork/join thread lifecycle: creation, reaping, disable, and the
//! automatic-context stack opcodes.
//!
//! A `%fork` pushes a new child into the parent's children set. Automatic
//! children are tracked separately and consumed first by `%join`. A child
//! that `%end`s while its parent is blocked in a `%join` completes the
//! join on the parent's behalf and schedules the parent ahead of its
//! siblings.

use super::{Thread, ThreadId, ThreadState};
use crate::code::CodeAddr;
use crate::runtime::Runtime;
use crate::schedule::SchedEvent;
use crate::scope::{ScopeId, ScopeKind};

impl Runtime {
    /// Create a child thread and either run it inline (function scopes
    /// cannot block) or schedule it ahead of the parent's siblings.
    pub(crate) fn op_fork(&mut self, tid: ThreadId, code: CodeAddr, scope: ScopeId) -> bool {
        let child = self.threads.alloc(Thread::new(code, scope));
        self.scopes.scope_mut(scope).threads.insert(child);

        let is_automatic = self.scopes.scope(scope).is_automatic;
        let is_function = self.scopes.scope(scope).kind == ScopeKind::Function;

        if is_automatic {
            // The context allocated for this call is the top entry on the
            // parent's write-context stack; the child reads and writes it.
            let parent_ctx = self.threads.get(tid).wt_stack.last().copied();
            let child_thr = self.threads.get_mut(child);
            if let Some(ctx) = parent_ctx {
                child_thr.wt_stack.push(ctx);
                child_thr.rd_stack.push(ctx);
            }
            self.threads.get_mut(tid).automatic_children.insert(child);
        }

        self.threads.get_mut(child).parent = Some(tid);
        self.threads.get_mut(tid).children.insert(child);

        if is_function {
            // Functions cannot contain blocking statements; run the child
            // to completion and resume this thread immediately.
            self.run_thread(child);
        } else {
            self.schedule_thread(child, 0, true);
        }
        true
    }

    /// Consume one ended child, or suspend until one ends. Automatic
    /// children are joined before any static ones.
    pub(crate) fn op_join(&mut self, tid: ThreadId) -> bool {
        let thr = self.threads.get(tid);
        debug_assert!(!thr.is_joining());
        debug_assert!(!thr.children.is_empty());

        let candidate = thr
            .children
            .iter()
            .copied()
            .find(|child| self.threads.get(*child).has_ended() && self.test_joinable(tid, *child));

        if let Some(child) = candidate {
            self.do_join(tid, child);
            return true;
        }

        self.threads.get_mut(tid).state = ThreadState::WaitingInJoin;
        false
    }

    /// Detach exactly `count` children: ended ones are reaped, running
    /// ones are orphaned. Automatic children cannot be detached.
    pub(crate) fn op_join_detach(&mut self, tid: ThreadId, count: u32) -> bool {
        let thr = self.threads.get(tid);
        debug_assert!(thr.automatic_children.is_empty());
        debug_assert_eq!(count as usize, thr.children.len());

        while let Some(child) = self.threads.get(tid).children.iter().copied().next() {
            debug_assert_eq!(self.threads.get(child).parent, Some(tid));
            debug_assert!(self.threads.get(child).wt_stack.is_empty());
            if self.threads.get(child).has_ended() {
                self.reap_thread(child);
            } else {
                self.threads.get_mut(tid).children.remove(&child);
                self.threads.get_mut(child).parent = None;
            }
        }
        true
    }

    /// End this thread. If a parent is blocked joining and this child is
    /// joinable, finish the join on its behalf and wake it ahead of its
    /// siblings; otherwise linger as a zombie for a later `%join`.
    pub(crate) fn op_end(&mut self, tid: ThreadId) -> bool {
        let thr = self.threads.get_mut(tid);
        debug_assert!(!thr.waiting_for_event());
        thr.state = ThreadState::EndedZombie;
        thr.pc = super::NULL_PC;

        let parent = thr.parent;
        if let Some(parent) = parent {
            if self.threads.get(parent).is_joining() {
                // A parent waiting on an automatic child cannot join a
                // static one; stay a zombie until that child ends.
                if !self.test_joinable(parent, tid) {
                    return false;
                }
                self.threads.get_mut(parent).state = ThreadState::Running;
                self.schedule_thread(parent, 0, true);
                self.do_join(parent, tid);
            }
            return false;
        }

        // No parent can ever join this thread; reap it now. An initial
        // thread must have consumed all its forks by this point.
        debug_assert!(self.threads.get(tid).children.is_empty());
        self.reap_thread(tid);
        false
    }

    /// Kill every thread in the target scope (and their descendants).
    /// Returns false when the executing thread disabled itself, so the
    /// dispatch loop stops advancing it.
    pub(crate) fn op_disable(&mut self, tid: ThreadId, scope: ScopeId) -> bool {
        let mut disabled_myself = false;
        loop {
            let target = self
                .scopes
                .scope(scope)
                .threads
                .iter()
                .copied()
                .next();
            let Some(target) = target else { break };
            if target == tid {
                disabled_myself = true;
            }
            if self.do_disable(target, tid) {
                disabled_myself = true;
            }
        }
        !disabled_myself
    }

    /// Push a fresh context for an automatic scope onto the write stack.
    pub(crate) fn op_alloc(&mut self, tid: ThreadId, scope: ScopeId) -> bool {
        let ctx = self.scopes.alloc_context(scope);
        self.threads.get_mut(tid).wt_stack.push(ctx);
        true
    }

    /// Pop the completed call's context off the read stack and return it
    /// to the scope's pool.
    pub(crate) fn op_free(&mut self, tid: ThreadId, scope: ScopeId) -> bool {
        let ctx = self
            .threads
            .get_mut(tid)
            .rd_stack
            .pop()
            .expect("free without a read context");
        self.scopes.free_context(scope, ctx);
        true
    }

    /// A scheduled thread discovered to be dead: park, and self-delete
    /// when nothing can reference it anymore.
    pub(crate) fn op_zombie(&mut self, tid: ThreadId) -> bool {
        self.threads.get_mut(tid).pc = super::NULL_PC;
        self.reap_zombie(tid);
        false
    }

    /// Shared zombie cleanup for `%zombie` and a null program counter.
    pub(crate) fn reap_zombie(&mut self, tid: ThreadId) {
        let thr = self.threads.get(tid);
        if thr.parent.is_none() && thr.children.is_empty() {
            if self.threads.get(tid).delay_delete {
                self.sched.schedule_monitor(SchedEvent::DelThread(tid));
            } else {
                self.release_thread(tid);
            }
        }
    }

    // ── lifecycle helpers ───────────────────────────────────

    /// While any automatic children remain, only they are joinable.
    pub(crate) fn test_joinable(&self, parent: ThreadId, child: ThreadId) -> bool {
        let thr = self.threads.get(parent);
        thr.automatic_children.is_empty() || thr.automatic_children.contains(&child)
    }

    /// Complete a join: move the call's context from the parent's write
    /// stack to its read stack (for automatic children), then reap.
    pub(crate) fn do_join(&mut self, parent: ThreadId, child: ThreadId) {
        debug_assert_eq!(self.threads.get(child).parent, Some(parent));

        let was_automatic = self.threads.get_mut(parent).automatic_children.remove(&child);
        if was_automatic {
            let thr = self.threads.get_mut(parent);
            // Only the top-level call thread shifts the context; nested
            // block threads of the same call share it.
            if thr.wt_stack.last() != thr.rd_stack.last() {
                if let Some(ctx) = thr.wt_stack.pop() {
                    thr.rd_stack.push(ctx);
                }
            }
        }

        self.reap_thread(child);
    }

    /// Pull a thread out of the tree: hand children to the grandparent,
    /// detach from the parent and scope, and delete unless the scheduler
    /// still references it.
    pub(crate) fn reap_thread(&mut self, tid: ThreadId) {
        let (parent, children): (Option<ThreadId>, Vec<ThreadId>) = {
            let thr = self.threads.get(tid);
            (thr.parent, thr.children.iter().copied().collect())
        };

        for child in &children {
            self.threads.get_mut(*child).parent = parent;
            if let Some(parent) = parent {
                self.threads.get_mut(parent).children.insert(*child);
            }
        }
        self.threads.get_mut(tid).children.clear();

        if let Some(parent) = parent {
            self.threads.get_mut(parent).children.remove(&tid);
            self.threads.get_mut(parent).automatic_children.remove(&tid);
        }
        self.threads.get_mut(tid).parent = None;

        let scope = self.threads.get(tid).scope;
        self.scopes.scope_mut(scope).threads.remove(&tid);

        self.threads.get_mut(tid).pc = super::NULL_PC;

        // If the scheduler still holds this thread (scheduled or waiting
        // on an event), the zombie path deletes it later.
        let thr = self.threads.get(tid);
        if !thr.is_scheduled && !thr.waiting_for_event() {
            debug_assert!(thr.children.is_empty());
            if thr.delay_delete {
                self.sched.schedule_monitor(SchedEvent::DelThread(tid));
            } else {
                self.release_thread(tid);
            }
        }
    }

    fn release_thread(&mut self, tid: ThreadId) {
        if self.running == Some(tid) {
            // The dispatch loop still holds this id; the slot is freed
            // when the loop unwinds. Mark for deferred deletion.
            self.sched.schedule_monitor(SchedEvent::DelThread(tid));
            return;
        }
        self.threads.free(tid);
    }

    /// Recursively kill a thread and its forked subtree. Simulates the
    /// missing `%join`s, then wakes a parent blocked in `%join`.
    pub(crate) fn do_disable(&mut self, tid: ThreadId, target: ThreadId) -> bool {
        let mut flag = false;

        // Pull the thread out of its scope first so the disable loop in
        // the caller terminates.
        let scope = self.threads.get(tid).scope;
        self.scopes.scope_mut(scope).threads.remove(&tid);

        // An event-waiting thread leaves the event's wait list.
        if let ThreadState::WaitingOnEvent(ev) = self.threads.get(tid).state {
            if let crate::net::NodeFun::Event(fun) = &mut self.nets.node_mut(ev).fun {
                fun.waiting.retain(|t| *t != tid);
            }
        }

        {
            let thr = self.threads.get_mut(tid);
            thr.pc = super::NULL_PC;
            thr.state = ThreadState::EndedZombie;
        }

        // Turn off all children, clearing one pending fork per pass.
        while let Some(child) = self.threads.get(tid).children.iter().copied().next() {
            debug_assert_eq!(self.threads.get(child).parent, Some(tid));
            if self.do_disable(child, target) {
                flag = true;
            }
            if self.threads.is_live(child) {
                self.reap_thread(child);
            }
        }

        let parent = self.threads.get(tid).parent;
        match parent {
            Some(parent) if self.threads.get(parent).is_joining() => {
                // Wake the joining parent; it may already be scheduled if
                // several children are ending at once.
                self.threads.get_mut(parent).state = ThreadState::Running;
                if !self.threads.get(parent).has_ended() && !self.threads.get(parent).is_scheduled
                {
                    self.schedule_thread(parent, 0, true);
                }
                self.reap_thread(tid);
            }
            Some(_) => {
                // The parent has yet to %join; its join does the reaping.
            }
            None => {
                self.reap_thread(tid);
            }
        }

        flag || tid == target
    }
}
