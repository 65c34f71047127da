//! The simulation scheduler: a time wheel of event slots.
//!
//! Each slot holds three ordered regions. The active region drains FIFO
//! first; when it empties, the non-blocking assignment region is pulled
//! into it wholesale; when both are empty the monitor region runs and
//! time advances. Threads resumed to finish a `join` are pushed to the
//! front of the active region so a parent runs before newly created
//! siblings.

use crate::array::ArrayId;
use crate::exec::ThreadId;
use crate::net::{NetId, NetPtr};
use crate::object::ObjectRef;
use crate::vector4::Vector4;
use std::collections::{BTreeMap, VecDeque};

/// One scheduled occurrence.
#[derive(Debug, Clone)]
pub enum SchedEvent {
    /// Resume a suspended thread.
    RunThread(ThreadId),
    /// Deliver a vector to a net port, spliced at `base` within a signal
    /// of `vwid` bits (`base == 0 && value.len() == vwid` is a full write).
    AssignVec4 {
        ptr: NetPtr,
        base: u32,
        vwid: u32,
        value: Vector4,
    },
    AssignReal {
        ptr: NetPtr,
        value: f64,
    },
    AssignStr {
        ptr: NetPtr,
        value: String,
    },
    AssignObj {
        ptr: NetPtr,
        value: ObjectRef,
    },
    /// Store a word into a static array.
    AssignArrayVec4 {
        array: ArrayId,
        adr: i64,
        value: Vector4,
    },
    AssignArrayReal {
        array: ArrayId,
        adr: i64,
        value: f64,
    },
    /// Run a user-function net node that saw its inputs change.
    RunUFunc(NetId),
    /// Reclaim a thread whose deletion was deferred.
    DelThread(ThreadId),
}

#[derive(Debug, Default)]
struct TimeSlot {
    active: VecDeque<SchedEvent>,
    nba: VecDeque<SchedEvent>,
    monitor: Vec<SchedEvent>,
}

impl TimeSlot {
    fn is_drained(&self) -> bool {
        self.active.is_empty() && self.nba.is_empty()
    }
}

/// The time wheel. All mutation happens from the single simulation
/// thread; there is no interior locking.
#[derive(Debug, Default)]
pub struct Scheduler {
    time: u64,
    wheel: BTreeMap<u64, TimeSlot>,
    stopped: bool,
    finished: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    /// Schedule into the active region at `now + delay`. `push_front`
    /// queues ahead of everything else in the slot.
    pub fn schedule_active(&mut self, event: SchedEvent, delay: u64, push_front: bool) {
        let slot = self.wheel.entry(self.time + delay).or_default();
        if push_front {
            slot.active.push_front(event);
        } else {
            slot.active.push_back(event);
        }
    }

    /// Schedule into the non-blocking region at `now + delay`.
    pub fn schedule_nba(&mut self, event: SchedEvent, delay: u64) {
        self.wheel
            .entry(self.time + delay)
            .or_default()
            .nba
            .push_back(event);
    }

    /// Schedule a read-only observer at the end of the current step.
    pub fn schedule_monitor(&mut self, event: SchedEvent) {
        self.wheel
            .entry(self.time)
            .or_default()
            .monitor
            .push(event);
    }

    /// The next event, honoring region ordering within the current time.
    /// Advances simulation time when the nearest populated slot is in the
    /// future. `None` means the wheel is empty.
    pub fn next_event(&mut self) -> Option<SchedEvent> {
        loop {
            let (&slot_time, _) = self.wheel.iter().next()?;
            let slot = self.wheel.get_mut(&slot_time).expect("slot just seen");

            if let Some(ev) = slot.active.pop_front() {
                self.time = slot_time;
                return Some(ev);
            }
            if !slot.nba.is_empty() {
                // Active region drained: promote the whole NBA region.
                std::mem::swap(&mut slot.active, &mut slot.nba);
                continue;
            }
            if !slot.monitor.is_empty() {
                let ev = slot.monitor.remove(0);
                self.time = slot_time;
                return Some(ev);
            }
            debug_assert!(slot.is_drained());
            self.wheel.remove(&slot_time);
        }
    }

    /// The time of the nearest populated slot.
    pub fn next_time(&self) -> Option<u64> {
        self.wheel.keys().next().copied()
    }

    pub fn is_idle(&self) -> bool {
        self.wheel.is_empty()
    }

    /// Request a pause at the current time (`$stop`).
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Clear the stop request before resuming.
    pub fn clear_stop(&mut self) {
        self.stopped = false;
    }

    /// Request the end of the simulation (`$finish`).
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
