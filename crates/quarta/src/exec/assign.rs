//! Non-blocking assignment, continuous-assign, and force/release opcode
//! handlers.
//!
//! All delayed updates go through the scheduler's non-blocking region.
//! The value is captured from the thread's bit space at scheduling time,
//! so later mutation of the workspace does not change the update.

use super::ThreadId;
use crate::array::ArrayId;
use crate::error::Severity;
use crate::net::{EvctlPending, NetId, NetPtr, NodeFun, ReleaseMode};
use crate::runtime::Runtime;
use crate::schedule::SchedEvent;
use crate::vector2::Vector2;
use crate::vector4::Vector4;

impl Runtime {
    // ── non-blocking vector assigns ─────────────────────────

    pub(crate) fn op_assign_v0(
        &mut self,
        tid: ThreadId,
        net: NetId,
        delay: u64,
        src: u32,
        wid: u32,
    ) -> bool {
        let value = self.threads.get(tid).read_vec(src, wid);
        self.schedule_assign_plucked_vector(NetPtr::new(net, 0), delay, value);
        true
    }

    pub(crate) fn op_assign_v0_e(&mut self, tid: ThreadId, net: NetId, src: u32, wid: u32) -> bool {
        let value = self.threads.get(tid).read_vec(src, wid);
        let ev = SchedEvent::AssignVec4 {
            ptr: NetPtr::new(net, 0),
            base: 0,
            vwid: wid,
            value,
        };
        self.arm_evctl_assign(tid, ev);
        true
    }

    /// Part-select NBA: the destination offset is in word register 1.
    /// Out-of-range parts are trimmed, fully off-range writes dropped.
    pub(crate) fn op_assign_v0_x1(
        &mut self,
        tid: ThreadId,
        net: NetId,
        delay: u64,
        src: u32,
        wid: u32,
    ) -> bool {
        if let Some((value, off, vwid)) = self.clip_x1_part(tid, net, src, wid) {
            self.schedule_assign_vector(NetPtr::new(net, 0), off, vwid, value, delay);
        }
        true
    }

    pub(crate) fn op_assign_v0_x1_e(
        &mut self,
        tid: ThreadId,
        net: NetId,
        src: u32,
        wid: u32,
    ) -> bool {
        match self.clip_x1_part(tid, net, src, wid) {
            Some((value, off, vwid)) => {
                let ev = SchedEvent::AssignVec4 {
                    ptr: NetPtr::new(net, 0),
                    base: off as u32,
                    vwid: vwid as u32,
                    value,
                };
                self.arm_evctl_assign(tid, ev);
            }
            None => {
                let thr = self.threads.get_mut(tid);
                thr.event = None;
                thr.ecount = 0;
            }
        }
        true
    }

    fn clip_x1_part(
        &self,
        tid: ThreadId,
        net: NetId,
        src: u32,
        wid: u32,
    ) -> Option<(Vector4, usize, usize)> {
        let thr = self.threads.get(tid);
        let mut off = thr.word_i(1);
        let mut wid = wid as i64;
        let mut src = src as i64;
        let vwid = self.nets.signal_width(net) as i64;

        if off >= vwid {
            return None;
        }
        if off < 0 {
            if -off >= wid {
                return None;
            }
            wid += off;
            src -= off;
            off = 0;
        }
        if off + wid > vwid {
            wid = vwid - off;
        }
        let value = thr.read_vec(src as u32, wid as u32);
        Some((value, off as usize, vwid as usize))
    }

    // ── non-blocking array-word assigns ─────────────────────

    pub(crate) fn op_assign_av(
        &mut self,
        tid: ThreadId,
        array: ArrayId,
        delay: u64,
        src: u32,
        wid: u32,
    ) -> bool {
        if let Some((adr, value)) = self.clip_array_word(tid, array, src, wid) {
            self.sched
                .schedule_nba(SchedEvent::AssignArrayVec4 { array, adr, value }, delay);
        }
        true
    }

    pub(crate) fn op_assign_av_e(
        &mut self,
        tid: ThreadId,
        array: ArrayId,
        src: u32,
        wid: u32,
    ) -> bool {
        match self.clip_array_word(tid, array, src, wid) {
            Some((adr, value)) => {
                let ev = SchedEvent::AssignArrayVec4 { array, adr, value };
                self.arm_evctl_assign(tid, ev);
            }
            None => {
                let thr = self.threads.get_mut(tid);
                thr.event = None;
                thr.ecount = 0;
            }
        }
        true
    }

    /// Clip a part write against the array word width. The word address
    /// is in word register 3, the part offset in word register 1.
    fn clip_array_word(
        &self,
        tid: ThreadId,
        array: ArrayId,
        src: u32,
        wid: u32,
    ) -> Option<(i64, Vector4)> {
        let thr = self.threads.get(tid);
        let adr = thr.word_i(3);
        if adr < 0 {
            return None;
        }
        let mut off = thr.word_i(1);
        let mut wid = wid as i64;
        let mut src = src as i64;
        let vwid = self.arrays.array(array).word_width() as i64;

        if off >= vwid {
            return None;
        }
        if off < 0 {
            if -off > wid {
                return None;
            }
            wid += off;
            src -= off;
            off = 0;
        }
        if off + wid > vwid {
            wid = vwid - off;
        }
        if wid <= 0 {
            return None;
        }
        let part = thr.read_vec(src as u32, wid as u32);
        let mut word = self.arrays.array(array).get_vec4(adr);
        word.set_vec(off as usize, &part);
        Some((adr, word))
    }

    // ── non-blocking real assigns ───────────────────────────

    pub(crate) fn op_assign_wr(&mut self, tid: ThreadId, net: NetId, delay: u64) -> bool {
        let value = self.threads.get_mut(tid).pop_real();
        self.sched.schedule_nba(
            SchedEvent::AssignReal {
                ptr: NetPtr::new(net, 0),
                value,
            },
            delay,
        );
        true
    }

    pub(crate) fn op_assign_wr_e(&mut self, tid: ThreadId, net: NetId) -> bool {
        let value = self.threads.get_mut(tid).pop_real();
        let ev = SchedEvent::AssignReal {
            ptr: NetPtr::new(net, 0),
            value,
        };
        self.arm_evctl_assign(tid, ev);
        true
    }

    pub(crate) fn op_assign_ar(&mut self, tid: ThreadId, array: ArrayId, delay: u64) -> bool {
        let thr = self.threads.get_mut(tid);
        let adr = thr.word_i(3);
        let value = thr.pop_real();
        if adr >= 0 {
            self.sched
                .schedule_nba(SchedEvent::AssignArrayReal { array, adr, value }, delay);
        }
        true
    }

    pub(crate) fn op_assign_ar_e(&mut self, tid: ThreadId, array: ArrayId) -> bool {
        let thr = self.threads.get_mut(tid);
        let adr = thr.word_i(3);
        let value = thr.pop_real();
        if adr >= 0 {
            let ev = SchedEvent::AssignArrayReal { array, adr, value };
            self.arm_evctl_assign(tid, ev);
        }
        true
    }

    /// Route an `..e` assign through the armed event-control state: with
    /// a zero count it schedules normally, otherwise the update parks on
    /// the event until enough triggers arrive. The armed state is
    /// consumed either way.
    fn arm_evctl_assign(&mut self, tid: ThreadId, ev: SchedEvent) {
        let (event, ecount) = {
            let thr = self.threads.get_mut(tid);
            let pair = (thr.event, thr.ecount);
            thr.event = None;
            thr.ecount = 0;
            pair
        };
        match (event, ecount) {
            (Some(event), count) if count > 0 => {
                if let NodeFun::Event(fun) = &mut self.nets.node_mut(event).fun {
                    fun.evctl.push(EvctlPending { count, event: ev });
                }
            }
            _ => self.sched.schedule_nba(ev, 0),
        }
    }

    pub(crate) fn op_evctl(&mut self, tid: ThreadId, event: NetId, count: u64) -> bool {
        let thr = self.threads.get_mut(tid);
        debug_assert!(thr.event.is_none() && thr.ecount == 0);
        thr.event = Some(event);
        thr.ecount = count;
        true
    }

    // ── continuous assign ───────────────────────────────────

    pub(crate) fn op_cassign_v(&mut self, tid: ThreadId, net: NetId, src: u32, wid: u32) -> bool {
        let value = self.threads.get(tid).read_vec(src, wid);
        self.send_vec4(NetPtr::new(net, 1), value);
        true
    }

    pub(crate) fn op_cassign_wr(&mut self, tid: ThreadId, net: NetId) -> bool {
        let value = self.threads.get_mut(tid).pop_real();
        self.send_real(NetPtr::new(net, 1), value);
        true
    }

    /// Part continuous assign with the offset in word register 0. Only
    /// the addressed bit range comes under cassign control.
    pub(crate) fn op_cassign_x0(&mut self, tid: ThreadId, net: NetId, src: u32, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let off = thr.word_i(0);
        let vwid = self.nets.signal_width(net) as i64;
        if off < 0 || off >= vwid {
            return true;
        }
        let wid = (wid as i64).min(vwid - off);
        let part = self.threads.get(tid).read_vec(src, wid as u32);
        if let NodeFun::Sig4(sig) = &mut self.nets.node_mut(net).fun {
            sig.set_cassign_pv(off as usize, &part);
        }
        self.propagate_vec4(net);
        true
    }

    /// Link a driver net's output onto the target's cassign port. Linking
    /// a new source unlinks the previous one first.
    pub(crate) fn op_cassign_link(&mut self, dst: NetId, src: NetId) -> bool {
        let dst_ptr = NetPtr::new(dst, 1);
        let prev = self
            .nets
            .node(dst)
            .fil
            .as_ref()
            .and_then(|fil| fil.cassign_link);
        if let Some(prev_src) = prev {
            self.nets.unlink(prev_src, dst_ptr);
        }
        self.nets.link(src, dst_ptr);
        if let Some(fil) = &mut self.nets.node_mut(dst).fil {
            fil.cassign_link = Some(src);
        }
        // Push the driver's current value through the new link.
        let value = self.signal_vec4(src);
        self.send_vec4(dst_ptr, value);
        true
    }

    /// Remove the continuous-assign override, fully or over a bit range.
    /// Partial deassign with an active full-signal link is a fatal
    /// diagnostic.
    pub(crate) fn op_deassign(&mut self, net: NetId, base: u32, wid: u32) -> bool {
        let vwid = self.nets.signal_width(net);
        let base = base as usize;
        let mut wid = wid as usize;
        if base >= vwid {
            return true;
        }
        if base + wid > vwid {
            wid = vwid - base;
        }
        let full_sig = base == 0 && wid == vwid;

        let link = self
            .nets
            .node(net)
            .fil
            .as_ref()
            .and_then(|fil| fil.cassign_link);
        if let Some(src) = link {
            if !full_sig {
                self.diags.report(
                    Severity::Fatal,
                    "a signal is assigning this register; cannot deassign part of it",
                );
                return true;
            }
            self.nets.unlink(src, NetPtr::new(net, 1));
            if let Some(fil) = &mut self.nets.node_mut(net).fil {
                fil.cassign_link = None;
            }
        }

        if let NodeFun::Sig4(sig) = &mut self.nets.node_mut(net).fun {
            if full_sig {
                sig.deassign();
            } else {
                sig.deassign_pv(base, wid);
            }
        }
        // The released bits read the procedural value again.
        self.propagate_vec4(net);
        true
    }

    pub(crate) fn op_deassign_wr(&mut self, net: NetId) -> bool {
        let link = self
            .nets
            .node(net)
            .fil
            .as_ref()
            .and_then(|fil| fil.cassign_link);
        if let Some(src) = link {
            self.nets.unlink(src, NetPtr::new(net, 1));
            if let Some(fil) = &mut self.nets.node_mut(net).fil {
                fil.cassign_link = None;
            }
        }
        if let NodeFun::SigReal(sig) = &mut self.nets.node_mut(net).fun {
            sig.deassign();
        }
        self.propagate_real(net);
        true
    }

    // ── force / release ─────────────────────────────────────

    pub(crate) fn op_force_v(&mut self, tid: ThreadId, net: NetId, src: u32, wid: u32) -> bool {
        let vwid = self.nets.signal_width(net);
        let value = self
            .threads
            .get(tid)
            .read_vec(src, wid)
            .coerced(vwid, false);
        self.force_vec4(net, value, Vector2::ones(vwid));
        true
    }

    /// Part force with the offset in word register 0.
    pub(crate) fn op_force_x0(&mut self, tid: ThreadId, net: NetId, src: u32, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let mut index = thr.word_i(0);
        let mut wid = wid as i64;
        let vwid = self.nets.signal_width(net) as i64;

        if index < 0 && wid <= -index {
            return true;
        }
        if index < 0 {
            wid += index;
            index = 0;
        }
        if index >= vwid {
            return true;
        }
        if index + wid > vwid {
            wid = vwid - index;
        }

        let mut mask = Vector2::zeros(vwid as usize);
        for idx in 0..wid as usize {
            mask.set_bit(index as usize + idx, true);
        }
        let part = self.threads.get(tid).read_vec(src, wid as u32);
        let mut value = Vector4::filled(vwid as usize, crate::logic::Bit4::Z);
        value.set_vec(index as usize, &part);
        self.force_vec4(net, value, mask);
        true
    }

    pub(crate) fn op_force_wr(&mut self, tid: ThreadId, net: NetId) -> bool {
        let value = self.threads.get_mut(tid).pop_real();
        if let Some(fil) = &mut self.nets.node_mut(net).fil {
            fil.force_real = value;
            fil.force_mask = Vector2::ones(1);
        }
        self.propagate_real(net);
        true
    }

    /// Remember the forcing source so a later release can unlink it
    /// without knowing which net forced.
    pub(crate) fn op_force_link(&mut self, dst: NetId, src: NetId) -> bool {
        let dst_ptr = NetPtr::new(dst, 2);
        let prev = self
            .nets
            .node(dst)
            .fil
            .as_ref()
            .and_then(|fil| fil.force_link);
        if let Some(prev_src) = prev {
            self.nets.unlink(prev_src, dst_ptr);
        }
        self.nets.link(src, dst_ptr);
        if let Some(fil) = &mut self.nets.node_mut(dst).fil {
            fil.force_link = Some(src);
        }
        true
    }

    pub(crate) fn force_vec4(&mut self, net: NetId, value: Vector4, mask: Vector2) {
        let vwid = self.nets.signal_width(net);
        if let Some(fil) = &mut self.nets.node_mut(net).fil {
            fil.force_vec4(&value, &mask, vwid);
        }
        self.propagate_vec4(net);
    }

    /// Release force bits. From the net side the visible value reverts to
    /// the driven value; from the reg side the forced bits are copied into
    /// the stored value and persist until the next procedural assign.
    pub(crate) fn op_release(&mut self, net: NetId, net_mode: bool) -> bool {
        let mode = if net_mode {
            ReleaseMode::Net
        } else {
            ReleaseMode::Reg
        };
        let vwid = self.nets.signal_width(net);
        self.release_pv(net, 0, vwid, mode);
        true
    }

    /// Partial or full release over a bit range.
    pub(crate) fn release_pv(&mut self, net: NetId, base: usize, wid: usize, mode: ReleaseMode) {
        self.force_unlink(net);
        let (released, forced) = {
            let Some(fil) = &mut self.nets.node_mut(net).fil else {
                return;
            };
            let forced = fil.force_value.clone();
            (fil.release_range(base, wid), forced)
        };
        if released.is_empty() {
            self.propagate_vec4(net);
            return;
        }
        if mode == ReleaseMode::Reg {
            // Keep the last forced value as the stored value.
            let ctx = self.write_context();
            let node = self.nets.node_mut(net);
            if let NodeFun::Sig4(sig) = &mut node.fun {
                match (sig.context_idx, ctx) {
                    (Some(idx), Some(ctx)) => {
                        if let crate::scope::ContextSlot::Vec4(slot) =
                            &mut self.scopes.context_mut(ctx).slots[idx as usize]
                        {
                            for bit in &released {
                                slot.set_bit(*bit, forced.value(*bit));
                            }
                        }
                    }
                    _ => {
                        for bit in &released {
                            sig.value.set_bit(*bit, forced.value(*bit));
                        }
                    }
                }
            }
        }
        self.propagate_vec4(net);
    }

    pub(crate) fn op_release_wr(&mut self, net: NetId) -> bool {
        self.force_unlink(net);
        if let Some(fil) = &mut self.nets.node_mut(net).fil {
            fil.force_mask = Vector2::zeros(0);
        }
        self.propagate_real(net);
        true
    }

    /// Detach a previously linked forcing source.
    fn force_unlink(&mut self, net: NetId) {
        let prev = self
            .nets
            .node(net)
            .fil
            .as_ref()
            .and_then(|fil| fil.force_link);
        if let Some(src) = prev {
            self.nets.unlink(src, NetPtr::new(net, 2));
            if let Some(fil) = &mut self.nets.node_mut(net).fil {
                fil.force_link = None;
            }
        }
    }
}
