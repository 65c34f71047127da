//! Data movement, load/store, string, and object opcode handlers.

use super::{FLAG_EQ, ThreadId};
use crate::array::ArrayId;
use crate::code::{ClassId, StrId};
use crate::logic::Bit4;
use crate::net::{NetId, NetPtr};
use crate::object::{DarrayKind, ObjectRef};
use crate::runtime::Runtime;
use crate::vector2::add_with_carry;
use crate::vector4::Vector4;

impl Runtime {
    // ── data movement ───────────────────────────────────────

    pub(crate) fn op_mov(&mut self, tid: ThreadId, dst: u32, src: u32, wid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.read_vec(src, wid);
        thr.write_vec(dst, &v);
        true
    }

    pub(crate) fn op_movi(&mut self, tid: ThreadId, dst: u32, imm: u64, wid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        thr.write_vec(dst, &Vector4::from_u64(wid as usize, imm));
        true
    }

    pub(crate) fn op_mov_wu(&mut self, tid: ThreadId, dst: u8, src: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.word_u(src);
        thr.set_word_u(dst, v);
        true
    }

    /// Replicate the bit at the source address across the destination.
    pub(crate) fn op_pad(&mut self, tid: ThreadId, dst: u32, src: u32, wid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let bit = thr.bit(src);
        thr.write_vec(dst, &Vector4::filled(wid as usize, bit));
        true
    }

    pub(crate) fn op_cast2(&mut self, tid: ThreadId, dst: u32, src: u32, wid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.read_vec(src, wid);
        thr.write_vec(dst, &v.cast2());
        true
    }

    // ── signal loads ────────────────────────────────────────

    pub(crate) fn op_load_v(&mut self, tid: ThreadId, dst: u32, net: NetId, wid: u32) -> bool {
        let mut value = self.signal_vec4(net);
        // Trim to the requested width; short sources pad with X.
        if value.len() != wid as usize {
            value = value.extended(wid as usize, Bit4::X);
        }
        self.threads.get_mut(tid).write_vec(dst, &value);
        true
    }

    /// Load a signal and add the signed addend from word register 0. The
    /// expected result width may exceed the signal width; `signed` pads
    /// with the sign bit first.
    pub(crate) fn op_load_vp0(
        &mut self,
        tid: ThreadId,
        dst: u32,
        net: NetId,
        wid: u32,
        signed: bool,
    ) -> bool {
        let sig = self.signal_vec4(net);
        self.load_p0_common(tid, dst, sig, wid, signed)
    }

    fn load_p0_common(
        &mut self,
        tid: ThreadId,
        dst: u32,
        sig: Vector4,
        wid: u32,
        signed: bool,
    ) -> bool {
        let padded = if signed {
            sig.sign_extended(wid as usize)
        } else {
            sig.extended(wid as usize, Bit4::Zero)
        };
        let thr = self.threads.get_mut(tid);
        let Some(mut words) = padded.to_words() else {
            thr.write_vec(dst, &Vector4::filled(wid as usize, Bit4::X));
            return true;
        };
        let addend = thr.word_i(0) as u64;
        let mut carry = 0;
        let mut imm = addend;
        for w in words.iter_mut() {
            *w = add_with_carry(*w, imm, &mut carry);
            // Sign-extend the addend across the higher words.
            imm = (addend as i64 >> 63) as u64;
        }
        thr.write_vec(dst, &Vector4::from_words(wid as usize, &words));
        true
    }

    /// Read one bit at an offset taken from word register 1 (canonical
    /// part-select base). Out-of-range bits read X.
    pub(crate) fn op_load_x1p(&mut self, tid: ThreadId, dst: u32, net: NetId, wid: u32) -> bool {
        let sig = self.signal_vec4(net);
        let index = self.threads.get(tid).word_i(1);
        let mut out = Vector4::new(wid as usize);
        for idx in 0..wid as i64 {
            let use_index = index + idx;
            let bit = if use_index < 0 || use_index >= sig.len() as i64 {
                Bit4::X
            } else {
                sig.value(use_index as usize)
            };
            out.set_bit(idx as usize, bit);
        }
        self.threads.get_mut(tid).write_vec(dst, &out);
        true
    }

    // ── array loads (address in word register 3) ────────────

    pub(crate) fn op_load_av(&mut self, tid: ThreadId, dst: u32, array: ArrayId, wid: u32) -> bool {
        let unknown_adr = self.threads.get(tid).bit(FLAG_EQ) == Bit4::One;
        if unknown_adr {
            let fill = Vector4::filled(wid as usize, Bit4::X);
            self.threads.get_mut(tid).write_vec(dst, &fill);
            return true;
        }
        let adr = self.threads.get(tid).word_i(3);
        let word = self.arrays.array(array).get_vec4(adr);
        let word = word.extended(wid as usize, Bit4::X);
        self.threads.get_mut(tid).write_vec(dst, &word);
        true
    }

    pub(crate) fn op_load_avp0(
        &mut self,
        tid: ThreadId,
        dst: u32,
        array: ArrayId,
        wid: u32,
        signed: bool,
    ) -> bool {
        let unknown_adr = self.threads.get(tid).bit(FLAG_EQ) == Bit4::One;
        if unknown_adr {
            let fill = Vector4::filled(wid as usize, Bit4::X);
            self.threads.get_mut(tid).write_vec(dst, &fill);
            return true;
        }
        let adr = self.threads.get(tid).word_i(3);
        let word = self.arrays.array(array).get_vec4(adr);
        self.load_p0_common(tid, dst, word, wid, signed)
    }

    /// Single-bit array read with a post-incrementing index register.
    pub(crate) fn op_load_avx_p(
        &mut self,
        tid: ThreadId,
        dst: u32,
        array: ArrayId,
        idx_reg: u8,
    ) -> bool {
        let unknown_adr = self.threads.get(tid).bit(FLAG_EQ) == Bit4::One;
        if unknown_adr {
            self.threads.get_mut(tid).set_bit(dst, Bit4::X);
            return true;
        }
        let adr = self.threads.get(tid).word_i(3);
        let use_index = self.threads.get(tid).word_i(idx_reg);
        let word = self.arrays.array(array).get_vec4(adr);
        let bit = if use_index < 0 || use_index >= word.len() as i64 {
            Bit4::X
        } else {
            word.value(use_index as usize)
        };
        let thr = self.threads.get_mut(tid);
        thr.set_bit(dst, bit);
        thr.set_word_i(idx_reg, use_index + 1);
        true
    }

    pub(crate) fn op_load_ar(&mut self, tid: ThreadId, array: ArrayId, idx_reg: u8) -> bool {
        let unknown_adr = self.threads.get(tid).bit(FLAG_EQ) == Bit4::One;
        let word = if unknown_adr {
            0.0
        } else {
            let adr = self.threads.get(tid).word_i(idx_reg);
            self.arrays.array(array).get_real(adr)
        };
        self.threads.get_mut(tid).push_real(word);
        true
    }

    pub(crate) fn op_load_stra(&mut self, tid: ThreadId, array: ArrayId, idx_reg: u8) -> bool {
        let unknown_adr = self.threads.get(tid).bit(FLAG_EQ) == Bit4::One;
        let word = if unknown_adr {
            String::new()
        } else {
            let adr = self.threads.get(tid).word_i(idx_reg);
            self.arrays.array(array).get_str(adr)
        };
        self.threads.get_mut(tid).push_str(word);
        true
    }

    // ── dynamic-array loads ─────────────────────────────────

    pub(crate) fn op_load_dar(&mut self, tid: ThreadId, dst: u32, net: NetId, wid: u32) -> bool {
        let adr = self.threads.get(tid).word_i(3);
        let obj = self.nets.read_obj(net);
        let word = match obj.as_darray() {
            Some(darray) => {
                let darray = darray.borrow();
                match usize::try_from(adr) {
                    Ok(adr) => darray.get_vec4(adr),
                    Err(_) => Vector4::filled(darray.word_width(), Bit4::X),
                }
            }
            None => Vector4::filled(wid as usize, Bit4::X),
        };
        let word = word.extended(wid as usize, Bit4::X);
        self.threads.get_mut(tid).write_vec(dst, &word);
        true
    }

    pub(crate) fn op_load_dar_r(&mut self, tid: ThreadId, net: NetId) -> bool {
        let adr = self.threads.get(tid).word_i(3);
        let obj = self.nets.read_obj(net);
        let word = obj
            .as_darray()
            .and_then(|d| usize::try_from(adr).ok().map(|adr| d.borrow().get_real(adr)))
            .unwrap_or(0.0);
        self.threads.get_mut(tid).push_real(word);
        true
    }

    pub(crate) fn op_load_dar_str(&mut self, tid: ThreadId, net: NetId) -> bool {
        let adr = self.threads.get(tid).word_i(3);
        let obj = self.nets.read_obj(net);
        let word = obj
            .as_darray()
            .and_then(|d| usize::try_from(adr).ok().map(|adr| d.borrow().get_str(adr)))
            .unwrap_or_default();
        self.threads.get_mut(tid).push_str(word);
        true
    }

    // ── scalar loads ────────────────────────────────────────

    pub(crate) fn op_load_obj(&mut self, tid: ThreadId, net: NetId) -> bool {
        let obj = self.nets.read_obj(net);
        self.threads.get_mut(tid).push_obj(obj);
        true
    }

    pub(crate) fn op_load_real(&mut self, tid: ThreadId, net: NetId) -> bool {
        let value = self.nets.read_real(net);
        self.threads.get_mut(tid).push_real(value);
        true
    }

    pub(crate) fn op_load_str(&mut self, tid: ThreadId, net: NetId) -> bool {
        let value = self.signal_str(net);
        self.threads.get_mut(tid).push_str(value);
        true
    }

    // ── stores ──────────────────────────────────────────────

    pub(crate) fn op_store_real(&mut self, tid: ThreadId, net: NetId) -> bool {
        let value = self.threads.get_mut(tid).pop_real();
        self.send_real(NetPtr::new(net, 0), value);
        true
    }

    pub(crate) fn op_store_str(&mut self, tid: ThreadId, net: NetId) -> bool {
        let value = self.threads.get_mut(tid).pop_str();
        self.send_str(NetPtr::new(net, 0), value);
        true
    }

    pub(crate) fn op_store_obj(&mut self, tid: ThreadId, net: NetId) -> bool {
        let value = self.threads.get_mut(tid).pop_obj();
        self.send_obj(NetPtr::new(net, 0), value);
        true
    }

    pub(crate) fn op_store_reala(&mut self, tid: ThreadId, array: ArrayId, idx_reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let adr = thr.word_i(idx_reg);
        let value = thr.pop_real();
        self.arrays.array_mut(array).set_real(adr, value);
        true
    }

    pub(crate) fn op_store_stra(&mut self, tid: ThreadId, array: ArrayId, idx_reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let adr = thr.word_i(idx_reg);
        let value = thr.pop_str();
        self.arrays.array_mut(array).set_str(adr, value);
        true
    }

    pub(crate) fn op_store_dar_r(&mut self, tid: ThreadId, net: NetId) -> bool {
        let thr = self.threads.get_mut(tid);
        let adr = thr.word_i(3);
        let value = thr.pop_real();
        let obj = self.nets.read_obj(net);
        if let (Some(darray), Ok(adr)) = (obj.as_darray(), usize::try_from(adr)) {
            darray.borrow_mut().set_real(adr, value);
        }
        true
    }

    pub(crate) fn op_store_dar_str(&mut self, tid: ThreadId, net: NetId) -> bool {
        let thr = self.threads.get_mut(tid);
        let adr = thr.word_i(3);
        let value = thr.pop_str();
        let obj = self.nets.read_obj(net);
        if let (Some(darray), Ok(adr)) = (obj.as_darray(), usize::try_from(adr)) {
            darray.borrow_mut().set_str(adr, value);
        }
        true
    }

    /// Immediate (blocking) write of thread bits through port 0.
    pub(crate) fn op_set_vec(&mut self, tid: ThreadId, net: NetId, src: u32, wid: u32) -> bool {
        let value = self.threads.get(tid).read_vec(src, wid);
        self.send_vec4(NetPtr::new(net, 0), value);
        true
    }

    /// Part-select variant: the destination offset is in word register 0.
    pub(crate) fn op_set_x0(&mut self, tid: ThreadId, net: NetId, src: u32, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let mut off = thr.word_i(0);
        let mut wid = wid as i64;
        let mut src = src as i64;
        let vwid = self.nets.signal_width(net) as i64;

        if off >= vwid {
            return true;
        }
        if off < 0 {
            if -off >= wid {
                return true;
            }
            wid += off;
            src -= off;
            off = 0;
        }
        if off + wid > vwid {
            wid = vwid - off;
        }
        let value = self.threads.get(tid).read_vec(src as u32, wid as u32);
        self.send_vec4_pv(NetPtr::new(net, 0), value, off as usize, vwid as usize);
        true
    }

    pub(crate) fn op_set_av(&mut self, tid: ThreadId, array: ArrayId, src: u32, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let adr = thr.word_i(3);
        let value = thr.read_vec(src, wid);
        self.arrays.array_mut(array).set_vec4(adr, &value);
        true
    }

    pub(crate) fn op_set_dar(&mut self, tid: ThreadId, net: NetId, src: u32, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let adr = thr.word_i(3);
        let value = thr.read_vec(src, wid);
        let obj = self.nets.read_obj(net);
        if let (Some(darray), Ok(adr)) = (obj.as_darray(), usize::try_from(adr)) {
            darray.borrow_mut().set_vec4(adr, &value);
        }
        true
    }

    // ── strings ─────────────────────────────────────────────

    /// SystemVerilog substr: inclusive byte range, empty on bad indices.
    pub(crate) fn op_substr(&mut self, tid: ThreadId, first_reg: u8, last_reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let first = thr.word_i(first_reg);
        let last = thr.word_i(last_reg);
        let val = thr.peek_str_mut();
        if first < 0 || last < first || last >= val.len() as i64 {
            val.clear();
            return true;
        }
        *val = val[first as usize..=last as usize].to_string();
        true
    }

    /// Unpack bytes of the string at TOS into thread bits, 8 bits per
    /// character starting at the index in `idx_reg`. Bytes beyond the
    /// string read as zero.
    pub(crate) fn op_substr_v(&mut self, tid: ThreadId, dst: u32, idx_reg: u8, wid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let mut sel = thr.word_i(idx_reg);
        let val = thr.peek_str(0).as_bytes().to_vec();
        let mut base = dst;
        for _ in 0..wid / 8 {
            let byte = if sel < 0 || sel >= val.len() as i64 {
                0
            } else {
                val[sel as usize]
            };
            thr.write_vec(base, &Vector4::from_u64(8, byte as u64));
            base += 8;
            sel += 1;
        }
        true
    }

    /// Write one byte into a string variable at the index in `idx_reg`.
    /// Out-of-range indices and NUL bytes are discarded.
    pub(crate) fn op_putc_str_v(&mut self, tid: ThreadId, net: NetId, idx_reg: u8, src: u32) -> bool {
        let thr = self.threads.get(tid);
        let idx = thr.word_i(idx_reg);
        let byte = thr.read_vec(src, 8).as_u64().unwrap_or(0) as u8;
        if byte == 0 {
            return true;
        }
        let value = self.signal_str(net);
        if idx < 0 || idx >= value.len() as i64 {
            return true;
        }
        // Byte-wise edit; strings here are byte sequences.
        let mut bytes = value.into_bytes();
        bytes[idx as usize] = byte;
        let value = String::from_utf8_lossy(&bytes).into_owned();
        self.send_str(NetPtr::new(net, 0), value);
        true
    }

    pub(crate) fn op_pushv_str(&mut self, tid: ThreadId, src: u32, wid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.read_vec(src, wid).cast2();
        let mut bytes = Vec::with_capacity((wid / 8) as usize);
        // MSB-first: the leftmost character is the top byte.
        for idx in (0..wid / 8).rev() {
            let byte = v.subvector((idx * 8) as usize, 8).as_u64().unwrap_or(0) as u8;
            if byte != 0 {
                bytes.push(byte);
            }
        }
        thr.push_str(String::from_utf8_lossy(&bytes).into_owned());
        true
    }

    // ── class properties ────────────────────────────────────

    pub(crate) fn op_prop_v(&mut self, tid: ThreadId, pid: u32, dst: u32, wid: u32) -> bool {
        let value = {
            let thr = self.threads.get(tid);
            let obj = thr.peek_obj();
            let cobj = obj.as_class().expect("property access on nil object");
            cobj.borrow().get_vec4(pid as usize)
        };
        let value = value.extended(wid as usize, Bit4::X);
        self.threads.get_mut(tid).write_vec(dst, &value);
        true
    }

    pub(crate) fn op_prop_r(&mut self, tid: ThreadId, pid: u32) -> bool {
        let value = {
            let thr = self.threads.get(tid);
            let obj = thr.peek_obj();
            let cobj = obj.as_class().expect("property access on nil object");
            cobj.borrow().get_real(pid as usize)
        };
        self.threads.get_mut(tid).push_real(value);
        true
    }

    pub(crate) fn op_prop_str(&mut self, tid: ThreadId, pid: u32) -> bool {
        let value = {
            let thr = self.threads.get(tid);
            let obj = thr.peek_obj();
            let cobj = obj.as_class().expect("property access on nil object");
            cobj.borrow().get_str(pid as usize)
        };
        self.threads.get_mut(tid).push_str(value);
        true
    }

    pub(crate) fn op_prop_obj(&mut self, tid: ThreadId, pid: u32) -> bool {
        let value = {
            let thr = self.threads.get(tid);
            let obj = thr.peek_obj();
            let cobj = obj.as_class().expect("property access on nil object");
            cobj.borrow().get_obj(pid as usize)
        };
        self.threads.get_mut(tid).push_obj(value);
        true
    }

    pub(crate) fn op_store_prop_v(&mut self, tid: ThreadId, pid: u32, src: u32, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let value = thr.read_vec(src, wid);
        let obj = thr.peek_obj();
        let cobj = obj.as_class().expect("property store on nil object");
        cobj.borrow_mut().set_vec4(pid as usize, value);
        true
    }

    pub(crate) fn op_store_prop_r(&mut self, tid: ThreadId, pid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let value = thr.pop_real();
        let obj = thr.peek_obj();
        let cobj = obj.as_class().expect("property store on nil object");
        cobj.borrow_mut().set_real(pid as usize, value);
        true
    }

    pub(crate) fn op_store_prop_str(&mut self, tid: ThreadId, pid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let value = thr.pop_str();
        let obj = thr.peek_obj();
        let cobj = obj.as_class().expect("property store on nil object");
        cobj.borrow_mut().set_str(pid as usize, value);
        true
    }

    /// Pop the value object, then store it into the property of the
    /// object now at TOS.
    pub(crate) fn op_store_prop_obj(&mut self, tid: ThreadId, pid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let value = thr.pop_obj();
        let obj = thr.peek_obj();
        let cobj = obj.as_class().expect("property store on nil object");
        cobj.borrow_mut().set_obj(pid as usize, value);
        true
    }

    // ── object construction ─────────────────────────────────

    pub(crate) fn op_new_cobj(&mut self, tid: ThreadId, class: ClassId) -> bool {
        let class = self.code.class(class).clone();
        self.threads
            .get_mut(tid)
            .push_obj(ObjectRef::new_class(&class));
        true
    }

    pub(crate) fn op_new_darray(
        &mut self,
        tid: ThreadId,
        size_reg: u8,
        tag: StrId,
        width: u32,
    ) -> bool {
        let size = self.threads.get(tid).word_u(size_reg) as usize;
        let kind = DarrayKind::from_tag(self.code.text(tag), width);
        self.threads
            .get_mut(tid)
            .push_obj(ObjectRef::new_darray(kind, size));
        true
    }

    pub(crate) fn op_test_nul(&mut self, tid: ThreadId, net: NetId) -> bool {
        let obj = self.nets.read_obj(net);
        let bit = if obj.is_nil() { Bit4::One } else { Bit4::Zero };
        self.threads.get_mut(tid).set_bit(FLAG_EQ, bit);
        true
    }

    /// Shallow-copy the referent of the object at TOS, replacing the
    /// handle with the copy.
    pub(crate) fn op_scopy(&mut self, tid: ThreadId) -> bool {
        let thr = self.threads.get_mut(tid);
        let src = thr.pop_obj();
        let copy = match &src {
            ObjectRef::Nil => ObjectRef::Nil,
            ObjectRef::DArray(d) => {
                let cloned = d.borrow().clone();
                ObjectRef::DArray(std::rc::Rc::new(std::cell::RefCell::new(cloned)))
            }
            ObjectRef::Class(c) => {
                let cloned = c.borrow().clone();
                ObjectRef::Class(std::rc::Rc::new(std::cell::RefCell::new(cloned)))
            }
        };
        thr.push_obj(copy);
        true
    }
}
