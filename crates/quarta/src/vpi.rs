//! The narrow VPI-style callback surface exposed to plug-ins.
//!
//! Handles are ids into the scope and net arenas. Attribute access covers
//! the scope property set the runtime tracks (names, source positions,
//! timescale, automatic/cell flags); value access reads and writes signal
//! nets with an optional delay and mode.

use crate::error::RuntimeError;
use crate::net::{NetId, NetPtr, NodeFun};
use crate::runtime::Runtime;
use crate::schedule::SchedEvent;
use crate::scope::{ScopeId, ScopeKind};
use crate::vector4::Vector4;

/// Returned by [`Runtime::vpi_get`] when an attribute does not apply.
pub const VPI_UNDEFINED: i64 = -1;

/// An object handle passed through the callback interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpiRef {
    Scope(ScopeId),
    Net(NetId),
}

/// Integer attribute codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpiProp {
    CellInstance,
    DefLineNo,
    LineNo,
    TimeUnit,
    TimePrecision,
    TopModule,
    Automatic,
    Type,
    Size,
}

/// String attribute codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpiStrProp {
    DefFile,
    File,
    FullName,
    Name,
    DefName,
}

/// Object-class filters for child iteration. `Scope` means every child
/// object held by the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpiIterate {
    All,
    Scope,
    Module,
    Net,
}

/// Values crossing the callback boundary.
#[derive(Debug, Clone)]
pub enum VpiValue {
    Vec4(Vector4),
    Real(f64),
    Str(String),
}

/// Delay handling for [`Runtime::vpi_put_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpiPutMode {
    NoDelay,
    Transport,
    Inertial,
}

/// Type codes reported for scopes, in the traditional numbering.
fn scope_type_code(kind: ScopeKind) -> i64 {
    match kind {
        ScopeKind::Module => 32,
        ScopeKind::Function => 20,
        ScopeKind::Task => 28,
        ScopeKind::Fork => 33,
        ScopeKind::Begin => 34,
        ScopeKind::Generate => 32,
        ScopeKind::Package => 600,
        ScopeKind::Class => 630,
    }
}

impl Runtime {
    /// Integer attribute retrieval for scopes and nets.
    pub fn vpi_get(&self, prop: VpiProp, handle: VpiRef) -> i64 {
        match handle {
            VpiRef::Scope(id) => {
                let scope = self.scopes.scope(id);
                match prop {
                    VpiProp::CellInstance => scope.is_cell as i64,
                    VpiProp::DefLineNo => scope.loc.def_lineno as i64,
                    VpiProp::LineNo => scope.loc.lineno as i64,
                    VpiProp::TimeUnit => scope.time_units as i64,
                    VpiProp::TimePrecision => scope.time_precision as i64,
                    VpiProp::TopModule => scope.parent.is_none() as i64,
                    VpiProp::Automatic => scope.is_automatic as i64,
                    VpiProp::Type => scope_type_code(scope.kind),
                    VpiProp::Size => VPI_UNDEFINED,
                }
            }
            VpiRef::Net(id) => match prop {
                VpiProp::Size => self.nets.signal_width(id) as i64,
                VpiProp::Type => 36,
                _ => VPI_UNDEFINED,
            },
        }
    }

    /// String attribute retrieval.
    pub fn vpi_get_str(&self, prop: VpiStrProp, handle: VpiRef) -> String {
        match handle {
            VpiRef::Scope(id) => {
                let scope = self.scopes.scope(id);
                match prop {
                    VpiStrProp::DefFile => scope.loc.def_file.clone(),
                    VpiStrProp::File => scope.loc.file.clone(),
                    VpiStrProp::FullName => scope.full_name(&self.scopes),
                    VpiStrProp::Name => scope.name.clone(),
                    VpiStrProp::DefName => scope.type_name.clone(),
                }
            }
            VpiRef::Net(id) => match prop {
                VpiStrProp::Name | VpiStrProp::FullName => self
                    .nets
                    .node(id)
                    .name
                    .clone()
                    .unwrap_or_default(),
                _ => String::new(),
            },
        }
    }

    /// Enumerate a scope's children of the requested object class.
    pub fn vpi_iterate(&self, handle: VpiRef, filter: VpiIterate) -> Vec<VpiRef> {
        let VpiRef::Scope(id) = handle else {
            return Vec::new();
        };
        let scope = self.scopes.scope(id);
        let mut out = Vec::new();
        let want_scopes = matches!(
            filter,
            VpiIterate::All | VpiIterate::Scope | VpiIterate::Module
        );
        let want_nets = matches!(filter, VpiIterate::All | VpiIterate::Scope | VpiIterate::Net);
        if want_scopes {
            for child in &scope.children {
                if filter == VpiIterate::Module
                    && self.scopes.scope(*child).kind != ScopeKind::Module
                {
                    continue;
                }
                out.push(VpiRef::Scope(*child));
            }
        }
        if want_nets {
            out.extend(scope.nets.iter().map(|id| VpiRef::Net(*id)));
        }
        out
    }

    /// Handle accessor: the scope containing an object (`scope` and
    /// `module` resolve identically).
    pub fn vpi_scope_of(&self, handle: VpiRef) -> Option<VpiRef> {
        match handle {
            VpiRef::Scope(id) => self.scopes.scope(id).parent.map(VpiRef::Scope),
            VpiRef::Net(id) => self
                .scopes
                .iter_ids()
                .find(|sid| self.scopes.scope(*sid).nets.contains(&id))
                .map(VpiRef::Scope),
        }
    }

    /// Read the current value of a signal handle.
    pub fn vpi_get_value(&self, handle: VpiRef) -> Option<VpiValue> {
        let VpiRef::Net(net) = handle else {
            return None;
        };
        match &self.nets.node(net).fun {
            NodeFun::SigReal(_) => Some(VpiValue::Real(self.nets.read_real(net))),
            NodeFun::SigStr(_) => Some(VpiValue::Str(self.nets.read_str(net))),
            _ => Some(VpiValue::Vec4(self.read_vec4(net))),
        }
    }

    /// Put a value onto a signal handle, optionally after a delay. With
    /// no delay the write happens synchronously; the transport and
    /// inertial modes both go through the non-blocking region here.
    pub fn vpi_put_value(
        &mut self,
        handle: VpiRef,
        value: VpiValue,
        delay: u64,
        mode: VpiPutMode,
    ) -> Result<(), RuntimeError> {
        let VpiRef::Net(net) = handle else {
            return Err(RuntimeError::BadHandle);
        };
        let ptr = NetPtr::new(net, 0);
        match (mode, delay) {
            (VpiPutMode::NoDelay, _) | (_, 0) => match value {
                VpiValue::Vec4(v) => self.send_vec4(ptr, v),
                VpiValue::Real(v) => self.send_real(ptr, v),
                VpiValue::Str(v) => self.send_str(ptr, v),
            },
            _ => match value {
                VpiValue::Vec4(v) => self.schedule_assign_plucked_vector(ptr, delay, v),
                VpiValue::Real(v) => self
                    .sched
                    .schedule_nba(SchedEvent::AssignReal { ptr, value: v }, delay),
                VpiValue::Str(v) => self
                    .sched
                    .schedule_nba(SchedEvent::AssignStr { ptr, value: v }, delay),
            },
        }
        Ok(())
    }

    /// `$stop`: pause the simulation at the current time.
    pub fn vpi_stop(&mut self) {
        self.sched.stop();
    }

    /// `$finish`: end the simulation.
    pub fn vpi_finish(&mut self) {
        self.sched.finish();
    }

    /// Resume after a `$stop` returned control to the embedder.
    pub fn resume_after_stop(&mut self) {
        self.sched.clear_stop();
    }
}
