//! The scope tree and per-invocation storage for automatic scopes.
//!
//! Scopes form a tree rooted at the top modules. A scope owns its
//! sub-scopes, its declared nets, the threads running inside it, and —
//! when automatic — a pool of contexts. Context free/live bookkeeping
//! uses plain index vectors; members never carry intrusive links.

use crate::exec::ThreadId;
use crate::net::NetId;
use crate::object::ObjectRef;
use crate::vector4::Vector4;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) u32);

impl ContextId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scope kinds, as declared in the loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Task,
    Fork,
    Begin,
    Generate,
    Package,
    Class,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Module => "module",
            ScopeKind::Function => "function",
            ScopeKind::Task => "task",
            ScopeKind::Fork => "fork",
            ScopeKind::Begin => "begin",
            ScopeKind::Generate => "generate",
            ScopeKind::Package => "package",
            ScopeKind::Class => "class",
        }
    }
}

/// Declared slot shape for one automatic item. `reset` builds the fresh
/// per-invocation value.
#[derive(Debug, Clone)]
pub enum ContextItem {
    Vec4 { width: usize },
    Real,
    Str,
    Obj,
}

impl ContextItem {
    fn reset(&self) -> ContextSlot {
        match self {
            ContextItem::Vec4 { width } => ContextSlot::Vec4(Vector4::new(*width)),
            ContextItem::Real => ContextSlot::Real(0.0),
            ContextItem::Str => ContextSlot::Str(String::new()),
            ContextItem::Obj => ContextSlot::Obj(ObjectRef::Nil),
        }
    }
}

/// One automatic item's per-invocation value.
#[derive(Debug, Clone)]
pub enum ContextSlot {
    Vec4(Vector4),
    Real(f64),
    Str(String),
    Obj(ObjectRef),
}

/// A per-invocation storage slice for an automatic scope.
#[derive(Debug, Clone)]
pub struct Context {
    pub scope: ScopeId,
    pub slots: Vec<ContextSlot>,
}

/// Source position bookkeeping for the VPI attribute surface.
#[derive(Debug, Clone, Default)]
pub struct ScopeLoc {
    pub file: String,
    pub lineno: u32,
    pub def_file: String,
    pub def_lineno: u32,
}

#[derive(Debug)]
pub struct Scope {
    pub name: String,
    pub type_name: String,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub is_automatic: bool,
    pub is_cell: bool,
    pub loc: ScopeLoc,
    /// Power-of-ten exponents, e.g. -9 for 1ns.
    pub time_units: i8,
    pub time_precision: i8,
    /// Signal nets declared directly in this scope.
    pub nets: Vec<NetId>,
    /// Threads currently rooted in this scope.
    pub threads: BTreeSet<ThreadId>,
    /// Automatic item table; index is the per-context slot index.
    pub items: Vec<ContextItem>,
    free_contexts: Vec<ContextId>,
    live_contexts: Vec<ContextId>,
}

impl Scope {
    pub fn full_name(&self, arena: &ScopeArena) -> String {
        let mut parts = vec![self.name.clone()];
        let mut cur = self.parent;
        while let Some(id) = cur {
            let scope = arena.scope(id);
            parts.push(scope.name.clone());
            cur = scope.parent;
        }
        parts.reverse();
        parts.join(".")
    }
}

/// Arena of all scopes plus the automatic-context pool.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
    contexts: Vec<Context>,
    roots: Vec<ScopeId>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: ScopeKind, name: impl Into<String>, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let (time_units, time_precision) = match parent {
            Some(p) => {
                let ps = self.scope(p);
                (ps.time_units, ps.time_precision)
            }
            None => (0, 0),
        };
        self.scopes.push(Scope {
            name: name.into(),
            type_name: String::new(),
            kind,
            parent,
            children: Vec::new(),
            is_automatic: false,
            is_cell: false,
            loc: ScopeLoc::default(),
            time_units,
            time_precision,
            nets: Vec::new(),
            threads: BTreeSet::new(),
            items: Vec::new(),
            free_contexts: Vec::new(),
            live_contexts: Vec::new(),
        });
        match parent {
            Some(p) => self.scopes[p.index()].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn roots(&self) -> &[ScopeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len() as u32).map(ScopeId)
    }

    /// Find a scope by dotted path from a root, e.g. `"top.child"`.
    pub fn by_path(&self, path: &str) -> Option<ScopeId> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut cur = *self
            .roots
            .iter()
            .find(|id| self.scope(**id).name == first)?;
        for part in parts {
            cur = *self
                .scope(cur)
                .children
                .iter()
                .find(|id| self.scope(**id).name == part)?;
        }
        Some(cur)
    }

    pub fn context(&self, id: ContextId) -> &Context {
        &self.contexts[id.index()]
    }

    pub fn context_mut(&mut self, id: ContextId) -> &mut Context {
        &mut self.contexts[id.index()]
    }

    /// Draw a context from the scope's free pool, or make a fresh one.
    /// The context joins the scope's live list.
    pub fn alloc_context(&mut self, scope_id: ScopeId) -> ContextId {
        debug_assert!(self.scope(scope_id).is_automatic);
        match self.scopes[scope_id.index()].free_contexts.pop() {
            Some(ctx_id) => {
                let items: Vec<ContextSlot> = self
                    .scope(scope_id)
                    .items
                    .iter()
                    .map(|item| item.reset())
                    .collect();
                self.contexts[ctx_id.index()].slots = items;
                self.scopes[scope_id.index()].live_contexts.push(ctx_id);
                ctx_id
            }
            None => {
                let ctx_id = ContextId(self.contexts.len() as u32);
                let slots = self
                    .scope(scope_id)
                    .items
                    .iter()
                    .map(|item| item.reset())
                    .collect();
                self.contexts.push(Context {
                    scope: scope_id,
                    slots,
                });
                self.scopes[scope_id.index()].live_contexts.push(ctx_id);
                ctx_id
            }
        }
    }

    /// Return a context to the scope's free pool.
    pub fn free_context(&mut self, scope_id: ScopeId, ctx_id: ContextId) {
        let scope = &mut self.scopes[scope_id.index()];
        scope.live_contexts.retain(|c| *c != ctx_id);
        scope.free_contexts.push(ctx_id);
    }

    /// Declare an automatic item in `scope`, returning its slot index.
    pub fn add_item(&mut self, scope_id: ScopeId, item: ContextItem) -> u32 {
        let scope = &mut self.scopes[scope_id.index()];
        scope.items.push(item);
        scope.items.len() as u32 - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_lookup() {
        let mut arena = ScopeArena::new();
        let top = arena.add(ScopeKind::Module, "top", None);
        let child = arena.add(ScopeKind::Begin, "blk", Some(top));
        assert_eq!(arena.by_path("top"), Some(top));
        assert_eq!(arena.by_path("top.blk"), Some(child));
        assert_eq!(arena.by_path("top.missing"), None);
    }

    #[test]
    fn context_pool_reuses_freed_slots() {
        let mut arena = ScopeArena::new();
        let func = arena.add(ScopeKind::Function, "f", None);
        arena.scope_mut(func).is_automatic = true;
        arena.add_item(func, ContextItem::Vec4 { width: 8 });

        let a = arena.alloc_context(func);
        arena.free_context(func, a);
        let b = arena.alloc_context(func);
        assert_eq!(a, b, "freed context should be reused");

        // A reused context comes back reset.
        match &arena.context(b).slots[0] {
            ContextSlot::Vec4(v) => assert!(v.has_xz()),
            other => panic!("unexpected slot {other:?}"),
        }
    }

    #[test]
    fn full_name_walks_parents() {
        let mut arena = ScopeArena::new();
        let top = arena.add(ScopeKind::Module, "top", None);
        let task = arena.add(ScopeKind::Task, "t", Some(top));
        assert_eq!(arena.scope(task).full_name(&arena), "top.t");
    }
}
