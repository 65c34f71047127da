//! Reference-counted runtime objects: dynamic arrays and class instances.
//!
//! Object handles have shared ownership; every copy of a handle refers to
//! the same referent. `Nil` is a real value (the null object), not an
//! absent one. Out-of-bounds dynamic-array reads produce the element
//! type's default; out-of-bounds writes are discarded.

use crate::logic::Bit4;
use crate::vector4::Vector4;
use std::cell::RefCell;
use std::rc::Rc;

/// A shared object handle.
#[derive(Clone, Default)]
pub enum ObjectRef {
    #[default]
    Nil,
    DArray(Rc<RefCell<Darray>>),
    Class(Rc<RefCell<ClassObject>>),
}

impl ObjectRef {
    pub fn is_nil(&self) -> bool {
        matches!(self, ObjectRef::Nil)
    }

    pub fn new_darray(kind: DarrayKind, size: usize) -> ObjectRef {
        ObjectRef::DArray(Rc::new(RefCell::new(Darray::new(kind, size))))
    }

    pub fn new_class(class: &Rc<ClassType>) -> ObjectRef {
        ObjectRef::Class(Rc::new(RefCell::new(ClassObject::new(class))))
    }

    pub fn as_darray(&self) -> Option<&Rc<RefCell<Darray>>> {
        match self {
            ObjectRef::DArray(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Rc<RefCell<ClassObject>>> {
        match self {
            ObjectRef::Class(c) => Some(c),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectRef::Nil => write!(f, "nil"),
            ObjectRef::DArray(d) => write!(f, "darray[{}]", d.borrow().len()),
            ObjectRef::Class(c) => write!(f, "class {}", c.borrow().class_type().name),
        }
    }
}

/// Element kind of a dynamic array, selected by the textual type tag of
/// the `new/darray` opcode: `b<N>`/`sb<N>` for atoms, `r` for reals, `S`
/// for strings, anything else a packed vector of that width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DarrayKind {
    /// Two-state atom of 1..=64 bits.
    Atom { width: u32, signed: bool },
    Real,
    Str,
    Vec4 { width: u32 },
}

impl DarrayKind {
    /// Parse a type tag. Unknown tags fall back to a packed four-state
    /// vector of `default_width` bits.
    pub fn from_tag(tag: &str, default_width: u32) -> DarrayKind {
        let atom = |s: &str, signed| {
            s.parse::<u32>()
                .ok()
                .filter(|w| (1..=64).contains(w))
                .map(|width| DarrayKind::Atom { width, signed })
        };
        match tag {
            "r" => DarrayKind::Real,
            "S" => DarrayKind::Str,
            _ if tag.starts_with("sb") => {
                atom(&tag[2..], true).unwrap_or(DarrayKind::Vec4 {
                    width: default_width,
                })
            }
            _ if tag.starts_with('b') => atom(&tag[1..], false).unwrap_or(DarrayKind::Vec4 {
                width: default_width,
            }),
            _ => DarrayKind::Vec4 {
                width: default_width,
            },
        }
    }
}

/// A dynamic array. Storage is monomorphic per element kind.
#[derive(Debug, Clone)]
pub enum Darray {
    Atom {
        width: u32,
        signed: bool,
        words: Vec<u64>,
    },
    Real(Vec<f64>),
    Str(Vec<String>),
    Vec4 {
        width: u32,
        words: Vec<Vector4>,
    },
}

impl Darray {
    pub fn new(kind: DarrayKind, size: usize) -> Darray {
        match kind {
            DarrayKind::Atom { width, signed } => Darray::Atom {
                width,
                signed,
                words: vec![0; size],
            },
            DarrayKind::Real => Darray::Real(vec![0.0; size]),
            DarrayKind::Str => Darray::Str(vec![String::new(); size]),
            DarrayKind::Vec4 { width } => Darray::Vec4 {
                width,
                words: vec![Vector4::new(width as usize); size],
            },
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Darray::Atom { words, .. } => words.len(),
            Darray::Real(words) => words.len(),
            Darray::Str(words) => words.len(),
            Darray::Vec4 { words, .. } => words.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element width in bits, for vector-valued arrays.
    pub fn word_width(&self) -> usize {
        match self {
            Darray::Atom { width, .. } => *width as usize,
            Darray::Vec4 { width, .. } => *width as usize,
            Darray::Real(_) | Darray::Str(_) => 0,
        }
    }

    /// Read a vector word. Out of range yields all-X of the element width.
    pub fn get_vec4(&self, adr: usize) -> Vector4 {
        match self {
            Darray::Atom { width, words, .. } => match words.get(adr) {
                Some(word) => Vector4::from_u64(*width as usize, *word),
                None => Vector4::filled(*width as usize, Bit4::X),
            },
            Darray::Vec4 { width, words } => words
                .get(adr)
                .cloned()
                .unwrap_or_else(|| Vector4::filled(*width as usize, Bit4::X)),
            Darray::Real(_) | Darray::Str(_) => Vector4::new(0),
        }
    }

    /// Write a vector word. Out-of-range writes and writes to non-vector
    /// arrays are discarded. Atoms store the two-state cast.
    pub fn set_vec4(&mut self, adr: usize, value: &Vector4) {
        match self {
            Darray::Atom { width, words, .. } => {
                if let Some(word) = words.get_mut(adr) {
                    let bits = value.cast2().coerced(*width as usize, false);
                    *word = bits.as_u64().unwrap_or(0);
                }
            }
            Darray::Vec4 { width, words } => {
                if let Some(slot) = words.get_mut(adr) {
                    *slot = value.coerced(*width as usize, false);
                }
            }
            Darray::Real(_) | Darray::Str(_) => {}
        }
    }

    pub fn get_real(&self, adr: usize) -> f64 {
        match self {
            Darray::Real(words) => words.get(adr).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn set_real(&mut self, adr: usize, value: f64) {
        if let Darray::Real(words) = self {
            if let Some(slot) = words.get_mut(adr) {
                *slot = value;
            }
        }
    }

    pub fn get_str(&self, adr: usize) -> String {
        match self {
            Darray::Str(words) => words.get(adr).cloned().unwrap_or_default(),
            _ => String::new(),
        }
    }

    pub fn set_str(&mut self, adr: usize, value: String) {
        if let Darray::Str(words) = self {
            if let Some(slot) = words.get_mut(adr) {
                *slot = value;
            }
        }
    }
}

/// Property type of a class member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropType {
    Vec4 { width: u32 },
    Real,
    Str,
    Obj,
}

/// A class definition: ordered, named property slots.
#[derive(Debug, Clone)]
pub struct ClassType {
    pub name: String,
    pub properties: Vec<(String, PropType)>,
}

impl ClassType {
    pub fn new(name: impl Into<String>, properties: Vec<(String, PropType)>) -> Rc<ClassType> {
        Rc::new(ClassType {
            name: name.into(),
            properties,
        })
    }

    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|(n, _)| n == name)
    }
}

/// One property slot's value.
#[derive(Debug, Clone)]
pub enum PropValue {
    Vec4(Vector4),
    Real(f64),
    Str(String),
    Obj(ObjectRef),
}

/// An instance of a class: the property slots of its type.
#[derive(Debug, Clone)]
pub struct ClassObject {
    class: Rc<ClassType>,
    slots: Vec<PropValue>,
}

impl ClassObject {
    pub fn new(class: &Rc<ClassType>) -> ClassObject {
        let slots = class
            .properties
            .iter()
            .map(|(_, ty)| match ty {
                PropType::Vec4 { width } => PropValue::Vec4(Vector4::new(*width as usize)),
                PropType::Real => PropValue::Real(0.0),
                PropType::Str => PropValue::Str(String::new()),
                PropType::Obj => PropValue::Obj(ObjectRef::Nil),
            })
            .collect();
        ClassObject {
            class: Rc::clone(class),
            slots,
        }
    }

    pub fn class_type(&self) -> &Rc<ClassType> {
        &self.class
    }

    pub fn get_vec4(&self, pid: usize) -> Vector4 {
        match &self.slots[pid] {
            PropValue::Vec4(v) => v.clone(),
            _ => Vector4::new(0),
        }
    }

    pub fn set_vec4(&mut self, pid: usize, value: Vector4) {
        if let PropValue::Vec4(slot) = &mut self.slots[pid] {
            *slot = value.coerced(slot.len(), false);
        }
    }

    pub fn get_real(&self, pid: usize) -> f64 {
        match &self.slots[pid] {
            PropValue::Real(v) => *v,
            _ => 0.0,
        }
    }

    pub fn set_real(&mut self, pid: usize, value: f64) {
        if let PropValue::Real(slot) = &mut self.slots[pid] {
            *slot = value;
        }
    }

    pub fn get_str(&self, pid: usize) -> String {
        match &self.slots[pid] {
            PropValue::Str(v) => v.clone(),
            _ => String::new(),
        }
    }

    pub fn set_str(&mut self, pid: usize, value: String) {
        if let PropValue::Str(slot) = &mut self.slots[pid] {
            *slot = value;
        }
    }

    pub fn get_obj(&self, pid: usize) -> ObjectRef {
        match &self.slots[pid] {
            PropValue::Obj(v) => v.clone(),
            _ => ObjectRef::Nil,
        }
    }

    pub fn set_obj(&mut self, pid: usize, value: ObjectRef) {
        if let PropValue::Obj(slot) = &mut self.slots[pid] {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn darray_tags() {
        assert_eq!(
            DarrayKind::from_tag("b8", 0),
            DarrayKind::Atom {
                width: 8,
                signed: false
            }
        );
        assert_eq!(
            DarrayKind::from_tag("sb32", 0),
            DarrayKind::Atom {
                width: 32,
                signed: true
            }
        );
        assert_eq!(DarrayKind::from_tag("r", 0), DarrayKind::Real);
        assert_eq!(DarrayKind::from_tag("S", 0), DarrayKind::Str);
        assert_eq!(DarrayKind::from_tag("v17", 17), DarrayKind::Vec4 { width: 17 });
    }

    #[test]
    fn out_of_bounds_reads_give_defaults() {
        let arr = Darray::new(DarrayKind::Vec4 { width: 4 }, 2);
        assert_eq!(arr.get_vec4(5).to_string(), "xxxx");
        let arr = Darray::new(DarrayKind::Real, 2);
        assert_eq!(arr.get_real(5), 0.0);
        let arr = Darray::new(DarrayKind::Str, 2);
        assert_eq!(arr.get_str(5), "");
    }

    #[test]
    fn out_of_bounds_writes_are_dropped() {
        let mut arr = Darray::new(DarrayKind::Real, 2);
        arr.set_real(7, 3.5);
        assert_eq!(arr.len(), 2);
        assert_eq!(arr.get_real(0), 0.0);
    }

    #[test]
    fn handles_share_the_referent() {
        let a = ObjectRef::new_darray(DarrayKind::Real, 4);
        let b = a.clone();
        a.as_darray().unwrap().borrow_mut().set_real(1, 2.5);
        assert_eq!(b.as_darray().unwrap().borrow().get_real(1), 2.5);
    }
}
