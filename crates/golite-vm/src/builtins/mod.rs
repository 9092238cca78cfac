//! The builtin function table and math constant set (spec §6 "Builtins").
//!
//! Modeled on the teacher's `vm/builtins/registry.rs`: one declarative table
//! mapping a name to an arity and a function pointer, built once at startup
//! and shared (read-only) by every task. A `BUILTIN` heap object stores only
//! the numeric id from this table (spec §4.1), so the table's index *is*
//! the calling convention.

use crate::error::{VmError, VmResult};
use crate::heap::{Address, Heap, RootSource, Tag, FALSE_ADDR, TRUE_ADDR};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

type BuiltinFn = fn(&mut Heap, &[Address], &dyn RootSource) -> VmResult<Address>;

struct BuiltinSpec {
    name: &'static str,
    arity: u16,
    func: BuiltinFn,
}

/// Declarative builtin table (spec §6): name, arity, implementation. The
/// table's position assigns each builtin its id, stored in a `BUILTIN`
/// node's metadata word.
static BUILTINS: &[BuiltinSpec] = &[
    BuiltinSpec { name: "display", arity: 1, func: bi_display },
    BuiltinSpec { name: "make_channel", arity: 0, func: bi_make_channel },
    BuiltinSpec { name: "make_array", arity: 1, func: bi_make_array },
    BuiltinSpec { name: "math_sqrt", arity: 1, func: bi_math_sqrt },
    BuiltinSpec { name: "is_number", arity: 1, func: bi_is_number },
    BuiltinSpec { name: "is_boolean", arity: 1, func: bi_is_boolean },
    BuiltinSpec { name: "is_string", arity: 1, func: bi_is_string },
    BuiltinSpec { name: "is_undefined", arity: 1, func: bi_is_undefined },
    BuiltinSpec { name: "is_function", arity: 1, func: bi_is_function },
];

/// The math constants spec §6 requires be visible as global bindings,
/// computed once (teacher: `once_cell::sync::Lazy` for its interner tables).
pub static MATH_CONSTANTS: Lazy<Vec<(&'static str, f64)>> = Lazy::new(|| {
    vec![
        ("MATH_E", std::f64::consts::E),
        ("MATH_LN2", std::f64::consts::LN_2),
        ("MATH_LN10", std::f64::consts::LN_10),
        ("MATH_LOG2E", std::f64::consts::LOG2_E),
        ("MATH_LOG10E", std::f64::consts::LOG10_E),
        ("MATH_PI", std::f64::consts::PI),
        ("MATH_SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ("MATH_SQRT2", std::f64::consts::SQRT_2),
    ]
});

#[derive(Debug)]
pub struct BuiltinRegistry {
    name_to_id: FxHashMap<&'static str, u32>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let name_to_id = BUILTINS
            .iter()
            .enumerate()
            .map(|(id, spec)| (spec.name, id as u32))
            .collect();
        BuiltinRegistry { name_to_id }
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        BUILTINS.iter().map(|spec| spec.name)
    }

    fn spec(&self, id: u32) -> VmResult<&'static BuiltinSpec> {
        BUILTINS.get(id as usize).ok_or(VmError::UnknownBuiltin(id))
    }

    pub fn arity(&self, id: u32) -> VmResult<u16> {
        Ok(self.spec(id)?.arity)
    }

    pub fn call(
        &self,
        id: u32,
        heap: &mut Heap,
        args: &[Address],
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let spec = self.spec(id)?;
        if args.len() != spec.arity as usize {
            return Err(VmError::OperandTypeError(format!(
                "{} expects {} argument(s), got {}",
                spec.name,
                spec.arity,
                args.len()
            )));
        }
        (spec.func)(heap, args, roots)
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(heap: &Heap, addr: Address) -> String {
    match heap.tag_of(addr) {
        Tag::False | Tag::True | Tag::Null | Tag::Undefined | Tag::Number | Tag::String => heap
            .address_to_value(addr)
            .map(|v| v.display())
            .unwrap_or_else(|_| "<corrupt>".to_string()),
        other => format!("<{}>", other.name().to_lowercase()),
    }
}

fn bi_display(heap: &mut Heap, args: &[Address], _roots: &dyn RootSource) -> VmResult<Address> {
    println!("{}", describe(heap, args[0]));
    Ok(args[0])
}

fn bi_make_channel(heap: &mut Heap, _args: &[Address], roots: &dyn RootSource) -> VmResult<Address> {
    heap.allocate_channel(roots)
}

fn bi_make_array(heap: &mut Heap, args: &[Address], roots: &dyn RootSource) -> VmResult<Address> {
    let len = heap.read_number(args[0])?;
    if len < 0.0 || len.fract() != 0.0 {
        return Err(VmError::OperandTypeError(format!(
            "make_array expects a non-negative integer length, got {len}"
        )));
    }
    heap.allocate_array(len as u32, roots)
}

fn bi_math_sqrt(heap: &mut Heap, args: &[Address], roots: &dyn RootSource) -> VmResult<Address> {
    let n = heap.read_number(args[0])?;
    heap.allocate_number(n.sqrt(), roots)
}

fn bi_is_number(heap: &mut Heap, args: &[Address], _roots: &dyn RootSource) -> VmResult<Address> {
    Ok(bool_addr(heap.tag_of(args[0]) == Tag::Number))
}

fn bi_is_boolean(heap: &mut Heap, args: &[Address], _roots: &dyn RootSource) -> VmResult<Address> {
    let tag = heap.tag_of(args[0]);
    Ok(bool_addr(tag == Tag::True || tag == Tag::False))
}

fn bi_is_string(heap: &mut Heap, args: &[Address], _roots: &dyn RootSource) -> VmResult<Address> {
    Ok(bool_addr(heap.tag_of(args[0]) == Tag::String))
}

fn bi_is_undefined(heap: &mut Heap, args: &[Address], _roots: &dyn RootSource) -> VmResult<Address> {
    Ok(bool_addr(heap.tag_of(args[0]) == Tag::Undefined))
}

fn bi_is_function(heap: &mut Heap, args: &[Address], _roots: &dyn RootSource) -> VmResult<Address> {
    let tag = heap.tag_of(args[0]);
    Ok(bool_addr(tag == Tag::Closure || tag == Tag::Builtin))
}

fn bool_addr(b: bool) -> Address {
    if b {
        TRUE_ADDR
    } else {
        FALSE_ADDR
    }
}
