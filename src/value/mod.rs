//! Runtime values shared by the compiler, the VM, and the evaluator.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::BlockStatement;
use crate::builtins::Builtin;
use crate::evaluator::environment::Environment;

/// A runtime value.
///
/// Arrays and hashes are immutable once built (`push` copies), so they are
/// shared with plain `Rc` and never need interior mutability.
#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit signed integer
    Integer(i64),
    /// Boolean value
    Boolean(bool),
    /// The null value
    Null,
    /// Immutable string
    String(Rc<String>),
    /// Ordered sequence of values
    Array(Rc<Vec<Value>>),
    /// Hash map; each entry keeps the original key value alongside the value
    Hash(Rc<HashMap<HashKey, HashPair>>),
    /// Bytecode function produced by the compiler
    CompiledFunction(Rc<CompiledFunction>),
    /// Compiled function plus its captured free variables
    Closure(Rc<Closure>),
    /// Host-provided function
    Builtin(&'static Builtin),
    /// Tree-walk function literal carrying its defining environment
    Function(Rc<FunctionValue>),
    /// Wrapper used by the evaluator to unwind `return`
    ReturnValue(Box<Value>),
    /// Runtime fault carried as a value by the evaluator and builtins
    Error(String),
}

impl Value {
    pub const TRUE: Value = Value::Boolean(true);
    pub const FALSE: Value = Value::Boolean(false);

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::Null => "Null",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
            Value::CompiledFunction(_) => "CompiledFunction",
            Value::Closure(_) => "Closure",
            Value::Builtin(_) => "Builtin",
            Value::Function(_) => "Function",
            Value::ReturnValue(_) => "ReturnValue",
            Value::Error(_) => "Error",
        }
    }

    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// The hash key for this value, or `None` if the type cannot key a hash.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(n) => Some(HashKey {
                kind: HashKeyKind::Integer,
                value: *n as u64,
            }),
            Value::Boolean(b) => Some(HashKey {
                kind: HashKeyKind::Boolean,
                value: u64::from(*b),
            }),
            Value::String(s) => Some(HashKey {
                kind: HashKeyKind::String,
                value: fnv1a(s.as_bytes()),
            }),
            _ => None,
        }
    }

    /// Render the value the way the REPL prints results.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

/// 64-bit FNV-1a over raw bytes.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(PRIME)
    })
}

/// Identity of a value usable as a hash-map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: HashKeyKind,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKeyKind {
    Integer,
    Boolean,
    String,
}

/// A hash entry preserving the key's original value for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// A function lowered to bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    /// Flat instruction byte stream.
    pub instructions: Vec<u8>,
    /// Local slots the frame reserves, parameters included.
    pub num_locals: usize,
    /// Declared parameter count, checked at call time.
    pub num_parameters: usize,
}

/// A compiled function bound to its captured free variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

/// A tree-walk function value: parameters, body, and defining environment.
#[derive(Clone)]
pub struct FunctionValue {
    pub parameters: Vec<String>,
    pub body: BlockStatement,
    pub env: Rc<RefCell<Environment>>,
}

// The environment chain can reach this function again; Debug skips it.
impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::ReturnValue(a), Value::ReturnValue(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                // Sorted by key text so output is deterministic.
                let mut entries: Vec<&HashPair> = pairs.values().collect();
                entries.sort_by_key(|pair| pair.key.to_string());
                write!(f, "{{")?;
                for (i, pair) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Value::CompiledFunction(func) => {
                write!(f, "<fn/{}>", func.num_parameters)
            }
            Value::Closure(closure) => {
                write!(f, "<closure/{}>", closure.function.num_parameters)
            }
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            Value::Function(func) => write!(f, "fn({})", func.parameters.join(", ")),
            Value::ReturnValue(value) => write!(f, "{}", value),
            Value::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}
