//! Names of the built-in nominal types.
//!
//! These are the names `vet_types::Hierarchy::with_builtins` registers and
//! the names runtime values report for themselves.

pub const OBJECT: &str = "object";
pub const NUMBER: &str = "number";
pub const COMPLEX: &str = "complex";
pub const FLOAT: &str = "float";
pub const INTEGRAL: &str = "integral";
pub const INT: &str = "int";
pub const BOOL: &str = "bool";
pub const STR: &str = "str";
pub const BYTES: &str = "bytes";
pub const BYTEARRAY: &str = "bytearray";
pub const NONE: &str = "None";
pub const TUPLE: &str = "tuple";
pub const LIST: &str = "list";
pub const SET: &str = "set";
pub const DICT: &str = "dict";
pub const FUNCTION: &str = "function";
pub const TYPE: &str = "type";

/// Every built-in name paired with its parents, in registration order.
pub const BUILTIN_PARENTS: &[(&str, &[&str])] = &[
    (OBJECT, &[]),
    (NUMBER, &[OBJECT]),
    (COMPLEX, &[NUMBER]),
    (FLOAT, &[COMPLEX]),
    (INTEGRAL, &[FLOAT]),
    (INT, &[INTEGRAL]),
    (BOOL, &[INTEGRAL]),
    (STR, &[OBJECT]),
    (BYTES, &[OBJECT]),
    (BYTEARRAY, &[OBJECT]),
    (NONE, &[OBJECT]),
    (TUPLE, &[OBJECT]),
    (LIST, &[OBJECT]),
    (SET, &[OBJECT]),
    (DICT, &[OBJECT]),
    (FUNCTION, &[OBJECT]),
    (TYPE, &[OBJECT]),
];
