//! Human-readable rendering of descriptors.
//!
//! The same text is used in failure messages and as the ordering key when
//! unions and constraint lists are canonicalized.

use std::fmt;

use super::{CallableParams, Descriptor, TypeVar};
use crate::ensure_sufficient_stack;

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Descriptor]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Descriptor::Any => write!(f, "Any"),
            Descriptor::NoneType => write!(f, "None"),
            Descriptor::Primitive(name) => write!(f, "{name}"),
            Descriptor::Union(members) => {
                write!(f, "Union[")?;
                write_list(f, members)?;
                write!(f, "]")
            }
            Descriptor::TypeVar(var) => write!(f, "{var}"),
            Descriptor::Tuple { elements, variadic } => {
                write!(f, "Tuple[")?;
                if elements.is_empty() {
                    write!(f, "()")?;
                } else {
                    write_list(f, elements)?;
                }
                if *variadic {
                    write!(f, ", ...")?;
                }
                write!(f, "]")
            }
            Descriptor::Record(record) => write!(f, "{}", record.name()),
            Descriptor::Sequence(element) => write!(f, "List[{element}]"),
            Descriptor::SetOf(element) => write!(f, "Set[{element}]"),
            Descriptor::Mapping { key, value } => write!(f, "Dict[{key}, {value}]"),
            Descriptor::Callable { params, result } => match params {
                CallableParams::Any => write!(f, "Callable[..., {result}]"),
                CallableParams::Exact(params) => {
                    write!(f, "Callable[[")?;
                    write_list(f, params)?;
                    write!(f, "], {result}]")
                }
            },
            Descriptor::Generic(app) => {
                write!(f, "{}", app.def().name())?;
                if let Some(args) = app.args() {
                    write!(f, "[")?;
                    write_list(f, args)?;
                    write!(f, "]")?;
                }
                Ok(())
            }
            Descriptor::ForwardRef(forward) => write!(f, "'{}'", forward.name),
        })
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.variance_prefix(), self.name())
    }
}
