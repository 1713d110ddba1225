//! Method bodies.
//!
//! The `RVA` column of a `MethodDef` row points at the method body inside the image. Only the
//! header and the exception clauses are decoded; the IL code is exposed as raw bytes.

mod body;
mod exceptions;

pub use body::{MethodBody, MethodBodyFlags, MethodHeader, TINY_MAX_STACK};
pub use exceptions::{ExceptionClause, ExceptionClauseKind, SectionFlags};
