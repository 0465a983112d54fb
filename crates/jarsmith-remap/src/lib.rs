//! Internal-name rewriting of class files and the archive tools built on it.

mod converter;
mod error;
mod remapper;
mod retarget;
mod test_jar;

pub use crate::converter::{TypeWrapperConverter, WRAPPED_PREFIXES, WRAPPER_NAMESPACE};
pub use crate::error::RemapError;
pub use crate::remapper::TypeRemapper;
pub use crate::retarget::{Invocation, InvocationRetarget};
pub use crate::test_jar::{TestJarSelector, RELOCATION_PREFIX};
