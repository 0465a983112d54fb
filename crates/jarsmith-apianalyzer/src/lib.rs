//! API surface digests of class files and the queries built on them.

mod digest;
mod error;
mod generator;
mod lister;
mod references;
mod resolver;
pub mod textproto;

pub use crate::digest::{ClassDigest, ClassDigestCollection, FieldDigest, MethodDigest};
pub use crate::error::AnalyzerError;
pub use crate::generator::{read_text_digest, write_text_digest, ClassDigestGenerator};
pub use crate::lister::{list_desugared_apis, undo_desugar_mirrored_type, ApiRecord};
pub use crate::references::TypeReferenceScanner;
pub use crate::resolver::{ClassMemberResolver, TypePool};
