//! Ordered class rewrite stages.

use crate::classfile::ClassFile;
use crate::error::Result;

/// One rewrite stage over an in-memory [`ClassFile`].
pub trait ClassTransform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, class: &mut ClassFile) -> Result<()>;
}

/// Decodes class bytes, applies each stage in order and re-encodes.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn ClassTransform>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: impl ClassTransform + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn run(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut class = ClassFile::parse(bytes)?;
        self.apply(&mut class)?;
        class.to_bytes()
    }

    /// Applies every stage, in order, to an already decoded class.
    pub fn apply(&self, class: &mut ClassFile) -> Result<()> {
        for stage in &self.stages {
            tracing::trace!(
                target: "jarsmith.classfile",
                stage = stage.name(),
                class = class.name().unwrap_or_default(),
                "applying class transform"
            );
            stage.apply(class)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
