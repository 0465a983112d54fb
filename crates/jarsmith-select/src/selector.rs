use std::collections::HashSet;
use std::path::Path;

use jarsmith_archive::{transfer, Archive, ArchiveEntry, TransferStats};
use jarsmith_classfile::{is_class_entry, ClassFile, Pipeline, ReadOptions};

use crate::companion::CompanionIndex;
use crate::error::SelectError;
use crate::filter::{AnnotationFilter, StripMethodParameters};
use crate::pattern::PatternList;

/// Copies the class entries of a jar that match a pattern list, plus every
/// resource, into a deterministic output jar.
///
/// Classes with desugar-supported members also yield a generated
/// `Desugar`-prefixed companion class, which is written when the patterns
/// select its name.
#[derive(Debug)]
pub struct ClassEntrySelector {
    patterns: PatternList,
    pipeline: Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionReport {
    /// Selected input classes and generated companions.
    pub selected: usize,
    pub transfer: TransferStats,
}

impl ClassEntrySelector {
    /// Selected classes pass through [`AnnotationFilter`] and
    /// [`StripMethodParameters`].
    pub fn new(patterns: PatternList) -> Self {
        let pipeline = Pipeline::new()
            .stage(AnnotationFilter::default())
            .stage(StripMethodParameters);
        Self { patterns, pipeline }
    }

    /// Names of the class entries of `input`, and of the companions it
    /// yields, matched by the patterns, in ascending order.
    pub fn match_entries(&self, input: &Path) -> Result<Vec<String>, SelectError> {
        self.plan(input).map(|(_, selected)| selected)
    }

    pub fn run(&self, input: &Path, output: &Path) -> Result<SelectionReport, SelectError> {
        let (companions, selected) = self.plan(input)?;
        let selected: HashSet<String> = selected.into_iter().collect();
        let stats = transfer(
            &[input.to_path_buf()],
            output,
            |entry: ArchiveEntry| -> Result<Vec<ArchiveEntry>, SelectError> {
                let keep_base = selected.contains(&entry.name);
                let companion_entry = companions
                    .companion_entry(&entry.name)
                    .filter(|name| selected.contains(*name));
                if !keep_base && companion_entry.is_none() {
                    return Ok(Vec::new());
                }

                let class_error = |source| SelectError::Class {
                    entry: entry.name.clone(),
                    source,
                };
                let mut class = ClassFile::parse(&entry.data).map_err(class_error)?;
                let companion = match companion_entry {
                    Some(name) => companions
                        .generate(&class)
                        .map_err(|source| SelectError::Companion {
                            entry: entry.name.clone(),
                            source,
                        })?
                        .map(|companion| (name, companion)),
                    None => None,
                };

                let mut produced = Vec::with_capacity(2);
                if keep_base {
                    self.pipeline.apply(&mut class).map_err(class_error)?;
                    let data = class.to_bytes().map_err(class_error)?;
                    produced.push(ArchiveEntry::new(entry.name.clone(), data));
                }
                if let Some((name, mut companion)) = companion {
                    let class_error = |source| SelectError::Class {
                        entry: name.to_string(),
                        source,
                    };
                    self.pipeline.apply(&mut companion).map_err(class_error)?;
                    let data = companion.to_bytes().map_err(class_error)?;
                    produced.push(ArchiveEntry::new(name, data));
                }
                Ok(produced)
            },
        )?;
        Ok(SelectionReport {
            selected: selected.len(),
            transfer: stats,
        })
    }

    /// Indexes companion members and selects among the class entries plus
    /// the companion names.
    fn plan(&self, input: &Path) -> Result<(CompanionIndex, Vec<String>), SelectError> {
        let archive = Archive::new(input);
        let mut companions = CompanionIndex::new();
        archive.for_each_entry(|entry| {
            if !is_class_entry(&entry.name) {
                return Ok(());
            }
            ClassFile::parse_with(&entry.data, ReadOptions::STRUCTURE_ONLY)
                .and_then(|class| companions.scan(&class))
                .map_err(|source| SelectError::Class {
                    entry: entry.name,
                    source,
                })
        })?;

        let mut candidates: Vec<String> = archive
            .entry_names()?
            .into_iter()
            .filter(|name| is_class_entry(name))
            .collect();
        let generated = companions.companion_entries();
        let generated_count = generated.len();
        for name in &generated {
            if candidates.binary_search_by(|c| c.as_str().cmp(*name)).is_ok() {
                return Err(SelectError::CompanionConflict {
                    name: name.to_string(),
                });
            }
        }
        candidates.extend(generated.into_iter().map(str::to_string));
        candidates.sort();

        let selected = self.patterns.select(&candidates)?;
        tracing::debug!(
            target: "jarsmith.select",
            input = %input.display(),
            candidates = candidates.len(),
            companions = generated_count,
            patterns = self.patterns.len(),
            selected = selected.len(),
            "matched top-level patterns"
        );
        Ok((companions, selected))
    }
}
