use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SelectError;

/// Built-in top-level pattern lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SelectorPreset {
    /// The JDK 11 library surface shipped with the d8 desugared library.
    #[default]
    D8Desugar,
    /// The `java.util.concurrent` fixes shipped to Android.
    AndroidFixLibs,
}

impl SelectorPreset {
    pub const ALL: [SelectorPreset; 2] =
        [SelectorPreset::D8Desugar, SelectorPreset::AndroidFixLibs];

    pub fn name(self) -> &'static str {
        match self {
            SelectorPreset::D8Desugar => "d8_desugar",
            SelectorPreset::AndroidFixLibs => "android_fix_libs",
        }
    }

    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            SelectorPreset::D8Desugar => D8_JDK11_LIB_TOP_LEVEL_TYPE_PATTERNS,
            SelectorPreset::AndroidFixLibs => ANDROID_CONCURRENT_FIX_LIB_TOP_LEVEL_TYPE_PATTERNS,
        }
    }
}

impl fmt::Display for SelectorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectorPreset {
    type Err = SelectError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SelectorPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == name)
            .ok_or_else(|| SelectError::UnknownPreset(name.to_string()))
    }
}

/// Resolves a preset name: built-ins first, then `custom` (from the tool
/// configuration).
pub fn resolve_preset(
    name: &str,
    custom: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<String>, SelectError> {
    if let Ok(preset) = name.parse::<SelectorPreset>() {
        return Ok(preset.patterns().iter().map(|p| p.to_string()).collect());
    }
    custom
        .get(name)
        .cloned()
        .ok_or_else(|| SelectError::UnknownPreset(name.to_string()))
}

const D8_JDK11_LIB_TOP_LEVEL_TYPE_PATTERNS: &[&str] = &[
    "java/io/BufferedInputStream",
    "java/io/Desugar*",
    "java/io/UncheckedIOException",
    "java/lang/AbstractStringBuilder",
    "java/lang/CharSequence",
    "java/lang/DesugarCharacter",
    "java/lang/FunctionalInterface",
    "java/lang/Iterable",
    "java/lang/ReflectiveOperationException",
    "java/lang/String",
    "java/lang/annotation/Native",
    "java/lang/annotation/Repeatable",
    "java/net/URLDecoder",
    "java/net/URLEncoder",
    "java/nio/channels/Desugar*",
    "java/nio/channels/AsynchronousChannel",
    "java/nio/channels/AsynchronousFileChannel",
    "java/nio/channels/CompletionHandler",
    "java/nio/channels/FileChannel",
    "java/nio/channels/SeekableByteChannel",
    "java/nio/charset/*",
    "java/nio/file/*",
    "java/time/*",
    "java/util/AbstractList",
    "java/util/CollSer",
    "java/util/Collection",
    "java/util/Comparator",
    "java/util/Comparators",
    "java/util/Deque",
    "java/util/Desugar*",
    "java/util/DoubleSummaryStatistics",
    "java/util/ImmutableCollections",
    "java/util/IntSummaryStatistics",
    "java/util/Iterator",
    "java/util/KeyValueHolder",
    "java/util/List",
    "java/util/ListIterator",
    "java/util/LongSummaryStatistics",
    "java/util/Map",
    "java/util/NavigableMap",
    "java/util/NavigableSet",
    "java/util/Objects",
    "java/util/Optional*",
    "java/util/PrimitiveIterator",
    "java/util/Queue",
    "java/util/Set",
    "java/util/SortedMap",
    "java/util/SortedSet",
    "java/util/Spliterator",
    "java/util/Spliterators",
    "java/util/StringJoiner",
    "java/util/Tripwire",
    "java/util/concurrent/BlockingDeque",
    "java/util/concurrent/BlockingQueue",
    "java/util/concurrent/CompletableFuture",
    "java/util/concurrent/ConcurrentHashMap",
    "java/util/concurrent/ConcurrentLinkedDeque",
    "java/util/concurrent/ConcurrentLinkedQueue",
    "java/util/concurrent/ConcurrentMap",
    "java/util/concurrent/ConcurrentNavigableMap",
    "java/util/concurrent/CountedCompleter",
    "java/util/concurrent/Desugar*",
    "java/util/concurrent/Exchanger",
    "java/util/concurrent/Flow",
    "java/util/concurrent/ForkJoinPool",
    "java/util/concurrent/ForkJoinTask",
    "java/util/concurrent/FutureTask",
    "java/util/concurrent/Helpers",
    "java/util/concurrent/LinkedTransferQueue",
    "java/util/concurrent/Phaser",
    "java/util/concurrent/SubmissionPublisher",
    "java/util/concurrent/SynchronousQueue",
    "java/util/concurrent/ThreadLocalRandom",
    "java/util/concurrent/TransferQueue",
    "java/util/concurrent/atomic/Desugar*",
    "java/util/function/*",
    "java/util/stream/*",
    "sun/misc/Desugar*",
    "sun/nio/*",
    "sun/security/action/*",
    "sun/util/PreHashedMap",
    "jdk/internal/util/StaticProperty",
    "jdk/internal/util/Preconditions",
];

const ANDROID_CONCURRENT_FIX_LIB_TOP_LEVEL_TYPE_PATTERNS: &[&str] = &[
    "java/io/BufferedInputStream",
    "java/util/concurrent/CompletableFuture",
    "java/util/concurrent/ConcurrentHashMap",
    "java/util/concurrent/ConcurrentLinkedDeque",
    "java/util/concurrent/ConcurrentLinkedQueue",
    "java/util/concurrent/CountedCompleter",
    "java/util/concurrent/Exchanger",
    "java/util/concurrent/ForkJoinPool",
    "java/util/concurrent/ForkJoinTask",
    "java/util/concurrent/FutureTask",
    "java/util/concurrent/Helpers",
    "java/util/concurrent/LinkedTransferQueue",
    "java/util/concurrent/Phaser",
    "java/util/concurrent/SynchronousQueue",
    "java/util/concurrent/ThreadLocalRandom",
    "sun/misc/Desugar*",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternList;

    #[test]
    fn presets_round_trip_through_their_names() {
        for preset in SelectorPreset::ALL {
            assert_eq!(preset.name().parse::<SelectorPreset>().unwrap(), preset);
        }
        assert_eq!(SelectorPreset::default(), SelectorPreset::D8Desugar);
        assert!(matches!(
            "jdk17".parse::<SelectorPreset>(),
            Err(SelectError::UnknownPreset(name)) if name == "jdk17"
        ));
    }

    #[test]
    fn built_in_pattern_lists_are_well_formed() {
        for preset in SelectorPreset::ALL {
            let list = PatternList::new(preset.patterns()).unwrap();
            assert_eq!(
                list.len(),
                preset.patterns().len(),
                "{preset} has duplicates"
            );
        }
    }

    #[test]
    fn custom_presets_resolve_after_built_ins() {
        let mut custom = BTreeMap::new();
        custom.insert("mine".to_string(), vec!["a/B".to_string()]);
        custom.insert("d8_desugar".to_string(), vec!["shadowed/X".to_string()]);

        assert_eq!(resolve_preset("mine", &custom).unwrap(), vec!["a/B"]);
        assert_eq!(
            resolve_preset("d8_desugar", &custom).unwrap().len(),
            SelectorPreset::D8Desugar.patterns().len()
        );
        assert!(resolve_preset("other", &custom).is_err());
    }
}
