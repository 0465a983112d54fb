//! Conversions between archive entry names and internal class names.

/// Package prefixes of JDK-owned types, including the desugared `j$` mirror.
pub const JDK_PACKAGE_PREFIXES: &[&str] = &["com/sun/", "java/", "javax/", "jdk/", "sun/", "j$/"];

pub const CLASS_SUFFIX: &str = ".class";

pub fn class_entry_name(internal_name: &str) -> String {
    format!("{internal_name}{CLASS_SUFFIX}")
}

pub fn is_class_entry(entry_name: &str) -> bool {
    entry_name.ends_with(CLASS_SUFFIX)
}

pub fn entry_to_internal_name(entry_name: &str) -> Option<&str> {
    entry_name
        .strip_prefix('/')
        .unwrap_or(entry_name)
        .strip_suffix(CLASS_SUFFIX)
}

pub fn is_jdk_type(internal_name: &str) -> bool {
    JDK_PACKAGE_PREFIXES
        .iter()
        .any(|prefix| internal_name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_round_trip() {
        assert_eq!(class_entry_name("java/util/List"), "java/util/List.class");
        assert_eq!(
            entry_to_internal_name("java/util/List.class"),
            Some("java/util/List")
        );
        assert_eq!(entry_to_internal_name("/a/B$C.class"), Some("a/B$C"));
        assert_eq!(entry_to_internal_name("META-INF/MANIFEST.MF"), None);
        assert!(is_class_entry("a/B.class"));
        assert!(!is_class_entry("a/"));
    }

    #[test]
    fn jdk_types_are_recognised_by_package() {
        assert!(is_jdk_type("java/lang/Object"));
        assert!(is_jdk_type("j$/util/Optional"));
        assert!(is_jdk_type("com/sun/net/httpserver/HttpServer"));
        assert!(!is_jdk_type("com/google/common/collect/Lists"));
        assert!(!is_jdk_type("javafx/Node"));
    }
}
