use std::ops::Range;

use crate::error::{Error, Result};

/// Maps an internal name to its replacement, or `None` to keep it.
pub type NameMapper<'f> = dyn FnMut(&str) -> Option<String> + 'f;

/// Calls `visit` with every object type name in a field or method descriptor.
pub fn visit_descriptor(desc: &str, visit: &mut dyn FnMut(&str)) -> Result<()> {
    for range in object_type_ranges(desc)? {
        visit(&desc[range]);
    }
    Ok(())
}

/// Rewrites the object types of a field or method descriptor.
///
/// Returns `None` when `map` leaves every name unchanged.
pub fn map_descriptor(desc: &str, map: &mut NameMapper<'_>) -> Result<Option<String>> {
    let mut out = String::with_capacity(desc.len());
    let mut last = 0usize;
    let mut changed = false;
    for range in object_type_ranges(desc)? {
        if let Some(mapped) = map(&desc[range.clone()]) {
            out.push_str(&desc[last..range.start]);
            out.push_str(&mapped);
            last = range.end;
            changed = true;
        }
    }
    if !changed {
        return Ok(None);
    }
    out.push_str(&desc[last..]);
    Ok(Some(out))
}

/// A `CONSTANT_Class` name is either an internal name or, for array classes,
/// a field descriptor.
pub fn visit_class_constant(name: &str, visit: &mut dyn FnMut(&str)) -> Result<()> {
    if name.starts_with('[') {
        visit_descriptor(name, visit)
    } else {
        visit(name);
        Ok(())
    }
}

pub fn map_class_constant(name: &str, map: &mut NameMapper<'_>) -> Result<Option<String>> {
    if name.starts_with('[') {
        map_descriptor(name, map)
    } else {
        Ok(map(name).filter(|mapped| mapped != name))
    }
}

/// Byte ranges of every `L...;` class name, validating the whole descriptor.
fn object_type_ranges(desc: &str) -> Result<Vec<Range<usize>>> {
    let bytes = desc.as_bytes();
    let invalid = || Error::InvalidDescriptor(desc.to_string());
    let mut ranges = Vec::new();
    let mut pos = 0usize;

    // A lone `V` is the class value of `void.class` in annotations.
    if desc == "V" {
        return Ok(ranges);
    }

    if bytes.first() == Some(&b'(') {
        pos += 1;
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => pos = field_type(bytes, pos, &mut ranges).ok_or_else(invalid)?,
                None => return Err(invalid()),
            }
        }
        if bytes.get(pos) == Some(&b'V') {
            pos += 1;
        } else {
            pos = field_type(bytes, pos, &mut ranges).ok_or_else(invalid)?;
        }
    } else {
        pos = field_type(bytes, pos, &mut ranges).ok_or_else(invalid)?;
    }

    if pos != bytes.len() {
        return Err(invalid());
    }
    Ok(ranges)
}

fn field_type(bytes: &[u8], mut pos: usize, ranges: &mut Vec<Range<usize>>) -> Option<usize> {
    while bytes.get(pos) == Some(&b'[') {
        pos += 1;
    }
    match bytes.get(pos)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => Some(pos + 1),
        b'L' => {
            let start = pos + 1;
            let len = bytes[start..].iter().position(|b| *b == b';')?;
            if len == 0 {
                return None;
            }
            ranges.push(start..start + len);
            Some(start + len + 1)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(desc: &str) -> Vec<String> {
        let mut out = Vec::new();
        visit_descriptor(desc, &mut |name| out.push(name.to_string())).unwrap();
        out
    }

    #[test]
    fn visits_object_types_in_method_descriptors() {
        assert_eq!(
            names("(I[Ljava/lang/String;J)Ljava/util/List;"),
            vec!["java/lang/String", "java/util/List"]
        );
        assert!(names("([[IZ)V").is_empty());
    }

    #[test]
    fn maps_only_accepted_names() {
        let mut map = |name: &str| {
            name.starts_with("java/io/")
                .then(|| format!("__wrapper__/{name}"))
        };
        let files = "(Ljava/io/File;Ljava/lang/String;)[Ljava/io/File;";
        let wrapped = "(L__wrapper__/java/io/File;Ljava/lang/String;)[L__wrapper__/java/io/File;";
        assert_eq!(
            map_descriptor(files, &mut map).unwrap(),
            Some(wrapped.into())
        );
        assert_eq!(map_descriptor("(I)V", &mut map).unwrap(), None);
        assert_eq!(
            map_class_constant("[[Ljava/io/File;", &mut map).unwrap(),
            Some("[[L__wrapper__/java/io/File;".into())
        );
        assert_eq!(
            map_class_constant("java/io/File", &mut map).unwrap(),
            Some("__wrapper__/java/io/File".into())
        );
    }

    #[test]
    fn rejects_malformed_descriptors() {
        for desc in ["", "(I", "Ljava/lang/String", "()", "IV", "L;", "(V)V", "Q"] {
            assert!(
                matches!(
                    visit_descriptor(desc, &mut |_| {}),
                    Err(Error::InvalidDescriptor(_))
                ),
                "{desc} should be rejected"
            );
        }
    }
}
