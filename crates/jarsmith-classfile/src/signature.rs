//! Generic signature walking (JVMS §4.7.9.1).
//!
//! A single grammar covers class, method and field signatures: optional type
//! parameters, then either a parenthesised method shape or a sequence of
//! reference types (one for fields, superclass plus interfaces for classes).
//!
//! Inner class suffixes (`Lpkg/Outer<TT;>.Inner;`) are reported to the mapper
//! under their binary name `pkg/Outer$Inner`; the rewritten suffix is the part
//! of the mapped binary name that follows the mapped outer name.

use crate::descriptor::NameMapper;
use crate::error::{Error, Result};

/// Calls `visit` with every class name the signature mentions.
pub fn visit_signature(signature: &str, visit: &mut dyn FnMut(&str)) -> Result<()> {
    let mut map = |name: &str| {
        visit(name);
        None::<String>
    };
    map_signature(signature, &mut map).map(|_| ())
}

/// Rewrites the class names of a signature; `None` if nothing changed.
pub fn map_signature(signature: &str, map: &mut NameMapper<'_>) -> Result<Option<String>> {
    let mut walker = Walker {
        input: signature,
        pos: 0,
        out: String::with_capacity(signature.len()),
        map,
    };
    walker.signature()?;
    if walker.out == signature {
        Ok(None)
    } else {
        Ok(Some(walker.out))
    }
}

struct Walker<'a, 'm, 'f> {
    input: &'a str,
    pos: usize,
    out: String,
    map: &'m mut NameMapper<'f>,
}

impl<'a> Walker<'a, '_, '_> {
    fn signature(&mut self) -> Result<()> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.bump();
            while self.peek() != Some(b')') {
                self.java_type()?;
            }
            self.bump();
            if self.peek() == Some(b'V') {
                self.bump();
            } else {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.bump();
                self.reference_type()?;
            }
        } else {
            if self.peek().is_none() {
                return Err(self.invalid());
            }
            while self.peek().is_some() {
                self.reference_type()?;
            }
        }
        if self.pos != self.input.len() {
            return Err(self.invalid());
        }
        Ok(())
    }

    fn type_parameters(&mut self) -> Result<()> {
        self.expect(b'<')?;
        loop {
            self.identifier(b':')?;
            self.expect(b':')?;
            // The class bound may be empty (`T::Ljava/lang/Comparable;`).
            if !matches!(self.peek(), Some(b':') | Some(b'>')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.bump();
                self.reference_type()?;
            }
            if self.peek() == Some(b'>') {
                self.bump();
                return Ok(());
            }
        }
    }

    fn java_type(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                self.bump();
                Ok(())
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.bump();
                self.identifier(b';')?;
                self.expect(b';')
            }
            Some(b'[') => {
                self.bump();
                self.java_type()
            }
            _ => Err(self.invalid()),
        }
    }

    fn class_type(&mut self) -> Result<()> {
        self.expect(b'L')?;
        let name = self.class_name()?;
        let mut mapped_outer = (self.map)(name).unwrap_or_else(|| name.to_string());
        self.out.push_str(&mapped_outer);
        let mut binary_name = name.to_string();

        loop {
            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
            match self.peek() {
                Some(b';') => {
                    self.bump();
                    return Ok(());
                }
                Some(b'.') => {
                    self.bump();
                    let simple = self.class_name()?;
                    binary_name = format!("{binary_name}${simple}");
                    let mapped =
                        (self.map)(&binary_name).unwrap_or_else(|| binary_name.clone());
                    let outer_prefix = format!("{mapped_outer}$");
                    let suffix = match mapped.strip_prefix(&outer_prefix) {
                        Some(rest) => rest,
                        None => mapped.rsplit('$').next().unwrap_or(&mapped),
                    };
                    self.out.push_str(suffix);
                    mapped_outer = mapped;
                }
                _ => return Err(self.invalid()),
            }
        }
    }

    fn type_arguments(&mut self) -> Result<()> {
        self.expect(b'<')?;
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.bump();
                    return Ok(());
                }
                Some(b'*') => self.bump(),
                Some(b'+' | b'-') => {
                    self.bump();
                    self.reference_type()?;
                }
                Some(_) => self.reference_type()?,
                None => return Err(self.invalid()),
            }
        }
    }

    /// Reads a (possibly package-qualified) class name without emitting it.
    fn class_name(&mut self) -> Result<&'a str> {
        let input: &'a str = self.input;
        let start = self.pos;
        let len = input.as_bytes()[start..]
            .iter()
            .position(|b| matches!(b, b'<' | b'.' | b';'))
            .ok_or_else(|| self.invalid())?;
        if len == 0 {
            return Err(self.invalid());
        }
        self.pos += len;
        Ok(&input[start..start + len])
    }

    /// Copies an identifier running up to `end` (exclusive) to the output.
    fn identifier(&mut self, end: u8) -> Result<()> {
        let start = self.pos;
        let len = self.input.as_bytes()[start..]
            .iter()
            .position(|b| *b == end)
            .ok_or_else(|| self.invalid())?;
        if len == 0 {
            return Err(self.invalid());
        }
        self.out.push_str(&self.input[start..start + len]);
        self.pos += len;
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        if let Some(b) = self.peek() {
            self.out.push(b as char);
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.invalid())
        }
    }

    fn invalid(&self) -> Error {
        Error::InvalidSignature(self.input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(signature: &str) -> Vec<String> {
        let mut out = Vec::new();
        visit_signature(signature, &mut |name| out.push(name.to_string())).unwrap();
        out
    }

    fn relocate(signature: &str) -> Option<String> {
        let mut map = |name: &str| {
            name.starts_with("java/nio/")
                .then(|| format!("__wrapper__/{name}"))
        };
        map_signature(signature, &mut map).unwrap()
    }

    #[test]
    fn visits_class_method_and_field_signatures() {
        let class = "<T::Ljava/lang/Comparable<-TT;>;>Ljava/lang/Object;Ljava/util/List<TT;>;";
        assert_eq!(
            names(class),
            vec!["java/lang/Comparable", "java/lang/Object", "java/util/List"]
        );
        let method =
            "<E:Ljava/lang/Exception;>([TE;Ljava/util/Map<**>;)TE;^TE;^Ljava/io/IOException;";
        assert_eq!(
            names(method),
            vec![
                "java/lang/Exception",
                "java/util/Map",
                "java/io/IOException",
            ]
        );
        assert_eq!(
            names("Ljava/util/List<+Ljava/lang/Number;>;"),
            vec!["java/util/List", "java/lang/Number"]
        );
    }

    #[test]
    fn inner_class_suffixes_use_binary_names() {
        assert_eq!(
            names("Ljava/util/Map<TK;TV;>.Entry<TK;TV;>;"),
            vec!["java/util/Map", "java/util/Map$Entry"]
        );
    }

    #[test]
    fn maps_outer_and_inner_names() {
        assert_eq!(
            relocate("Ljava/nio/file/WatchEvent<TT;>.Kind<TT;>;"),
            Some("L__wrapper__/java/nio/file/WatchEvent<TT;>.Kind<TT;>;".into())
        );
        assert_eq!(
            relocate("(Ljava/util/List<Ljava/nio/file/Path;>;)V"),
            Some("(Ljava/util/List<L__wrapper__/java/nio/file/Path;>;)V".into())
        );
        assert_eq!(relocate("Ljava/util/List<Ljava/lang/String;>;"), None);
    }

    #[test]
    fn rejects_malformed_signatures() {
        for signature in ["", "Ljava/lang/Object", "<T>V", "(I", "Ljava/util/List<TT;"] {
            assert!(
                matches!(
                    visit_signature(signature, &mut |_| {}),
                    Err(Error::InvalidSignature(_))
                ),
                "{signature} should be rejected"
            );
        }
    }
}
