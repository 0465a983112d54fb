use std::collections::HashSet;

use jarsmith_classfile::{
    retain_annotations, AnnotationLayout, Attribute, ClassFile, ClassTransform, CodeAttribute,
    ConstantPool, Retained, Result,
};

/// Annotations stripped from selected classes: desugar API markers and JDK
/// internal VM hints that other platform class path entries do not carry.
pub const OMITTED_ANNOTATIONS: &[&str] = &[
    "Lcom/google/devtools/build/android/annotations/DesugarSupportedApi;",
    "Lcom/google/devtools/build/android/annotations/DesugarSupportedApiHelper;",
    "Ljdk/internal/HotSpotIntrinsicCandidate;",
    "Ljdk/internal/vm/annotation/Contended;",
    "Ljdk/internal/vm/annotation/DontInline;",
    "Ljdk/internal/vm/annotation/ForceInline;",
    "Ljdk/internal/vm/annotation/Preserve;",
    "Ljdk/internal/vm/annotation/ReservedStackAccess;",
    "Ljdk/internal/vm/annotation/Stable;",
];

/// Removes annotations by type descriptor from every annotation attribute:
/// class, field, method and parameter annotations, type annotations, and the
/// type annotations nested in `Code`.
#[derive(Debug, Clone)]
pub struct AnnotationFilter {
    omitted: HashSet<String>,
}

impl AnnotationFilter {
    pub fn new<I, S>(omitted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            omitted: omitted.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for AnnotationFilter {
    fn default() -> Self {
        Self::new(OMITTED_ANNOTATIONS.iter().copied())
    }
}

impl ClassTransform for AnnotationFilter {
    fn name(&self) -> &'static str {
        "annotation-filter"
    }

    fn apply(&self, class: &mut ClassFile) -> Result<()> {
        let keep = |descriptor: &str| !self.omitted.contains(descriptor);
        let cp = &class.constant_pool;
        filter_attributes(&mut class.attributes, cp, &keep)?;
        for member in class.fields.iter_mut().chain(class.methods.iter_mut()) {
            filter_attributes(&mut member.attributes, cp, &keep)?;
        }
        Ok(())
    }
}

/// Returns whether any attribute changed.
fn filter_attributes(
    attributes: &mut Vec<Attribute>,
    cp: &ConstantPool,
    keep: &dyn Fn(&str) -> bool,
) -> Result<bool> {
    let mut changed = false;
    let mut kept = Vec::with_capacity(attributes.len());
    for mut attribute in std::mem::take(attributes) {
        let name = attribute.name(cp)?;
        if name == "Code" {
            let mut code = CodeAttribute::parse(&attribute.info)?;
            if filter_attributes(&mut code.attributes, cp, keep)? {
                attribute.info = code.to_bytes()?;
                changed = true;
            }
        } else if let Some(layout) = AnnotationLayout::of(name) {
            match retain_annotations(layout, &attribute.info, cp, keep)? {
                Retained::Unchanged => {}
                Retained::Rewritten(info) => {
                    attribute.info = info;
                    changed = true;
                }
                Retained::Emptied => {
                    changed = true;
                    continue;
                }
            }
        }
        kept.push(attribute);
    }
    *attributes = kept;
    Ok(changed)
}

/// Drops `MethodParameters`, which platform class path entries such as
/// `android.jar` do not carry and build-time checks reject.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripMethodParameters;

impl ClassTransform for StripMethodParameters {
    fn name(&self) -> &'static str {
        "strip-method-parameters"
    }

    fn apply(&self, class: &mut ClassFile) -> Result<()> {
        let cp = &class.constant_pool;
        for method in &mut class.methods {
            let mut result = Ok(());
            method.attributes.retain(|attribute| match attribute.name(cp) {
                Ok(name) => name != "MethodParameters",
                Err(err) => {
                    result = Err(err);
                    true
                }
            });
            result?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarsmith_test_utils::{u2, ClassBuilder, Target};

    fn annotation_names(class: &ClassFile, attributes: &[Attribute]) -> Vec<String> {
        attributes
            .iter()
            .map(|a| a.name(&class.constant_pool).unwrap().to_string())
            .collect()
    }

    #[test]
    fn strips_listed_annotations_and_drops_emptied_attributes() {
        let mut builder = ClassBuilder::new("java/util/Optional");
        builder.annotations(
            Target::Class,
            true,
            &[
                "Lcom/google/devtools/build/android/annotations/DesugarSupportedApi;",
                "Ljava/lang/Deprecated;",
            ],
        );
        let field = builder.field(0x0001, "value", "Ljava/lang/Object;");
        let stable = "Ljdk/internal/vm/annotation/Stable;";
        builder.annotations(Target::Field(field), true, &[stable]);
        let method = builder.method(0x0001, "get", "()Ljava/lang/Object;");
        builder.annotations(
            Target::Method(method),
            false,
            &["Ljdk/internal/HotSpotIntrinsicCandidate;"],
        );
        let bytes = builder.build();

        let mut class = ClassFile::parse(&bytes).unwrap();
        AnnotationFilter::default().apply(&mut class).unwrap();
        let class = ClassFile::parse(&class.to_bytes().unwrap()).unwrap();

        assert_eq!(
            annotation_names(&class, &class.attributes),
            vec!["RuntimeVisibleAnnotations"]
        );
        let info = &class.attributes[0].info;
        assert_eq!(&info[..2], &[0, 1]);
        let kept = u16::from_be_bytes([info[2], info[3]]);
        assert_eq!(
            class.constant_pool.get_utf8(kept).unwrap(),
            "Ljava/lang/Deprecated;"
        );

        assert!(class.fields[0].attributes.is_empty());
        assert!(class.methods[0].attributes.is_empty());
    }

    #[test]
    fn parameter_and_code_type_annotations_are_filtered() {
        let mut builder = ClassBuilder::new("a/B");
        let stable = builder.utf8("Ljdk/internal/vm/annotation/Stable;");
        let deprecated = builder.utf8("Ljava/lang/Deprecated;");
        let method = builder.method(0x0001, "m", "(II)V");

        // (@Stable int, @Deprecated @Stable int)
        let mut visible = vec![2u8];
        for types in [&[stable][..], &[deprecated, stable][..]] {
            visible.extend(u2(types.len() as u16));
            for ty in types {
                visible.extend(u2(*ty));
                visible.extend(u2(0));
            }
        }
        builder.attribute(
            Target::Method(method),
            "RuntimeVisibleParameterAnnotations",
            visible,
        );
        let mut invisible = vec![1u8];
        invisible.extend(u2(1));
        invisible.extend(u2(stable));
        invisible.extend(u2(0));
        builder.attribute(
            Target::Method(method),
            "RuntimeInvisibleParameterAnnotations",
            invisible,
        );

        // @Stable on local variable 1, nested in Code.
        let mut local = u2(1).to_vec();
        local.push(0x40);
        local.extend(u2(1));
        local.extend([0, 0, 0, 1, 0, 1]);
        local.push(0);
        local.extend(u2(stable));
        local.extend(u2(0));
        let nested = vec![("RuntimeVisibleTypeAnnotations", local)];
        builder.code_with(method, 0, 3, &[0xb1], &[], nested);
        let bytes = builder.build();

        let mut class = ClassFile::parse(&bytes).unwrap();
        AnnotationFilter::default().apply(&mut class).unwrap();
        let class = ClassFile::parse(&class.to_bytes().unwrap()).unwrap();
        let method = &class.methods[0];
        assert_eq!(
            annotation_names(&class, &method.attributes),
            vec!["RuntimeVisibleParameterAnnotations", "Code"]
        );

        let mut expected = vec![2u8];
        expected.extend(u2(0));
        expected.extend(u2(1));
        expected.extend(u2(deprecated));
        expected.extend(u2(0));
        assert_eq!(method.attributes[0].info, expected);

        let code = CodeAttribute::parse(&method.attributes[1].info).unwrap();
        assert_eq!(code.code, vec![0xb1]);
        assert!(code.attributes.is_empty());
    }

    #[test]
    fn untouched_classes_keep_their_bytes() {
        let mut builder = ClassBuilder::new("a/B");
        builder.annotations(Target::Class, true, &["Ljava/lang/Deprecated;"]);
        let bytes = builder.build();

        let mut class = ClassFile::parse(&bytes).unwrap();
        AnnotationFilter::default().apply(&mut class).unwrap();
        assert_eq!(class.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn method_parameters_are_removed() {
        let mut builder = ClassBuilder::new("a/B");
        let method = builder.method(0x0001, "m", "(I)V");
        let parameters = vec![1, 0, 0, 0, 0];
        builder.attribute(Target::Method(method), "MethodParameters", parameters);
        builder.exceptions(method, &["java/io/IOException"]);
        let bytes = builder.build();

        let mut class = ClassFile::parse(&bytes).unwrap();
        StripMethodParameters.apply(&mut class).unwrap();
        assert_eq!(
            annotation_names(&class, &class.methods[0].attributes),
            vec!["Exceptions"]
        );
    }
}
