//! Companion classes for desugar-supported APIs.
//!
//! Members of a class `pkg/Name` carrying one of [`API_ANNOTATIONS`] are
//! copied into a synthetic `pkg/DesugarName` class. Static members keep
//! their descriptor; instance methods become static and take the receiver as
//! their first parameter, so the copied bytecode runs unchanged.

use std::collections::{BTreeSet, HashMap, HashSet};

use jarsmith_classfile::opcodes::INVOKEDYNAMIC;
use jarsmith_classfile::{
    annotation_types, class_entry_name, walk_instructions, Attribute, BootstrapMethod, ClassFile,
    CodeAttribute, Constant, ConstantPool, Member, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC,
};
use thiserror::Error;

/// Visible member annotations that move a member into its companion class.
pub const API_ANNOTATIONS: &[&str] = &[
    "Lcom/google/devtools/build/android/annotations/DesugarSupportedApi;",
    "Lcom/google/devtools/build/android/annotations/DesugarSupportedApiHelper;",
];

const COMPANION_PREFIX: &str = "Desugar";
const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";
const OBJECT: &str = "java/lang/Object";

const ACC_FINAL: u16 = 0x0010;
const ACC_SUPER: u16 = 0x0020;
const ACC_SYNTHETIC: u16 = 0x1000;
const COMPANION_ACCESS: u16 = ACC_SYNTHETIC | ACC_PUBLIC | ACC_SUPER | ACC_FINAL;
/// Java 11.
const COMPANION_MAJOR_VERSION: u16 = 55;

const ALOAD_0: u8 = 0x2a;
const INVOKESPECIAL: u8 = 0xb7;
const RETURN: u8 = 0xb1;

#[derive(Debug, Error)]
pub enum CompanionError {
    #[error(transparent)]
    Class(#[from] jarsmith_classfile::Error),
    #[error("lambda altMetafactory is not supported in {class}")]
    AltMetafactory { class: String },
    #[error(
        "lambda metafactory in {class} takes {arguments} bootstrap arguments; \
         expected 3 with a method handle implementation"
    )]
    InvalidMetafactory { class: String, arguments: usize },
}

/// `pkg/Name` -> `pkg/DesugarName`.
pub fn companion_name(class_name: &str) -> String {
    match class_name.rfind('/') {
        Some(slash) => format!(
            "{}{COMPANION_PREFIX}{}",
            &class_name[..=slash],
            &class_name[slash + 1..]
        ),
        None => format!("{COMPANION_PREFIX}{class_name}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemberKey {
    owner: String,
    name: String,
    descriptor: String,
}

impl MemberKey {
    fn of(owner: &str, member: &Member, cp: &ConstantPool) -> jarsmith_classfile::Result<Self> {
        Ok(Self {
            owner: owner.to_string(),
            name: member.name(cp)?.to_string(),
            descriptor: member.descriptor(cp)?.to_string(),
        })
    }

    /// The member's key in the companion class.
    fn replacement(&self, access_flags: u16, is_method: bool) -> Self {
        let descriptor = if is_method && access_flags & ACC_STATIC == 0 {
            static_descriptor(&self.owner, &self.descriptor)
        } else {
            self.descriptor.clone()
        };
        Self {
            owner: companion_name(&self.owner),
            name: self.name.clone(),
            descriptor,
        }
    }
}

/// `(args)ret` of an instance method of `owner` -> `(Lowner;args)ret`.
fn static_descriptor(owner: &str, descriptor: &str) -> String {
    let parameters = descriptor.strip_prefix('(').unwrap_or(descriptor);
    format!("(L{owner};{parameters}")
}

/// Annotated members of every scanned class, keyed by their original
/// location.
#[derive(Debug, Clone, Default)]
pub struct CompanionIndex {
    fields: HashMap<MemberKey, MemberKey>,
    methods: HashMap<MemberKey, MemberKey>,
    /// Base class entry name -> companion class entry name.
    companions: HashMap<String, String>,
}

impl CompanionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the annotated members of `class`. Structural-only decoding is
    /// enough.
    pub fn scan(&mut self, class: &ClassFile) -> jarsmith_classfile::Result<()> {
        let owner = class.name()?;
        let cp = &class.constant_pool;
        let mut marked = false;
        for (members, table, is_method) in [
            (&class.fields, &mut self.fields, false),
            (&class.methods, &mut self.methods, true),
        ] {
            for member in members {
                if !is_marked(member, cp)? {
                    continue;
                }
                let key = MemberKey::of(owner, member, cp)?;
                let replacement = key.replacement(member.access_flags, is_method);
                table.insert(key, replacement);
                marked = true;
            }
        }
        if marked {
            self.companions.insert(
                class_entry_name(owner),
                class_entry_name(&companion_name(owner)),
            );
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.companions.is_empty()
    }

    /// Companion entry name for a base class entry, if it has one.
    pub fn companion_entry(&self, base_entry: &str) -> Option<&str> {
        self.companions.get(base_entry).map(String::as_str)
    }

    /// Every companion entry name, ascending.
    pub fn companion_entries(&self) -> BTreeSet<&str> {
        self.companions.values().map(String::as_str).collect()
    }

    /// Builds the companion of `base`, or `None` when no member of `base`
    /// was indexed.
    pub fn generate(&self, base: &ClassFile) -> Result<Option<ClassFile>, CompanionError> {
        let base_name = base.name()?;
        let cp = &base.constant_pool;

        let mut fields = Vec::new();
        for field in &base.fields {
            let key = MemberKey::of(base_name, field, cp)?;
            if let Some(replacement) = self.fields.get(&key) {
                fields.push((field, replacement));
            }
        }
        let mut methods = Vec::new();
        for method in &base.methods {
            let key = MemberKey::of(base_name, method, cp)?;
            if let Some(replacement) = self.methods.get(&key) {
                methods.push((method, replacement));
            }
        }
        if fields.is_empty() && methods.is_empty() {
            return Ok(None);
        }

        // The companion shares the base pool; new constants are appended.
        let mut companion = base.clone();
        let name = companion_name(base_name);
        let pool = &mut companion.constant_pool;
        companion.minor_version = 0;
        companion.major_version = COMPANION_MAJOR_VERSION;
        companion.access_flags = COMPANION_ACCESS;
        companion.this_class = push_class(pool, &name)?;
        companion.super_class = push_class(pool, OBJECT)?;
        companion.interfaces.clear();

        companion.fields = Vec::with_capacity(fields.len());
        for (field, replacement) in fields {
            let attributes = retain_named(&field.attributes, cp, &["Signature", "ConstantValue"])?;
            companion.fields.push(Member {
                access_flags: field.access_flags,
                name_index: pool.intern_utf8(&replacement.name)?,
                descriptor_index: pool.intern_utf8(&replacement.descriptor)?,
                attributes,
            });
        }

        companion.methods = Vec::with_capacity(methods.len() + 1);
        companion.methods.push(private_constructor(pool)?);
        for (method, replacement) in methods {
            if method.access_flags & ACC_STATIC != 0 {
                companion.methods.push(method.clone());
                continue;
            }
            let attributes = method
                .attributes
                .iter()
                .filter_map(|attribute| match attribute.name(cp) {
                    Ok("Signature" | "MethodParameters") => None,
                    Ok(_) => Some(Ok(attribute.clone())),
                    Err(err) => Some(Err(err)),
                })
                .collect::<jarsmith_classfile::Result<Vec<_>>>()?;
            companion.methods.push(Member {
                access_flags: method.access_flags | ACC_STATIC,
                name_index: method.name_index,
                descriptor_index: pool.intern_utf8(&replacement.descriptor)?,
                attributes,
            });
        }

        companion.attributes = retain_named(&base.attributes, cp, &["BootstrapMethods"])?;
        retarget_lambdas(&mut companion, base_name)?;

        tracing::debug!(
            target: "jarsmith.select",
            base = base_name,
            companion = %name,
            fields = companion.fields.len(),
            methods = companion.methods.len() - 1,
            "generated companion class"
        );
        Ok(Some(companion))
    }
}

fn is_marked(member: &Member, cp: &ConstantPool) -> jarsmith_classfile::Result<bool> {
    for attribute in &member.attributes {
        if attribute.name(cp)? != "RuntimeVisibleAnnotations" {
            continue;
        }
        let types = annotation_types(&attribute.info, cp)?;
        if types.iter().any(|ty| API_ANNOTATIONS.contains(ty)) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn retain_named(
    attributes: &[Attribute],
    cp: &ConstantPool,
    names: &[&str],
) -> jarsmith_classfile::Result<Vec<Attribute>> {
    let mut kept = Vec::new();
    for attribute in attributes {
        if names.contains(&attribute.name(cp)?) {
            kept.push(attribute.clone());
        }
    }
    Ok(kept)
}

fn push_class(pool: &mut ConstantPool, name: &str) -> jarsmith_classfile::Result<u16> {
    let name_index = pool.intern_utf8(name)?;
    pool.push(Constant::Class { name_index })
}

/// `private <init>()V` calling `Object.<init>`.
fn private_constructor(pool: &mut ConstantPool) -> jarsmith_classfile::Result<Member> {
    let name_index = pool.intern_utf8("<init>")?;
    let descriptor_index = pool.intern_utf8("()V")?;
    let class_index = push_class(pool, OBJECT)?;
    let name_and_type_index = pool.push(Constant::NameAndType {
        name_index,
        descriptor_index,
    })?;
    let super_init = pool.push(Constant::Methodref {
        class_index,
        name_and_type_index,
    })?;
    let [hi, lo] = super_init.to_be_bytes();
    let code = CodeAttribute {
        max_stack: 1,
        max_locals: 1,
        code: vec![ALOAD_0, INVOKESPECIAL, hi, lo, RETURN],
        exception_table: Vec::new(),
        attributes: Vec::new(),
    };
    Ok(Member {
        access_flags: ACC_PRIVATE,
        name_index,
        descriptor_index,
        attributes: vec![Attribute {
            name_index: pool.intern_utf8("Code")?,
            info: code.to_bytes()?,
        }],
    })
}

/// Points `LambdaMetafactory.metafactory` implementation handles that target
/// `base_name` at the companion instead, for every bootstrap method the
/// companion's code invokes.
fn retarget_lambdas(companion: &mut ClassFile, base_name: &str) -> Result<(), CompanionError> {
    let used = invoked_bootstrap_methods(companion)?;
    if used.is_empty() {
        return Ok(());
    }
    let cp = &companion.constant_pool;
    let Some(position) = companion
        .attributes
        .iter()
        .position(|attribute| matches!(attribute.name(cp), Ok("BootstrapMethods")))
    else {
        return Err(jarsmith_classfile::Error::MalformedAttribute("BootstrapMethods").into());
    };
    let mut rows = BootstrapMethod::parse_table(&companion.attributes[position].info)?;

    let pool = &mut companion.constant_pool;
    let mut changed = false;
    for (index, row) in rows.iter_mut().enumerate() {
        if !used.contains(&index) {
            continue;
        }
        let bootstrap = handle_reference(pool, row.method_handle_index)?;
        let (owner, name, _) = pool.get_member_ref(bootstrap)?;
        if owner != LAMBDA_METAFACTORY {
            continue;
        }
        match name {
            "metafactory" => {}
            "altMetafactory" => {
                return Err(CompanionError::AltMetafactory {
                    class: base_name.to_string(),
                })
            }
            _ => continue,
        }
        let invalid = || CompanionError::InvalidMetafactory {
            class: base_name.to_string(),
            arguments: row.arguments.len(),
        };
        if row.arguments.len() != 3 {
            return Err(invalid());
        }
        let Constant::MethodHandle {
            reference_kind,
            reference_index,
        } = *pool.get(row.arguments[1])?
        else {
            return Err(invalid());
        };
        if pool.get_member_ref(reference_index)?.0 != base_name {
            continue;
        }
        let class_index = companion.this_class;
        let retargeted = match *pool.get(reference_index)? {
            Constant::Methodref {
                name_and_type_index,
                ..
            } => Constant::Methodref {
                class_index,
                name_and_type_index,
            },
            Constant::InterfaceMethodref {
                name_and_type_index,
                ..
            } => Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            },
            Constant::Fieldref {
                name_and_type_index,
                ..
            } => Constant::Fieldref {
                class_index,
                name_and_type_index,
            },
            _ => continue,
        };
        let reference_index = pool.push(retargeted)?;
        row.arguments[1] = pool.push(Constant::MethodHandle {
            reference_kind,
            reference_index,
        })?;
        changed = true;
    }
    if changed {
        companion.attributes[position].info = BootstrapMethod::write_table(&rows)?;
    }
    Ok(())
}

/// Bootstrap method indices referenced by `invokedynamic` in any method.
fn invoked_bootstrap_methods(class: &ClassFile) -> jarsmith_classfile::Result<HashSet<usize>> {
    let cp = &class.constant_pool;
    let mut used = HashSet::new();
    for method in &class.methods {
        for attribute in &method.attributes {
            if attribute.name(cp)? != "Code" {
                continue;
            }
            let code = CodeAttribute::parse(&attribute.info)?;
            let mut call_sites = Vec::new();
            walk_instructions(&code.code, |insn| {
                if insn.opcode == INVOKEDYNAMIC {
                    call_sites.extend(insn.constant);
                }
            })?;
            for call_site in call_sites {
                if let Constant::InvokeDynamic {
                    bootstrap_method_attr_index,
                    ..
                } = cp.get(call_site)?
                {
                    used.insert(*bootstrap_method_attr_index as usize);
                }
            }
        }
    }
    Ok(used)
}

fn handle_reference(pool: &ConstantPool, handle: u16) -> jarsmith_classfile::Result<u16> {
    match pool.get(handle)? {
        Constant::MethodHandle {
            reference_index, ..
        } => Ok(*reference_index),
        _ => Err(jarsmith_classfile::Error::MalformedAttribute("BootstrapMethods")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarsmith_test_utils::{ClassBuilder, Target};
    use pretty_assertions::assert_eq;

    const METAFACTORY_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;\
        Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;\
        Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)\
        Ljava/lang/invoke/CallSite;";

    fn attribute_names(class: &ClassFile, member: &Member) -> Vec<String> {
        member
            .attributes
            .iter()
            .map(|a| a.name(&class.constant_pool).unwrap().to_string())
            .collect()
    }

    fn signatures(class: &ClassFile, members: &[Member]) -> Vec<(String, String, u16)> {
        let cp = &class.constant_pool;
        members
            .iter()
            .map(|m| {
                (
                    m.name(cp).unwrap().to_string(),
                    m.descriptor(cp).unwrap().to_string(),
                    m.access_flags,
                )
            })
            .collect()
    }

    fn companion_of(bytes: &[u8]) -> Result<Option<ClassFile>, CompanionError> {
        let base = ClassFile::parse(bytes).unwrap();
        let mut index = CompanionIndex::new();
        index.scan(&base).unwrap();
        index.generate(&base)
    }

    /// `run()` returns a lambda whose body is the annotated `lambda$run$0`.
    fn lambda_class(factory: &str) -> Vec<u8> {
        let mut builder = ClassBuilder::new("java/util/Stream");
        let factory = builder.method_ref(
            "java/lang/invoke/LambdaMetafactory",
            factory,
            METAFACTORY_DESCRIPTOR,
        );
        let bootstrap = builder.method_handle(6, factory);
        let erased = builder.method_type("()V");
        let body = builder.method_ref("java/util/Stream", "lambda$run$0", "()V");
        let body = builder.method_handle(6, body);
        let bootstrap = builder.bootstrap_method(bootstrap, &[erased, body, erased]);
        let call_site = builder.invoke_dynamic(bootstrap, "run", "()Ljava/lang/Runnable;");

        let run = builder.method(0x0009, "run", "()Ljava/lang/Runnable;");
        builder.annotations(Target::Method(run), true, &[API_ANNOTATIONS[0]]);
        let [hi, lo] = call_site.to_be_bytes();
        builder.code(run, 1, 0, &[0xba, hi, lo, 0, 0, 0xb0]);
        let lambda = builder.method(0x100a, "lambda$run$0", "()V");
        builder.annotations(Target::Method(lambda), true, &[API_ANNOTATIONS[1]]);
        builder.code(lambda, 0, 0, &[0xb1]);
        builder.build()
    }

    #[test]
    fn companion_names_prefix_the_simple_name() {
        assert_eq!(
            companion_name("java/util/Optional"),
            "java/util/DesugarOptional"
        );
        assert_eq!(
            companion_name("java/util/Map$Entry"),
            "java/util/DesugarMap$Entry"
        );
        assert_eq!(companion_name("Top"), "DesugarTop");
    }

    #[test]
    fn annotated_members_move_to_a_static_companion() {
        let mut builder = ClassBuilder::new("java/lang/Long");
        builder.interface("java/lang/Comparable");
        builder.signature(Target::Class, "Ljava/lang/Object;Ljava/lang/Comparable<*>;");
        let eight = builder.integer(8);
        let field = builder.field(0x0019, "BYTES", "I");
        builder.annotations(Target::Field(field), true, &[API_ANNOTATIONS[0]]);
        let constant_value = eight.to_be_bytes().to_vec();
        builder.attribute(Target::Field(field), "ConstantValue", constant_value);
        builder.field(0x0012, "value", "J");

        builder.method(0x0001, "hashCode", "()I");
        let sum = builder.method(0x0009, "sum", "(JJ)J");
        builder.annotations(Target::Method(sum), true, &[API_ANNOTATIONS[0]]);
        builder.code(sum, 4, 4, &[0x1e, 0x20, 0x61, 0xad]);
        let compare = builder.method(0x0001, "compareTo", "(Ljava/lang/Long;)I");
        builder.annotations(Target::Method(compare), true, &[API_ANNOTATIONS[1]]);
        builder.signature(Target::Method(compare), "(Ljava/lang/Long;)I");
        let parameters = vec![1, 0, 0, 0, 0];
        builder.attribute(Target::Method(compare), "MethodParameters", parameters);
        builder.exceptions(compare, &["java/lang/IllegalStateException"]);
        builder.code(compare, 1, 2, &[0x03, 0xac]);
        let hidden = builder.method(0x0009, "hidden", "()V");
        builder.annotations(Target::Method(hidden), false, &[API_ANNOTATIONS[0]]);
        let base = ClassFile::parse(&builder.build()).unwrap();

        let mut index = CompanionIndex::new();
        index.scan(&base).unwrap();
        assert_eq!(
            index.companion_entry("java/lang/Long.class"),
            Some("java/lang/DesugarLong.class")
        );
        let companion = index.generate(&base).unwrap().unwrap();
        let companion = ClassFile::parse(&companion.to_bytes().unwrap()).unwrap();
        let cp = &companion.constant_pool;

        assert_eq!(companion.name().unwrap(), "java/lang/DesugarLong");
        assert_eq!(companion.super_name().unwrap(), Some("java/lang/Object"));
        assert_eq!(companion.access_flags, 0x1031);
        assert_eq!(companion.major_version, 55);
        assert!(companion.interfaces.is_empty());
        assert!(companion.attributes.is_empty());

        assert_eq!(
            signatures(&companion, &companion.fields),
            vec![("BYTES".to_string(), "I".to_string(), 0x0019)]
        );
        assert_eq!(
            attribute_names(&companion, &companion.fields[0]),
            vec!["ConstantValue"]
        );

        assert_eq!(
            signatures(&companion, &companion.methods),
            vec![
                ("<init>".to_string(), "()V".to_string(), 0x0002),
                ("sum".to_string(), "(JJ)J".to_string(), 0x0009),
                (
                    "compareTo".to_string(),
                    "(Ljava/lang/Long;Ljava/lang/Long;)I".to_string(),
                    0x0009
                ),
            ]
        );
        assert_eq!(companion.methods[1], base.methods[1]);
        assert_eq!(
            attribute_names(&companion, &companion.methods[2]),
            vec!["RuntimeVisibleAnnotations", "Exceptions", "Code"]
        );

        let init = CodeAttribute::parse(&companion.methods[0].attributes[0].info).unwrap();
        assert_eq!((init.max_stack, init.max_locals), (1, 1));
        assert_eq!(init.code[..2], [ALOAD_0, INVOKESPECIAL]);
        assert_eq!(init.code[4], RETURN);
        let super_init = u16::from_be_bytes([init.code[2], init.code[3]]);
        assert_eq!(
            cp.get_member_ref(super_init).unwrap(),
            ("java/lang/Object", "<init>", "()V")
        );
    }

    #[test]
    fn classes_without_marked_members_have_no_companion() {
        let mut builder = ClassBuilder::new("a/Plain");
        let method = builder.method(0x0009, "m", "()V");
        builder.annotations(Target::Method(method), true, &["Ljava/lang/Deprecated;"]);
        assert!(companion_of(&builder.build()).unwrap().is_none());

        let base = ClassFile::parse(&builder.build()).unwrap();
        let mut index = CompanionIndex::new();
        index.scan(&base).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.companion_entry("a/Plain.class"), None);
    }

    #[test]
    fn lambda_bodies_are_looked_up_on_the_companion() {
        let bytes = lambda_class("metafactory");
        let companion = companion_of(&bytes).unwrap().unwrap();
        let companion = ClassFile::parse(&companion.to_bytes().unwrap()).unwrap();
        let cp = &companion.constant_pool;

        let table = companion.find_attribute("BootstrapMethods").unwrap();
        let rows = BootstrapMethod::parse_table(&table.info).unwrap();
        assert_eq!(rows.len(), 1);
        let Constant::MethodHandle {
            reference_kind,
            reference_index,
        } = *cp.get(rows[0].arguments[1]).unwrap()
        else {
            panic!("implementation is not a method handle");
        };
        assert_eq!(reference_kind, 6);
        assert_eq!(
            cp.get_member_ref(reference_index).unwrap(),
            ("java/util/DesugarStream", "lambda$run$0", "()V")
        );
        assert_eq!(rows[0].arguments[0], rows[0].arguments[2]);

        let base = ClassFile::parse(&bytes).unwrap();
        let base_rows =
            BootstrapMethod::parse_table(&base.find_attribute("BootstrapMethods").unwrap().info)
                .unwrap();
        assert_eq!(rows[0].arguments[0], base_rows[0].arguments[0]);
        assert_ne!(rows[0].arguments[1], base_rows[0].arguments[1]);
    }

    #[test]
    fn alt_metafactory_lambdas_are_rejected() {
        let err = companion_of(&lambda_class("altMetafactory")).unwrap_err();
        assert!(
            matches!(
                err,
                CompanionError::AltMetafactory { ref class } if class == "java/util/Stream"
            ),
            "{err}"
        );
    }
}
