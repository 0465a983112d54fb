use jarsmith_classfile::{
    attribute_refs, BootstrapMethod, ClassFile, CodeAttribute, ReadOptions, RefKind,
    ACC_PROTECTED, ACC_PUBLIC,
};
use jarsmith_test_utils::{ClassBuilder, Target};
use pretty_assertions::assert_eq;

const ACC_PRIVATE: u16 = 0x0002;

fn sample_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("com/example/Widget");
    builder
        .super_class(Some("com/example/Base"))
        .interface("java/lang/Runnable")
        .interface("java/io/Serializable");
    builder.field(ACC_PUBLIC, "size", "I");
    builder.field(ACC_PRIVATE, "cache", "Ljava/util/Map;");

    let run = builder.method(ACC_PUBLIC, "run", "()V");
    let print = builder.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let hello = builder.string("hello");
    let println = builder.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let mut lvt = Vec::new();
    lvt.extend_from_slice(&1u16.to_be_bytes());
    lvt.extend_from_slice(&[0, 0, 0, 9]);
    lvt.extend_from_slice(&builder.utf8("this").to_be_bytes());
    lvt.extend_from_slice(&builder.utf8("Lcom/example/Widget;").to_be_bytes());
    lvt.extend_from_slice(&0u16.to_be_bytes());
    let code = [
        0xb2,
        (print >> 8) as u8,
        print as u8,
        0x12,
        hello as u8,
        0xb6,
        (println >> 8) as u8,
        println as u8,
        0xb1,
    ];
    builder.code_with(run, 2, 1, &code, &[], vec![("LocalVariableTable", lvt)]);

    let open_desc = "(Ljava/lang/String;)Ljava/io/InputStream;";
    let open = builder.method(ACC_PROTECTED, "open", open_desc);
    builder.exceptions(open, &["java/io/IOException"]);
    builder.signature(
        Target::Class,
        "Lcom/example/Base<Ljava/lang/String;>;Ljava/lang/Runnable;Ljava/io/Serializable;",
    );
    builder.build()
}

#[test]
fn unmodified_class_round_trips_byte_for_byte() {
    let bytes = sample_class();
    let class = ClassFile::parse(&bytes).unwrap();
    assert_eq!(class.to_bytes().unwrap(), bytes);
}

#[test]
fn exposes_structural_names() {
    let class = ClassFile::parse(&sample_class()).unwrap();
    let cp = &class.constant_pool;

    assert_eq!(class.name().unwrap(), "com/example/Widget");
    assert_eq!(class.super_name().unwrap(), Some("com/example/Base"));
    assert_eq!(
        class.interface_names().unwrap(),
        vec!["java/lang/Runnable", "java/io/Serializable"]
    );

    let fields: Vec<_> = class
        .fields
        .iter()
        .map(|f| (f.name(cp).unwrap(), f.is_public_or_protected()))
        .collect();
    assert_eq!(fields, vec![("size", true), ("cache", false)]);

    let open = &class.methods[1];
    assert_eq!(
        open.descriptor(cp).unwrap(),
        "(Ljava/lang/String;)Ljava/io/InputStream;"
    );
    assert_eq!(open.exceptions(cp).unwrap(), vec!["java/io/IOException"]);
    assert!(class.methods[0].exceptions(cp).unwrap().is_empty());
}

#[test]
fn read_options_drop_code_and_debug_tables() {
    let bytes = sample_class();

    let structure = ClassFile::parse_with(&bytes, ReadOptions::STRUCTURE_ONLY).unwrap();
    assert!(structure.methods[0].attributes.is_empty());

    let options = ReadOptions {
        skip_debug: true,
        ..ReadOptions::default()
    };
    let stripped = ClassFile::parse_with(&bytes, options).unwrap();
    let code_attr = &stripped.methods[0].attributes[0];
    assert_eq!(code_attr.name(&stripped.constant_pool).unwrap(), "Code");
    let code = CodeAttribute::parse(&code_attr.info).unwrap();
    assert!(code.attributes.is_empty());
    assert_eq!(code.code.len(), 9);

    // The stripped model still serialises to a parseable class.
    let reparsed = ClassFile::parse(&stripped.to_bytes().unwrap()).unwrap();
    assert_eq!(reparsed.name().unwrap(), "com/example/Widget");
}

#[test]
fn code_references_resolve_against_the_pool() {
    let class = ClassFile::parse(&sample_class()).unwrap();
    let cp = &class.constant_pool;
    let refs = attribute_refs(&class.methods[0].attributes[0], cp).unwrap();

    let members: Vec<_> = refs
        .iter()
        .filter(|r| r.kind == RefKind::Constant)
        .filter_map(|r| cp.get_member_ref(r.index).ok())
        .map(|(owner, name, _)| format!("{owner}.{name}"))
        .collect();
    assert_eq!(
        members,
        vec!["java/lang/System.out", "java/io/PrintStream.println"]
    );

    let descriptors: Vec<_> = refs
        .iter()
        .filter(|r| r.kind == RefKind::Descriptor)
        .map(|r| cp.get_utf8(r.index).unwrap())
        .collect();
    assert_eq!(descriptors, vec!["Lcom/example/Widget;"]);
}

#[test]
fn malformed_input_is_rejected() {
    let bytes = sample_class();
    assert!(matches!(
        ClassFile::parse(&bytes[..bytes.len() - 3]),
        Err(jarsmith_classfile::Error::UnexpectedEof)
    ));
    let mut bad_magic = bytes.clone();
    bad_magic[0] = 0;
    assert!(matches!(
        ClassFile::parse(&bad_magic),
        Err(jarsmith_classfile::Error::InvalidMagic(_))
    ));
    let mut trailing = bytes;
    trailing.push(0);
    assert!(ClassFile::parse(&trailing).is_err());
}

#[test]
fn oversized_tables_fail_to_serialize() {
    let mut class = ClassFile::parse(&sample_class()).unwrap();
    let interface = class.super_class;
    class.interfaces = vec![interface; usize::from(u16::MAX) + 1];
    assert!(matches!(
        class.to_bytes(),
        Err(jarsmith_classfile::Error::TooLarge("interfaces"))
    ));

    let mut class = ClassFile::parse(&sample_class()).unwrap();
    let method = class.methods[0].clone();
    class.methods = vec![method; usize::from(u16::MAX) + 1];
    assert!(matches!(
        class.to_bytes(),
        Err(jarsmith_classfile::Error::TooLarge("methods"))
    ));
}

#[test]
fn unpaired_surrogate_strings_round_trip() {
    let mut builder = ClassBuilder::new("a/Surrogates");
    builder.raw_string(&[0xED, 0xA0, 0x80]);
    // U+1F600 as a surrogate pair.
    builder.raw_string(&[0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
    let bytes = builder.build();

    let class = ClassFile::parse(&bytes).unwrap();
    assert_eq!(class.to_bytes().unwrap(), bytes);
}

#[test]
fn bootstrap_method_table_decodes_and_re_encodes() {
    let mut builder = ClassBuilder::new("a/Lambdas");
    let factory = builder.method_ref("a/Factory", "make", "()Ljava/lang/Object;");
    let handle = builder.method_handle(6, factory);
    let one = builder.integer(1);
    let text = builder.string("x");
    builder.bootstrap_method(handle, &[]);
    builder.bootstrap_method(handle, &[one, text]);
    let class = ClassFile::parse(&builder.build()).unwrap();

    let info = &class.find_attribute("BootstrapMethods").unwrap().info;
    let rows = BootstrapMethod::parse_table(info).unwrap();
    assert_eq!(
        rows,
        vec![
            BootstrapMethod {
                method_handle_index: handle,
                arguments: vec![],
            },
            BootstrapMethod {
                method_handle_index: handle,
                arguments: vec![one, text],
            },
        ]
    );
    assert_eq!(&BootstrapMethod::write_table(&rows).unwrap(), info);

    let mut truncated = info.clone();
    truncated.pop();
    assert!(BootstrapMethod::parse_table(&truncated).is_err());
}
