use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_SUPER: u16 = 0x0020;

/// Where an attribute is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Class,
    Field(usize),
    Method(usize),
}

struct MemberDef {
    access: u16,
    name: u16,
    descriptor: u16,
    attributes: Vec<(u16, Vec<u8>)>,
}

/// Assembles a class file. Pool helpers deduplicate identical entries and
/// return their index, so tests can embed the indices in bytecode or
/// attribute payloads they write by hand.
///
/// Text is encoded as plain UTF-8, which equals modified UTF-8 for the
/// NUL-free BMP strings fixtures use.
pub struct ClassBuilder {
    pool: Vec<u8>,
    pool_count: u16,
    interned: HashMap<(u8, Vec<u8>), u16>,
    version: (u16, u16),
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<MemberDef>,
    methods: Vec<MemberDef>,
    attributes: Vec<(u16, Vec<u8>)>,
    inner_classes: Vec<[u16; 4]>,
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
}

impl ClassBuilder {
    /// A public class extending `java/lang/Object`, version 55 (Java 11).
    pub fn new(name: &str) -> Self {
        let mut builder = ClassBuilder {
            pool: Vec::new(),
            pool_count: 1,
            interned: HashMap::new(),
            version: (0, 55),
            access: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            inner_classes: Vec::new(),
            bootstrap_methods: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    pub fn access(&mut self, access: u16) -> &mut Self {
        self.access = access;
        self
    }

    /// `None` for `java/lang/Object` itself.
    pub fn super_class(&mut self, name: Option<&str>) -> &mut Self {
        self.super_class = match name {
            Some(name) => self.class(name),
            None => 0,
        };
        self
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    /// Adds a field and returns its position for [`Target::Field`].
    pub fn field(&mut self, access: u16, name: &str, descriptor: &str) -> usize {
        let member = self.member(access, name, descriptor);
        self.fields.push(member);
        self.fields.len() - 1
    }

    /// Adds a method and returns its position for [`Target::Method`].
    pub fn method(&mut self, access: u16, name: &str, descriptor: &str) -> usize {
        let member = self.member(access, name, descriptor);
        self.methods.push(member);
        self.methods.len() - 1
    }

    pub fn attribute(&mut self, target: Target, name: &str, info: Vec<u8>) -> &mut Self {
        let name = self.utf8(name);
        match target {
            Target::Class => self.attributes.push((name, info)),
            Target::Field(i) => self.fields[i].attributes.push((name, info)),
            Target::Method(i) => self.methods[i].attributes.push((name, info)),
        }
        self
    }

    /// Attaches a `Code` attribute with an empty exception table.
    pub fn code(
        &mut self,
        method: usize,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
    ) -> &mut Self {
        self.code_with(method, max_stack, max_locals, code, &[], Vec::new())
    }

    /// Attaches a `Code` attribute. Handlers are
    /// `(start_pc, end_pc, handler_pc, catch_type)`; nested attributes are
    /// `(name, payload)` pairs.
    pub fn code_with(
        &mut self,
        method: usize,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
        handlers: &[(u16, u16, u16, u16)],
        nested: Vec<(&str, Vec<u8>)>,
    ) -> &mut Self {
        let mut info = Vec::new();
        info.extend_from_slice(&max_stack.to_be_bytes());
        info.extend_from_slice(&max_locals.to_be_bytes());
        info.extend_from_slice(&(code.len() as u32).to_be_bytes());
        info.extend_from_slice(code);
        info.extend_from_slice(&(handlers.len() as u16).to_be_bytes());
        for (start, end, handler, catch_type) in handlers {
            for value in [start, end, handler, catch_type] {
                info.extend_from_slice(&value.to_be_bytes());
            }
        }
        info.extend_from_slice(&(nested.len() as u16).to_be_bytes());
        for (name, payload) in nested {
            let name = self.utf8(name);
            info.extend_from_slice(&name.to_be_bytes());
            info.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            info.extend_from_slice(&payload);
        }
        self.attribute(Target::Method(method), "Code", info)
    }

    pub fn exceptions(&mut self, method: usize, names: &[&str]) -> &mut Self {
        let mut info = (names.len() as u16).to_be_bytes().to_vec();
        for name in names {
            info.extend_from_slice(&self.class(name).to_be_bytes());
        }
        self.attribute(Target::Method(method), "Exceptions", info)
    }

    pub fn signature(&mut self, target: Target, signature: &str) -> &mut Self {
        let index = self.utf8(signature);
        self.attribute(target, "Signature", index.to_be_bytes().to_vec())
    }

    /// Adds a `RuntimeVisibleAnnotations` (or invisible) attribute holding
    /// marker annotations of the given descriptors.
    pub fn annotations(
        &mut self,
        target: Target,
        visible: bool,
        descriptors: &[&str],
    ) -> &mut Self {
        let mut info = (descriptors.len() as u16).to_be_bytes().to_vec();
        for descriptor in descriptors {
            info.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
            info.extend_from_slice(&0u16.to_be_bytes());
        }
        let name = if visible {
            "RuntimeVisibleAnnotations"
        } else {
            "RuntimeInvisibleAnnotations"
        };
        self.attribute(target, name, info)
    }

    /// Adds an `InnerClasses` row; emitted as one attribute by [`build`](Self::build).
    pub fn inner_class(
        &mut self,
        inner: &str,
        outer: Option<&str>,
        simple_name: Option<&str>,
        access: u16,
    ) -> &mut Self {
        let inner = self.class(inner);
        let outer = outer.map(|name| self.class(name)).unwrap_or(0);
        let simple = simple_name.map(|name| self.utf8(name)).unwrap_or(0);
        self.inner_classes.push([inner, outer, simple, access]);
        self
    }

    /// Adds a `BootstrapMethods` row and returns its position.
    pub fn bootstrap_method(&mut self, method_handle: u16, arguments: &[u16]) -> u16 {
        self.bootstrap_methods.push((method_handle, arguments.to_vec()));
        (self.bootstrap_methods.len() - 1) as u16
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        let bytes = text.as_bytes().to_vec();
        let mut entry = vec![1];
        entry.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        entry.extend_from_slice(&bytes);
        self.intern(1, bytes, entry, 1)
    }

    /// A `CONSTANT_Utf8` holding `bytes` as given, for encodings [`utf8`](Self::utf8)
    /// cannot produce (unpaired surrogates, surrogate pairs).
    pub fn raw_utf8(&mut self, bytes: &[u8]) -> u16 {
        let mut entry = vec![1];
        entry.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        entry.extend_from_slice(bytes);
        self.intern(1, bytes.to_vec(), entry, 1)
    }

    pub fn raw_string(&mut self, bytes: &[u8]) -> u16 {
        let text = self.raw_utf8(bytes);
        self.ref_entry(8, &[text])
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.ref_entry(7, &[name])
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let text = self.utf8(text);
        self.ref_entry(8, &[text])
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let bytes = value.to_be_bytes().to_vec();
        let mut entry = vec![3];
        entry.extend_from_slice(&bytes);
        self.intern(3, bytes, entry, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let bytes = value.to_be_bytes().to_vec();
        let mut entry = vec![5];
        entry.extend_from_slice(&bytes);
        self.intern(5, bytes, entry, 2)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.ref_entry(12, &[name, descriptor])
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, owner, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(11, owner, name, descriptor)
    }

    /// `reference_kind` 6 is `REF_invokeStatic`.
    pub fn method_handle(&mut self, reference_kind: u8, reference: u16) -> u16 {
        let key = vec![reference_kind, (reference >> 8) as u8, reference as u8];
        let mut entry = vec![15];
        entry.extend_from_slice(&key);
        self.intern(15, key, entry, 1)
    }

    pub fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor = self.utf8(descriptor);
        self.ref_entry(16, &[descriptor])
    }

    pub fn invoke_dynamic(&mut self, bootstrap_method: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type = self.name_and_type(name, descriptor);
        self.ref_entry(18, &[bootstrap_method, name_and_type])
    }

    pub fn build(&mut self) -> Vec<u8> {
        if !self.inner_classes.is_empty() {
            let rows = std::mem::take(&mut self.inner_classes);
            let mut info = (rows.len() as u16).to_be_bytes().to_vec();
            for row in rows {
                for value in row {
                    info.extend_from_slice(&value.to_be_bytes());
                }
            }
            self.attribute(Target::Class, "InnerClasses", info);
        }
        if !self.bootstrap_methods.is_empty() {
            let rows = std::mem::take(&mut self.bootstrap_methods);
            let mut info = (rows.len() as u16).to_be_bytes().to_vec();
            for (handle, arguments) in rows {
                info.extend_from_slice(&handle.to_be_bytes());
                info.extend_from_slice(&(arguments.len() as u16).to_be_bytes());
                for argument in arguments {
                    info.extend_from_slice(&argument.to_be_bytes());
                }
            }
            self.attribute(Target::Class, "BootstrapMethods", info);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&self.version.0.to_be_bytes());
        out.extend_from_slice(&self.version.1.to_be_bytes());
        out.extend_from_slice(&self.pool_count.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        for members in [&self.fields, &self.methods] {
            out.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for member in members {
                out.extend_from_slice(&member.access.to_be_bytes());
                out.extend_from_slice(&member.name.to_be_bytes());
                out.extend_from_slice(&member.descriptor.to_be_bytes());
                write_attributes(&mut out, &member.attributes);
            }
        }
        write_attributes(&mut out, &self.attributes);
        out
    }

    fn member(&mut self, access: u16, name: &str, descriptor: &str) -> MemberDef {
        MemberDef {
            access,
            name: self.utf8(name),
            descriptor: self.utf8(descriptor),
            attributes: Vec::new(),
        }
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let owner = self.class(owner);
        let name_and_type = self.name_and_type(name, descriptor);
        self.ref_entry(tag, &[owner, name_and_type])
    }

    fn ref_entry(&mut self, tag: u8, indices: &[u16]) -> u16 {
        let key: Vec<u8> = indices.iter().flat_map(|i| i.to_be_bytes()).collect();
        let mut entry = vec![tag];
        entry.extend_from_slice(&key);
        self.intern(tag, key, entry, 1)
    }

    fn intern(&mut self, tag: u8, key: Vec<u8>, entry: Vec<u8>, slots: u16) -> u16 {
        if let Some(index) = self.interned.get(&(tag, key.clone())) {
            return *index;
        }
        let index = self.pool_count;
        self.pool.extend_from_slice(&entry);
        self.pool_count += slots;
        self.interned.insert((tag, key), index);
        index
    }
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[(u16, Vec<u8>)]) {
    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for (name, info) in attributes {
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&(info.len() as u32).to_be_bytes());
        out.extend_from_slice(info);
    }
}
