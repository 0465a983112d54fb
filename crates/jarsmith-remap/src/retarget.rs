use jarsmith_classfile::{
    walk_instructions, ClassFile, ClassTransform, CodeAttribute, Constant, ConstantPool, Result,
};

/// An invocation instruction with its resolved call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub method: String,
    pub opcode: u8,
    /// `None` for `invokedynamic` call sites.
    pub owner: Option<String>,
    pub name: String,
    pub descriptor: String,
}

/// Visits every invocation in the class's method bodies.
///
/// No call is retargeted yet: the stage leaves the bytes untouched and only
/// reports how many call sites it saw.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationRetarget;

impl InvocationRetarget {
    pub fn invocations(class: &ClassFile) -> Result<Vec<Invocation>> {
        let cp = &class.constant_pool;
        let mut invocations = Vec::new();
        for method in &class.methods {
            let method_name = method.name(cp)?;
            for attribute in &method.attributes {
                if attribute.name(cp)? != "Code" {
                    continue;
                }
                let code = CodeAttribute::parse(&attribute.info)?;
                let mut targets = Vec::new();
                walk_instructions(&code.code, |insn| {
                    match insn.constant {
                        Some(index) if insn.is_invocation() => targets.push((insn.opcode, index)),
                        _ => {}
                    }
                })?;
                for (opcode, index) in targets {
                    let (owner, name, descriptor) = call_target(cp, index)?;
                    invocations.push(Invocation {
                        method: method_name.to_string(),
                        opcode,
                        owner: owner.map(str::to_string),
                        name: name.to_string(),
                        descriptor: descriptor.to_string(),
                    });
                }
            }
        }
        Ok(invocations)
    }
}

fn call_target(cp: &ConstantPool, index: u16) -> Result<(Option<&str>, &str, &str)> {
    match cp.get(index)? {
        Constant::InvokeDynamic {
            name_and_type_index,
            ..
        } => {
            let (name, descriptor) = cp.get_name_and_type(*name_and_type_index)?;
            Ok((None, name, descriptor))
        }
        _ => {
            let (owner, name, descriptor) = cp.get_member_ref(index)?;
            Ok((Some(owner), name, descriptor))
        }
    }
}

impl ClassTransform for InvocationRetarget {
    fn name(&self) -> &'static str {
        "invocation-retarget"
    }

    fn apply(&self, class: &mut ClassFile) -> Result<()> {
        let invocations = Self::invocations(class)?;
        tracing::trace!(
            target: "jarsmith.remap",
            class = class.name().unwrap_or_default(),
            invocations = invocations.len(),
            "invocations left in place"
        );
        Ok(())
    }
}
