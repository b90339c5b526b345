//! Class initialization (§4.8): a `<clinit>` that sets a static field, driven
//! through [`Compiler::ensure_initialized`], which compiles and invokes it lazily
//! and exactly once.

use embervm_jit::class_image::{
    ClassImage, ConstantPool, ConstantPoolEntry, FieldAccessFlags, FieldInfo, Instruction, Method,
    MethodAccessFlags,
};
use embervm_jit::{Compiler, CompilerConfig};
use std::sync::{Arc, Mutex};

fn counter_image() -> Arc<ClassImage> {
    let mut constant_pool = ConstantPool::new();
    let class_name = constant_pool.push(ConstantPoolEntry::Utf8("Registry".to_string()));
    let this_class = constant_pool.push(ConstantPoolEntry::Class { name_index: class_name });
    let field_name = constant_pool.push(ConstantPoolEntry::Utf8("count".to_string()));
    let field_descriptor = constant_pool.push(ConstantPoolEntry::Utf8("I".to_string()));
    let nat = constant_pool.push(ConstantPoolEntry::NameAndType {
        name_index: field_name,
        descriptor_index: field_descriptor,
    });
    let field_ref = constant_pool
        .push(ConstantPoolEntry::FieldRef { class_index: this_class, name_and_type_index: nat });

    Arc::new(ClassImage {
        this_class,
        super_class: None,
        constant_pool,
        fields: vec![FieldInfo {
            name: "count".to_string(),
            descriptor: "I".to_string(),
            access_flags: FieldAccessFlags::STATIC,
        }],
        methods: vec![
            Method {
                name: "<clinit>".to_string(),
                descriptor: "()V".to_string(),
                access_flags: MethodAccessFlags::STATIC,
                max_locals: 0,
                code: vec![
                    Instruction::IconstN(7),
                    Instruction::Putstatic { field_ref_index: field_ref },
                    Instruction::Return,
                ],
            },
            Method {
                name: "getCount".to_string(),
                descriptor: "()I".to_string(),
                access_flags: MethodAccessFlags::STATIC,
                max_locals: 0,
                code: vec![Instruction::Getstatic { field_ref_index: field_ref }, Instruction::Ireturn],
            },
        ],
    })
}

#[test]
fn test_clinit_is_compiled_and_invoked_exactly_once() {
    let compiler = Compiler::new(CompilerConfig::default());
    let class = compiler.link_class(counter_image()).expect("link");

    let invocations = Mutex::new(Vec::new());
    let mut invoke = |method: &Arc<embervm_jit::runtime::VmMethod>, entry: usize| {
        invocations.lock().expect("lock").push((method.name.clone(), entry));
        Ok(())
    };
    compiler.ensure_initialized(&class, &mut invoke).expect("init");
    compiler.ensure_initialized(&class, &mut invoke).expect("init again");

    let recorded = invocations.into_inner().expect("lock");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, "<clinit>");
    assert!(recorded[0].1 != 0);
}

#[test]
fn test_static_getter_compiles_independently_of_initialization() {
    let compiler = Compiler::new(CompilerConfig::default());
    let class = compiler.link_class(counter_image()).expect("link");
    let getter = Arc::clone(&class.methods[1]);
    let entry = compiler.compile_method("Registry", &getter).expect("compile getter");
    assert!(entry != 0);
}
