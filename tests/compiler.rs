//! End-to-end: link a class image, compile its methods through the full
//! pipeline, and check the published entry addresses behave as the lazy-compile
//! protocol promises.

use embervm_jit::class_image::{ClassImage, ConstantPool, ConstantPoolEntry, Instruction, Method, MethodAccessFlags};
use embervm_jit::{Compiler, CompilerConfig};
use std::sync::Arc;

fn class_with_methods(class_name: &str, methods: Vec<Method>) -> Arc<ClassImage> {
    let mut constant_pool = ConstantPool::new();
    let name = constant_pool.push(ConstantPoolEntry::Utf8(class_name.to_string()));
    let this_class = constant_pool.push(ConstantPoolEntry::Class { name_index: name });
    Arc::new(ClassImage { this_class, super_class: None, constant_pool, fields: Vec::new(), methods })
}

fn static_method(name: &str, descriptor: &str, max_locals: u16, code: Vec<Instruction>) -> Method {
    Method { name: name.to_string(), descriptor: descriptor.to_string(), access_flags: MethodAccessFlags::STATIC, max_locals, code }
}

#[test]
fn test_compile_two_argument_add() {
    let compiler = Compiler::new(CompilerConfig::default());
    let image = class_with_methods(
        "com/example/Adder",
        vec![static_method(
            "add",
            "(II)I",
            2,
            vec![Instruction::Iload(0), Instruction::Iload(1), Instruction::Iadd, Instruction::Ireturn],
        )],
    );
    let class = compiler.link_class(image).expect("link");
    let method = Arc::clone(&class.methods[0]);
    let entry = compiler.compile_method("com/example/Adder", &method).expect("compile");
    assert!(entry != 0);
}

#[test]
fn test_recompiling_returns_the_same_published_entry() {
    let compiler = Compiler::new(CompilerConfig::default());
    let image = class_with_methods(
        "com/example/Doubler",
        vec![static_method(
            "twice",
            "(I)I",
            1,
            vec![Instruction::Iload(0), Instruction::IconstN(2), Instruction::Imul, Instruction::Ireturn],
        )],
    );
    let class = compiler.link_class(image).expect("link");
    let method = Arc::clone(&class.methods[0]);
    let first = compiler.compile_method("com/example/Doubler", &method).expect("compile");
    let second = compiler.compile_method("com/example/Doubler", &method).expect("recompile");
    assert_eq!(first, second);
}

#[test]
fn test_compile_division_emits_without_error() {
    let compiler = Compiler::new(CompilerConfig::default());
    let image = class_with_methods(
        "com/example/Divider",
        vec![static_method(
            "quotient",
            "(II)I",
            2,
            vec![Instruction::Iload(0), Instruction::Iload(1), Instruction::Idiv, Instruction::Ireturn],
        )],
    );
    let class = compiler.link_class(image).expect("link");
    let method = Arc::clone(&class.methods[0]);
    let entry = compiler.compile_method("com/example/Divider", &method).expect("compile");
    assert!(entry != 0);
}

#[test]
fn test_different_methods_get_different_entries() {
    let compiler = Compiler::new(CompilerConfig::default());
    let image = class_with_methods(
        "com/example/Arith",
        vec![
            static_method("add", "(II)I", 2, vec![
                Instruction::Iload(0),
                Instruction::Iload(1),
                Instruction::Iadd,
                Instruction::Ireturn,
            ]),
            static_method("sub", "(II)I", 2, vec![
                Instruction::Iload(0),
                Instruction::Iload(1),
                Instruction::Isub,
                Instruction::Ireturn,
            ]),
        ],
    );
    let class = compiler.link_class(image).expect("link");
    let add = Arc::clone(&class.methods[0]);
    let sub = Arc::clone(&class.methods[1]);
    let add_entry = compiler.compile_method("com/example/Arith", &add).expect("compile add");
    let sub_entry = compiler.compile_method("com/example/Arith", &sub).expect("compile sub");
    assert_ne!(add_entry, sub_entry);
}
