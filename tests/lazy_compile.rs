//! The trampoline state machine (§4.6), observed from outside the compiler: a
//! freshly linked method starts uncompiled and pointing at its stub, and exactly
//! one call to [`Compiler::compile_method`] publishes a distinct, stable entry.

use embervm_jit::class_image::{ClassImage, ConstantPool, ConstantPoolEntry, Instruction, Method, MethodAccessFlags};
use embervm_jit::trampoline::TrampolineState;
use embervm_jit::{Compiler, CompilerConfig};
use std::sync::Arc;
use std::thread;

fn image() -> Arc<ClassImage> {
    let mut constant_pool = ConstantPool::new();
    let name = constant_pool.push(ConstantPoolEntry::Utf8("com/example/Identity".to_string()));
    let this_class = constant_pool.push(ConstantPoolEntry::Class { name_index: name });
    Arc::new(ClassImage {
        this_class,
        super_class: None,
        constant_pool,
        fields: Vec::new(),
        methods: vec![Method {
            name: "identity".to_string(),
            descriptor: "(I)I".to_string(),
            access_flags: MethodAccessFlags::STATIC,
            max_locals: 1,
            code: vec![Instruction::Iload(0), Instruction::Ireturn],
        }],
    })
}

#[test]
fn test_trampoline_starts_at_its_stub_and_upgrades_once() {
    let compiler = Compiler::new(CompilerConfig::default());
    let class = compiler.link_class(image()).expect("link");
    let method = Arc::clone(&class.methods[0]);

    assert_eq!(method.trampoline.state(), TrampolineState::NotCompiled);
    let stub_entry = method.trampoline.stub_entry();
    assert_eq!(method.trampoline.current_entry(), stub_entry);

    let compiled_entry = compiler.compile_method("com/example/Identity", &method).expect("compile");
    assert_eq!(method.trampoline.state(), TrampolineState::Compiled);
    assert_eq!(method.trampoline.current_entry(), compiled_entry);
    assert_ne!(compiled_entry, stub_entry);

    // The stub address itself never changes once a method has a trampoline.
    assert_eq!(method.trampoline.stub_entry(), stub_entry);
}

#[test]
fn test_every_method_gets_its_own_stub() {
    let compiler = Compiler::new(CompilerConfig::default());
    let mut constant_pool = ConstantPool::new();
    let name = constant_pool.push(ConstantPoolEntry::Utf8("com/example/Pair".to_string()));
    let this_class = constant_pool.push(ConstantPoolEntry::Class { name_index: name });
    let image = Arc::new(ClassImage {
        this_class,
        super_class: None,
        constant_pool,
        fields: Vec::new(),
        methods: vec![
            Method {
                name: "first".to_string(),
                descriptor: "(I)I".to_string(),
                access_flags: MethodAccessFlags::STATIC,
                max_locals: 1,
                code: vec![Instruction::Iload(0), Instruction::Ireturn],
            },
            Method {
                name: "second".to_string(),
                descriptor: "(I)I".to_string(),
                access_flags: MethodAccessFlags::STATIC,
                max_locals: 1,
                code: vec![Instruction::Iload(0), Instruction::Ireturn],
            },
        ],
    });
    let class = compiler.link_class(image).expect("link");
    let stub_a = class.methods[0].trampoline.stub_entry();
    let stub_b = class.methods[1].trampoline.stub_entry();
    assert_ne!(stub_a, stub_b);
}

#[test]
fn test_compile_method_from_many_threads_compiles_once() {
    let compiler = Arc::new(Compiler::new(CompilerConfig::default()));
    let class = compiler.link_class(image()).expect("link");
    let method = Arc::clone(&class.methods[0]);
    const THREADS: usize = 8;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let compiler = Arc::clone(&compiler);
            let method = Arc::clone(&method);
            thread::spawn(move || compiler.compile_method("com/example/Identity", &method).expect("compile"))
        })
        .collect();

    let entries: Vec<usize> = handles.into_iter().map(|handle| handle.join().expect("joined")).collect();
    let first = entries[0];
    assert!(entries.iter().all(|&entry| entry == first));
    assert_eq!(method.trampoline.state(), TrampolineState::Compiled);
    assert_eq!(method.trampoline.current_entry(), first);
}
