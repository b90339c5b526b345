//! Compiler driver (component K): links class images, lazily compiles methods on
//! demand through their trampoline, and keeps every finalized code region alive for
//! as long as this `Compiler` lives.
//!
//! This ties together every other component in pipeline order: [`crate::ir::build`]
//! (D) → [`crate::codegen::select_block`] (F) → [`crate::codegen::emit_unit`] (G) →
//! [`crate::buffer::CodeBuffer::finalize`] (A) → [`crate::trampoline::Trampoline`]
//! publication (H).

use crate::buffer::{CodeBuffer, CodeRegion};
use crate::cfg::CompilationUnit;
use crate::class_image::ClassImage;
use crate::codegen::{select_block, AluOp, Operand, PseudoInstruction, PseudoOp, Register, SelectionContext};
use crate::config::CompilerConfig;
use crate::ir;
use crate::runtime::layout;
use crate::runtime::linker::{self, ClassRegistry};
use crate::runtime::{VmClass, VmMethod};
use crate::trampoline::Trampoline;
use crate::{Error, Result};
use ahash::AHashMap;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, instrument};

/// The address pushed onto the stack by every lazy-compilation stub, and the target
/// `call` reaches into.
///
/// Real embeddings would resolve the pushed context pointer back to a compilation
/// request and invoke [`Compiler::compile_method`]; this crate never executes
/// generated code (including stub code) in its own test suite, so the body only
/// documents the contract rather than wiring a working callback through a process
/// global.
extern "C" fn compile_entry_trampoline(_context: usize) -> usize {
    unimplemented!("invoked only from generated machine code, which this crate never executes")
}

/// Links class images, owns the linked class and method tables, and compiles methods
/// on demand.
pub struct Compiler {
    registry: ClassRegistry,
    config: CompilerConfig,
    class_images: DashMap<String, Arc<ClassImage>>,
    /// Every finalized code region this compiler has produced — trampoline stubs and
    /// compiled method bodies alike. A [`CodeRegion`] unmaps its pages on drop, so
    /// this list must outlive every trampoline and return address pointing into it.
    regions: Mutex<Vec<CodeRegion>>,
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("linked_classes", &self.class_images.len())
            .field("regions", &self.regions.lock().len())
            .finish()
    }
}

impl Compiler {
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Compiler {
            registry: ClassRegistry::new(),
            config,
            class_images: DashMap::new(),
            regions: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Links `image` against its already-linked superclass (looked up by name in this
    /// compiler's own registry) and registers the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if the superclass has not been linked yet, or
    /// whatever [`linker::link_class`] returns for a malformed image.
    #[instrument(skip_all, fields(class = image.class_name().unwrap_or("<unknown>")))]
    pub fn link_class(&self, image: Arc<ClassImage>) -> Result<Arc<VmClass>> {
        let class_name = image.class_name()?.to_string();
        let super_class = match image.super_class_name()? {
            Some(name) => Some(self.registry.resolve(name)?),
            None => None,
        };
        let class = linker::link_class(&image, super_class, || self.make_trampoline())?;
        let class = Arc::new(class);
        self.registry.register(Arc::clone(&class));
        self.class_images.insert(class_name, image);
        Ok(class)
    }

    /// Ensures `class`'s `<clinit>` (and its ancestors') has run, compiling and
    /// invoking each as needed.
    ///
    /// # Errors
    ///
    /// Returns whatever a static initializer's compilation or `invoke` callback
    /// returns; see [`linker::ensure_initialized`].
    pub fn ensure_initialized(
        &self,
        class: &Arc<VmClass>,
        invoke: &mut impl FnMut(&Arc<VmMethod>, usize) -> Result<()>,
    ) -> Result<()> {
        linker::ensure_initialized(class, &mut |method| {
            let entry = self.compile_method(&method.declaring_class, method)?;
            invoke(method, entry)
        })
    }

    /// Compiles `method` if it has not been compiled yet, returning its current
    /// callable entry address either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if `declaring_class` was never linked,
    /// [`Error::UnsupportedInstruction`]/[`Error::UnsupportedType`] if the method's
    /// bytecode uses a construct this compiler does not lower, or any error the
    /// selector or emitter surfaces.
    #[instrument(skip(self, method), fields(method = %format!("{}.{}{}", method.declaring_class, method.name, method.descriptor)))]
    pub fn compile_method(&self, declaring_class: &str, method: &Arc<VmMethod>) -> Result<usize> {
        let trampoline = Arc::clone(&method.trampoline);
        trampoline.ensure_compiled(|| self.compile_uncached(declaring_class, method))
    }

    fn compile_uncached(&self, declaring_class: &str, method: &Arc<VmMethod>) -> Result<usize> {
        let image = self
            .class_images
            .get(declaring_class)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::ClassNotFound(declaring_class.to_string()))?;
        let source_method = image
            .find_method(&method.name, &method.descriptor)
            .ok_or_else(|| {
                Error::ClassLinkError(format!(
                    "{declaring_class}.{}{} missing from its own class image",
                    method.name, method.descriptor
                ))
            })?;

        let (blocks, entry_block, exit_block) = ir::build(&image, source_method, declaring_class, &self.registry)?;
        let args = args_slot_count(method);
        let mut unit = CompilationUnit {
            method: Arc::clone(method),
            entry_block,
            exit_block,
            blocks,
            trampoline: Arc::clone(&method.trampoline),
        };

        let ctx = SelectionContext {
            args_slot_count: args,
            exit_block,
            allocate_object_addr: self.config.allocate_object_addr,
            instruction_capacity_hint: self.config.instruction_capacity_hint,
        };
        for block in &mut unit.blocks {
            select_block(block, &ctx)?;
        }
        insert_prologue_epilogue(&mut unit, args, entry_block, exit_block);

        if self.config.trace_selection {
            debug!(blocks = unit.blocks.len(), "selected pseudo-instructions for method");
        }

        let buffer = crate::codegen::emit_unit(&mut unit)?;
        let region = buffer.finalize()?;
        let entry = region.base();
        self.regions.lock().push(region);
        debug!(entry, "compiled and published method");
        Ok(entry)
    }

    /// Builds a fresh lazy-compilation stub (`push cu_ptr; call compile_entry;
    /// add esp,4; jmp eax`) and wraps it in a [`Trampoline`] pointing at it.
    fn make_trampoline(&self) -> Arc<Trampoline> {
        let region = build_stub().expect("the fixed-size stub sequence always encodes");
        let stub_entry = region.base();
        self.regions.lock().push(region);
        Arc::new(Trampoline::new(stub_entry))
    }
}

/// Number of local-variable slots this method's incoming arguments occupy: an
/// implicit `this` for instance methods, plus each parameter's
/// [`crate::value::VmType::slot_width`].
#[must_use]
pub fn args_slot_count(method: &VmMethod) -> u16 {
    let implicit_this = u16::from(!method.is_static);
    implicit_this + method.parameter_types.iter().map(|vm_type| vm_type.slot_width()).sum::<u16>()
}

/// Prepends the function prologue to the entry block and appends the epilogue to the
/// exit block (§4.5). The selector only ever processes a block's own `Statement`
/// list, and the exit block has none, so this step happens once per unit rather than
/// inside the selector itself.
fn insert_prologue_epilogue(
    unit: &mut CompilationUnit,
    args_slot_count: u16,
    entry_block: usize,
    exit_block: usize,
) {
    let spill_slots = unit.method.max_locals.saturating_sub(args_slot_count);
    let mut prologue = vec![
        PseudoInstruction::new(PseudoOp::Push { src: Operand::Register(Register::Fp) }),
        PseudoInstruction::new(PseudoOp::Mov {
            dst: Operand::Register(Register::Fp),
            src: Operand::Register(Register::Sp),
        }),
    ];
    if spill_slots > 0 {
        let bytes = i32::from(spill_slots) * layout::WORD_SIZE;
        prologue.push(PseudoInstruction::new(PseudoOp::Alu {
            op: AluOp::Sub,
            dst: Register::Sp,
            src: Operand::Immediate(bytes),
        }));
    }
    let entry = unit.block_mut(entry_block);
    prologue.append(&mut entry.instructions);
    entry.instructions = prologue;

    let exit = unit.block_mut(exit_block);
    if spill_slots > 0 {
        exit.instructions.push(PseudoInstruction::new(PseudoOp::Leave));
    } else {
        exit.instructions.push(PseudoInstruction::new(PseudoOp::Pop { dst: Register::Fp }));
    }
    exit.instructions.push(PseudoInstruction::new(PseudoOp::Ret));
}

/// Assembles one lazy-compilation stub. The context pointer every real embedding
/// would push ahead of `call compile_entry` is a placeholder here — see
/// [`compile_entry_trampoline`] — since this crate never executes generated stub
/// code.
fn build_stub() -> Result<CodeRegion> {
    let mut buffer = CodeBuffer::new();
    buffer.push_u8(0x68);
    buffer.push_i32_le(0);
    buffer.reserve_external_call(0xE8, compile_entry_trampoline as usize);
    // add esp, 4
    buffer.push_u8(0x83);
    buffer.push_u8(0xC4);
    buffer.push_u8(0x04);
    // jmp eax
    buffer.push_u8(0xFF);
    buffer.push_u8(0xE0);
    buffer.finalize()
}
