use crate::cfg::block::{BasicBlock, BlockId};
use crate::runtime::VmMethod;
use crate::trampoline::Trampoline;
use std::sync::Arc;

/// Per-method compilation workspace: every block built for this method, plus the
/// method metadata and trampoline the compiled result will be published through.
///
/// All IR nodes and blocks for one method are owned here and dropped together once
/// compilation completes — nothing outlives the method's finished code buffer.
#[derive(Debug)]
pub struct CompilationUnit {
    pub method: Arc<VmMethod>,
    pub entry_block: BlockId,
    pub exit_block: BlockId,
    pub blocks: Vec<BasicBlock>,
    pub trampoline: Arc<Trampoline>,
}

impl CompilationUnit {
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }
}
