//! Growable machine-code buffer and the external-call relocation mechanism (§4.1,
//! component A).
//!
//! Two kinds of forward reference get resolved very differently. A branch to another
//! block *within the same compilation unit* is base-independent: once both the branch
//! site and its target have offsets inside this buffer, `rel32 = target - (site + 4)`
//! is correct regardless of where the buffer eventually ends up in memory, so the
//! emitter patches those directly with [`CodeBuffer::patch_i32_le`] before this buffer
//! is ever mapped. A call to a *fixed absolute address* — another method's trampoline,
//! an allocation routine — cannot be resolved that way: the target is already known,
//! but the call site's own final address is not, until this buffer is mapped and its
//! base address is assigned. [`CodeBuffer::reserve_external_call`] records those sites
//! and [`CodeBuffer::finalize`] patches them once the base is known.

use crate::{Error, Result};
use memmap2::{Mmap, MmapMut};

#[derive(Debug, Clone, Copy)]
struct ExternalCallRelocation {
    site_offset: usize,
    target: usize,
}

/// A growable buffer of machine code bytes being assembled for one compilation unit
/// (or, for trampoline stubs, one tiny fixed sequence).
#[derive(Debug, Default)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
    relocations: Vec<ExternalCallRelocation>,
}

impl CodeBuffer {
    #[must_use]
    pub fn new() -> Self {
        CodeBuffer::default()
    }

    /// The offset the next appended byte will land at.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn push_u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn push_i32_le(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Overwrites the 4 bytes at `offset` with `value`, used to backpatch an
    /// already-emitted branch once its target block's offset is known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalError`] if `offset..offset + 4` is out of range —
    /// a selector or emitter bug, since every patch site is reserved by this buffer
    /// itself.
    pub fn patch_i32_le(&mut self, offset: usize, value: i32) -> Result<()> {
        let slice = self
            .bytes
            .get_mut(offset..offset + 4)
            .ok_or_else(|| Error::InternalError(format!("patch offset {offset} out of range")))?;
        slice.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Appends a one-byte call/jmp opcode followed by a placeholder `rel32`, and
    /// records the site for patching against `target` (an address fixed independent
    /// of this buffer's own eventual base) once [`Self::finalize`] knows that base.
    ///
    /// Returns the offset of the opcode byte.
    pub fn reserve_external_call(&mut self, opcode: u8, target: usize) -> usize {
        let insn_offset = self.offset();
        self.push_u8(opcode);
        let site_offset = self.offset();
        self.push_i32_le(0);
        self.relocations.push(ExternalCallRelocation { site_offset, target });
        insn_offset
    }

    /// Reads back the 4 little-endian bytes at `offset`, for tests that need to
    /// verify an emitted or patched displacement rather than just that patching
    /// succeeded.
    #[cfg(test)]
    pub(crate) fn read_i32_le(&self, offset: usize) -> i32 {
        let bytes: [u8; 4] = self.bytes[offset..offset + 4].try_into().expect("4-byte slice");
        i32::from_le_bytes(bytes)
    }

    /// Maps this buffer's bytes into an anonymous executable region, patches every
    /// external-call relocation against the region's now-known base address, and
    /// returns the finished region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the mapping cannot be created, or
    /// [`Error::InternalError`] if a relocation's displacement does not fit a 32-bit
    /// signed integer.
    pub fn finalize(self) -> Result<CodeRegion> {
        let mut mmap = MmapMut::map_anon(self.bytes.len().max(1))
            .map_err(|error| Error::OutOfMemory(error.to_string()))?;
        mmap[..self.bytes.len()].copy_from_slice(&self.bytes);
        let base = mmap.as_ptr() as usize;
        for relocation in &self.relocations {
            let site_address = base as i64 + relocation.site_offset as i64 + 4;
            let displacement = relocation.target as i64 - site_address;
            let rel32 = i32::try_from(displacement)
                .map_err(|_| Error::InternalError("external call displacement overflow".to_string()))?;
            mmap[relocation.site_offset..relocation.site_offset + 4]
                .copy_from_slice(&rel32.to_le_bytes());
        }
        let executable = mmap.make_exec().map_err(|error| Error::OutOfMemory(error.to_string()))?;
        Ok(CodeRegion { mmap: executable, base })
    }
}

/// A finalized, executable code region. Dropping it unmaps the underlying pages, so
/// it must outlive every trampoline and compiled entry pointing into it.
pub struct CodeRegion {
    mmap: Mmap,
    base: usize,
}

impl CodeRegion {
    /// The address of the first byte of this region — the entry point, for a region
    /// holding a single compiled method or stub.
    #[must_use]
    pub fn base(&self) -> usize {
        self.base
    }
}
