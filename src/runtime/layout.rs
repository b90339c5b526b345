//! Fixed offsets the selector's `invokevirtual` and field-access sequences are
//! encoded against (§6, §4.4 of the design document).
//!
//! These describe the ABI that *compiled code* targets — a 32-bit (IA-32) address
//! space, per this crate's Non-goals — which is deliberately a separate contract from
//! the host Rust struct layout `runtime::class`/`runtime::method`/`trampoline` happen
//! to use on the machine running the compiler. Keeping the two decoupled means the
//! selector's pattern table (§4.4) can hardcode these constants instead of reaching
//! for `std::mem::offset_of!` against a pointer width the target does not share.

/// Size, in bytes, of one machine word on the IA-32 target.
pub const WORD_SIZE: i32 = 4;

/// Size of the fixed object header every allocated object begins with (one word: a
/// pointer to the object's class).
pub const OBJECT_HEADER_SIZE: i32 = WORD_SIZE;

/// Offset, from the start of a class object, of the pointer to its method table.
pub const CLASS_METHOD_TABLE_OFFSET: i32 = 0;

/// Offset, from the start of a method record, of the pointer to that method's
/// trampoline record.
pub const METHOD_TRAMPOLINE_OFFSET: i32 = 0;

/// Offset, from the start of a trampoline record, of the word holding the current
/// entry address (the trampoline's own base while `NotCompiled`/`Compiling`, the
/// compiled method's entry once `Compiled`).
pub const TRAMPOLINE_BUFFER_BASE_OFFSET: i32 = 0;

/// Offset, from the start of a field record, of its static storage slot.
///
/// Used by `class_field` expressions: the selector loads the field record's address
/// as an immediate, then reads this fixed offset from it.
pub const FIELD_STATIC_VALUE_OFFSET: i32 = 0;

/// The SIB scale factor (`log2(WORD_SIZE)`) used for all memindex addressing —
/// instance-field access and vtable-slot indexing both multiply a word-sized index
/// by this shift.
pub const WORD_SHIFT: u8 = 2;
