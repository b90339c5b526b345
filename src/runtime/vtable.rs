//! Virtual method table construction (§4.7 / component I).
//!
//! A class's method table mirrors its superclass's table as an inherited prefix and
//! appends its own newly declared virtual methods after it; an override reuses its
//! superclass method's `virtual_index` rather than allocating a new slot. Grounded in
//! the same class-linking pass that assigns instance field layout (`runtime::class`).

use crate::runtime::method::VmMethod;
use std::sync::Arc;

/// Assigns a `virtual_index` to each of this class's own virtual method declarations,
/// given the superclass's table as a parallel `(name, descriptor)` key list.
///
/// An override — a declaration matching an inherited `(name, descriptor)` — keeps that
/// entry's index. Everything else is appended after the inherited prefix, in
/// declaration order.
#[must_use]
pub fn assign_virtual_indices(
    superclass_table: &[(String, String)],
    own_declarations: &[(String, String)],
) -> Vec<u32> {
    let mut next_index = u32::try_from(superclass_table.len()).unwrap_or(u32::MAX);
    own_declarations
        .iter()
        .map(|declaration| {
            if let Some(position) = superclass_table.iter().position(|entry| entry == declaration) {
                u32::try_from(position).unwrap_or(u32::MAX)
            } else {
                let index = next_index;
                next_index += 1;
                index
            }
        })
        .collect()
}

/// Builds this class's method table: the superclass's table, with each of this
/// class's own virtual methods placed at its assigned `virtual_index` (overriding
/// whatever was inherited there, or extending the table for a newly introduced slot).
///
/// # Panics
///
/// Panics if `own_virtual_methods` contains a method without a `virtual_index`, or if
/// the resulting table has an unfilled slot — both indicate a linker bug, not a
/// malformed program.
#[must_use]
pub fn build_method_table(
    superclass_table: &[Arc<VmMethod>],
    own_virtual_methods: &[Arc<VmMethod>],
) -> Vec<Arc<VmMethod>> {
    let mut table: Vec<Option<Arc<VmMethod>>> =
        superclass_table.iter().cloned().map(Some).collect();
    for method in own_virtual_methods {
        let index = method.virtual_index.expect("virtual method without virtual_index") as usize;
        if index >= table.len() {
            table.resize(index + 1, None);
        }
        table[index] = Some(Arc::clone(method));
    }
    table
        .into_iter()
        .map(|slot| slot.expect("vtable slot left unfilled"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trampoline::Trampoline;
    use crate::value::VmType;

    fn method(name: &str, virtual_index: Option<u32>) -> Arc<VmMethod> {
        Arc::new(VmMethod {
            declaring_class: "com/example/Shape".to_string(),
            name: name.to_string(),
            descriptor: "()I".to_string(),
            parameter_types: Vec::new(),
            return_type: VmType::Int,
            is_static: false,
            max_locals: 1,
            code: Vec::new(),
            virtual_index,
            trampoline: Arc::new(Trampoline::new(0x1000)),
        })
    }

    #[test]
    fn test_override_reuses_inherited_index() {
        let superclass_table = vec![("area".to_string(), "()I".to_string())];
        let own_declarations = vec![("area".to_string(), "()I".to_string())];
        let indices = assign_virtual_indices(&superclass_table, &own_declarations);
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn test_new_method_appends_after_inherited_prefix() {
        let superclass_table = vec![("area".to_string(), "()I".to_string())];
        let own_declarations = vec![("perimeter".to_string(), "()I".to_string())];
        let indices = assign_virtual_indices(&superclass_table, &own_declarations);
        assert_eq!(indices, vec![1]);
    }

    #[test]
    fn test_build_method_table_overrides_inherited_slot() {
        let superclass_table = vec![method("area", Some(0))];
        let own = vec![method("area", Some(0)), method("perimeter", Some(1))];
        let table = build_method_table(&superclass_table, &own);
        assert_eq!(table.len(), 2);
        assert!(Arc::ptr_eq(&table[0], &own[0]));
        assert!(Arc::ptr_eq(&table[1], &own[1]));
    }
}
