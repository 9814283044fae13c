//! # Evictor
//!
//! The periodic scan that validates idle instances and destroys the ones
//! that no longer pass. Shared, via [`run_scan`], between the plain
//! `ObjectPool` (outbound-validate only) and `TimedObjectPool` (outbound-
//! validate *and* an idle-timeout check) so the two variants' only
//! difference stays in the validity predicate they pass in, per the spec.

use crate::buffer::Buffer;
use crate::diagnostics::ObjectPoolDiagnostics;
use crate::object::{Poolable, Slot, ValidationDirection};

/// Runs one eviction pass over `buffer`, destroying every idle slot for
/// which `extra_validity` returns `false` or outbound validation fails.
/// Returns the number of instances destroyed this pass.
pub(crate) fn run_scan<T, F>(
    buffer: &Buffer<Slot<T>>,
    diagnostics: &ObjectPoolDiagnostics,
    mut extra_validity: F,
) -> usize
where
    T: Poolable,
    F: FnMut(&Slot<T>) -> bool,
{
    let removed = buffer.evict_if(|slot| {
        let outbound_ok = slot.value.on_validate(ValidationDirection::Outbound);
        !(outbound_ok && extra_validity(slot))
    });

    let destroyed = removed.len();
    for mut slot in removed {
        slot.value.on_release_resources();
        diagnostics.bump_destroyed();
        log::debug!("evictor: destroyed instance id={}", slot.id);
    }
    destroyed
}
