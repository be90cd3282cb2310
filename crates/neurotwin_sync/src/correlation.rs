//! Cross-domain correlation: which brain regions are implicated by the
//! symptoms currently reported active.

use neurotwin_core::{ActivitySignal, BrainModel, RegionId, SymptomMapping};
use std::collections::BTreeSet;

/// Regions of active symptoms, deduplicated and restricted to regions the
/// brain model actually has. `None` until both inputs are loaded.
pub fn derive_active_regions(
    model: Option<&BrainModel>,
    mappings: &[SymptomMapping],
    signal: &dyn ActivitySignal,
) -> Option<BTreeSet<RegionId>> {
    let model = model?;
    if mappings.is_empty() {
        return None;
    }

    let active: BTreeSet<RegionId> = mappings
        .iter()
        .filter(|m| signal.is_active(m))
        .flat_map(|m| m.region_ids.iter())
        .filter(|id| model.contains_region(id))
        .cloned()
        .collect();
    Some(active)
}
