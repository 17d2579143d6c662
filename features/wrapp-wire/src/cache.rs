use std::sync::{Arc, OnceLock};

use crate::{
    dependency_graph::MergedIndex,
    errors::{Diagnostic, ErrorKind, Errors},
    registry::{SetId, SetRegistry},
};

/// Merged indexes of one generation run
///
/// Each set is merged at most once, no matter how many sets import it or how many threads ask
/// for it.
pub struct MergeCache<'r> {
    registry: &'r SetRegistry,
    slots: Vec<OnceLock<Result<Arc<MergedIndex>, Errors>>>,
}

impl<'r> MergeCache<'r> {
    pub fn new(registry: &'r SetRegistry) -> Self {
        MergeCache {
            registry,
            slots: (0..registry.len()).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Merges a set and everything it imports
    pub fn merge(&self, id: SetId) -> Result<Arc<MergedIndex>, Errors> {
        // Import cycles would make a slot wait on itself
        self.registry.check_imports(id)?;
        self.merge_checked(id)
    }

    /// True if the set was merged already, successfully or not
    pub fn is_merged(&self, id: SetId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.get().is_some())
    }

    fn merge_checked(&self, id: SetId) -> Result<Arc<MergedIndex>, Errors> {
        let Some(slot) = self.slots.get(id.index()) else {
            return Err(Diagnostic::new(ErrorKind::UndefinedSet(id)).into());
        };

        slot.get_or_init(|| self.build(id)).clone()
    }

    fn build(&self, id: SetId) -> Result<Arc<MergedIndex>, Errors> {
        let Some(set) = self.registry.get(id) else {
            return Err(Diagnostic::new(ErrorKind::UndefinedSet(id)).into());
        };

        let imports = set
            .imports
            .iter()
            .map(|import| {
                (
                    import.clone(),
                    self.registry.describe(import.set),
                    self.merge_checked(import.set),
                )
            })
            .collect();

        MergedIndex::build(id, set.clone(), imports)
    }
}
