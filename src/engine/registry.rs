use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use anyhow::{bail, Result};
use log::{debug, info, warn};

use crate::engine::descriptor::ArtifactDescriptor;

/// Every artifact known to a run, in registration order, plus selection state
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    descriptors: Vec<ArtifactDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact. Names must be unique.
    pub fn register(&mut self, descriptor: ArtifactDescriptor) -> Result<()> {
        if self.by_name.contains_key(&descriptor.name) {
            bail!("Artifact {} is already registered", descriptor.name);
        }
        if descriptor.patterns.is_empty() {
            warn!("Artifact {} declares no search patterns and will always be skipped", descriptor.name);
        }

        debug!("Registered artifact {} ({})", descriptor.name, descriptor.category);
        self.by_name.insert(descriptor.name.clone(), self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactDescriptor> {
        self.by_name.get(name).map(|&index| &self.descriptors[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactDescriptor> {
        self.descriptors.iter()
    }

    pub(crate) fn descriptor_mut(&mut self, index: usize) -> &mut ArtifactDescriptor {
        &mut self.descriptors[index]
    }

    /// Select one artifact by name. Selecting a core artifact is a no-op.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let index = match self.by_name.get(name) {
            Some(&index) => index,
            None => bail!("Unknown artifact: {}", name),
        };

        let descriptor = &mut self.descriptors[index];
        if descriptor.core {
            debug!("Artifact {} is core and always runs", name);
        } else {
            descriptor.selected = true;
        }
        Ok(())
    }

    /// Select every optional artifact, long-running ones only on request
    pub fn select_all(&mut self, include_long_running: bool) {
        for descriptor in self.descriptors.iter_mut().filter(|d| !d.core) {
            if include_long_running || !descriptor.long_running {
                descriptor.selected = true;
            }
        }
    }

    /// Clear the selection. Core artifacts are unaffected.
    pub fn deselect_all(&mut self) {
        for descriptor in self.descriptors.iter_mut().filter(|d| !d.core) {
            descriptor.selected = false;
        }
    }

    /// Names of the currently selected optional artifacts
    pub fn selected_names(&self) -> BTreeSet<String> {
        self.descriptors
            .iter()
            .filter(|d| !d.core && d.selected)
            .map(|d| d.name.clone())
            .collect()
    }

    /// Core artifacts plus selected optional artifacts
    pub fn count_to_process(&self) -> usize {
        self.descriptors.iter().filter(|d| d.should_run()).count()
    }

    pub fn categories_to_process(&self) -> BTreeSet<String> {
        self.descriptors
            .iter()
            .filter(|d| d.should_run())
            .map(|d| d.category.clone())
            .collect()
    }

    /// Artifacts whose plugin ran to completion in the last run
    pub fn processed(&self) -> impl Iterator<Item = &ArtifactDescriptor> {
        self.descriptors.iter().filter(|d| d.processed())
    }

    /// Apply a name list: empty selects all non-long-running artifacts
    pub fn apply_selection(&mut self, names: &[String], include_long_running: bool) -> Result<()> {
        self.deselect_all();

        if names.is_empty() {
            self.select_all(include_long_running);
        } else {
            for name in names {
                self.select(name.trim())?;
            }
        }

        info!(
            "{} artifact(s) to process across {} categories",
            self.count_to_process(),
            self.categories_to_process().len()
        );
        Ok(())
    }

    /// Indices of the artifacts to run, in dispatch order.
    ///
    /// Core artifacts come first, then optional ones; within each phase by
    /// ascending priority, then registration order.
    pub(crate) fn build_queue(&self) -> Vec<usize> {
        let mut heap = BinaryHeap::new();
        for (index, descriptor) in self.descriptors.iter().enumerate() {
            if !descriptor.should_run() {
                continue;
            }
            let phase = u8::from(!descriptor.core);
            heap.push(Reverse((phase, descriptor.effective_priority(), index)));
        }

        let mut queue = Vec::with_capacity(heap.len());
        while let Some(Reverse((_, _, index))) = heap.pop() {
            queue.push(index);
        }
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileHandle;
    use crate::context::RunContext;
    use crate::models::{ArtifactOutput, SearchPattern};
    use std::sync::Arc;

    fn noop(_: &RunContext, _: &[Arc<FileHandle>]) -> anyhow::Result<ArtifactOutput> {
        Ok(ArtifactOutput::default())
    }

    fn descriptor(name: &str, category: &str) -> ArtifactDescriptor {
        ArtifactDescriptor::new(name, category, noop).pattern(SearchPattern::new(format!("**/{}", name)))
    }

    fn sample_registry() -> ArtifactRegistry {
        let mut registry = ArtifactRegistry::new();
        registry.register(descriptor("core1", "Device").core()).unwrap();
        registry.register(descriptor("opt1", "Messages")).unwrap();
        registry.register(descriptor("core2", "Device").core()).unwrap();
        registry.register(descriptor("opt2", "Safari")).unwrap();
        registry.register(descriptor("slow", "KnowledgeC").long_running()).unwrap();
        registry
    }

    fn queue_names(registry: &ArtifactRegistry) -> Vec<String> {
        registry.build_queue().into_iter().map(|i| registry.descriptors[i].name.clone()).collect()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = ArtifactRegistry::new();
        registry.register(descriptor("sms", "Messages")).unwrap();
        assert!(registry.register(descriptor("sms", "Messages")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_queue_core_first_then_selected() {
        let mut registry = sample_registry();
        registry.select("opt2").unwrap();

        assert_eq!(queue_names(&registry), vec!["core1", "core2", "opt2"]);
        assert_eq!(registry.count_to_process(), 3);
    }

    #[test]
    fn test_explicit_priority_within_phase() {
        let mut registry = ArtifactRegistry::new();
        registry.register(descriptor("late", "A")).unwrap();
        registry.register(descriptor("early", "A").priority(2)).unwrap();
        // An optional artifact never overtakes a core one
        registry.register(descriptor("core", "B").core().priority(50)).unwrap();
        registry.select_all(false);

        assert_eq!(queue_names(&registry), vec!["core", "early", "late"]);
    }

    #[test]
    fn test_select_all_and_long_running() {
        let mut registry = sample_registry();

        registry.select_all(false);
        assert!(!registry.selected_names().contains("slow"));
        assert_eq!(registry.selected_names().len(), 2);

        registry.select_all(true);
        assert!(registry.selected_names().contains("slow"));
    }

    #[test]
    fn test_deselect_all_keeps_core() {
        let mut registry = sample_registry();
        registry.select_all(true);
        registry.deselect_all();

        assert!(registry.selected_names().is_empty());
        assert_eq!(registry.count_to_process(), 2);
        assert_eq!(queue_names(&registry), vec!["core1", "core2"]);
    }

    #[test]
    fn test_select_unknown_and_core() {
        let mut registry = sample_registry();
        assert!(registry.select("missing").is_err());

        registry.select("core1").unwrap();
        assert!(registry.selected_names().is_empty());
    }

    #[test]
    fn test_categories_to_process() {
        let mut registry = sample_registry();
        registry.select("opt1").unwrap();

        let categories: Vec<String> = registry.categories_to_process().into_iter().collect();
        assert_eq!(categories, vec!["Device".to_string(), "Messages".to_string()]);
    }

    #[test]
    fn test_apply_selection() {
        let mut registry = sample_registry();

        registry.apply_selection(&["opt1".to_string()], false).unwrap();
        assert_eq!(registry.selected_names().into_iter().collect::<Vec<_>>(), vec!["opt1".to_string()]);

        registry.apply_selection(&[], false).unwrap();
        assert_eq!(registry.selected_names().len(), 2);

        assert!(registry.apply_selection(&["nope".to_string()], false).is_err());
    }
}
