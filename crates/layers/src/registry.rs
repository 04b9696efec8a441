use std::collections::BTreeMap;

use formats::FeatureCollection;

use crate::descriptor::LayerDescriptor;
use crate::filter::FilterPredicate;
use crate::layer::LayerKey;

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub descriptor: LayerDescriptor,
    /// Unfiltered feature collection as fetched. Filters never replace it.
    pub data: FeatureCollection,
    pub visible: bool,
    pub filter: Option<FilterPredicate>,
}

/// The store's record of which layers exist and which are visible.
///
/// Invariants: one entry per key, and every visible key is registered.
/// `visible` keeps the order in which layers were shown.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    entries: BTreeMap<LayerKey, RegistryEntry>,
    order: Vec<LayerKey>,
    visible: Vec<LayerKey>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &LayerKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Adds a visible entry. Returns false and leaves the registry untouched
    /// when the key is already registered.
    pub fn register(&mut self, descriptor: LayerDescriptor, data: FeatureCollection) -> bool {
        let key = descriptor.key();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(
            key.clone(),
            RegistryEntry {
                descriptor,
                data,
                visible: true,
                filter: None,
            },
        );
        self.order.push(key.clone());
        self.visible.push(key);
        true
    }

    pub fn get(&self, key: &LayerKey) -> Option<&RegistryEntry> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &LayerKey) -> Option<RegistryEntry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.visible.retain(|k| k != key);
        Some(entry)
    }

    /// Returns false for unknown keys.
    pub fn set_visible(&mut self, key: &LayerKey, visible: bool) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.visible = visible;
        if visible {
            if !self.visible.contains(key) {
                self.visible.push(key.clone());
            }
        } else {
            self.visible.retain(|k| k != key);
        }
        true
    }

    pub fn is_visible(&self, key: &LayerKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.visible)
    }

    pub fn list_visible(&self) -> &[LayerKey] {
        &self.visible
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> &[LayerKey] {
        &self.order
    }

    /// Replaces the descriptor of an entry. The revision must keep the key.
    pub fn revise_descriptor(&mut self, descriptor: LayerDescriptor) -> bool {
        match self.entries.get_mut(&descriptor.key()) {
            Some(entry) => {
                entry.descriptor = descriptor;
                true
            }
            None => false,
        }
    }

    pub fn set_filter(&mut self, key: &LayerKey, filter: Option<FilterPredicate>) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.filter = filter;
                true
            }
            None => false,
        }
    }

    /// Maps a renderer layer id back to its key.
    pub fn key_for_layer_id(&self, layer_id: &str) -> Option<&LayerKey> {
        self.order.iter().find(|k| k.layer_id() == layer_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.visible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::LayerRegistry;
    use crate::descriptor::LayerDescriptor;
    use crate::filter::FilterPredicate;
    use crate::layer::{LayerKey, RenderType};
    use formats::FeatureCollection;

    fn circle(index: &str) -> LayerDescriptor {
        LayerDescriptor::new(index, RenderType::Circle)
    }

    #[test]
    fn register_is_a_no_op_when_present() {
        let mut reg = LayerRegistry::new();
        assert!(reg.register(circle("a"), FeatureCollection::default()));
        assert!(!reg.register(
            circle("a").with_paint("circle-color", "#000"),
            FeatureCollection::default()
        ));
        let key = LayerKey::new("a", RenderType::Circle);
        assert_eq!(reg.len(), 1);
        assert!(reg.get(&key).is_some_and(|e| e.descriptor.paint.is_empty()));
        assert_eq!(reg.list_visible(), &[key]);
    }

    #[test]
    fn visibility_list_has_no_duplicates() {
        let mut reg = LayerRegistry::new();
        reg.register(circle("a"), FeatureCollection::default());
        reg.register(circle("b"), FeatureCollection::default());
        let a = LayerKey::new("a", RenderType::Circle);
        let b = LayerKey::new("b", RenderType::Circle);

        reg.set_visible(&a, false);
        reg.set_visible(&a, true);
        reg.set_visible(&a, true);
        assert_eq!(reg.list_visible(), &[b.clone(), a.clone()]);
        assert_eq!(reg.keys(), &[a.clone(), b]);

        assert!(!reg.set_visible(&LayerKey::new("zzz", RenderType::Line), true));
    }

    #[test]
    fn remove_clears_existence_and_visibility() {
        let mut reg = LayerRegistry::new();
        reg.register(circle("a"), FeatureCollection::default());
        let a = LayerKey::new("a", RenderType::Circle);
        reg.set_filter(&a, Some(FilterPredicate::equals("k", 1)));

        let entry = reg.remove(&a).expect("entry");
        assert!(entry.filter.is_some());
        assert!(!reg.has(&a));
        assert!(reg.list_visible().is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn layer_ids_map_back_to_keys() {
        let mut reg = LayerRegistry::new();
        reg.register(
            LayerDescriptor::new("bus", RenderType::Route3D),
            FeatureCollection::default(),
        );
        assert_eq!(
            reg.key_for_layer_id("bus-3DRoute"),
            Some(&LayerKey::new("bus", RenderType::Route3D))
        );
        assert_eq!(reg.key_for_layer_id("bus-circle"), None);
    }
}
