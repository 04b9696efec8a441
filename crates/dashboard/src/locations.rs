use foundation::CameraPose;
use serde::{Deserialize, Serialize};

/// A named camera view the user can jump back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLocation {
    pub name: String,
    pub camera: CameraPose,
}

impl SavedLocation {
    pub fn new(name: impl Into<String>, camera: CameraPose) -> Self {
        Self {
            name: name.into(),
            camera,
        }
    }

    pub fn home() -> Self {
        Self::new("Taipei City Hall", CameraPose::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedLocations {
    items: Vec<SavedLocation>,
}

impl SavedLocations {
    pub fn new(items: Vec<SavedLocation>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, location: SavedLocation) {
        self.items.push(location);
    }

    /// Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<SavedLocation> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&SavedLocation> {
        self.items.get(index)
    }

    pub fn as_slice(&self) -> &[SavedLocation] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
