//! Local mirror of the host project's item tree.
//!
//! The host can only be queried by running `file_map.jsx`, so the interpreter
//! keeps a snapshot and answers "does this item exist?" locally. The snapshot
//! is refreshed after bulk changes (imports) and patched by hand when the
//! orchestrator deletes a scene folder.

use serde::{Deserialize, Serialize};

/// One entry of the host project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostItem {
    /// Host-assigned item index
    pub id: u64,
    pub name: String,
    /// Host class name (`CompItem`, `FolderItem`, `FootageItem`)
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Name of the containing folder (`Root` for top level)
    #[serde(rename = "parentFolder", default)]
    pub parent_folder: String,
}

/// The `{"files": [...]}` document written by `file_map.jsx`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectMap {
    #[serde(default)]
    pub files: Vec<HostItem>,
}

/// Snapshot of host items, owned by the interpreter.
#[derive(Debug, Clone, Default)]
pub struct ItemCache {
    items: Vec<HostItem>,
}

impl ItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot wholesale.
    pub fn replace_all(&mut self, items: Vec<HostItem>) {
        self.items = items;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[HostItem] {
        &self.items
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.name == name)
    }

    /// True when an item called `name` still has to be created.
    pub fn needs_creation(&self, name: &str) -> bool {
        !self.contains(name)
    }

    pub fn find(&self, name: &str) -> Option<&HostItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Drop every item called `name` together with everything nested in it.
    ///
    /// Returns the number of entries removed.
    pub fn remove_named(&mut self, name: &str) -> usize {
        let before = self.items.len();
        let mut doomed = vec![name.to_string()];
        while let Some(folder) = doomed.pop() {
            self.items.retain(|item| {
                if item.name == folder || item.parent_folder == folder {
                    if item.name != folder {
                        doomed.push(item.name.clone());
                    }
                    false
                } else {
                    true
                }
            });
        }
        before - self.items.len()
    }

    /// Items whose parent folder is `folder`.
    pub fn folder_items(&self, folder: &str) -> Vec<&HostItem> {
        self.items
            .iter()
            .filter(|item| item.parent_folder == folder)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, name: &str, parent: &str) -> HostItem {
        HostItem {
            id,
            name: name.to_string(),
            kind: "FolderItem".to_string(),
            parent_folder: parent.to_string(),
        }
    }

    #[test]
    fn test_needs_creation_is_inverse_of_contains() {
        let mut cache = ItemCache::new();
        assert!(cache.needs_creation("hostbridge"));
        cache.replace_all(vec![item(1, "hostbridge", "Root")]);
        assert!(cache.contains("hostbridge"));
        assert!(!cache.needs_creation("hostbridge"));
        assert_eq!(cache.find("hostbridge").map(|i| i.id), Some(1));
    }

    #[test]
    fn test_remove_named_drops_children() {
        let mut cache = ItemCache::new();
        cache.replace_all(vec![
            item(1, "scene-1", "hostbridge"),
            item(2, "scene-1-intro", "scene-1"),
            item(3, "scene-2", "hostbridge"),
        ]);
        assert_eq!(cache.remove_named("scene-1"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.folder_items("hostbridge").len(), 1);
    }

    #[test]
    fn test_remove_named_drops_nested_descendants() {
        let mut cache = ItemCache::new();
        cache.replace_all(vec![
            item(1, "scene-1", "hostbridge"),
            item(2, "shots", "scene-1"),
            item(3, "take-a", "shots"),
            item(4, "frames", "take-a"),
            item(5, "frame-001", "frames"),
            item(6, "scene-2", "hostbridge"),
            item(7, "take-b", "scene-2"),
        ]);
        assert_eq!(cache.remove_named("scene-1"), 5);
        let left: Vec<&str> = cache.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(left, vec!["scene-2", "take-b"]);
    }
}
