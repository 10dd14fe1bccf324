//! Path eligibility resolution: which workers' advertised storage mounts
//! cover a given absolute path.

use crate::model::WorkerHeartbeat;
use std::collections::HashSet;
use std::path::{Component, Path};

/// Returns `true` iff `mount` covers `path`: `mount == path`, or `mount` is a
/// proper ancestor of `path`. Components are compared as-is — no symlink
/// resolution, no case folding.
fn mount_covers(mount: &str, path: &str) -> bool {
    let mount_components: Vec<Component> = Path::new(mount).components().collect();
    let path_components: Vec<Component> = Path::new(path).components().collect();
    if mount_components.len() > path_components.len() {
        return false;
    }
    mount_components
        .iter()
        .zip(path_components.iter())
        .all(|(a, b)| a == b)
}

/// Ordered (insertion order of the worker registry, deduplicated) list of
/// worker ids whose `storage_paths` cover `path`. Empty means "no eligible
/// worker".
pub fn resolve<'a, I>(path: &str, heartbeats: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a WorkerHeartbeat>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for hb in heartbeats {
        if seen.contains(&hb.worker_id) {
            continue;
        }
        if hb.storage_paths.iter().any(|mount| mount_covers(mount, path)) {
            seen.insert(hb.worker_id.clone());
            result.push(hb.worker_id.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;
    use crate::model::WorkerState;
    use chrono::Utc;

    fn heartbeat(worker_id: &str, storage_paths: &[&str]) -> WorkerHeartbeat {
        WorkerHeartbeat {
            worker_id: worker_id.to_string(),
            status: WorkerState::Idle,
            timestamp: Utc::now(),
            control_plane_address: "10.0.0.1".into(),
            data_plane_endpoints: vec![],
            storage_paths: storage_paths.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn exact_mount_match_covers() {
        let hbs = vec![heartbeat("w1", &["/a/src"])];
        assert_eq!(resolve("/a/src", &hbs), vec!["w1".to_string()]);
    }

    #[test]
    fn ancestor_mount_covers() {
        let hbs = vec![heartbeat("w1", &["/a"])];
        assert_eq!(resolve("/a/src/proj", &hbs), vec!["w1".to_string()]);
    }

    #[test]
    fn sibling_prefix_does_not_cover() {
        // "/data/source" must not be treated as covering "/data/sourceX"
        let hbs = vec![heartbeat("w1", &["/data/source"])];
        assert!(resolve("/data/sourceX", &hbs).is_empty());
    }

    #[test]
    fn deeper_mount_does_not_cover_shallower_path() {
        let hbs = vec![heartbeat("w1", &["/a/src/deep"])];
        assert!(resolve("/a/src", &hbs).is_empty());
    }

    #[test]
    fn no_match_yields_empty() {
        let hbs = vec![heartbeat("w1", &["/data/destination"])];
        assert!(resolve("/data/source/proj", &hbs).is_empty());
    }

    #[test]
    fn order_is_insertion_order_deduplicated() {
        let hbs = vec![heartbeat("w2", &["/a"]), heartbeat("w1", &["/a"]), heartbeat("w2", &["/a"])];
        assert_eq!(resolve("/a/x", &hbs), vec!["w2".to_string(), "w1".to_string()]);
    }
}
