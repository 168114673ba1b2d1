// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tree builder: sorted content paths → nested, insertion-ordered tree.

use indexmap::IndexMap;
use sip_app_core::prefs::CompilerPrefs;
use tracing::warn;

use crate::properties::{supplementary_label, Collected};

/// Node of the content tree.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TreeNode {
    /// A content file; `path` is its full workspace-relative path.
    File {
        /// Full path of the file.
        path: String,
    },
    /// A directory (or, in supplementary mode, a type bucket).
    Dir(DirNode),
}

/// Directory node; children keep insertion order.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DirNode {
    /// Children keyed by path segment (or bucket label / full path in supplementary mode).
    pub children: IndexMap<String, TreeNode>,
}

impl DirNode {
    /// Insert `path`, creating intermediate directories. Returns `false`
    /// (and changes nothing) when the path collides with an existing entry.
    fn insert_path(&mut self, path: &str) -> bool {
        let mut node = self;
        let mut segments = path.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                if node.children.contains_key(segment) {
                    return false;
                }
                node.children.insert(
                    segment.to_owned(),
                    TreeNode::File {
                        path: path.to_owned(),
                    },
                );
                return true;
            }
            let child = node
                .children
                .entry(segment.to_owned())
                .or_insert_with(|| TreeNode::Dir(DirNode::default()));
            match child {
                TreeNode::Dir(dir) => node = dir,
                TreeNode::File { .. } => return false,
            }
        }
        false
    }
}

/// Which tree to build.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TreeMode {
    /// Mirror the directory hierarchy of non-supplementary content.
    Directory,
    /// One flat bucket per supplementary label.
    Supplementary,
}

/// Build the tree for `mode` over the collected (sorted) paths.
pub fn build(collected: &Collected, prefs: &CompilerPrefs, mode: TreeMode) -> DirNode {
    match mode {
        TreeMode::Directory => build_directory_tree(collected),
        TreeMode::Supplementary => build_supplementary_tree(collected, prefs),
    }
}

/// Nested directory tree of every non-supplementary path.
pub fn build_directory_tree(collected: &Collected) -> DirNode {
    let mut root = DirNode::default();
    for path in &collected.paths {
        let supplementary = collected
            .get(path)
            .is_some_and(|props| props.supplementary.is_some());
        if supplementary {
            continue;
        }
        if !root.insert_path(path) {
            warn!(%path, "path collides with an existing file or directory; skipped");
        }
    }
    root
}

/// Two-level tree: supplementary label → files of that type (keyed by full path).
pub fn build_supplementary_tree(collected: &Collected, prefs: &CompilerPrefs) -> DirNode {
    let mut root = DirNode::default();
    for path in collected.supplementary_paths() {
        let Some(tag) = collected
            .get(path)
            .and_then(|props| props.supplementary.as_deref())
        else {
            continue;
        };
        let bucket = root
            .children
            .entry(supplementary_label(prefs, tag))
            .or_insert_with(|| TreeNode::Dir(DirNode::default()));
        if let TreeNode::Dir(dir) = bucket {
            dir.children.insert(
                path.to_owned(),
                TreeNode::File {
                    path: path.to_owned(),
                },
            );
        }
    }
    root
}

#[cfg(test)]
impl DirNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    fn dir(&self, key: &str) -> Option<&Self> {
        match self.children.get(key) {
            Some(TreeNode::Dir(dir)) => Some(dir),
            _ => None,
        }
    }
}
