// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Div/fileSec synthesizer for the directory grammars.
//!
//! Walks a [`DirNode`] depth-first and emits paired `mets:div` / `mets:fptr`
//! structure and `mets:file` entries. Children of every division are emitted
//! in three sections: bare pointers, then decorated (ordered or bit-level)
//! file divisions, then subdirectory divisions. [`ChildBuilder`] owns that
//! policy.

use std::collections::BTreeSet;

use sip_app_core::prefs::CompilerPrefs;
use sip_refs::{MdKind, RefQuery, ReferenceStore, ROOT_DIRECTORY};
use tracing::debug;

use crate::filesec::FileSecBuilder;
use crate::model::{Div, DivChild, FilePointer, StructMap};
use crate::properties::{supplementary_label, Collected, FileProperties};
use crate::tree::{DirNode, TreeNode};

/// structMap `TYPE` of the physical directory grammar.
pub const PHYSICAL_STRUCTMAP_TYPE: &str = "Directory-physical";
/// structMap `TYPE` of the generic logical grammar.
pub const LOGICAL_STRUCTMAP_TYPE: &str = "logical";
/// div `TYPE` of directories in the physical grammar.
pub const DIRECTORY_DIV_TYPE: &str = "directory";
/// div `TYPE` of a wrapper around one decorated file.
pub const FILE_DIV_TYPE: &str = "file";
/// structMap `LABEL` of the supplementary map.
pub const SUPPLEMENTARY_STRUCTMAP_LABEL: &str = "supplementary";
/// Container div `TYPE` of the supplementary map.
pub const SUPPLEMENTARY_ROOT_TYPE: &str = "fi-preservation-supplementary";

/// How directories become divisions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DirectoryGrammar {
    /// `TYPE="directory"`, directory name in `LABEL`.
    Physical,
    /// Directory name in `TYPE`.
    Logical,
}

/// Read-only inputs shared by every step of a synthesis.
#[derive(Clone, Copy)]
pub struct SynthContext<'a> {
    /// Metadata references of the workspace.
    pub refs: &'a dyn ReferenceStore,
    /// Content paths and properties.
    pub collected: &'a Collected,
    /// Compiler preferences (supplementary labels).
    pub prefs: &'a CompilerPrefs,
    /// Directory grammar for the directory walk.
    pub grammar: DirectoryGrammar,
}

impl SynthContext<'_> {
    /// Properties of `path`, default when unknown.
    pub fn properties(&self, path: &str) -> FileProperties {
        self.collected.get(path).cloned().unwrap_or_default()
    }

    /// fileGrp `USE` for `path`: its supplementary label, or `None` for main content.
    pub fn group_for(&self, props: &FileProperties) -> Option<String> {
        props
            .supplementary
            .as_deref()
            .map(|tag| supplementary_label(self.prefs, tag))
    }

    /// Descriptive and administrative ids of a directory.
    pub fn directory_ids(&self, dir: &str) -> (BTreeSet<String>, BTreeSet<String>) {
        (
            self.refs.lookup(&RefQuery::directory(dir).kind(MdKind::Dmd)),
            self.refs.lookup(&RefQuery::directory(dir).kind(MdKind::Amd)),
        )
    }

    /// Resolve `path` into the file section.
    pub fn pointer(&self, path: &str, filesec: &mut FileSecBuilder) -> (FilePointer, FileProperties) {
        let props = self.properties(path);
        let group = self.group_for(&props);
        let ptr = filesec.resolve(path, &props, group.as_deref(), self.refs);
        (ptr, props)
    }
}

/// Ordered output for one division's children.
///
/// Append-only sections merged by [`finish`](ChildBuilder::finish):
/// pointers, then decorated file divisions, then subdivisions.
#[derive(Debug, Default)]
pub struct ChildBuilder {
    pointers: Vec<FilePointer>,
    decorated: Vec<Div>,
    subdivisions: Vec<Div>,
}

impl ChildBuilder {
    /// Queue a bare pointer.
    pub fn pointer(&mut self, ptr: FilePointer) {
        self.pointers.push(ptr);
    }

    /// Queue a wrapper division around one decorated file.
    pub fn decorated(&mut self, div: Div) {
        self.decorated.push(div);
    }

    /// Queue a nested structural division.
    pub fn subdivision(&mut self, div: Div) {
        self.subdivisions.push(div);
    }

    /// Children in emitted order.
    pub fn finish(self) -> Vec<DivChild> {
        self.pointers
            .into_iter()
            .map(DivChild::Pointer)
            .chain(self.decorated.into_iter().map(DivChild::Div))
            .chain(self.subdivisions.into_iter().map(DivChild::Div))
            .collect()
    }

    /// Append the children to `parent`.
    pub fn append_to(self, parent: &mut Div) {
        parent.children.extend(self.finish());
    }
}

/// Wrapper division for a decorated file.
pub fn decorated_div(kind: &str, ptr: FilePointer, props: &FileProperties) -> Div {
    let mut div = Div::wrapping(kind, ptr);
    div.order = props.order;
    div
}

/// Recursively append the structure of `node` (at accumulated path `base`) to `parent`.
pub fn synthesize(
    node: &DirNode,
    parent: &mut Div,
    filesec: &mut FileSecBuilder,
    ctx: &SynthContext<'_>,
    base: &str,
) {
    let mut out = ChildBuilder::default();
    for (key, child) in &node.children {
        match child {
            TreeNode::File { path } => {
                let (ptr, props) = ctx.pointer(path, filesec);
                if props.is_decorated() {
                    out.decorated(decorated_div(FILE_DIV_TYPE, ptr, &props));
                } else {
                    out.pointer(ptr);
                }
            }
            TreeNode::Dir(dir) => {
                let path = if base == ROOT_DIRECTORY {
                    key.clone()
                } else {
                    format!("{base}/{key}")
                };
                let mut div = match ctx.grammar {
                    DirectoryGrammar::Physical => Div::new(DIRECTORY_DIV_TYPE).with_label(key),
                    DirectoryGrammar::Logical => Div::new(key.clone()),
                };
                (div.dmd_ids, div.amd_ids) = ctx.directory_ids(&path);
                debug!(%path, dmd = div.dmd_ids.len(), amd = div.amd_ids.len(), "directory division");
                synthesize(dir, &mut div, filesec, ctx, &path);
                out.subdivision(div);
            }
        }
    }
    out.append_to(parent);
}

/// Main structMap of a directory grammar.
pub fn directory_structmap(
    tree: &DirNode,
    filesec: &mut FileSecBuilder,
    ctx: &SynthContext<'_>,
    root_type: &str,
) -> StructMap {
    let (kind, mut root) = match ctx.grammar {
        DirectoryGrammar::Physical => (
            PHYSICAL_STRUCTMAP_TYPE,
            Div::new(root_type).with_label(ROOT_DIRECTORY),
        ),
        DirectoryGrammar::Logical => (LOGICAL_STRUCTMAP_TYPE, Div::new(root_type)),
    };
    (root.dmd_ids, root.amd_ids) = ctx.directory_ids(ROOT_DIRECTORY);
    synthesize(tree, &mut root, filesec, ctx, ROOT_DIRECTORY);
    StructMap {
        kind: kind.to_owned(),
        label: None,
        root,
    }
}

/// Supplementary structMap: one division per label, file pointers directly inside.
pub fn supplementary_structmap(
    tree: &DirNode,
    filesec: &mut FileSecBuilder,
    ctx: &SynthContext<'_>,
) -> StructMap {
    let mut root = Div::new(SUPPLEMENTARY_ROOT_TYPE);
    for (label, node) in &tree.children {
        let TreeNode::Dir(bucket) = node else {
            continue;
        };
        let mut div = Div::new(label.clone());
        for child in bucket.children.values() {
            if let TreeNode::File { path } = child {
                let props = ctx.properties(path);
                let ptr = filesec.resolve(path, &props, Some(label.as_str()), ctx.refs);
                div.children.push(DivChild::Pointer(ptr));
            }
        }
        root.children.push(DivChild::Div(div));
    }
    StructMap {
        kind: LOGICAL_STRUCTMAP_TYPE.to_owned(),
        label: Some(SUPPLEMENTARY_STRUCTMAP_LABEL.to_owned()),
        root,
    }
}
