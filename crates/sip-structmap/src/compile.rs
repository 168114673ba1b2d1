// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One compilation run over a workspace.

use std::fs;
use std::path::{Path, PathBuf};

use sip_app_core::prefs::CompilerPrefs;
use sip_refs::workspace::{load_property_records, load_references, PropertyRecord};
use sip_refs::MemoryRefStore;
use tracing::{debug, info};

use crate::ead::compile_from_description;
use crate::filesec::{FileIds, FileSecBuilder};
use crate::mets::{filesec_document, structmap_document};
use crate::model::{FileSec, StructMap};
use crate::properties::{collect, Collected};
use crate::synth::{directory_structmap, supplementary_structmap, DirectoryGrammar, SynthContext};
use crate::tree::{build, TreeMode};
use crate::CompileError;

/// Output file of the main structMap.
pub const STRUCTMAP_FILE: &str = "structmap.xml";
/// Output file of the fileSec.
pub const FILESEC_FILE: &str = "filesec.xml";
/// Output file of the supplementary structMap.
pub const SUPPLEMENTARY_STRUCTMAP_FILE: &str = "supplementary-structmap.xml";

/// Which structure the main structMap follows.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum StructGrammar {
    /// Directory tree, `TYPE="Directory-physical"`.
    #[default]
    DirectoryPhysical,
    /// EAD3 finding aid, `TYPE="EAD3-logical"`.
    Ead3Logical,
    /// Directory tree, `TYPE="logical"`, directory names as div types.
    Logical,
}

impl StructGrammar {
    /// Command-line spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectoryPhysical => "directory-physical",
            Self::Ead3Logical => "ead3-logical",
            Self::Logical => "logical",
        }
    }
}

/// Options of one run.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Structure of the main structMap.
    pub grammar: StructGrammar,
    /// Container div `TYPE`; falls back to the preferences.
    pub root_type: Option<String>,
    /// EAD3 description, required by [`StructGrammar::Ead3Logical`].
    pub description: Option<PathBuf>,
}

/// A serialized output document.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Document {
    /// File name inside the workspace.
    pub file_name: &'static str,
    /// `mets:mets` document text.
    pub xml: String,
}

/// Result of a run.
#[derive(Clone, Debug)]
pub struct CompileOutput {
    /// Main structMap.
    pub structmap: StructMap,
    /// Supplementary structMap, when any supplementary content exists.
    pub supplementary: Option<StructMap>,
    /// File section shared by every structMap of the run.
    pub filesec: FileSec,
    /// Path → file id.
    pub file_ids: FileIds,
    /// Serialized documents in write order.
    pub documents: Vec<Document>,
}

/// Loaded inputs of a run.
#[derive(Debug)]
pub struct CompileRun {
    workspace: PathBuf,
    refs: MemoryRefStore,
    collected: Collected,
    prefs: CompilerPrefs,
}

impl CompileRun {
    /// Load references and property records from `workspace` and collect them.
    pub fn load(workspace: &Path, prefs: CompilerPrefs) -> Result<Self, CompileError> {
        let refs = load_references(workspace)?;
        let records = load_property_records(workspace)?;
        debug!(references = refs.len(), records = records.len(), "workspace loaded");
        Self::from_parts(workspace, refs, &records, prefs)
    }

    /// Build a run from already-loaded inputs.
    pub fn from_parts(
        workspace: &Path,
        refs: MemoryRefStore,
        records: &[PropertyRecord],
        prefs: CompilerPrefs,
    ) -> Result<Self, CompileError> {
        let collected = collect(&refs, records, &prefs)?;
        Ok(Self {
            workspace: workspace.to_path_buf(),
            refs,
            collected,
            prefs,
        })
    }

    /// Workspace directory.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Collected content paths and properties.
    pub fn collected(&self) -> &Collected {
        &self.collected
    }

    /// Effective preferences.
    pub fn prefs(&self) -> &CompilerPrefs {
        &self.prefs
    }

    fn ctx(&self, grammar: DirectoryGrammar) -> SynthContext<'_> {
        SynthContext {
            refs: &self.refs,
            collected: &self.collected,
            prefs: &self.prefs,
            grammar,
        }
    }

    /// Synthesize and serialize every section. Nothing is written.
    pub fn compile(&self, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
        let root_type = options.root_type.as_deref().unwrap_or(&self.prefs.root_type);
        info!(
            workspace = %self.workspace.display(),
            grammar = options.grammar.as_str(),
            paths = self.collected.paths.len(),
            "compiling structMap"
        );

        let mut filesec = FileSecBuilder::new();
        let structmap = match options.grammar {
            StructGrammar::DirectoryPhysical => {
                let tree = build(&self.collected, &self.prefs, TreeMode::Directory);
                let ctx = self.ctx(DirectoryGrammar::Physical);
                directory_structmap(&tree, &mut filesec, &ctx, root_type)
            }
            StructGrammar::Logical => {
                let tree = build(&self.collected, &self.prefs, TreeMode::Directory);
                let ctx = self.ctx(DirectoryGrammar::Logical);
                directory_structmap(&tree, &mut filesec, &ctx, root_type)
            }
            StructGrammar::Ead3Logical => {
                let path = options
                    .description
                    .as_deref()
                    .ok_or(CompileError::MissingDescription)?;
                let source = fs::read_to_string(path).map_err(|source| CompileError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let ctx = self.ctx(DirectoryGrammar::Logical);
                compile_from_description(&source, &mut filesec, &ctx, root_type)?
            }
        };

        let supplementary = self.collected.has_supplementary().then(|| {
            let tree = build(&self.collected, &self.prefs, TreeMode::Supplementary);
            supplementary_structmap(&tree, &mut filesec, &self.ctx(DirectoryGrammar::Logical))
        });

        let (filesec, file_ids) = filesec.finish();
        let mut documents = vec![
            Document {
                file_name: STRUCTMAP_FILE,
                xml: structmap_document(&structmap)?,
            },
            Document {
                file_name: FILESEC_FILE,
                xml: filesec_document(&filesec)?,
            },
        ];
        if let Some(supplementary) = &supplementary {
            documents.push(Document {
                file_name: SUPPLEMENTARY_STRUCTMAP_FILE,
                xml: structmap_document(supplementary)?,
            });
        }
        info!(
            files = file_ids.len(),
            groups = filesec.groups.len(),
            supplementary = supplementary.is_some(),
            "structMap compiled"
        );

        Ok(CompileOutput {
            structmap,
            supplementary,
            filesec,
            file_ids,
            documents,
        })
    }
}

/// Write `documents` into `dir`, returning the written paths.
pub fn write_documents(dir: &Path, documents: &[Document]) -> Result<Vec<PathBuf>, CompileError> {
    documents
        .iter()
        .map(|doc| {
            let path = dir.join(doc.file_name);
            fs::write(&path, &doc.xml).map_err(|source| CompileError::Io {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "wrote");
            Ok(path)
        })
        .collect()
}

/// Load `workspace`, compile it and write the documents back into it.
pub fn compile_structmap(
    workspace: &Path,
    options: &CompileOptions,
    prefs: CompilerPrefs,
) -> Result<CompileOutput, CompileError> {
    let run = CompileRun::load(workspace, prefs)?;
    let output = run.compile(options)?;
    write_documents(workspace, &output.documents)?;
    Ok(output)
}
