// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `compile-structmap`: write `structmap.xml`, `filesec.xml` and (when
//! supplementary content exists) `supplementary-structmap.xml` into a SIP
//! workspace.
//!
//! Preferences come from `compile-structmap.json` in the workspace, else the
//! user config dir, else defaults. Flags override them.
#![allow(clippy::print_stdout)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sip_app_core::config::{ConfigService, COMPILER_PREFS_KEY};
use sip_app_core::prefs::{CompilerPrefs, SupplementaryConflict};
use sip_config_fs::FsConfigStore;
use sip_structmap::{compile_structmap, CompileOptions, StructGrammar};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "compile-structmap", version)]
#[command(about = "Compile METS structMap and fileSec documents for a SIP workspace")]
pub struct Cli {
    /// Workspace directory holding the metadata reference and property documents
    pub workspace: PathBuf,
    /// Structure of the main structMap
    #[arg(long, value_enum, default_value_t = GrammarArg::DirectoryPhysical)]
    pub structmap_type: GrammarArg,
    /// TYPE of the container division (default: saved preference, else "directory")
    #[arg(long)]
    pub root_type: Option<String>,
    /// EAD3 finding aid; required with --structmap-type ead3-logical
    #[arg(long, required_if_eq("structmap_type", "ead3-logical"))]
    pub dmdsec_loc: Option<PathBuf>,
    /// Also print every written document to stdout
    #[arg(long)]
    pub stdout: bool,
    /// How to resolve conflicting supplementary tags (default: saved preference)
    #[arg(long, value_enum)]
    pub supplementary_conflict: Option<ConflictArg>,
}

/// `--structmap-type` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GrammarArg {
    /// Directory tree, physical grammar
    #[value(name = "directory-physical")]
    DirectoryPhysical,
    /// EAD3 finding aid
    #[value(name = "ead3-logical")]
    Ead3Logical,
    /// Directory tree, logical grammar
    #[value(name = "logical")]
    Logical,
}

impl From<GrammarArg> for StructGrammar {
    fn from(arg: GrammarArg) -> Self {
        match arg {
            GrammarArg::DirectoryPhysical => Self::DirectoryPhysical,
            GrammarArg::Ead3Logical => Self::Ead3Logical,
            GrammarArg::Logical => Self::Logical,
        }
    }
}

/// `--supplementary-conflict` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConflictArg {
    /// Latest tag wins
    LastWins,
    /// First tag sticks
    FirstWins,
    /// Abort on conflict
    Reject,
}

impl From<ConflictArg> for SupplementaryConflict {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::LastWins => Self::LastWins,
            ConflictArg::FirstWins => Self::FirstWins,
            ConflictArg::Reject => Self::Reject,
        }
    }
}

/// Saved preferences: the workspace's own file first, then the user config dir.
pub fn load_prefs(workspace: &Path) -> Result<CompilerPrefs> {
    let local = ConfigService::new(FsConfigStore::at(workspace));
    if let Some(prefs) = local
        .load::<CompilerPrefs>(COMPILER_PREFS_KEY)
        .with_context(|| format!("failed to read preferences in {}", workspace.display()))?
    {
        debug!(workspace = %workspace.display(), "using workspace preferences");
        return Ok(prefs);
    }
    let user = match FsConfigStore::new() {
        Ok(store) => ConfigService::new(store),
        Err(err) => {
            debug!(%err, "no user config dir; using default preferences");
            return Ok(CompilerPrefs::default());
        }
    };
    let prefs = user
        .load_or_default::<CompilerPrefs>(COMPILER_PREFS_KEY)
        .with_context(|| format!("failed to read preferences in {}", user.store().base().display()))?;
    Ok(prefs)
}

/// Run the compiler for parsed arguments.
pub fn run(cli: Cli) -> Result<()> {
    let mut prefs = load_prefs(&cli.workspace)?;
    if let Some(conflict) = cli.supplementary_conflict {
        prefs.supplementary_conflict = conflict.into();
    }
    let options = CompileOptions {
        grammar: cli.structmap_type.into(),
        root_type: cli.root_type,
        description: cli.dmdsec_loc,
    };

    let output = compile_structmap(&cli.workspace, &options, prefs)
        .with_context(|| format!("failed to compile {}", cli.workspace.display()))?;
    info!(
        documents = output.documents.len(),
        files = output.file_ids.len(),
        "done"
    );
    if cli.stdout {
        for doc in &output.documents {
            println!("{}", doc.xml);
        }
    }
    Ok(())
}

/// Parse arguments, install logging and run.
pub fn entrypoint() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();
    run(cli)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "compile-structmap",
            "ws",
            "--structmap-type",
            "ead3-logical",
            "--dmdsec-loc",
            "ead.xml",
            "--supplementary-conflict",
            "reject",
        ])
        .unwrap();
        assert_eq!(cli.structmap_type, GrammarArg::Ead3Logical);
        assert_eq!(cli.supplementary_conflict, Some(ConflictArg::Reject));
        assert_eq!(StructGrammar::from(cli.structmap_type), StructGrammar::Ead3Logical);
    }

    #[test]
    fn ead_requires_description() {
        let err = Cli::try_parse_from(["compile-structmap", "ws", "--structmap-type", "ead3-logical"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn workspace_prefs_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("compile-structmap.json"),
            r#"{"root_type": "package", "supplementary_conflict": "first_wins"}"#,
        )
        .unwrap();
        let prefs = load_prefs(dir.path()).unwrap();
        assert_eq!(prefs.root_type, "package");
        assert_eq!(prefs.supplementary_conflict, SupplementaryConflict::FirstWins);
        assert_eq!(
            prefs.supplementary_label("xml_schema"),
            Some("fi-preservation-xml-schemas")
        );
    }
}
