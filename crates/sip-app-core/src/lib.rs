// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for SIP workspace tools (config, compiler prefs).
//! Keeps the CLI and storage adapters thin.

pub mod config;
pub mod prefs;
