// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! CLI entry point for the structMap compiler.

use anyhow::Result;
use sip_cli::entrypoint;

fn main() -> Result<()> {
    entrypoint()
}
