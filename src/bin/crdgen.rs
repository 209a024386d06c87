// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from the Rust types in `src/crd.rs` and
//! `src/backup_crd.rs`, one file per CRD plus a combined manifest that the
//! operator accepts through `--crd-manifest`.
//!
//! Usage:
//!   cargo run --bin crdgen
//!
//! Generated files will be written to deploy/crds/ with proper headers.

use cozystack_operator::crd_install::{all_crds, render_manifest};
use kube::ResourceExt;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs and src/backup_crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files...");

    let crds = all_crds();
    for crd in &crds {
        let filename = format!("{}.crd.yaml", crd.name_any());
        let yaml = render_manifest(std::slice::from_ref(crd))?;
        fs::write(output_dir.join(&filename), format!("{COPYRIGHT_HEADER}{yaml}"))?;
        println!("  ✓ Generated {filename}");
    }

    let combined = render_manifest(&crds)?;
    fs::write(output_dir.join("all.yaml"), format!("{COPYRIGHT_HEADER}{combined}"))?;
    println!("  ✓ Generated all.yaml");

    println!("✓ Successfully generated {} CRDs in deploy/crds/", crds.len());
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}
