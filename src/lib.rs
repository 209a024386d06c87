// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Cozystack Operator - platform packaging and application operator for Kubernetes
//!
//! The operator turns a small set of Custom Resource Definitions into the Flux
//! objects that install a Kubernetes platform, and keeps the applications
//! users create on that platform consistent with their definitions.
//!
//! ## Overview
//!
//! - Packages: `PackageSource`, `Package`, `Bundle`, `Platform` and
//!   `PlatformConfiguration` become `ArtifactGenerator`s, `GitRepository`s and
//!   `HelmRelease`s
//! - Applications: `ApplicationDefinition`s drive release alignment, dashboard
//!   publishing, subresource RBAC, workload monitors and lineage labels
//! - Backups: `Plan`s schedule `BackupJob`s, which a driver turns into `Backup`s
//!   that `RestoreJob`s restore
//!
//! ## Modules
//!
//! - [`crd`] - Platform and application Custom Resource Definitions
//! - [`backup_crd`] - Backup Custom Resource Definitions
//! - [`external`] - Flux and monitoring resources written by the operator
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`context`] - Shared context and reflector stores for controllers
//! - [`config`] - Command-line and environment configuration
//! - [`server`] - Metrics, health and admission webhook HTTP server
//!
//! ## Example
//!
//! ```rust,no_run
//! use cozystack_operator::schedule::Schedule;
//! use cozystack_operator::backup_crd::ScheduleType;
//!
//! let schedule = Schedule::parse(ScheduleType::Cron, "0 3 * * *").unwrap();
//! ```

pub mod backup_crd;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod crd_install;
pub mod external;
pub mod labels;
pub mod leader;
pub mod lineage;
pub mod metrics;
pub mod naming;
pub mod reconcilers;
pub mod schedule;
pub mod server;
pub mod status_reasons;
pub mod template;
pub mod values;
pub mod webhook;
