// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Shared-filesystem mount authorization for provisioned compute clusters.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Reconciles security-group access on EFS mount targets and
//!   mounts the filesystem on every cluster node

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
