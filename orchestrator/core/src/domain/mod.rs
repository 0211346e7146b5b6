// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Value objects, collaborator traits and configuration types for the
//! shared-filesystem mount workflow.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and contracts with no I/O of their own

pub mod filesystem;
pub mod node;
pub mod cluster;
pub mod events;
pub mod cluster_config;
