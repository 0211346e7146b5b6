// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod access_reconciler;
pub mod node_mounter;
pub mod efs_plugin;
pub mod whoami_plugin;
pub mod plugin_chain;

// Re-export services for convenience
pub use access_reconciler::{AccessReconciler, ReconcileError, ReconcilePhase, StandardAccessReconciler};
pub use node_mounter::{MountError, MountOutcome, MountPhase, NodeMounter, StandardNodeMounter};
pub use efs_plugin::EfsPlugin;
pub use whoami_plugin::WhoamiPlugin;
pub use plugin_chain::{build_plugin_chain, PluginChain};
