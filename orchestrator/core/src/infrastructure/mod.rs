// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod process;
pub mod directory;
pub mod remote;

pub use event_bus::{DomainEvent, EventBus};
