// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for Cortex bounded context

pub mod snapshot_store;

pub use snapshot_store::{read_snapshot, write_snapshot};
