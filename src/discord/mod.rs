// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::store::PgRequestStore;
use crate::workflow::engine::WorkflowEngine;

mod commands;
mod connection;
mod interactions;
mod messenger;
pub mod state;
mod utils;

pub use connection::{run_bot, set_up_client};
pub use messenger::DiscordMessenger;

/// The workflow engine as wired up for the running bot
pub type Engine = WorkflowEngine<PgRequestStore, DiscordMessenger>;
