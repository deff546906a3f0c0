// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::workflow::forms::{FormSessions, SessionPolicy};
use tokio::sync::RwLock;
use type_map::concurrent::TypeMap;

/// Runs `action` against the form sessions held in the bot state.
///
/// The sessions are normally inserted with the configured policy at startup; if they're missing, the default policy
/// is used.
pub async fn with_form_sessions<T>(bot_state: &RwLock<TypeMap>, action: impl FnOnce(&mut FormSessions) -> T) -> T {
	let mut state = bot_state.write().await;
	let sessions = state
		.entry::<FormSessions>()
		.or_insert_with(|| FormSessions::new(SessionPolicy::default()));
	action(sessions)
}
