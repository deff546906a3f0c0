// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::Engine;
use miette::bail;
use std::collections::HashMap;
use tokio::sync::RwLock;
use twilight_http::client::Client;
use twilight_model::application::interaction::message_component::MessageComponentInteractionData;
use twilight_model::application::interaction::modal::ModalInteractionData;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use type_map::concurrent::TypeMap;

mod controls;
mod forms;
mod votes;

pub async fn route_interaction(
	interaction: &InteractionCreate,
	interaction_data: &MessageComponentInteractionData,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
	bot_state: &RwLock<TypeMap>,
) -> miette::Result<()> {
	let custom_id_path: Vec<String> = interaction_data.custom_id.split('/').map(|s| s.to_string()).collect();

	match custom_id_path.first().map(|s| s.as_str()) {
		Some("panel") => {
			forms::handle_panel_select(
				interaction,
				interaction_data,
				http_client,
				application_id,
				engine,
				bot_state,
			)
			.await
		}
		Some("page") => {
			forms::handle_continue_button(interaction, &custom_id_path, http_client, application_id, bot_state).await
		}
		Some("request") => {
			controls::route_control_button(interaction, &custom_id_path, http_client, application_id, engine).await
		}
		Some("vote") => votes::handle_vote_button(interaction, &custom_id_path, http_client, application_id, engine).await,
		_ => bail!("Unknown component interaction: {}", interaction_data.custom_id),
	}
}

pub async fn route_modal_submit(
	interaction: &InteractionCreate,
	modal_data: &ModalInteractionData,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
	bot_state: &RwLock<TypeMap>,
) -> miette::Result<()> {
	let custom_id_path: Vec<String> = modal_data.custom_id.split('/').map(|s| s.to_string()).collect();

	match custom_id_path.first().map(|s| s.as_str()) {
		Some("form") => {
			forms::handle_form_modal(
				interaction,
				modal_data,
				&custom_id_path,
				http_client,
				application_id,
				engine,
			)
			.await
		}
		Some("page") => {
			forms::handle_page_modal(
				interaction,
				modal_data,
				&custom_id_path,
				http_client,
				application_id,
				engine,
				bot_state,
			)
			.await
		}
		Some("reason") => {
			controls::handle_reason_modal(
				interaction,
				modal_data,
				&custom_id_path,
				http_client,
				application_id,
				engine,
			)
			.await
		}
		_ => bail!("Unknown modal submitted: {}", modal_data.custom_id),
	}
}

/// Collects the submitted values of a modal's text inputs, keyed by input ID. Blank values are kept.
fn modal_values(modal_data: &ModalInteractionData) -> HashMap<String, String> {
	let mut values = HashMap::new();
	for row in modal_data.components.iter() {
		for component in row.components.iter() {
			if let Some(value) = &component.value {
				values.insert(component.custom_id.clone(), value.clone());
			}
		}
	}
	values
}
