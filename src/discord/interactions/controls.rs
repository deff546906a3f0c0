// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::modal_values;
use crate::discord::Engine;
use crate::discord::utils::permissions::actor_from_interaction;
use crate::discord::utils::responses::{
	deferred_ephemeral, ephemeral_message, modal, send_response, transition_outcome_message, update_deferred,
	workflow_error_message, workflow_error_text,
};
use crate::discord::utils::shared_components::reason_input;
use crate::discord::utils::timestamp::interaction_time;
use crate::workflow::engine::TransitionTarget;
use crate::workflow::error::WorkflowError;
use crate::workflow::settings::Actor;
use miette::bail;
use twilight_http::client::Client;
use twilight_model::application::interaction::modal::ModalInteractionData;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::{ApplicationMarker, GuildMarker};

fn control_context(interaction: &InteractionCreate) -> miette::Result<(Id<GuildMarker>, Actor)> {
	let Some(guild_id) = interaction.guild_id else {
		bail!("Request controls were used outside of a guild");
	};
	let Some(actor) = actor_from_interaction(interaction) else {
		bail!("Request controls were used by a non-member");
	};
	Ok((guild_id, actor))
}

/// Handles the buttons under a request's control message. Decisions ask for an optional reason first.
pub async fn route_control_button(
	interaction: &InteractionCreate,
	custom_id_path: &[String],
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	let (Some(request_id), Some(action)) = (custom_id_path.get(1), custom_id_path.get(2)) else {
		bail!("Invalid custom ID for request controls (parts: {:?})", custom_id_path);
	};
	let (guild_id, actor) = control_context(interaction)?;

	let response = match action.as_str() {
		"claim" => match engine
			.claim(guild_id, request_id, &actor, interaction_time(interaction.id))
			.await
		{
			Ok(request) => ephemeral_message(format!("You claimed **{}**.", request.id)),
			Err(error) => workflow_error_message(&error),
		},
		"progress" => match engine
			.start_progress(guild_id, request_id, &actor, interaction_time(interaction.id))
			.await
		{
			Ok(request) => ephemeral_message(format!("**{}** is now in progress.", request.id)),
			Err(error) => workflow_error_message(&error),
		},
		action => {
			let Some(target) = TransitionTarget::from_id(action) else {
				bail!(
					"Invalid action for request controls: {} (custom ID parts: {:?})",
					action,
					custom_id_path
				);
			};
			let title = match target {
				TransitionTarget::Approve => format!("Approve {}", request_id),
				TransitionTarget::Deny => format!("Deny {}", request_id),
				TransitionTarget::Close => format!("Close {}", request_id),
			};
			modal(format!("reason/{}/{}", request_id, action), title, reason_input())
		}
	};
	send_response(interaction, http_client, application_id, &response).await
}

/// Applies the decision from a reason form opened by a control button.
pub async fn handle_reason_modal(
	interaction: &InteractionCreate,
	modal_data: &ModalInteractionData,
	custom_id_path: &[String],
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	let (Some(request_id), Some(action)) = (custom_id_path.get(1), custom_id_path.get(2)) else {
		bail!("Invalid custom ID for request decision (parts: {:?})", custom_id_path);
	};
	let Some(target) = TransitionTarget::from_id(action) else {
		bail!(
			"Invalid action for request decision: {} (custom ID parts: {:?})",
			action,
			custom_id_path
		);
	};
	let (guild_id, actor) = control_context(interaction)?;
	let reason = modal_values(modal_data)
		.remove("reason")
		.map(|reason| reason.trim().to_string())
		.filter(|reason| !reason.is_empty());

	send_response(interaction, http_client, application_id, &deferred_ephemeral()).await?;
	let content = match engine
		.transition(
			guild_id,
			request_id,
			target,
			&actor,
			reason,
			interaction_time(interaction.id),
		)
		.await
	{
		Ok(outcome) => transition_outcome_message(&outcome),
		Err(WorkflowError::NotFound) => format!("Request {} no longer exists.", request_id),
		Err(error) => workflow_error_text(&error),
	};
	update_deferred(interaction, http_client, application_id, &content).await
}
