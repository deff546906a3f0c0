// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::modal_values;
use crate::discord::Engine;
use crate::discord::state::with_form_sessions;
use crate::discord::utils::responses::{
	deferred_ephemeral, ephemeral_message_with_components, modal, send_response, update_deferred,
	workflow_error_message, workflow_error_text,
};
use crate::discord::utils::shared_components::{button_rows, field_inputs, question_inputs};
use crate::discord::utils::timestamp::interaction_time;
use crate::workflow::engine::Created;
use crate::workflow::error::{ProvisioningDegraded, WorkflowError};
use crate::workflow::forms::{FormPage, PageOutcome, single_page_payload};
use crate::workflow::kind::{FormSchema, RequestKind};
use crate::workflow::platform::{ActionButton, ButtonKind};
use crate::workflow::request::RequestPayload;
use miette::bail;
use tokio::sync::RwLock;
use twilight_http::client::Client;
use twilight_mention::fmt::Mention;
use twilight_model::application::interaction::message_component::MessageComponentInteractionData;
use twilight_model::application::interaction::modal::ModalInteractionData;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::http::interaction::InteractionResponse;
use twilight_model::id::Id;
use twilight_model::id::marker::{ApplicationMarker, GuildMarker, UserMarker};
use type_map::concurrent::TypeMap;

fn page_modal(page: &FormPage) -> InteractionResponse {
	let descriptor = page.kind.descriptor();
	modal(
		format!("page/{}/{}", page.kind.as_id(), page.page),
		format!("{} ({}/{})", descriptor.display_name, page.page + 1, page.page_count),
		question_inputs(page.first_question, page.questions),
	)
}

fn continue_prompt(kind: RequestKind, next_page: usize, page_count: usize) -> InteractionResponse {
	let button = ActionButton {
		custom_id: format!("page/{}/{}", kind.as_id(), next_page),
		label: format!("Continue ({}/{})", next_page + 1, page_count),
		kind: ButtonKind::Primary,
		disabled: false,
	};
	ephemeral_message_with_components(
		format!(
			"Page {} of {} saved. Continue when you're ready; your answers are kept for a while.",
			next_page, page_count
		),
		button_rows(&[button]),
	)
}

/// Describes a newly created request to the member who opened it.
fn creation_reply(created: &Created) -> String {
	let request = &created.request;
	match (&created.degraded, request.channel_id) {
		(None, Some(channel_id)) => format!(
			"Your {} **{}** was created. Continue in {}.",
			request.kind,
			request.id,
			channel_id.mention()
		),
		(Some(ProvisioningDegraded::MissingParent), _) | (None, None) => format!(
			"Your {} **{}** was created. Staff will be in touch.",
			request.kind, request.id
		),
		(Some(ProvisioningDegraded::Platform(_)), _) => format!(
			"Your {} **{}** was created, but I couldn't open a channel for it. Staff have been notified and will be in touch.",
			request.kind, request.id
		),
	}
}

fn path_kind(custom_id_path: &[String]) -> miette::Result<RequestKind> {
	let Some(kind_id) = custom_id_path.get(1) else {
		bail!("Invalid custom ID for request form (parts: {:?})", custom_id_path);
	};
	match RequestKind::from_id(kind_id) {
		Some(kind) => Ok(kind),
		None => bail!("Unknown request kind in custom ID (parts: {:?})", custom_id_path),
	}
}

fn path_page(custom_id_path: &[String]) -> miette::Result<usize> {
	match custom_id_path.get(2).map(|page| page.parse::<usize>()) {
		Some(Ok(page)) => Ok(page),
		_ => bail!("Invalid page in custom ID (parts: {:?})", custom_id_path),
	}
}

fn interaction_member(interaction: &InteractionCreate) -> miette::Result<(Id<GuildMarker>, Id<UserMarker>)> {
	let Some(guild_id) = interaction.guild_id else {
		bail!("Request form was used outside of a guild");
	};
	let Some(user_id) = interaction.author_id() else {
		bail!("Request form was used by a non-user");
	};
	Ok((guild_id, user_id))
}

/// Handles a member picking a kind of request from the panel by showing them the first form for it.
pub async fn handle_panel_select(
	interaction: &InteractionCreate,
	interaction_data: &MessageComponentInteractionData,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
	bot_state: &RwLock<TypeMap>,
) -> miette::Result<()> {
	let (guild_id, user_id) = interaction_member(interaction)?;
	let Some(kind) = interaction_data
		.values
		.first()
		.and_then(|kind_id| RequestKind::from_id(kind_id))
	else {
		bail!("Unknown request kind selected from panel: {:?}", interaction_data.values);
	};

	if let Err(error) = engine.check_can_open(guild_id, user_id, kind).await {
		return send_response(interaction, http_client, application_id, &workflow_error_message(&error)).await;
	}

	let descriptor = kind.descriptor();
	let response = match descriptor.schema {
		FormSchema::SinglePage(fields) => modal(
			format!("form/{}", kind.as_id()),
			descriptor.display_name,
			field_inputs(fields),
		),
		FormSchema::MultiPage(_) => {
			let now = interaction_time(interaction.id);
			let page = with_form_sessions(bot_state, |sessions| {
				sessions.start(user_id, kind, guild_id, now);
				sessions.current_page(user_id, now)
			})
			.await;
			match page {
				Ok(page) => page_modal(&page),
				Err(error) => workflow_error_message(&error),
			}
		}
	};
	send_response(interaction, http_client, application_id, &response).await
}

/// Shows the next page of a multi-page form when the member presses its continue button.
pub async fn handle_continue_button(
	interaction: &InteractionCreate,
	custom_id_path: &[String],
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	bot_state: &RwLock<TypeMap>,
) -> miette::Result<()> {
	let (_, user_id) = interaction_member(interaction)?;
	let kind = path_kind(custom_id_path)?;
	let page_number = path_page(custom_id_path)?;

	let now = interaction_time(interaction.id);
	let page = with_form_sessions(bot_state, |sessions| sessions.current_page(user_id, now)).await;
	let response = match page {
		Ok(page) if page.kind == kind && page.page == page_number => page_modal(&page),
		Ok(_) => workflow_error_message(&WorkflowError::SessionExpired),
		Err(error) => workflow_error_message(&error),
	};
	send_response(interaction, http_client, application_id, &response).await
}

/// Creates a request from a submitted single-page form.
pub async fn handle_form_modal(
	interaction: &InteractionCreate,
	modal_data: &ModalInteractionData,
	custom_id_path: &[String],
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	let kind = path_kind(custom_id_path)?;
	let FormSchema::SinglePage(fields) = kind.descriptor().schema else {
		bail!("Single-page form submitted for multi-page kind {}", kind.as_id());
	};

	let values = modal_values(modal_data);
	let (title, payload) = single_page_payload(fields, &values);
	let title = if title.is_empty() {
		kind.descriptor().display_name.to_string()
	} else {
		title
	};
	create_request(
		interaction,
		kind,
		title,
		payload,
		http_client,
		application_id,
		engine,
	)
	.await
}

/// Records one page of a multi-page form, creating the request once the last page is in.
pub async fn handle_page_modal(
	interaction: &InteractionCreate,
	modal_data: &ModalInteractionData,
	custom_id_path: &[String],
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
	bot_state: &RwLock<TypeMap>,
) -> miette::Result<()> {
	let (_, user_id) = interaction_member(interaction)?;
	let kind = path_kind(custom_id_path)?;
	let page_number = path_page(custom_id_path)?;

	let answers: Vec<(usize, String)> = modal_values(modal_data)
		.into_iter()
		.filter_map(|(custom_id, value)| {
			let index = custom_id.strip_prefix("question/")?.parse::<usize>().ok()?;
			Some((index, value))
		})
		.collect();

	let now = interaction_time(interaction.id);
	let outcome = with_form_sessions(bot_state, |sessions| {
		sessions.submit_page(user_id, kind, page_number, answers, now)
	})
	.await;
	match outcome {
		Ok(PageOutcome::Continue { next_page, page_count }) => {
			let response = continue_prompt(kind, next_page, page_count);
			send_response(interaction, http_client, application_id, &response).await
		}
		Ok(PageOutcome::Complete(form)) => {
			let kind = form.kind;
			create_request(
				interaction,
				kind,
				kind.descriptor().display_name.to_string(),
				form.into_payload(),
				http_client,
				application_id,
				engine,
			)
			.await
		}
		Err(error) => send_response(interaction, http_client, application_id, &workflow_error_message(&error)).await,
	}
}

async fn create_request(
	interaction: &InteractionCreate,
	kind: RequestKind,
	title: String,
	payload: RequestPayload,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	let (guild_id, user_id) = interaction_member(interaction)?;
	send_response(interaction, http_client, application_id, &deferred_ephemeral()).await?;
	let content = match engine
		.create(guild_id, user_id, kind, title, payload, interaction_time(interaction.id))
		.await
	{
		Ok(created) => creation_reply(&created),
		Err(error) => workflow_error_text(&error),
	};
	update_deferred(interaction, http_client, application_id, &content).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::workflow::error::PlatformError;
	use crate::workflow::testing::sample_request;
	use twilight_model::channel::message::Component;

	#[test]
	fn page_modals_are_numbered_from_one() {
		let page = FormPage {
			kind: RequestKind::AdminApplication,
			page: 3,
			page_count: 4,
			first_question: 15,
			questions: &["a", "b", "c", "d"],
		};
		let response = page_modal(&page);
		let data = response.data.unwrap();
		assert_eq!(data.custom_id.as_deref(), Some("page/app-admin/3"));
		assert_eq!(data.title.as_deref(), Some("Administrator Application (4/4)"));
		assert_eq!(data.components.map(|rows| rows.len()), Some(4));
	}

	#[test]
	fn continue_button_targets_the_next_page() {
		let response = continue_prompt(RequestKind::ModeratorApplication, 1, 3);
		let rows = response.data.unwrap().components.unwrap();
		let Component::ActionRow(row) = &rows[0] else {
			panic!("expected an action row");
		};
		let Component::Button(button) = &row.components[0] else {
			panic!("expected a button");
		};
		assert_eq!(button.custom_id.as_deref(), Some("page/app-moderator/1"));
		assert_eq!(button.label.as_deref(), Some("Continue (2/3)"));
	}

	#[test]
	fn creation_reply_reflects_provisioning() {
		let request = sample_request(RequestKind::Bug, "BUG-0004");
		let created = Created {
			request: request.clone(),
			degraded: None,
		};
		assert!(creation_reply(&created).contains("<#900>"));

		let mut without_channel = request;
		without_channel.channel_id = None;
		let degraded = Created {
			request: without_channel,
			degraded: Some(ProvisioningDegraded::Platform(PlatformError(String::from("Missing Access")))),
		};
		assert!(creation_reply(&degraded).contains("couldn't open a channel"));
	}

	#[test]
	fn custom_ids_are_parsed() {
		let path: Vec<String> = ["page", "app-event-host", "1"].iter().map(|s| s.to_string()).collect();
		assert_eq!(path_kind(&path).unwrap(), RequestKind::EventHostApplication);
		assert_eq!(path_page(&path).unwrap(), 1);
		let broken: Vec<String> = ["page", "complaint"].iter().map(|s| s.to_string()).collect();
		assert!(path_kind(&broken).is_err());
		assert!(path_page(&broken).is_err());
	}
}
