// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::discord::Engine;
use crate::discord::utils::permissions::{can_manage_requests, channel_permissions};
use crate::discord::utils::responses::{
	category_missing_permissions_message, ephemeral_message, send_response, workflow_error_message,
};
use crate::workflow::kind::RequestKind;
use crate::workflow::settings::GuildRequestSettings;
use miette::{bail, ensure};
use twilight_http::client::Client;
use twilight_mention::fmt::Mention;
use twilight_model::application::command::{Command, CommandOption, CommandType};
use twilight_model::application::interaction::InteractionContextType;
use twilight_model::application::interaction::application_command::{
	CommandData, CommandDataOption, CommandOptionValue,
};
use twilight_model::channel::ChannelType;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::guild::Permissions;
use twilight_model::id::Id;
use twilight_model::id::marker::{ApplicationMarker, ChannelMarker, GuildMarker};
use twilight_util::builder::command::{
	BooleanBuilder, ChannelBuilder, CommandBuilder, IntegerBuilder, RoleBuilder, StringBuilder, SubCommandBuilder,
};

fn kind_option(description: &str, required: bool) -> CommandOption {
	let choices: Vec<(String, String)> = RequestKind::all()
		.into_iter()
		.map(|kind| (kind.descriptor().display_name.to_string(), kind.as_id().to_string()))
		.collect();
	StringBuilder::new("kind", description)
		.choices(choices)
		.required(required)
		.build()
}

fn destination_subcommand(name: &str, description: &str) -> CommandOption {
	let channel_option = ChannelBuilder::new("channel", "The channel to use; leave out to clear the setting")
		.channel_types([ChannelType::GuildText, ChannelType::GuildAnnouncement])
		.required(false)
		.build();
	SubCommandBuilder::new(name, description).option(channel_option).build()
}

pub fn command_definition() -> Command {
	let show_subcommand = SubCommandBuilder::new("show", "Shows the current request settings").build();

	let enabled_option = BooleanBuilder::new("enabled", "Whether members can open requests")
		.required(true)
		.build();
	let enabled_subcommand = SubCommandBuilder::new("enabled", "Turns requests on or off for this server")
		.option(enabled_option)
		.build();

	let category_option = ChannelBuilder::new(
		"category",
		"The category new channels go in; leave out to stop creating channels",
	)
	.channel_types([ChannelType::GuildCategory])
	.required(false)
	.build();
	let category_subcommand = SubCommandBuilder::new("category", "Sets where channels for a kind of request are created")
		.option(kind_option("The kind of request", true))
		.option(category_option)
		.build();

	let action_option = StringBuilder::new("action", "Whether to add or remove the role")
		.choices([("add", "add"), ("remove", "remove")])
		.required(true)
		.build();
	let role_option = RoleBuilder::new("role", "The staff role").required(true).build();
	let staff_role_subcommand = SubCommandBuilder::new("staff_role", "Adds or removes a role that handles requests")
		.option(action_option)
		.option(role_option)
		.option(kind_option(
			"Only handle this kind of request; leave out for every kind",
			false,
		))
		.build();

	let approve_option = IntegerBuilder::new("approve", "Net votes that approve a suggestion; 0 turns this off")
		.min_value(0)
		.max_value(1000)
		.required(true)
		.build();
	let deny_option = IntegerBuilder::new("deny", "Net down-votes that deny a suggestion; 0 turns this off")
		.min_value(0)
		.max_value(1000)
		.required(true)
		.build();
	let thresholds_subcommand = SubCommandBuilder::new("thresholds", "Sets when community votes resolve a suggestion")
		.option(approve_option)
		.option(deny_option)
		.build();

	let days_option = IntegerBuilder::new("days", "Days a vote may stay open; 0 keeps votes open forever")
		.min_value(0)
		.max_value(365)
		.required(true)
		.build();
	let expiry_subcommand = SubCommandBuilder::new("expiry", "Sets how long community votes stay open")
		.option(days_option)
		.build();

	CommandBuilder::new(
		"request_settings",
		"View or change how requests work on this server",
		CommandType::ChatInput,
	)
	.contexts([InteractionContextType::Guild])
	.default_member_permissions(Permissions::MANAGE_GUILD)
	.option(show_subcommand)
	.option(enabled_subcommand)
	.option(category_subcommand)
	.option(staff_role_subcommand)
	.option(thresholds_subcommand)
	.option(expiry_subcommand)
	.option(destination_subcommand(
		"transcript_channel",
		"Sets where transcripts of resolved requests are uploaded",
	))
	.option(destination_subcommand(
		"voting_channel",
		"Sets where approved suggestions are put to a community vote",
	))
	.option(destination_subcommand(
		"showcase_channel",
		"Sets where suggestions accepted by vote are announced",
	))
	.build()
}

fn option_value<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a CommandOptionValue> {
	options
		.iter()
		.find(|option| option.name == name)
		.map(|option| &option.value)
}

fn kind_value(options: &[CommandDataOption]) -> miette::Result<Option<RequestKind>> {
	match option_value(options, "kind") {
		Some(CommandOptionValue::String(kind_id)) => match RequestKind::from_id(kind_id) {
			Some(kind) => Ok(Some(kind)),
			None => bail!("Unknown request kind passed to `/request_settings`: {}", kind_id),
		},
		Some(other) => bail!("Command data is malformed; expected `kind` to be a string, got {:?}", other),
		None => Ok(None),
	}
}

fn channel_value(options: &[CommandDataOption], name: &str) -> miette::Result<Option<Id<ChannelMarker>>> {
	match option_value(options, name) {
		Some(CommandOptionValue::Channel(channel_id)) => Ok(Some(*channel_id)),
		Some(other) => bail!("Command data is malformed; expected `{}` to be a channel, got {:?}", name, other),
		None => Ok(None),
	}
}

fn integer_value(options: &[CommandDataOption], name: &str) -> miette::Result<u32> {
	let Some(CommandOptionValue::Integer(value)) = option_value(options, name) else {
		bail!("Command data is malformed; expected required integer option `{}`", name);
	};
	ensure!(*value >= 0, "Option `{}` must not be negative", name);
	Ok(u32::try_from(*value).unwrap_or(u32::MAX))
}

fn describe_destination(channel: Option<Id<ChannelMarker>>) -> String {
	match channel {
		Some(channel) => channel.mention().to_string(),
		None => String::from("not set"),
	}
}

fn describe_threshold(threshold: u32) -> String {
	if threshold == 0 {
		String::from("off")
	} else {
		threshold.to_string()
	}
}

/// Summarizes a guild's settings for `/request_settings show`.
pub fn describe_settings(settings: &GuildRequestSettings) -> String {
	let mut lines = vec![format!(
		"**Requests are {}.**",
		if settings.enabled { "enabled" } else { "disabled" }
	)];

	let staff_roles: Vec<String> = settings.staff_roles.iter().map(|role| role.mention().to_string()).collect();
	lines.push(format!(
		"Staff roles: {}",
		if staff_roles.is_empty() {
			String::from("none (only administrators)")
		} else {
			staff_roles.join(", ")
		}
	));

	for kind in RequestKind::all() {
		let descriptor = kind.descriptor();
		let mut line = format!(
			"{} {}: channels in {}",
			descriptor.icon,
			descriptor.display_name,
			describe_destination(settings.category_for(kind))
		);
		if let Some(kind_roles) = settings.kind_staff_roles.get(&kind)
			&& !kind_roles.is_empty()
		{
			let roles: Vec<String> = kind_roles.iter().map(|role| role.mention().to_string()).collect();
			line = format!("{}; also handled by {}", line, roles.join(", "));
		}
		lines.push(line);
	}

	lines.push(format!(
		"Transcripts: {}",
		describe_destination(settings.transcript_channel)
	));
	lines.push(format!("Voting: {}", describe_destination(settings.voting_channel)));
	lines.push(format!("Showcase: {}", describe_destination(settings.showcase_channel)));
	lines.push(format!(
		"Vote thresholds: approve at {}, deny at {}",
		describe_threshold(settings.approve_threshold),
		describe_threshold(settings.deny_threshold)
	));
	lines.push(if settings.expire_days == 0 {
		String::from("Votes never expire")
	} else {
		format!("Votes expire after {} days", settings.expire_days)
	});
	lines.join("\n")
}

pub async fn handle_command(
	interaction: &InteractionCreate,
	command_data: &CommandData,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	let Some(guild_id) = interaction.guild_id else {
		bail!("Request settings command was used outside of a guild");
	};
	let Some(subcommand_data) = command_data.options.first() else {
		bail!("Request settings command invoked with no subcommand");
	};
	let CommandOptionValue::SubCommand(options) = &subcommand_data.value else {
		bail!(
			"Command data is malformed; expected `/request_settings {}` to get subcommand data",
			subcommand_data.name
		);
	};

	let content = match subcommand_data.name.as_str() {
		"show" => engine
			.settings_or_default(guild_id)
			.await
			.map(|settings| describe_settings(&settings)),
		"enabled" => {
			let Some(CommandOptionValue::Boolean(enabled)) = option_value(options, "enabled") else {
				bail!("Command data is malformed; expected required boolean option `enabled`");
			};
			let enabled = *enabled;
			engine
				.update_settings(guild_id, |settings| settings.enabled = enabled)
				.await
				.map(|_| {
					if enabled {
						String::from("Members can now open requests.")
					} else {
						String::from("Requests are now turned off.")
					}
				})
		}
		"category" => {
			let Some(kind) = kind_value(options)? else {
				bail!("Command data is malformed; expected required option `kind`");
			};
			let category = channel_value(options, "category")?;
			if let Some(category) = category
				&& !category_is_usable(guild_id, category, http_client).await
			{
				let response = ephemeral_message(category_missing_permissions_message(category.mention()));
				return send_response(interaction, http_client, application_id, &response).await;
			}
			engine
				.update_settings(guild_id, |settings| match category {
					Some(category) => {
						settings.categories.insert(kind, category);
					}
					None => {
						settings.categories.remove(&kind);
					}
				})
				.await
				.map(|_| match category {
					Some(category) => format!("New {} channels will be created in {}.", kind, category.mention()),
					None => format!("{} requests will no longer get their own channel.", kind),
				})
		}
		"staff_role" => {
			let Some(CommandOptionValue::String(action)) = option_value(options, "action") else {
				bail!("Command data is malformed; expected required string option `action`");
			};
			let Some(CommandOptionValue::Role(role)) = option_value(options, "role") else {
				bail!("Command data is malformed; expected required role option `role`");
			};
			let role = *role;
			let kind = kind_value(options)?;
			let adding = match action.as_str() {
				"add" => true,
				"remove" => false,
				_ => bail!("Unknown staff role action: {}", action),
			};
			engine
				.update_settings(guild_id, |settings| {
					let roles = match kind {
						Some(kind) => settings.kind_staff_roles.entry(kind).or_default(),
						None => &mut settings.staff_roles,
					};
					roles.retain(|existing| *existing != role);
					if adding {
						roles.push(role);
					}
					if let Some(kind) = kind
						&& settings.kind_staff_roles.get(&kind).is_some_and(|roles| roles.is_empty())
					{
						settings.kind_staff_roles.remove(&kind);
					}
				})
				.await
				.map(|_| {
					let scope = match kind {
						Some(kind) => format!("{} requests", kind),
						None => String::from("all requests"),
					};
					if adding {
						format!("{} now handles {}.", role.mention(), scope)
					} else {
						format!("{} no longer handles {}.", role.mention(), scope)
					}
				})
		}
		"thresholds" => {
			let approve = integer_value(options, "approve")?;
			let deny = integer_value(options, "deny")?;
			engine
				.update_settings(guild_id, |settings| {
					settings.approve_threshold = approve;
					settings.deny_threshold = deny;
				})
				.await
				.map(|settings| {
					format!(
						"Vote thresholds updated: approve at {}, deny at {}.",
						describe_threshold(settings.approve_threshold),
						describe_threshold(settings.deny_threshold)
					)
				})
		}
		"expiry" => {
			let days = integer_value(options, "days")?;
			engine
				.update_settings(guild_id, |settings| settings.expire_days = days)
				.await
				.map(|_| {
					if days == 0 {
						String::from("Community votes will stay open until staff resolve them.")
					} else {
						format!("Community votes will expire after {} days.", days)
					}
				})
		}
		destination @ ("transcript_channel" | "voting_channel" | "showcase_channel") => {
			let channel = channel_value(options, "channel")?;
			engine
				.update_settings(guild_id, |settings| match destination {
					"transcript_channel" => settings.transcript_channel = channel,
					"voting_channel" => settings.voting_channel = channel,
					_ => settings.showcase_channel = channel,
				})
				.await
				.map(|_| match channel {
					Some(channel) => format!("Set the {} to {}.", destination.replace('_', " "), channel.mention()),
					None => format!("Cleared the {}.", destination.replace('_', " ")),
				})
		}
		_ => bail!(
			"Unknown request_settings subcommand encountered: {}\n{:?}",
			subcommand_data.name,
			command_data
		),
	};

	let response = match content {
		Ok(content) => ephemeral_message(content),
		Err(error) => workflow_error_message(&error),
	};
	send_response(interaction, http_client, application_id, &response).await
}

async fn category_is_usable(guild_id: Id<GuildMarker>, category: Id<ChannelMarker>, http_client: &Client) -> bool {
	match channel_permissions(guild_id, category, http_client).await {
		Ok(permissions) => can_manage_requests(permissions),
		Err(error) => {
			tracing::warn!(source = ?error, category = %category, "Couldn't check permissions in request category");
			false
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn settings_summary_lists_every_kind() {
		let mut settings = GuildRequestSettings::new(Id::new(1));
		settings.enabled = true;
		settings.staff_roles = vec![Id::new(50)];
		settings.categories.insert(RequestKind::Bug, Id::new(700));
		settings
			.kind_staff_roles
			.insert(RequestKind::ModeratorApplication, vec![Id::new(51)]);
		settings.approve_threshold = 5;
		settings.expire_days = 14;

		let summary = describe_settings(&settings);
		assert!(summary.starts_with("**Requests are enabled.**"));
		assert!(summary.contains("Staff roles: <@&50>"));
		assert!(summary.contains("Bug Report: channels in <#700>"));
		assert!(summary.contains("also handled by <@&51>"));
		assert!(summary.contains("approve at 5, deny at off"));
		assert!(summary.contains("Votes expire after 14 days"));
		assert_eq!(summary.lines().count(), 2 + 7 + 5);
	}

	#[test]
	fn command_has_every_subcommand() {
		let command = command_definition();
		let names: Vec<&str> = command.options.iter().map(|option| option.name.as_str()).collect();
		assert_eq!(
			names,
			[
				"show",
				"enabled",
				"category",
				"staff_role",
				"thresholds",
				"expiry",
				"transcript_channel",
				"voting_channel",
				"showcase_channel"
			]
		);
	}
}
