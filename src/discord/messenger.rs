// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::utils::shared_components::button_rows;
use super::utils::timestamp::datetime_from_timestamp;
use crate::workflow::error::PlatformError;
use crate::workflow::platform::{
	AccessEntry, AccessLevel, AccessSubject, HistoryAttachment, HistoryMessage, Messenger, OutgoingMessage,
};
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Display;
use std::sync::Arc;
use twilight_http::client::Client;
use twilight_model::channel::ChannelType;
use twilight_model::channel::message::AllowedMentions;
use twilight_model::guild::Permissions;
use twilight_model::http::attachment::Attachment;
use twilight_model::http::permission_overwrite::{PermissionOverwrite, PermissionOverwriteType};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

fn platform_error(error: impl Display) -> PlatformError {
	PlatformError(error.to_string())
}

fn read_write_permissions() -> Permissions {
	Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::READ_MESSAGE_HISTORY | Permissions::ATTACH_FILES
}

/// Converts an access entry to a Discord permission overwrite. The guild ID is needed because the `@everyone` role
/// shares the guild's ID.
pub fn permission_overwrite(guild_id: Id<GuildMarker>, entry: AccessEntry) -> PermissionOverwrite {
	let (id, kind) = match entry.subject {
		AccessSubject::Everyone => (guild_id.cast(), PermissionOverwriteType::Role),
		AccessSubject::Role(role_id) => (role_id.cast(), PermissionOverwriteType::Role),
		AccessSubject::User(user_id) => (user_id.cast(), PermissionOverwriteType::Member),
	};
	let (allow, deny) = match entry.level {
		AccessLevel::ReadWrite => (read_write_permissions(), Permissions::empty()),
		AccessLevel::Hidden => (Permissions::empty(), Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES),
	};
	PermissionOverwrite {
		allow: Some(allow),
		deny: Some(deny),
		id,
		kind,
	}
}

/// Carries out workflow side effects through the Discord HTTP API.
pub struct DiscordMessenger {
	http_client: Arc<Client>,
	/// The bot's own user, which is always given access to the channels it creates
	bot_user_id: Id<UserMarker>,
}

impl DiscordMessenger {
	pub fn new(http_client: Arc<Client>, bot_user_id: Id<UserMarker>) -> Self {
		Self {
			http_client,
			bot_user_id,
		}
	}
}

#[async_trait]
impl Messenger for DiscordMessenger {
	async fn create_channel(
		&self,
		guild_id: Id<GuildMarker>,
		name: &str,
		parent_id: Id<ChannelMarker>,
		access: &[AccessEntry],
	) -> Result<Id<ChannelMarker>, PlatformError> {
		let mut overwrites: Vec<PermissionOverwrite> =
			access.iter().map(|entry| permission_overwrite(guild_id, *entry)).collect();
		overwrites.push(permission_overwrite(
			guild_id,
			AccessEntry {
				subject: AccessSubject::User(self.bot_user_id),
				level: AccessLevel::ReadWrite,
			},
		));
		let overwrites: Vec<twilight_model::channel::permission_overwrite::PermissionOverwrite> = overwrites
			.into_iter()
			.map(|o| twilight_model::channel::permission_overwrite::PermissionOverwrite {
				allow: o.allow.unwrap_or_else(Permissions::empty),
				deny: o.deny.unwrap_or_else(Permissions::empty),
				id: o.id,
				kind: (o.kind as u8).into(),
			})
			.collect();

		let channel = self
			.http_client
			.create_guild_channel(guild_id, name)
			.kind(ChannelType::GuildText)
			.parent_id(parent_id)
			.permission_overwrites(&overwrites)
			.await
			.map_err(platform_error)?
			.model()
			.await
			.map_err(platform_error)?;
		Ok(channel.id)
	}

	async fn edit_access(&self, channel_id: Id<ChannelMarker>, entry: AccessEntry) -> Result<(), PlatformError> {
		let channel = self
			.http_client
			.channel(channel_id)
			.await
			.map_err(platform_error)?
			.model()
			.await
			.map_err(platform_error)?;
		let Some(guild_id) = channel.guild_id else {
			return Err(PlatformError(format!("channel {} isn't in a server", channel_id)));
		};
		let overwrite = permission_overwrite(guild_id, entry);
		self.http_client
			.update_channel_permission(channel_id, &overwrite)
			.await
			.map_err(platform_error)?;
		Ok(())
	}

	async fn delete_channel(&self, channel_id: Id<ChannelMarker>) -> Result<(), PlatformError> {
		self.http_client
			.delete_channel(channel_id)
			.await
			.map_err(platform_error)?;
		Ok(())
	}

	async fn send_message(
		&self,
		channel_id: Id<ChannelMarker>,
		message: &OutgoingMessage,
	) -> Result<Id<MessageMarker>, PlatformError> {
		let components = button_rows(&message.buttons);
		let sent_message = self
			.http_client
			.create_message(channel_id)
			.content(&message.content)
			.components(&components)
			.allowed_mentions(Some(&AllowedMentions::default()))
			.await
			.map_err(platform_error)?
			.model()
			.await
			.map_err(platform_error)?;
		Ok(sent_message.id)
	}

	async fn edit_message(
		&self,
		channel_id: Id<ChannelMarker>,
		message_id: Id<MessageMarker>,
		message: &OutgoingMessage,
	) -> Result<(), PlatformError> {
		let components = button_rows(&message.buttons);
		self.http_client
			.update_message(channel_id, message_id)
			.content(Some(&message.content))
			.components(Some(&components))
			.allowed_mentions(Some(&AllowedMentions::default()))
			.await
			.map_err(platform_error)?;
		Ok(())
	}

	async fn send_direct_message(&self, user_id: Id<UserMarker>, content: &str) -> Result<(), PlatformError> {
		let channel = self
			.http_client
			.create_private_channel(user_id)
			.await
			.map_err(platform_error)?
			.model()
			.await
			.map_err(platform_error)?;
		self.http_client
			.create_message(channel.id)
			.content(content)
			.await
			.map_err(platform_error)?;
		Ok(())
	}

	async fn send_document(
		&self,
		channel_id: Id<ChannelMarker>,
		file_name: &str,
		document: Vec<u8>,
		caption: &str,
	) -> Result<(), PlatformError> {
		let attachments = [Attachment::from_bytes(file_name.to_string(), document, 1)];
		self.http_client
			.create_message(channel_id)
			.content(caption)
			.attachments(&attachments)
			.allowed_mentions(Some(&AllowedMentions::default()))
			.await
			.map_err(platform_error)?;
		Ok(())
	}

	async fn fetch_recent_messages(
		&self,
		channel_id: Id<ChannelMarker>,
		limit: u16,
	) -> Result<Vec<HistoryMessage>, PlatformError> {
		let messages = self
			.http_client
			.channel_messages(channel_id)
			.limit(limit.clamp(1, 100))
			.await
			.map_err(platform_error)?
			.models()
			.await
			.map_err(platform_error)?;

		// Discord returns the newest message first
		let history = messages
			.into_iter()
			.rev()
			.map(|message| HistoryMessage {
				author_id: message.author.id,
				author_name: message.author.global_name.unwrap_or(message.author.name),
				content: message.content,
				sent_at: datetime_from_timestamp(&message.timestamp).unwrap_or_else(Utc::now),
				attachments: message
					.attachments
					.into_iter()
					.map(|attachment| HistoryAttachment {
						file_name: attachment.filename,
						url: attachment.url,
					})
					.collect(),
			})
			.collect();
		Ok(history)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn everyone_is_the_guild_role() {
		let guild_id = Id::new(77);
		let overwrite = permission_overwrite(
			guild_id,
			AccessEntry {
				subject: AccessSubject::Everyone,
				level: AccessLevel::Hidden,
			},
		);
		assert_eq!(overwrite.id.get(), 77);
		assert_eq!(overwrite.kind, PermissionOverwriteType::Role);
		assert_eq!(overwrite.allow, Some(Permissions::empty()));
		assert!(overwrite.deny.unwrap().contains(Permissions::VIEW_CHANNEL));
	}

	#[test]
	fn members_can_write_and_attach() {
		let overwrite = permission_overwrite(
			Id::new(77),
			AccessEntry {
				subject: AccessSubject::User(Id::new(5)),
				level: AccessLevel::ReadWrite,
			},
		);
		assert_eq!(overwrite.id.get(), 5);
		assert_eq!(overwrite.kind, PermissionOverwriteType::Member);
		let allow = overwrite.allow.unwrap();
		assert!(allow.contains(Permissions::SEND_MESSAGES | Permissions::ATTACH_FILES));
		assert_eq!(overwrite.deny, Some(Permissions::empty()));
	}
}
