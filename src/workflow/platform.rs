// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::error::PlatformError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, RoleMarker, UserMarker};

/// Who a channel access entry applies to
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessSubject {
	Everyone,
	Role(Id<RoleMarker>),
	User(Id<UserMarker>),
}

/// What a channel access entry allows
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessLevel {
	/// Can see and write in the channel
	ReadWrite,
	Hidden,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AccessEntry {
	pub subject: AccessSubject,
	pub level: AccessLevel,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ButtonKind {
	Primary,
	Secondary,
	Success,
	Danger,
}

/// A button shown under a message. `custom_id` is routed back through the interaction handlers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionButton {
	pub custom_id: String,
	pub label: String,
	pub kind: ButtonKind,
	pub disabled: bool,
}

/// A platform-neutral message to post
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OutgoingMessage {
	pub content: String,
	pub buttons: Vec<ActionButton>,
}

impl OutgoingMessage {
	pub fn text(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			buttons: Vec::new(),
		}
	}
}

/// A message read back from a request channel's history
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistoryMessage {
	pub author_id: Id<UserMarker>,
	pub author_name: String,
	pub content: String,
	pub sent_at: DateTime<Utc>,
	pub attachments: Vec<HistoryAttachment>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistoryAttachment {
	pub file_name: String,
	/// Where the file can be downloaded from
	pub url: String,
}

/// The messaging platform collaborator.
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
	async fn create_channel(
		&self,
		guild_id: Id<GuildMarker>,
		name: &str,
		parent_id: Id<ChannelMarker>,
		access: &[AccessEntry],
	) -> Result<Id<ChannelMarker>, PlatformError>;

	async fn edit_access(&self, channel_id: Id<ChannelMarker>, entry: AccessEntry) -> Result<(), PlatformError>;

	async fn delete_channel(&self, channel_id: Id<ChannelMarker>) -> Result<(), PlatformError>;

	async fn send_message(
		&self,
		channel_id: Id<ChannelMarker>,
		message: &OutgoingMessage,
	) -> Result<Id<MessageMarker>, PlatformError>;

	async fn edit_message(
		&self,
		channel_id: Id<ChannelMarker>,
		message_id: Id<MessageMarker>,
		message: &OutgoingMessage,
	) -> Result<(), PlatformError>;

	async fn send_direct_message(&self, user_id: Id<UserMarker>, content: &str) -> Result<(), PlatformError>;

	/// Uploads a file to a channel with an accompanying message.
	async fn send_document(
		&self,
		channel_id: Id<ChannelMarker>,
		file_name: &str,
		document: Vec<u8>,
		caption: &str,
	) -> Result<(), PlatformError>;

	/// Gets up to `limit` of the most recent messages in the channel, oldest first.
	async fn fetch_recent_messages(
		&self,
		channel_id: Id<ChannelMarker>,
		limit: u16,
	) -> Result<Vec<HistoryMessage>, PlatformError>;
}
