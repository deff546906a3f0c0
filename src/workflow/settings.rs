// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::kind::RequestKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker};

pub const CURRENT_SETTINGS_VERSION: u32 = 2;

/// A guild's configuration for the request workflow.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GuildRequestSettings {
	pub version: u32,
	pub guild_id: Id<GuildMarker>,
	pub enabled: bool,
	/// The channel category under which each kind's request channels are created
	#[serde(default)]
	pub categories: BTreeMap<RequestKind, Id<ChannelMarker>>,
	/// Roles that are staff for every kind of request
	#[serde(default)]
	pub staff_roles: Vec<Id<RoleMarker>>,
	/// Roles that are additionally staff for a specific kind
	#[serde(default)]
	pub kind_staff_roles: BTreeMap<RequestKind, Vec<Id<RoleMarker>>>,
	pub transcript_channel: Option<Id<ChannelMarker>>,
	pub voting_channel: Option<Id<ChannelMarker>>,
	pub showcase_channel: Option<Id<ChannelMarker>>,
	/// Net votes at which a request is approved automatically. 0 disables.
	pub approve_threshold: u32,
	/// Net down-votes at which a request is denied automatically. 0 disables.
	pub deny_threshold: u32,
	/// Days after which voting requests expire. 0 disables.
	pub expire_days: u32,
}

/// The first settings layout, from before staff roles and categories could vary by request kind
#[derive(Debug, Deserialize)]
struct SettingsV1 {
	guild_id: Id<GuildMarker>,
	#[serde(default = "enabled_by_default")]
	enabled: bool,
	category: Option<Id<ChannelMarker>>,
	staff_role: Option<Id<RoleMarker>>,
	transcript_channel: Option<Id<ChannelMarker>>,
	suggestion_channel: Option<Id<ChannelMarker>>,
	#[serde(default)]
	vote_threshold: u32,
	#[serde(default)]
	expire_days: u32,
}

fn enabled_by_default() -> bool {
	true
}

impl From<SettingsV1> for GuildRequestSettings {
	fn from(legacy: SettingsV1) -> Self {
		let categories = match legacy.category {
			Some(category) => RequestKind::all().into_iter().map(|kind| (kind, category)).collect(),
			None => BTreeMap::new(),
		};
		Self {
			version: CURRENT_SETTINGS_VERSION,
			guild_id: legacy.guild_id,
			enabled: legacy.enabled,
			categories,
			staff_roles: legacy.staff_role.into_iter().collect(),
			kind_staff_roles: BTreeMap::new(),
			transcript_channel: legacy.transcript_channel,
			voting_channel: legacy.suggestion_channel,
			showcase_channel: None,
			approve_threshold: legacy.vote_threshold,
			deny_threshold: legacy.vote_threshold,
			expire_days: legacy.expire_days,
		}
	}
}

impl GuildRequestSettings {
	pub fn new(guild_id: Id<GuildMarker>) -> Self {
		Self {
			version: CURRENT_SETTINGS_VERSION,
			guild_id,
			enabled: false,
			categories: BTreeMap::new(),
			staff_roles: Vec::new(),
			kind_staff_roles: BTreeMap::new(),
			transcript_channel: None,
			voting_channel: None,
			showcase_channel: None,
			approve_threshold: 0,
			deny_threshold: 0,
			expire_days: 0,
		}
	}

	/// Reads a stored settings document, migrating older layouts to the current one.
	pub fn from_document(document: &str) -> Result<Self, serde_json::Error> {
		let value: serde_json::Value = serde_json::from_str(document)?;
		let version = value.get("version").and_then(|version| version.as_u64()).unwrap_or(1);
		if version < u64::from(CURRENT_SETTINGS_VERSION) {
			let legacy: SettingsV1 = serde_json::from_value(value)?;
			return Ok(legacy.into());
		}
		serde_json::from_value(value)
	}

	pub fn to_document(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	/// All roles that count as staff for the given kind of request.
	pub fn staff_roles_for(&self, kind: RequestKind) -> Vec<Id<RoleMarker>> {
		let mut roles = self.staff_roles.clone();
		if let Some(kind_roles) = self.kind_staff_roles.get(&kind) {
			for role in kind_roles {
				if !roles.contains(role) {
					roles.push(*role);
				}
			}
		}
		roles
	}

	pub fn category_for(&self, kind: RequestKind) -> Option<Id<ChannelMarker>> {
		self.categories.get(&kind).copied()
	}
}

/// The user performing an operation, along with what they're allowed to do in the guild.
#[derive(Clone, Debug)]
pub struct Actor {
	pub user_id: Id<UserMarker>,
	pub roles: Vec<Id<RoleMarker>>,
	pub is_administrator: bool,
}

impl Actor {
	pub fn new(user_id: Id<UserMarker>, roles: Vec<Id<RoleMarker>>, is_administrator: bool) -> Self {
		Self {
			user_id,
			roles,
			is_administrator,
		}
	}

	pub fn is_staff_for(&self, settings: &GuildRequestSettings, kind: RequestKind) -> bool {
		if self.is_administrator {
			return true;
		}
		settings
			.staff_roles_for(kind)
			.iter()
			.any(|role| self.roles.contains(role))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn legacy_documents_are_migrated() {
		let document = r#"{
			"guild_id": "100",
			"category": "200",
			"staff_role": "300",
			"transcript_channel": "400",
			"suggestion_channel": "500",
			"vote_threshold": 5,
			"expire_days": 14
		}"#;
		let settings = GuildRequestSettings::from_document(document).unwrap();
		assert_eq!(settings.version, CURRENT_SETTINGS_VERSION);
		assert!(settings.enabled);
		assert_eq!(settings.category_for(RequestKind::Bug), Some(Id::new(200)));
		assert_eq!(settings.staff_roles, vec![Id::new(300)]);
		assert_eq!(settings.voting_channel, Some(Id::new(500)));
		assert_eq!(settings.approve_threshold, 5);
		assert_eq!(settings.deny_threshold, 5);
		assert_eq!(settings.expire_days, 14);
	}

	#[test]
	fn current_documents_survive_storage() {
		let mut settings = GuildRequestSettings::new(Id::new(1));
		settings.enabled = true;
		settings.categories.insert(RequestKind::Suggestion, Id::new(2));
		settings.kind_staff_roles.insert(RequestKind::Bug, vec![Id::new(3)]);
		settings.approve_threshold = 3;
		let document = settings.to_document().unwrap();
		assert_eq!(GuildRequestSettings::from_document(&document).unwrap(), settings);
	}

	#[test]
	fn kind_staff_roles_extend_global_roles() {
		let mut settings = GuildRequestSettings::new(Id::new(1));
		settings.staff_roles = vec![Id::new(10)];
		settings.kind_staff_roles.insert(RequestKind::Bug, vec![Id::new(10), Id::new(11)]);
		assert_eq!(settings.staff_roles_for(RequestKind::Bug), vec![Id::new(10), Id::new(11)]);
		assert_eq!(settings.staff_roles_for(RequestKind::Ticket), vec![Id::new(10)]);

		let developer = Actor::new(Id::new(5), vec![Id::new(11)], false);
		assert!(developer.is_staff_for(&settings, RequestKind::Bug));
		assert!(!developer.is_staff_for(&settings, RequestKind::Ticket));
		let admin = Actor::new(Id::new(6), Vec::new(), true);
		assert!(admin.is_staff_for(&settings, RequestKind::Ticket));
	}
}
