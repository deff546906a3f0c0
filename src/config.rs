// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::TimeDelta;
use kdl::{KdlDocument, KdlValue};
use miette::{Diagnostic, IntoDiagnostic, Result};
use std::fmt;
use std::time::Duration;
use tokio::fs::read_to_string;

#[derive(Debug)]
pub struct ConfigData {
	pub discord: DiscordConfig,
	pub database: DatabaseConfig,
	pub workflow: WorkflowConfig,
	/// Default log filter, used when `RUST_LOG` isn't set
	pub log_level: String,
}

#[derive(Debug)]
pub struct DiscordConfig {
	pub bot_token: String,
}

#[derive(Debug)]
pub struct DatabaseConfig {
	pub host: String,
	pub port: Option<u16>,
	pub username: String,
	pub password: String,
	pub database: String,
}

#[derive(Debug)]
pub struct WorkflowConfig {
	/// How often stale voting requests are expired and abandoned form sessions are dropped
	pub sweep_interval: Duration,
	pub channel_delete_grace: Duration,
	pub transcript_message_limit: u16,
	/// `None` means form sessions never time out.
	pub session_ttl: Option<TimeDelta>,
	pub max_form_sessions: usize,
}

impl Default for WorkflowConfig {
	fn default() -> Self {
		Self {
			sweep_interval: Duration::from_secs(60 * 60),
			channel_delete_grace: Duration::from_secs(30),
			transcript_message_limit: 100,
			session_ttl: Some(TimeDelta::minutes(30)),
			max_form_sessions: 1000,
		}
	}
}

#[derive(Debug, Diagnostic)]
pub enum ConfigError {
	Missing(String),
	WrongType { name: String, expected: &'static str },
	OutOfRange(String),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Missing(name) => write!(f, "required config value `{}` is missing", name),
			Self::WrongType { name, expected } => write!(f, "config value `{}` must be {}", name, expected),
			Self::OutOfRange(name) => write!(f, "config value `{}` is out of range", name),
		}
	}
}

pub async fn parse_config(config_path: &str) -> Result<ConfigData> {
	let config_file_contents = read_to_string(config_path).await.into_diagnostic()?;
	parse_config_document(&config_file_contents)
}

pub fn parse_config_document(contents: &str) -> Result<ConfigData> {
	let document: KdlDocument = contents.parse()?;

	let discord = section(&document, "discord")?;
	let discord = DiscordConfig {
		bot_token: required_string(discord, "discord", "bot_token")?,
	};

	let database = section(&document, "database")?;
	let database_config = DatabaseConfig {
		host: required_string(database, "database", "host")?,
		port: optional_integer(database, "database", "port")?,
		username: required_string(database, "database", "username")?,
		password: required_string(database, "database", "password")?,
		database: required_string(database, "database", "database")?,
	};

	let mut workflow = WorkflowConfig::default();
	if let Some(section) = document.get("workflow").and_then(|node| node.children()) {
		if let Some(minutes) = optional_integer::<u64>(section, "workflow", "sweep_interval_minutes")? {
			let seconds = minutes.checked_mul(60).filter(|seconds| *seconds > 0);
			let Some(seconds) = seconds else {
				return Err(ConfigError::OutOfRange(String::from("workflow.sweep_interval_minutes")).into());
			};
			workflow.sweep_interval = Duration::from_secs(seconds);
		}
		if let Some(seconds) = optional_integer::<u64>(section, "workflow", "channel_delete_grace_seconds")? {
			workflow.channel_delete_grace = Duration::from_secs(seconds);
		}
		if let Some(limit) = optional_integer::<u16>(section, "workflow", "transcript_message_limit")? {
			workflow.transcript_message_limit = limit;
		}
		if let Some(minutes) = optional_integer::<i64>(section, "workflow", "session_ttl_minutes")? {
			workflow.session_ttl = if minutes <= 0 {
				None
			} else {
				match TimeDelta::try_minutes(minutes) {
					Some(ttl) => Some(ttl),
					None => return Err(ConfigError::OutOfRange(String::from("workflow.session_ttl_minutes")).into()),
				}
			};
		}
		if let Some(max_sessions) = optional_integer::<usize>(section, "workflow", "max_form_sessions")? {
			workflow.max_form_sessions = max_sessions;
		}
	}

	let log_level = match document.get_arg("log_level") {
		Some(value) => value
			.as_string()
			.map(String::from)
			.ok_or_else(|| ConfigError::WrongType {
				name: String::from("log_level"),
				expected: "a string",
			})?,
		None => String::from("info"),
	};

	Ok(ConfigData {
		discord,
		database: database_config,
		workflow,
		log_level,
	})
}

fn section<'a>(document: &'a KdlDocument, name: &str) -> Result<&'a KdlDocument> {
	document
		.get(name)
		.and_then(|node| node.children())
		.ok_or_else(|| ConfigError::Missing(name.to_string()).into())
}

fn required_string(section: &KdlDocument, section_name: &str, name: &str) -> Result<String> {
	let full_name = format!("{}.{}", section_name, name);
	let Some(value) = section.get_arg(name) else {
		return Err(ConfigError::Missing(full_name).into());
	};
	match value.as_string() {
		Some(value) => Ok(value.to_string()),
		None => Err(ConfigError::WrongType {
			name: full_name,
			expected: "a string",
		}
		.into()),
	}
}

fn optional_integer<T: TryFrom<i128>>(section: &KdlDocument, section_name: &str, name: &str) -> Result<Option<T>> {
	let full_name = format!("{}.{}", section_name, name);
	let Some(value) = section.get_arg(name) else {
		return Ok(None);
	};
	let Some(integer) = KdlValue::as_integer(value) else {
		return Err(ConfigError::WrongType {
			name: full_name,
			expected: "an integer",
		}
		.into());
	};
	match T::try_from(integer) {
		Ok(value) => Ok(Some(value)),
		Err(_) => Err(ConfigError::OutOfRange(full_name).into()),
	}
}
