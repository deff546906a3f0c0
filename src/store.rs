// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::database::DbPool;
use crate::model::{self, GuildSettingsRow, RequestChanges, RequestRow, database_id_from_discord};
use crate::schema::{guild_request_settings, request_sequences, requests};
use crate::workflow::error::StoreError;
use crate::workflow::kind::Family;
use crate::workflow::request::Request;
use crate::workflow::settings::GuildRequestSettings;
use crate::workflow::store::{InsertOutcome, RequestFilter, RequestStore};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker};

const FAMILY_INDEX: &str = "requests_one_active_per_family";

const TERMINAL_STATUSES: [model::RequestStatus; 4] = [
	model::RequestStatus::Approved,
	model::RequestStatus::Denied,
	model::RequestStatus::Closed,
	model::RequestStatus::Expired,
];

/// Stores requests and guild settings in Postgres.
#[derive(Clone)]
pub struct PgRequestStore {
	db_connection_pool: DbPool,
}

fn query_error(error: DieselError) -> StoreError {
	StoreError::Query(error.to_string())
}

impl PgRequestStore {
	pub fn new(db_connection_pool: DbPool) -> Self {
		Self { db_connection_pool }
	}

	fn connection(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, StoreError> {
		self.db_connection_pool
			.get()
			.map_err(|error| StoreError::Connection(error.to_string()))
	}

	fn active_in_family(
		db_connection: &mut PgConnection,
		request: &Request,
		family: Family,
	) -> Result<Option<String>, StoreError> {
		requests::table
			.filter(requests::guild_id.eq(database_id_from_discord(request.guild_id.get())))
			.filter(requests::requester_id.eq(database_id_from_discord(request.requester_id.get())))
			.filter(requests::family.eq(family.as_id()))
			.filter(requests::status.ne_all(TERMINAL_STATUSES.to_vec()))
			.select(requests::id)
			.first(db_connection)
			.optional()
			.map_err(query_error)
	}
}

#[async_trait]
impl RequestStore for PgRequestStore {
	async fn guild_settings(&self, guild_id: Id<GuildMarker>) -> Result<Option<GuildRequestSettings>, StoreError> {
		let mut db_connection = self.connection()?;
		let row: Option<GuildSettingsRow> = guild_request_settings::table
			.find(database_id_from_discord(guild_id.get()))
			.select(GuildSettingsRow::as_select())
			.first(&mut db_connection)
			.optional()
			.map_err(query_error)?;
		match row {
			Some(row) => Ok(Some(GuildRequestSettings::from_document(&row.settings)?)),
			None => Ok(None),
		}
	}

	async fn save_guild_settings(&self, settings: &GuildRequestSettings) -> Result<(), StoreError> {
		let row = GuildSettingsRow {
			guild_id: database_id_from_discord(settings.guild_id.get()),
			settings: settings.to_document()?,
		};
		let mut db_connection = self.connection()?;
		diesel::insert_into(guild_request_settings::table)
			.values(&row)
			.on_conflict(guild_request_settings::guild_id)
			.do_update()
			.set(guild_request_settings::settings.eq(&row.settings))
			.execute(&mut db_connection)
			.map_err(query_error)?;
		Ok(())
	}

	async fn all_guild_settings(&self) -> Result<Vec<GuildRequestSettings>, StoreError> {
		let mut db_connection = self.connection()?;
		let rows: Vec<GuildSettingsRow> = guild_request_settings::table
			.select(GuildSettingsRow::as_select())
			.load(&mut db_connection)
			.map_err(query_error)?;
		let mut all_settings = Vec::with_capacity(rows.len());
		for row in rows {
			match GuildRequestSettings::from_document(&row.settings) {
				Ok(settings) => all_settings.push(settings),
				Err(error) => {
					tracing::error!(source = ?error, guild = row.guild_id, "Stored guild settings couldn't be read")
				}
			}
		}
		Ok(all_settings)
	}

	async fn next_sequence(&self, guild_id: Id<GuildMarker>, prefix: &str) -> Result<u32, StoreError> {
		let mut db_connection = self.connection()?;
		let sequence: i32 = diesel::insert_into(request_sequences::table)
			.values((
				request_sequences::guild_id.eq(database_id_from_discord(guild_id.get())),
				request_sequences::prefix.eq(prefix),
				request_sequences::last_value.eq(1),
			))
			.on_conflict((request_sequences::guild_id, request_sequences::prefix))
			.do_update()
			.set(request_sequences::last_value.eq(request_sequences::last_value + 1))
			.returning(request_sequences::last_value)
			.get_result(&mut db_connection)
			.map_err(query_error)?;
		u32::try_from(sequence).map_err(|_| StoreError::Query(format!("sequence for {} is negative", prefix)))
	}

	async fn insert_request(&self, request: &Request, family: Option<Family>) -> Result<InsertOutcome, StoreError> {
		let row = RequestRow::from_request(request, family)?;
		let mut db_connection = self.connection()?;
		let insert_result = diesel::insert_into(requests::table)
			.values(&row)
			.execute(&mut db_connection);
		match insert_result {
			Ok(_) => Ok(InsertOutcome::Inserted),
			Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info))
				if info.constraint_name() == Some(FAMILY_INDEX) =>
			{
				let Some(family) = family else {
					return Err(StoreError::Query(info.message().to_string()));
				};
				let existing_id = Self::active_in_family(&mut db_connection, request, family)?.unwrap_or_default();
				Ok(InsertOutcome::ActiveInFamily { existing_id })
			}
			Err(error) => Err(query_error(error)),
		}
	}

	async fn request(&self, guild_id: Id<GuildMarker>, id: &str) -> Result<Option<Request>, StoreError> {
		let mut db_connection = self.connection()?;
		let row: Option<RequestRow> = requests::table
			.find((database_id_from_discord(guild_id.get()), id))
			.select(RequestRow::as_select())
			.first(&mut db_connection)
			.optional()
			.map_err(query_error)?;
		row.map(RequestRow::into_request).transpose()
	}

	async fn request_by_channel(&self, channel_id: Id<ChannelMarker>) -> Result<Option<Request>, StoreError> {
		let mut db_connection = self.connection()?;
		let row: Option<RequestRow> = requests::table
			.filter(requests::channel_id.eq(database_id_from_discord(channel_id.get())))
			.select(RequestRow::as_select())
			.first(&mut db_connection)
			.optional()
			.map_err(query_error)?;
		row.map(RequestRow::into_request).transpose()
	}

	async fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
		let mut query = requests::table.into_boxed();
		if let Some(guild_id) = filter.guild_id {
			query = query.filter(requests::guild_id.eq(database_id_from_discord(guild_id.get())));
		}
		if let Some(requester_id) = filter.requester_id {
			query = query.filter(requests::requester_id.eq(database_id_from_discord(requester_id.get())));
		}
		if !filter.kinds.is_empty() {
			let kinds: Vec<&str> = filter.kinds.iter().map(|kind| kind.as_id()).collect();
			query = query.filter(requests::kind.eq_any(kinds));
		}
		if !filter.statuses.is_empty() {
			let statuses: Vec<model::RequestStatus> = filter.statuses.iter().map(|status| (*status).into()).collect();
			query = query.filter(requests::status.eq_any(statuses));
		}
		if let Some(created_before) = filter.created_before {
			query = query.filter(requests::created_at.lt(created_before));
		}

		let mut db_connection = self.connection()?;
		let rows: Vec<RequestRow> = query
			.order(requests::created_at.asc())
			.select(RequestRow::as_select())
			.load(&mut db_connection)
			.map_err(query_error)?;
		rows.into_iter().map(RequestRow::into_request).collect()
	}

	async fn update_request(&self, current: &Request, updated: &Request) -> Result<bool, StoreError> {
		let changes = RequestChanges::from_request(updated)?;
		let current_status: model::RequestStatus = current.status.into();
		let mut db_connection = self.connection()?;
		let updated_rows = diesel::update(
			requests::table
				.filter(requests::guild_id.eq(database_id_from_discord(current.guild_id.get())))
				.filter(requests::id.eq(&current.id))
				.filter(requests::status.eq(current_status))
				.filter(requests::revision.eq(current.revision)),
		)
		.set(&changes)
		.execute(&mut db_connection)
		.map_err(query_error)?;
		Ok(updated_rows == 1)
	}
}
