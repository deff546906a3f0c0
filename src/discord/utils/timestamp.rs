// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, TimeZone, Utc};
use twilight_model::util::datetime::Timestamp;
use twilight_util::snowflake::Snowflake;

/// Gets the timestamp from the ID snowflake. If any failures occur in the conversion, returns `None`.
pub fn datetime_from_id(id: impl Snowflake) -> Option<DateTime<Utc>> {
	let timestamp = id.timestamp();
	Utc.timestamp_millis_opt(timestamp).single()
}

/// Gets the time an interaction was created, falling back to the current time.
pub fn interaction_time(id: impl Snowflake) -> DateTime<Utc> {
	datetime_from_id(id).unwrap_or_else(Utc::now)
}

/// Gets the [DateTime] object for a timestamp from Discord. If any failures occur in the conversion, returns `None`.
pub fn datetime_from_timestamp(timestamp: &Timestamp) -> Option<DateTime<Utc>> {
	let micros = timestamp.as_micros();
	Utc.timestamp_micros(micros).single()
}

#[cfg(test)]
mod tests {
	use super::*;
	use twilight_model::id::Id;
	use twilight_model::id::marker::InteractionMarker;

	#[test]
	fn snowflakes_carry_their_creation_time() {
		// Discord's documentation example snowflake
		let id: Id<InteractionMarker> = Id::new(175928847299117063);
		let time = datetime_from_id(id).unwrap();
		assert_eq!(time.to_rfc3339(), "2016-04-30T11:18:25.796+00:00");
	}

	#[test]
	fn timestamps_convert_exactly() {
		let timestamp = Timestamp::from_micros(1_700_000_000_123_456).unwrap();
		let time = datetime_from_timestamp(&timestamp).unwrap();
		assert_eq!(time.timestamp_micros(), 1_700_000_000_123_456);
	}
}
