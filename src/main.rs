// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use miette::IntoDiagnostic;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use twilight_requests::config::parse_config;
use twilight_requests::database::{connect_db, run_embedded_migrations};
use twilight_requests::discord::{DiscordMessenger, run_bot, set_up_client};
use twilight_requests::scheduler::run_scheduler;
use twilight_requests::store::PgRequestStore;
use twilight_requests::workflow::engine::{EngineOptions, WorkflowEngine};
use twilight_requests::workflow::forms::{FormSessions, SessionPolicy};
use type_map::concurrent::TypeMap;

#[tokio::main]
async fn main() -> miette::Result<()> {
	let config_path = std::env::args().nth(1).unwrap_or_else(|| String::from("config.kdl"));
	let config = Arc::new(parse_config(&config_path).await?);

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.log_level.as_str().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let db_connection_pool = connect_db(&config.database)?;
	run_embedded_migrations(&db_connection_pool)?;
	let store = Arc::new(PgRequestStore::new(db_connection_pool));

	let http_client = set_up_client(&config);
	let bot_user_id = {
		let user_response = http_client.current_user().await.into_diagnostic()?;
		user_response.model().await.into_diagnostic()?.id
	};
	let messenger = Arc::new(DiscordMessenger::new(Arc::clone(&http_client), bot_user_id));

	let (shutdown_sender, shutdown) = watch::channel(false);
	let shutdown_sender = Arc::new(shutdown_sender);
	let options = EngineOptions {
		channel_delete_grace: config.workflow.channel_delete_grace,
		transcript_message_limit: config.workflow.transcript_message_limit,
	};
	let engine = Arc::new(WorkflowEngine::new(store, messenger, options, shutdown.clone()));

	let mut bot_state = TypeMap::new();
	bot_state.insert(FormSessions::new(SessionPolicy {
		ttl: config.workflow.session_ttl,
		max_sessions: config.workflow.max_form_sessions,
	}));
	let bot_state = Arc::new(RwLock::new(bot_state));

	let scheduler_task = {
		let engine = Arc::clone(&engine);
		let bot_state = Arc::clone(&bot_state);
		let sweep_interval = config.workflow.sweep_interval;
		let shutdown = shutdown.clone();
		tokio::spawn(async move { run_scheduler(&engine, &bot_state, sweep_interval, shutdown).await })
	};

	let signal_sender = Arc::clone(&shutdown_sender);
	tokio::spawn(async move {
		if let Err(error) = tokio::signal::ctrl_c().await {
			tracing::error!(source = ?error, "Failed to listen for shutdown signal");
			return;
		}
		tracing::info!("Shutdown requested");
		signal_sender.send_replace(true);
	});

	tracing::info!("Starting request bot");
	let bot_result = run_bot(config, http_client, engine, bot_state, shutdown).await;
	shutdown_sender.send_replace(true);

	if let Err(error) = scheduler_task.await {
		tracing::error!(source = ?error, "Maintenance scheduler task failed");
	}
	bot_result
}
