//! Command handlers

use crate::output::Output;
use crate::session::Session;
use crate::{CfgCommands, Commands, MessageCommands, RedisCommands};
use anyhow::Result;

pub mod cfg;
pub mod message;
pub mod nodes;
pub mod profile;
pub mod redis;
pub mod registry;

/// Run one parsed command
///
/// Everything except `config` and `use` needs stored profile state; without
/// it the command stops before any connection attempt.
pub async fn dispatch(command: Commands, session: &mut Session) -> Result<Output> {
    if !matches!(command, Commands::Config { .. } | Commands::Use { .. }) {
        session.require_state()?;
    }

    match command {
        Commands::Config {
            name,
            url,
            port,
            db,
            password,
        } => {
            if name == "list" {
                profile::list(session)
            } else {
                profile::configure(session, &name, url, port, db, password).await
            }
        }
        Commands::Use { name } => profile::use_profile(session, &name).await,
        Commands::Nodes { service, active } => nodes::list(session, service, active).await,
        Commands::Refresh { stale_after } => nodes::refresh(session, stale_after).await,
        Commands::Routes { service } => registry::routes(session, service).await,
        Commands::Services { service } => registry::services(session, service).await,
        Commands::Health { service } => registry::health(session, service).await,
        Commands::Healthlog { service, limit } => {
            registry::health_log(session, &service, limit).await
        }
        Commands::Message { command } => match command {
            MessageCommands::Create => message::create(),
            MessageCommands::Send { file } => message::send(session, &file).await,
            MessageCommands::Queue { file } => message::queue(session, &file).await,
        },
        Commands::Rest { route, payload } => message::rest(session, &route, payload).await,
        Commands::Cfg { command } => match command {
            CfgCommands::Push { label, file } => cfg::push(session, &label, &file).await,
            CfgCommands::Pull { label } => cfg::pull(session, &label).await,
            CfgCommands::List { service } => cfg::list(session, service).await,
            CfgCommands::Remove { label } => cfg::remove(session, &label).await,
        },
        Commands::Redis { command } => match command {
            RedisCommands::Info => redis::info(session).await,
        },
        Commands::Shell => redis::shell(session).await,
    }
}
