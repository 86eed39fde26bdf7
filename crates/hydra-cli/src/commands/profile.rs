use crate::output::Output;
use crate::session::Session;
use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use hydra_registry::{Profile, ProfileState};
use tracing::info;

const DEFAULT_URL: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 6379;

/// Create a profile, or update the fields given on the command line
pub async fn configure(
    session: &mut Session,
    name: &str,
    url: Option<String>,
    port: Option<u16>,
    db: Option<i64>,
    password: Option<String>,
) -> Result<Output> {
    let backup = session.back_up_unreadable().await?;
    let mut state = session.state().cloned().unwrap_or_else(ProfileState::new);
    let existing = state.profiles.get(name).cloned();
    let created = existing.is_none();

    let base = existing.unwrap_or_else(|| Profile::new(name, DEFAULT_URL, DEFAULT_PORT, 0));
    let mut profile = Profile::new(
        name,
        url.unwrap_or(base.redis_url),
        port.unwrap_or(base.redis_port),
        db.unwrap_or(base.redis_db),
    );
    if let Some(password) = password.or(base.redis_password) {
        profile = profile.with_password(password);
    }

    state.set_profile(name, profile)?;
    session.save_state(state).await?;
    info!("Saved profile '{}'", name);

    let verb = if created { "created" } else { "updated" };
    let mut message = format!("Profile '{}' {}", name, verb);
    if let Some(backup) = backup {
        message = format!(
            "Unreadable state file moved to {}\n{}",
            backup.display(),
            message
        );
    }
    Ok(Output::text(message))
}

/// Make `name` the active profile
pub async fn use_profile(session: &mut Session, name: &str) -> Result<Output> {
    let state = session.require_state()?.switch_active(name)?;
    session.save_state(state).await?;
    Ok(Output::text(format!("Using profile '{}'", name)))
}

/// Table of every stored profile
pub fn list(session: &Session) -> Result<Output> {
    let Some(state) = session.state() else {
        return Ok(Output::text("No profiles configured"));
    };
    if state.profiles.is_empty() {
        return Ok(Output::text("No profiles configured"));
    }

    let active = state.active_name();
    let mut table = Table::new();
    table.set_header(vec!["PROFILE", "HOST", "PORT", "DB", "ACTIVE"]);
    for name in state.list_profiles() {
        let profile = &state.profiles[&name];
        let is_active = active == Some(name.as_str());
        table.add_row(vec![
            Cell::new(&name),
            Cell::new(&profile.redis_url),
            Cell::new(profile.redis_port),
            Cell::new(profile.redis_db),
            if is_active {
                Cell::new("*").fg(Color::Green)
            } else {
                Cell::new("")
            },
        ]);
    }

    Ok(Output::Table(table))
}
