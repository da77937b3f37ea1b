use async_trait::async_trait;
use clap::{Args, Subcommand};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use detecra_auth::{AuthState, ProfilePatch};
use inquire::Text;

use crate::context::Context;
use crate::utils::validation::{ensure_valid, validate_full_name};
use crate::utils::{print_notice, print_success};

use super::RunCommand;

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Show the signed-in user and their profile.
    Show(ProfileShowCommand),
    /// Update the full name or GitHub username of the profile.
    Update(ProfileUpdateCommand),
}

#[async_trait]
impl RunCommand for ProfileCommand {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            ProfileCommand::Show(cmd) => cmd.run(ctx).await,
            ProfileCommand::Update(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProfileShowCommand {}

#[async_trait]
impl RunCommand for ProfileShowCommand {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        if !ctx.coordinator.state().is_signed_in() {
            return print_notice("Not signed in. Run `detecra signin` first.");
        }

        let state = ctx.wait_for_profile().await;
        println!("{}", profile_table(&state));
        Ok(())
    }
}

fn profile_table(state: &AuthState) -> Table {
    let email = state
        .profile
        .as_ref()
        .and_then(|profile| profile.email.clone())
        .or_else(|| state.identity.as_ref().and_then(|identity| identity.email.clone()));
    let github_username = state.profile.as_ref().and_then(|profile| profile.github_username.clone());
    let member_since = state.profile.as_ref().map(|profile| profile.created_at.format("%B %-d, %Y").to_string());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Field", "Value"]);

    let rows = [
        ("Name", state.display_name().unwrap_or_else(|| "User".to_owned())),
        ("Email", email.unwrap_or_default()),
        ("GitHub", github_username.map(|name| format!("@{name}")).unwrap_or_default()),
        ("Avatar", state.display_avatar().unwrap_or_default()),
        ("Member since", member_since.unwrap_or_default()),
        ("User ID", state.identity.as_ref().map(|identity| identity.id.clone()).unwrap_or_default()),
    ];
    for (field, value) in rows {
        table.add_row(vec![field.to_owned(), value]);
    }

    table
}

#[derive(Args, Debug)]
pub struct ProfileUpdateCommand {
    #[clap(short = 'n', long = "full-name")]
    full_name: Option<String>,
    #[clap(short = 'g', long = "github-username")]
    github_username: Option<String>,
}

#[async_trait]
impl RunCommand for ProfileUpdateCommand {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let patch = if self.full_name.is_none() && self.github_username.is_none() {
            prompt_patch(&ctx.wait_for_profile().await)?
        } else {
            if let Some(full_name) = &self.full_name {
                ensure_valid(full_name, validate_full_name)?;
            }
            ProfilePatch {
                full_name: self.full_name.as_ref().map(|name| name.trim().to_owned()),
                github_username: self.github_username.as_ref().map(|name| normalize_github_username(name)),
                ..Default::default()
            }
        };

        if patch.is_empty() {
            return print_notice("Nothing to update.");
        }

        let profile = ctx.coordinator.update_profile(patch).await?;
        print_success(&format!("Profile updated for {}.", profile.full_name.as_deref().unwrap_or("User")))
    }
}

fn prompt_patch(state: &AuthState) -> anyhow::Result<ProfilePatch> {
    let current_name = state.display_name().unwrap_or_default();
    let current_github =
        state.profile.as_ref().and_then(|profile| profile.github_username.clone()).unwrap_or_default();

    let full_name =
        Text::new("Full name:").with_initial_value(&current_name).with_validator(validate_full_name).prompt()?;
    let github_username = Text::new("GitHub username:").with_initial_value(&current_github).prompt()?;

    let full_name = full_name.trim();
    let github_username = normalize_github_username(&github_username);

    Ok(ProfilePatch {
        full_name: (full_name != current_name).then(|| full_name.to_owned()),
        github_username: (github_username != current_github).then_some(github_username),
        ..Default::default()
    })
}

fn normalize_github_username(value: &str) -> String {
    value.trim().trim_start_matches('@').to_owned()
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use detecra_auth::{AuthState, Identity, Profile};
    use serde_json::{json, Map};

    use super::{normalize_github_username, profile_table};

    fn identity() -> Identity {
        let mut metadata = Map::new();
        metadata.insert("full_name".to_owned(), json!("Ada Lovelace"));
        metadata.insert("avatar_url".to_owned(), json!("https://avatars.example.com/ada.png"));
        Identity::new("U1", Some("ada@detecra.ai".to_owned()), metadata)
    }

    #[test]
    fn when_profile_is_not_loaded_then_table_falls_back_to_identity_metadata() {
        let state = AuthState { identity: Some(identity()), loading: false, ..Default::default() };

        let rendered = profile_table(&state).to_string();

        assert!(rendered.contains("Ada Lovelace"));
        assert!(rendered.contains("ada@detecra.ai"));
        assert!(rendered.contains("https://avatars.example.com/ada.png"));
    }

    #[test]
    fn when_profile_is_loaded_then_its_fields_win() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let profile = Profile {
            id: "U1".to_owned(),
            full_name: Some("Countess Ada".to_owned()),
            email: Some("ada@detecra.ai".to_owned()),
            avatar_url: None,
            github_username: Some("ada".to_owned()),
            created_at,
            updated_at: created_at,
        };
        let state = AuthState { identity: Some(identity()), profile: Some(profile), loading: false, ..Default::default() };

        let rendered = profile_table(&state).to_string();

        assert!(rendered.contains("Countess Ada"));
        assert!(rendered.contains("@ada"));
        assert!(rendered.contains("March 5, 2024"));
    }

    #[test]
    fn when_github_username_has_at_prefix_then_it_is_stripped() {
        assert_eq!(normalize_github_username(" @ada "), "ada");
        assert_eq!(normalize_github_username("ada"), "ada");
    }
}
