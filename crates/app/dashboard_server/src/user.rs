use std::time::Duration;

use dashboard_api::config::ApiConfig;
use dashboard_core::accounts::{NewUser, StoreUserService, UserService};
use dashboard_core::models::{User, UserState};
use tracing::info;

use crate::cli::{RoleCommand, UserCommand};
use crate::{Error, Result, db};

pub async fn run(database: Option<String>, command: UserCommand) -> Result<()> {
    let (database_url, store_timeout) = connection_settings(database, ApiConfig::from_env());
    let store = db::connect(&database_url, 1, store_timeout).await?;
    let users = StoreUserService::new(store);
    let summary = execute(&users, command).await?;
    println!("{summary}");
    Ok(())
}

/// Database URL (flag over environment) and store timeout for admin commands.
fn connection_settings(database: Option<String>, config: ApiConfig) -> (String, Duration) {
    (database.unwrap_or(config.database_url), config.store_timeout)
}

/// Apply `command` and describe the outcome in one line.
pub async fn execute(users: &dyn UserService, command: UserCommand) -> Result<String> {
    match command {
        UserCommand::New {
            email,
            password,
            first_name,
            last_name,
            role,
            email_verified,
        } => {
            let user = users
                .create(NewUser {
                    email,
                    password,
                    first_name,
                    last_name,
                    email_verified,
                    role: role.map(Into::into),
                })
                .await?;
            info!(user_id = %user.id, email = %user.email, "user created from cli");
            Ok(format!("created user {} <{}>", user.id, user.email))
        }
        UserCommand::Role(RoleCommand::Add { email, role }) => {
            let user = find(users, &email).await?;
            users.grant_role(user.id, role.into()).await?;
            Ok(format!("granted {role:?} to {}", user.email).to_lowercase())
        }
        UserCommand::Role(RoleCommand::Remove { email, role }) => {
            let user = find(users, &email).await?;
            users.revoke_role(user.id, role.into()).await?;
            Ok(format!("revoked {role:?} from {}", user.email).to_lowercase())
        }
        UserCommand::Lock { email } => {
            let user = find(users, &email).await?;
            users.set_state(user.id, UserState::Locked).await?;
            Ok(format!("locked {}", user.email))
        }
        UserCommand::Unlock { email } => {
            let user = find(users, &email).await?;
            users.set_state(user.id, UserState::Active).await?;
            Ok(format!("unlocked {}", user.email))
        }
    }
}

async fn find(users: &dyn UserService, email: &str) -> Result<User> {
    users
        .get_by_email(email)
        .await?
        .ok_or_else(|| Error::Custom(format!("no user with email {email}")))
}
