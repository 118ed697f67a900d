use anyhow::Result;
use minihub::cli::{actions, actions::Action, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = start()?;

    // Handle the action
    match action {
        Action::Server { .. } => actions::server::handle(action).await?,
        Action::UserAdd { .. } => actions::user_add::handle(action)?,
        Action::RepoInit { .. } => actions::repo_init::handle(action)?,
    }

    Ok(())
}
