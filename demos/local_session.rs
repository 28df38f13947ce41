//! A scripted local session: sign-in redirect, login, a few task
//! mutations, sign-out.
//!
//! ```sh
//! cargo run --example local_session
//! RUST_LOG=forte_tasks=debug cargo run --example local_session
//! ```

use std::sync::Arc;

use forte_tasks::identity::{IdentityGate, IdentityProvider, LocalIdentityProvider, User};
use forte_tasks::redirect::{Navigator, Redirect};
use forte_tasks::sync::{SyncController, SyncSnapshot};
use forte_tasks::ForteConfig;

struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, redirect: &Redirect) {
        match redirect {
            Redirect::SignIn { route } => println!("-> navigate to {route}"),
        }
    }
}

fn render(snapshot: &SyncSnapshot) {
    let owner = snapshot.owner.as_deref().unwrap_or("<nobody>");
    println!("[{owner}] {} task(s)", snapshot.tasks().len());
    for task in snapshot.tasks() {
        let mark = if task.completed { "x" } else { " " };
        println!("  [{mark}] {} ({})", task.content, task.id);
    }
    if let Some(ref err) = snapshot.last_error {
        println!("  last error: {err}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ForteConfig::load()?;
    forte_tasks::logging::init_logging(&config.logging.filter);

    let controller = Arc::new(
        SyncController::new(config.open_store()?)
            .with_sign_in_route(config.auth.sign_in_route.clone()),
    );
    let provider = Arc::new(LocalIdentityProvider::new());

    let driver = {
        let controller = controller.clone();
        let gate = IdentityGate::new(provider.clone());
        tokio::spawn(async move { controller.run(gate, &PrintNavigator).await })
    };

    let mut snapshots = controller.subscribe();

    provider.resolve_anonymous();
    provider.sign_in(User::new("demo-user").with_display_name("Demo"))?;
    snapshots
        .wait_for(|s| s.owner.is_some() && s.state.is_ready())
        .await?;

    controller.create("write spec").await?;
    controller.create("buy milk").await?;
    controller.create("   ").await?;
    render(&controller.snapshot());

    let first = controller
        .snapshot()
        .tasks()
        .first()
        .map(|task| task.id.clone())
        .ok_or("no tasks after create")?;
    controller.toggle(&first).await?;
    render(&controller.snapshot());

    controller.delete(&first).await?;
    render(&controller.snapshot());

    provider.sign_out().await?;
    snapshots.wait_for(|s| s.owner.is_none()).await?;
    render(&controller.snapshot());

    provider.close();
    driver.await?;
    Ok(())
}
