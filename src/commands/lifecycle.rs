//! Compose-backed verbs: up, down, restart, ps, logs, build, pull, exec,
//! shell and raw passthrough

use std::io::IsTerminal;

use anyhow::Result;
use tracing::info;

use crate::infrastructure::ComposeVerb;
use crate::services::Orchestrator;
use crate::ui;

/// Run `verb` for `services` with the layered compose files of `profile`
pub async fn execute(
    orchestrator: &Orchestrator,
    verb: ComposeVerb,
    services: Vec<String>,
    profile: Option<String>,
) -> Result<()> {
    verb.check_targets(&services)?;
    orchestrator.preflight().await?;

    if !services.is_empty() {
        info!("{} {}", verb.name(), services.join(", "));
    }

    let outcome = orchestrator
        .lifecycle(&verb, &services, profile.as_deref())
        .await?;
    if outcome.cancelled {
        return Ok(());
    }

    let scope = if services.is_empty() {
        "all services".to_string()
    } else {
        services.join(", ")
    };
    match verb {
        ComposeVerb::Up { detach: true, .. } => {
            ui::print_success(&format!("Started {}", scope));
            ui::print_dim("Use `shardctl status` to check them, `shardctl logs -f` to follow output");
        }
        ComposeVerb::Down { .. } => ui::print_success("Services stopped"),
        ComposeVerb::Restart => ui::print_success(&format!("Restarted {}", scope)),
        ComposeVerb::Build { .. } => ui::print_success(&format!("Built images for {}", scope)),
        ComposeVerb::Pull => ui::print_success(&format!("Pulled images for {}", scope)),
        _ => {}
    }
    Ok(())
}

/// Allocate a TTY only when both ends are attached to a terminal
pub fn wants_tty(no_tty: bool) -> bool {
    !no_tty && std::io::stdin().is_terminal() && console::Term::stdout().is_term()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::WorkspaceConfig;
    use crate::error::UsageError;
    use crate::infrastructure::fake::FakeInvoker;

    #[tokio::test]
    async fn test_target_count_checked_before_any_process() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeInvoker::new());
        let orch = Orchestrator::new(WorkspaceConfig::new(dir.path()), fake.clone());
        let verb = ComposeVerb::Shell {
            shell: "/bin/bash".to_string(),
            tty: false,
        };

        let err = execute(&orch, verb, Vec::new(), None).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<UsageError>(),
            Some(UsageError::SingleTargetRequired { count: 0, .. })
        ));
        assert!(fake.calls().is_empty());
    }
}
