//! Fail-fast supervision of the pipeline units.
//!
//! Every unit is a tokio task. The first one to finish, whatever the reason,
//! brings the others down and its outcome is returned as the reason the
//! pipeline stopped.

use std::future::Future;

use log::{error, info, warn};
use tokio::task::JoinSet;

use crate::error_handling::types::{ControllerError, PipelineError};

type UnitOutcome = (String, Result<(), PipelineError>);

#[derive(Default)]
pub struct Supervisor {
    units: JoinSet<UnitOutcome>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, unit: F)
    where
        F: Future<Output = Result<(), PipelineError>> + Send + 'static,
    {
        let name = name.into();
        info!("Spawning unit `{}`", name);
        self.units.spawn(async move { (name, unit.await) });
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Waits for the first unit to finish, aborts the rest and waits for them.
    pub async fn wait_for_first_exit(mut self) -> ControllerError {
        let reason = match self.units.join_next().await {
            None => return ControllerError::NoUnits,
            Some(Ok((unit, Ok(())))) => ControllerError::UnitStopped(unit),
            Some(Ok((unit, Err(error)))) => ControllerError::UnitFailed { unit, error },
            Some(Err(e)) => ControllerError::UnitPanicked(e.to_string()),
        };
        error!("{}, stopping {} remaining unit(s)", reason, self.units.len());

        self.units.abort_all();
        while let Some(outcome) = self.units.join_next().await {
            match outcome {
                Ok((unit, result)) => warn!("Unit `{}` ended during shutdown: {:?}", unit, result),
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("Unit failed during shutdown: {}", e),
            }
        }
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Unit that never returns; its sender is dropped when the task is aborted.
    fn endless(alive: oneshot::Sender<()>) -> impl Future<Output = Result<(), PipelineError>> {
        async move {
            let _alive = alive;
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_tears_down_other_units() {
        let (alive_tx, alive_rx) = oneshot::channel();
        let mut supervisor = Supervisor::new();
        supervisor.spawn("poller[office]", endless(alive_tx));
        supervisor.spawn("data-writer", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(PipelineError::ChannelClosed("bandwidth samples"))
        });
        assert_eq!(supervisor.len(), 2);

        let reason = supervisor.wait_for_first_exit().await;

        match reason {
            ControllerError::UnitFailed { unit, error } => {
                assert_eq!(unit, "data-writer");
                assert!(matches!(error, PipelineError::ChannelClosed("bandwidth samples")));
            }
            other => panic!("unexpected reason: {:?}", other),
        }
        // the endless unit was aborted, dropping its sender
        assert!(alive_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_normal_return_is_still_fatal() {
        let (alive_tx, alive_rx) = oneshot::channel();
        let mut supervisor = Supervisor::new();
        supervisor.spawn("aggregator[office]", endless(alive_tx));
        supervisor.spawn("session-writer", async { Ok(()) });

        let reason = supervisor.wait_for_first_exit().await;
        assert!(matches!(reason, ControllerError::UnitStopped(ref unit) if unit == "session-writer"));
        assert!(alive_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_panic_is_fatal() {
        let (alive_tx, alive_rx) = oneshot::channel();
        let mut supervisor = Supervisor::new();
        supervisor.spawn("poller[office]", endless(alive_tx));
        supervisor.spawn("poller[lab]", async {
            if true {
                panic!("boom");
            }
            Ok(())
        });

        let reason = supervisor.wait_for_first_exit().await;
        assert!(matches!(reason, ControllerError::UnitPanicked(_)));
        assert!(alive_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_empty_supervisor() {
        let supervisor = Supervisor::new();
        assert!(supervisor.is_empty());
        assert!(matches!(
            supervisor.wait_for_first_exit().await,
            ControllerError::NoUnits
        ));
    }
}
