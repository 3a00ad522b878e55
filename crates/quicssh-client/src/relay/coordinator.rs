//! Lifecycle of one relay: run both loops, stop at the first, close once.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pump::{Direction, PumpReport, pump};
use super::race::{Finished, Race};
use crate::error::TunnelError;
use crate::transport::{CLOSE_CODE, CLOSE_REASON, Session};

type LoopResult = Result<PumpReport, TunnelError>;

/// Supervises the two relay loops of a session and closes it afterwards.
pub struct Coordinator<S: Session> {
    session: S,
    cancel: CancellationToken,
    unwind_grace: Option<Duration>,
}

impl<S: Session> Coordinator<S> {
    /// `cancel` must be the token scoped to this session; the coordinator
    /// cancels it when the first loop finishes.
    pub const fn new(session: S, cancel: CancellationToken, unwind_grace: Option<Duration>) -> Self {
        Self {
            session,
            cancel,
            unwind_grace,
        }
    }

    /// Relay between `stream` and the local endpoints until either direction
    /// ends, then close the session.
    ///
    /// Returns the result of whichever loop finished first. The other loop's
    /// result is discarded, and a failed close is only logged.
    pub async fn supervise<LR, LW>(
        self,
        stream: (S::SendStream, S::RecvStream),
        local: (LR, LW),
    ) -> Result<(), TunnelError>
    where
        LR: AsyncRead + Unpin + Send + 'static,
        LW: AsyncWrite + Unpin + Send + 'static,
    {
        let (remote_send, remote_recv) = stream;
        let (local_in, local_out) = local;

        let mut loops: Race<Direction, LoopResult> = Race::new();
        loops.spawn(
            Direction::LocalToRemote,
            pump(
                Direction::LocalToRemote,
                local_in,
                remote_send,
                self.cancel.clone(),
            ),
        );
        loops.spawn(
            Direction::RemoteToLocal,
            pump(
                Direction::RemoteToLocal,
                remote_recv,
                local_out,
                self.cancel.clone(),
            ),
        );
        info!("Relaying stream");

        let winner = loops.next_finished().await;
        debug!(remaining = loops.len(), "First relay loop finished, cancelling the rest");
        self.cancel.cancel();
        let result = winner.map_or_else(
            || Err(TunnelError::RelayTask("no relay loops were running".into())),
            settle,
        );

        let drained = loops.drain(self.unwind_grace).await;
        for loser in &drained.finished {
            if let Ok(Err(e)) = &loser.outcome {
                debug!(direction = %loser.key, error = %e, "Discarding error from cancelled loop");
            }
        }
        for direction in &drained.aborted {
            warn!(
                %direction,
                grace = ?self.unwind_grace,
                "Relay loop did not unwind in time, aborted"
            );
        }

        self.close().await;
        result
    }

    /// Close the session. Failures are logged and never surfaced.
    async fn close(self) {
        debug!("Closing session");
        if let Err(e) = self.session.close(CLOSE_CODE, CLOSE_REASON).await {
            warn!(error = %e, "Session close error");
        }
    }
}

/// Turn the winning loop's completion into the run's result.
fn settle(winner: Finished<Direction, LoopResult>) -> Result<(), TunnelError> {
    match winner.outcome {
        Ok(Ok(report)) => {
            info!(
                direction = %report.direction,
                bytes = report.bytes,
                exit = ?report.exit,
                "Relay finished"
            );
            Ok(())
        }
        Ok(Err(e)) => {
            warn!(direction = %winner.key, error = %e, "Relay failed");
            Err(e)
        }
        Err(join) => Err(TunnelError::RelayTask(format!(
            "{} loop: {join}",
            winner.key
        ))),
    }
}
