//! Tokio driver for a [`Supplicant`].
//!
//! A single task owns the supplicant. Frames and control events arrive on
//! an mpsc channel; the scheduler's next deadline is awaited with
//! `sleep_until`. The driver's clock must agree with tokio's (use
//! `tokio::time::Instant::now().into_std()`), otherwise timers fire late or
//! early.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zeroize::Zeroizing;

use rsnkey::MacAddr;

use crate::driver::{Driver, Eapol};
use crate::error::{Result, SupplicantError};
use crate::supplicant::{AssocParams, Supplicant};

/// Default depth of the event channel created by [`spawn`].
pub const EVENT_QUEUE_DEPTH: usize = 64;

#[derive(Debug)]
pub enum SupplicantEvent {
    /// EAPOL frame from the link layer.
    Eapol { src: MacAddr, frame: Bytes },
    Assoc(AssocParams),
    Disassoc,
    /// PMK from an external authentication (EAP, SAE, OWE, DPP).
    SetPmk(Zeroizing<Vec<u8>>),
    /// FT Action frame received over the DS.
    FtAction(Bytes),
    KeyRequest { error: bool, pairwise: bool },
    MichaelMicFailure { unicast: bool },
    Shutdown,
}

/// Process events until `Shutdown` or until every sender is dropped.
///
/// Frame and event failures are logged and do not stop the loop; their
/// dispositions have already been applied by the supplicant.
pub async fn run<D: Driver, E: Eapol>(
    sup: &mut Supplicant<D, E>,
    mut events: mpsc::Receiver<SupplicantEvent>,
) -> Result<()> {
    loop {
        let deadline = sup.next_timer_deadline();
        let timer = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!("event channel closed");
                    return Ok(());
                };
                if matches!(event, SupplicantEvent::Shutdown) {
                    tracing::debug!("supplicant event loop shutting down");
                    return Ok(());
                }
                handle_event(sup, event);
            }
            () = timer => sup.poll_timers(),
        }
    }
}

fn handle_event<D: Driver, E: Eapol>(sup: &mut Supplicant<D, E>, event: SupplicantEvent) {
    let result = match event {
        SupplicantEvent::Eapol { src, frame } => sup.rx_eapol(src, &frame).map_err(SupplicantError::from),
        SupplicantEvent::Assoc(params) => sup.notify_assoc(params),
        SupplicantEvent::Disassoc => {
            sup.notify_disassoc();
            Ok(())
        }
        SupplicantEvent::SetPmk(pmk) => sup.set_pmk(&pmk),
        SupplicantEvent::FtAction(frame) => sup.ft_rx_action(&frame).map(|_| ()),
        SupplicantEvent::KeyRequest { error, pairwise } => sup.key_request(error, pairwise),
        SupplicantEvent::MichaelMicFailure { unicast } => sup.michael_mic_failure(unicast),
        SupplicantEvent::Shutdown => Ok(()),
    };
    if let Err(err) = result {
        tracing::debug!(error = %err, "event not processed");
    }
}

/// Move `sup` onto its own task. The task hands the supplicant back when
/// the loop ends.
pub fn spawn<D, E>(mut sup: Supplicant<D, E>) -> (mpsc::Sender<SupplicantEvent>, JoinHandle<Result<Supplicant<D, E>>>)
where
    D: Driver + Send + 'static,
    E: Eapol + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let handle = tokio::spawn(async move {
        run(&mut sup, rx).await?;
        Ok(sup)
    });
    (tx, handle)
}
