//! Baud rate negotiation
//!
//! The scanner does not announce its line speed, so connecting means trying
//! each candidate rate in a fixed order until a probe gets a well-formed
//! answer. The rate found stays in force for the whole session.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    ConnectError, ProtocolVariant, Transport, TransportError, DEFAULT_CANDIDATE_BAUDS,
    DEFAULT_PROBE_TIMEOUT_MS,
};

/// Result of probing one candidate rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    /// Well-formed response received
    Answered,
    /// Nothing arrived before the probe timeout
    NoResponse,
    /// Bytes arrived but did not form a valid response
    Malformed,
    /// Write or read failed at this rate
    TransportFailed,
}

/// One probe during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeAttempt {
    /// Rate the transport was opened at
    pub baud_rate: u32,
    /// What came back
    pub outcome: ProbeOutcome,
}

/// Successful negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Rate the device answered at; the transport is left open at it
    pub baud_rate: u32,
    /// Every probe issued, in order, ending with the successful one
    pub attempts: Vec<ProbeAttempt>,
}

/// Prioritized baud-rate sweep
#[derive(Debug, Clone)]
pub struct Negotiator {
    candidates: Vec<u32>,
    probe_timeout: Duration,
    variant: ProtocolVariant,
}

impl Negotiator {
    /// Negotiator over [`DEFAULT_CANDIDATE_BAUDS`]
    pub fn new(variant: ProtocolVariant) -> Self {
        Self {
            candidates: DEFAULT_CANDIDATE_BAUDS.to_vec(),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            variant,
        }
    }

    /// Replace the candidate list. Order is preserved as given.
    pub fn with_candidates(mut self, candidates: impl Into<Vec<u32>>) -> Self {
        self.candidates = candidates.into();
        self
    }

    /// How long each probe waits for an answer
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Rates tried, in order
    pub fn candidates(&self) -> &[u32] {
        &self.candidates
    }

    /// Find the rate the device on `port` answers at.
    ///
    /// On success the transport is open at that rate. On any failure the
    /// transport is closed.
    pub fn negotiate<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        port: &str,
    ) -> Result<Negotiated, ConnectError> {
        let probe = self.variant.probe();
        let mut attempts = Vec::with_capacity(self.candidates.len());

        for &baud_rate in &self.candidates {
            if let Err(e) = transport.open(port, baud_rate, self.probe_timeout) {
                transport.close();
                return Err(match e {
                    TransportError::Closed => ConnectError::Cancelled,
                    e => e.into(),
                });
            }

            let outcome = match self.probe_once(transport, &probe) {
                Ok(outcome) => outcome,
                Err(_) => {
                    info!("negotiation on {} cancelled at {} baud", port, baud_rate);
                    transport.close();
                    return Err(ConnectError::Cancelled);
                }
            };
            debug!("probe {} at {} baud: {:?}", port, baud_rate, outcome);
            attempts.push(ProbeAttempt { baud_rate, outcome });

            if outcome == ProbeOutcome::Answered {
                info!(
                    "device on {} answered at {} baud after {} probe(s)",
                    port,
                    baud_rate,
                    attempts.len()
                );
                return Ok(Negotiated {
                    baud_rate,
                    attempts,
                });
            }

            transport.close();
        }

        warn!("no device answered on {} ({} rates tried)", port, attempts.len());
        transport.close();
        Err(ConnectError::NoDeviceFound {
            port: port.to_string(),
            tried: self.candidates.clone(),
        })
    }

    /// Send one probe. Only a close request is returned as an error; other
    /// transport failures just fail this candidate.
    fn probe_once<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        probe: &[u8],
    ) -> Result<ProbeOutcome, TransportError> {
        let exchange = transport
            .clear_input()
            .and_then(|_| transport.write(probe))
            .and_then(|_| transport.read_upto(self.variant.response_limit(), self.probe_timeout));

        match exchange {
            Ok(response) if response.is_empty() => Ok(ProbeOutcome::NoResponse),
            Ok(response) if self.variant.is_well_formed(&response) => Ok(ProbeOutcome::Answered),
            Ok(_) => Ok(ProbeOutcome::Malformed),
            Err(TransportError::Closed) => Err(TransportError::Closed),
            Err(e) => {
                warn!("probe failed: {}", e);
                Ok(ProbeOutcome::TransportFailed)
            }
        }
    }
}
