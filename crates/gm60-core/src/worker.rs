//! Session worker
//!
//! Runs a [`DeviceSession`] on a dedicated OS thread so blocking serial reads
//! never stall an async caller (such as a UI event loop). Requests are
//! queued and served one at a time, which keeps exchanges on the connection
//! strictly sequential.

use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::protocol::{CloseHandle, ConfigError, ConnectError, SessionError, Transport};
use crate::session::{Connection, ConnectionState, DeviceSession};
use crate::settings::{ConfigBatch, DeviceState};

enum Request {
    Connect {
        port: String,
        reply: oneshot::Sender<Result<Connection, ConnectError>>,
    },
    Refresh {
        reply: oneshot::Sender<Result<DeviceState, ConfigError>>,
    },
    GetState {
        reply: oneshot::Sender<(ConnectionState, DeviceState)>,
    },
    SetConfiguration {
        batch: ConfigBatch,
        reply: oneshot::Sender<Result<(), ConfigError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Spawns the worker thread
pub struct SessionWorker;

impl SessionWorker {
    /// Move `session` onto its own thread.
    ///
    /// The thread exits, disconnecting the session, once every handle is
    /// dropped or [`SessionHandle::shutdown`] is called.
    pub fn spawn<T: Transport + 'static>(
        session: DeviceSession<T>,
    ) -> Result<SessionHandle, std::io::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let close = session.close_handle();

        thread::Builder::new()
            .name("gm60-session".to_string())
            .spawn(move || run(session, rx))?;

        Ok(SessionHandle { tx, close })
    }
}

fn run<T: Transport>(mut session: DeviceSession<T>, mut rx: mpsc::UnboundedReceiver<Request>) {
    debug!("session worker started");
    while let Some(request) = rx.blocking_recv() {
        match request {
            Request::Connect { port, reply } => {
                let _ = reply.send(session.connect(&port));
            }
            Request::Refresh { reply } => {
                let _ = reply.send(session.refresh_state().cloned());
            }
            Request::GetState { reply } => {
                let _ = reply.send((session.state(), session.device_state().clone()));
            }
            Request::SetConfiguration { batch, reply } => {
                let _ = reply.send(session.apply_configuration(&batch));
            }
            Request::Disconnect { reply } => {
                session.disconnect();
                let _ = reply.send(());
            }
            Request::Shutdown => break,
        }
    }
    session.disconnect();
    info!("session worker stopped");
}

/// Async handle to a session running on a [`SessionWorker`]
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Request>,
    close: CloseHandle,
}

impl SessionHandle {
    fn send(&self, request: Request) -> Result<(), SessionError> {
        self.tx.send(request).map_err(|_| SessionError::WorkerStopped)
    }

    async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Request,
    ) -> Result<R, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| SessionError::WorkerStopped)
    }

    /// See [`DeviceSession::connect`]
    pub async fn connect(&self, port: impl Into<String>) -> Result<Connection, SessionError> {
        let port = port.into();
        Ok(self.call(|reply| Request::Connect { port, reply }).await??)
    }

    /// See [`DeviceSession::refresh_state`]
    pub async fn refresh_state(&self) -> Result<DeviceState, SessionError> {
        Ok(self.call(|reply| Request::Refresh { reply }).await??)
    }

    /// Current session state and last device snapshot
    pub async fn get_state(&self) -> Result<(ConnectionState, DeviceState), SessionError> {
        self.call(|reply| Request::GetState { reply }).await
    }

    /// See [`DeviceSession::apply_configuration`]
    pub async fn set_configuration(&self, batch: ConfigBatch) -> Result<(), SessionError> {
        Ok(self
            .call(|reply| Request::SetConfiguration { batch, reply })
            .await??)
    }

    /// See [`DeviceSession::disconnect`]
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.call(|reply| Request::Disconnect { reply }).await
    }

    /// Abort the exchange in progress, if any. The read fails with
    /// `Closed` and the session drops to `Disconnected`.
    pub fn cancel(&self) {
        self.close.close();
    }

    /// Stop the worker after queued requests are served
    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Request::Shutdown)
    }
}
