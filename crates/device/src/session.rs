//! Device Session Management
//!
//! `SessionManager::open` hands out a `DeviceSession` that is already Active.
//! `DeviceSession::close` is the only way to Terminated and never fails.
//!
//! ```text
//! Created --open ok--> Active --close--> Terminated
//! ```

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::{HarnessError, Result, TeardownStage, TeardownWarning};
use crate::events::{EventBus, SessionEvent};
use crate::interaction::Interactions;
use crate::wait::WaitPolicies;
use crate::wire::{HttpTransport, RemoteSession, Transport, WireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Active => "active",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Opens sessions against one automation server
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    events: EventBus,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            events: EventBus::new(),
        }
    }

    /// Manager talking HTTP to `config.server_url`
    pub fn http(config: &SessionConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let transport = HttpTransport::new(&endpoint, config.request_timeout())?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Connect, negotiate capabilities and bring the app to the foreground
    ///
    /// On failure nothing is left open on the server side.
    pub async fn open(&self, config: SessionConfig) -> Result<DeviceSession> {
        config.validate()?;

        tracing::info!(
            session = %config.id,
            server = %config.server_url,
            package = %config.app_package,
            "opening session"
        );

        let remote = RemoteSession::create(self.transport.clone(), config.capabilities())
            .await
            .map_err(|err| match err {
                WireError::Unreachable(_) | WireError::Timeout | WireError::Http(_) => {
                    HarnessError::Connection {
                        endpoint: config.server_url.clone(),
                        source: err,
                    }
                }
                other => HarnessError::Launch {
                    package: config.app_package.clone(),
                    reason: format!("session not created: {}", other),
                },
            })?;

        self.events.publish(SessionEvent::Opened {
            session_id: config.id.clone(),
            remote_id: remote.session_id.clone(),
        });

        let activation =
            tokio::time::timeout(config.launch_timeout(), remote.activate_app(&config.app_package))
                .await;

        let failure = match activation {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some(format!("not activated within {:?}", config.launch_timeout())),
        };

        if let Some(reason) = failure {
            tracing::error!(session = %config.id, %reason, "app activation failed");
            if let Err(err) = remote.delete().await {
                let warning = TeardownWarning {
                    stage: TeardownStage::ReleaseConnection,
                    message: err.to_string(),
                };
                tracing::warn!(session = %config.id, "{}", warning);
                self.events.publish(SessionEvent::TeardownWarning {
                    session_id: config.id.clone(),
                    message: warning.to_string(),
                });
            }
            self.events.publish(SessionEvent::Closed {
                session_id: config.id.clone(),
            });
            return Err(HarnessError::Launch {
                package: config.app_package,
                reason,
            });
        }

        self.events.publish(SessionEvent::AppActivated {
            session_id: config.id.clone(),
            package: config.app_package.clone(),
        });
        tracing::info!(session = %config.id, remote = %remote.session_id, "session active");

        let mut session = DeviceSession::new(config, self.events.clone());
        session.remote = Some(remote);
        session.state = SessionState::Active;
        Ok(session)
    }

    /// Scoped session: open, run `f`, close on every exit path
    ///
    /// A panic inside `f` is resumed after the session is closed.
    pub async fn run<T, F>(&self, config: SessionConfig, f: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s DeviceSession) -> BoxFuture<'s, Result<T>>,
    {
        let mut session = self.open(config).await?;
        let result = AssertUnwindSafe(f(&session)).catch_unwind().await;
        session.close().await;

        match result {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// One live connection to one device/app pair
pub struct DeviceSession {
    config: SessionConfig,
    policies: WaitPolicies,
    remote: Option<RemoteSession>,
    state: SessionState,
    events: EventBus,
    teardown_warnings: Vec<TeardownWarning>,
}

impl DeviceSession {
    fn new(config: SessionConfig, events: EventBus) -> Self {
        Self {
            policies: WaitPolicies::from_settings(&config.wait),
            config,
            remote: None,
            state: SessionState::Created,
            events,
            teardown_warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policies(&self) -> &WaitPolicies {
        &self.policies
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Warnings collected by teardown so far
    pub fn teardown_warnings(&self) -> &[TeardownWarning] {
        &self.teardown_warnings
    }

    /// Connection handle, only while Active
    pub fn remote(&self) -> Result<&RemoteSession> {
        match (&self.remote, self.state) {
            (Some(remote), SessionState::Active) => Ok(remote),
            _ => Err(HarnessError::SessionNotActive(self.state)),
        }
    }

    /// Action primitives for this session
    pub fn interact(&self) -> Result<Interactions<'_>> {
        Interactions::new(self)
    }

    /// Terminate the app, then release the connection
    ///
    /// Never fails. Problems come back as warnings and are logged.
    /// Closing a session that is not Active does nothing.
    pub async fn close(&mut self) -> Vec<TeardownWarning> {
        if self.state != SessionState::Active {
            tracing::debug!(session = %self.config.id, state = %self.state, "close: nothing to do");
            return Vec::new();
        }

        // Taking the handle first means it is released even if a step below fails
        let Some(remote) = self.remote.take() else {
            self.state = SessionState::Terminated;
            return Vec::new();
        };
        self.state = SessionState::Terminated;

        let mut warnings = Vec::new();
        let package = self.config.app_package.clone();

        match tokio::time::timeout(self.config.launch_timeout(), remote.terminate_app(&package))
            .await
        {
            Ok(Ok(())) => self.events.publish(SessionEvent::AppTerminated {
                session_id: self.config.id.clone(),
                package,
            }),
            Ok(Err(err)) => warnings.push(TeardownWarning {
                stage: TeardownStage::TerminateApp,
                message: err.to_string(),
            }),
            Err(_) => warnings.push(TeardownWarning {
                stage: TeardownStage::TerminateApp,
                message: format!("not terminated within {:?}", self.config.launch_timeout()),
            }),
        }

        if let Err(err) = remote.delete().await {
            warnings.push(TeardownWarning {
                stage: TeardownStage::ReleaseConnection,
                message: err.to_string(),
            });
        }

        for warning in &warnings {
            self.warn(warning.clone());
        }

        self.events.publish(SessionEvent::Closed {
            session_id: self.config.id.clone(),
        });
        tracing::info!(session = %self.config.id, warnings = warnings.len(), "session closed");

        warnings
    }

    fn warn(&mut self, warning: TeardownWarning) {
        tracing::warn!(session = %self.config.id, "{}", warning);
        self.events.publish(SessionEvent::TeardownWarning {
            session_id: self.config.id.clone(),
            message: warning.to_string(),
        });
        self.teardown_warnings.push(warning);
    }
}

/// Dropping an Active session releases the connection in the background.
/// The app is not terminated on this path, and without a tokio runtime
/// nothing is released at all.
impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.state != SessionState::Active {
            return;
        }
        let Some(remote) = self.remote.take() else {
            return;
        };

        tracing::warn!(session = %self.config.id, "session dropped while active");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = remote.delete().await {
                        tracing::warn!(remote = %remote.session_id, error = %err, "background release failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    session = %self.config.id,
                    remote = %remote.session_id,
                    "no runtime to release session, remote session leaked"
                );
            }
        }
    }
}
