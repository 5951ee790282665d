//! Session configuration and orchestration, built on engine discovery and
//! the V3 marshal/unmarshal/authenticate pipeline.
//!
//! A [`Session`] is one logical conversation with a single SNMP agent: it
//! owns a packet-level copy of the USM security parameters, refreshes it
//! from the session's own state before every send, and updates that state
//! from every authenticated response.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{AuthErrorKind, Error, Result};
use crate::pdu::OpaquePdu;
use crate::transport::Transport;
use crate::v3::{
    self, AuthProtocol, MsgFlags, PrivProtocol, ScopedPdu, UsmSecurityParams, V3Message,
};

/// Configuration accepted by the orchestrator.
///
/// Validated once, synchronously, at [`SessionConfig::build`] time — a
/// rejected configuration never reaches the transport.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    user_name: Vec<u8>,
    auth_protocol: AuthProtocol,
    auth_passphrase: Option<Vec<u8>>,
    priv_protocol: PrivProtocol,
    priv_passphrase: Option<Vec<u8>>,
    context_engine_id: Option<Vec<u8>>,
    context_name: Vec<u8>,
    reportable: bool,
    timeout: Duration,
    retries: u32,
}

impl SessionConfig {
    /// Start a `NoAuthNoPriv` configuration for `user_name`.
    pub fn new(user_name: impl Into<Vec<u8>>) -> Self {
        Self {
            user_name: user_name.into(),
            auth_protocol: AuthProtocol::NoAuth,
            auth_passphrase: None,
            priv_protocol: PrivProtocol::NoPriv,
            priv_passphrase: None,
            context_engine_id: None,
            context_name: Vec::new(),
            reportable: true,
            timeout: Duration::from_secs(5),
            retries: 3,
        }
    }

    /// Select an authentication protocol and passphrase (`AuthNoPriv`).
    pub fn auth(mut self, protocol: AuthProtocol, passphrase: impl Into<Vec<u8>>) -> Self {
        self.auth_protocol = protocol;
        self.auth_passphrase = Some(passphrase.into());
        self
    }

    /// Select a privacy protocol and passphrase (`AuthPriv`; requires [`Self::auth`]).
    pub fn privacy(mut self, protocol: PrivProtocol, passphrase: impl Into<Vec<u8>>) -> Self {
        self.priv_protocol = protocol;
        self.priv_passphrase = Some(passphrase.into());
        self
    }

    /// Override the default `contextEngineID` (otherwise defaulted from discovery).
    pub fn context_engine_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.context_engine_id = Some(id.into());
        self
    }

    /// Set `contextName` (defaults to empty).
    pub fn context_name(mut self, name: impl Into<Vec<u8>>) -> Self {
        self.context_name = name.into();
        self
    }

    /// Per-request timeout before a retry is attempted.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of retries the transport performs on timeout.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.user_name.is_empty() {
            return Err(Error::ConfigInvalid {
                reason: "user name is required",
            });
        }
        if self.user_name.len() > 32 {
            return Err(Error::ConfigInvalid {
                reason: "user name exceeds 32 bytes",
            });
        }
        if self.priv_protocol.is_priv() && !self.auth_protocol.is_auth() {
            return Err(Error::ConfigInvalid {
                reason: "privacy requires authentication",
            });
        }
        if self.auth_protocol.is_auth() {
            match &self.auth_passphrase {
                None => {
                    return Err(Error::ConfigInvalid {
                        reason: "auth protocol selected without a passphrase",
                    });
                }
                Some(p) if p.len() < 8 => {
                    return Err(Error::ConfigInvalid {
                        reason: "auth passphrase shorter than 8 bytes",
                    });
                }
                _ => {}
            }
        }
        if self.priv_protocol.is_priv() {
            match &self.priv_passphrase {
                None => {
                    return Err(Error::ConfigInvalid {
                        reason: "privacy protocol selected without a passphrase",
                    });
                }
                Some(p) if p.len() < 8 => {
                    return Err(Error::ConfigInvalid {
                        reason: "privacy passphrase shorter than 8 bytes",
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn msg_flags(&self) -> Result<MsgFlags> {
        MsgFlags::new(
            self.auth_protocol.is_auth(),
            self.priv_protocol.is_priv(),
            self.reportable,
        )
    }
}

/// A single logical conversation with one SNMP agent over USM.
///
/// Only one request may be in flight at a time from this type's
/// perspective: `send` takes `&mut self` because the session's engine
/// id/boots/time are mutated between request and next send.
pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    msg_flags: MsgFlags,
    security: UsmSecurityParams,
    msg_id: AtomicI32,
}

impl<T: Transport> Session<T> {
    /// Validate `config` and build a session over `transport`.
    ///
    /// The security parameters start with an empty engine id; the first
    /// call to [`Session::send`] runs engine discovery before sending
    /// anything else.
    pub fn new(transport: T, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let msg_flags = config.msg_flags()?;
        let security =
            UsmSecurityParams::new(config.user_name.clone(), config.auth_protocol, config.priv_protocol)?;
        let mut seed = [0u8; 4];
        getrandom::fill(&mut seed).map_err(|_| Error::ConfigInvalid {
            reason: "failed to seed message id generator",
        })?;
        Ok(Self {
            transport,
            config,
            msg_flags,
            security,
            msg_id: AtomicI32::new(i32::from_be_bytes(seed)),
        })
    }

    /// The peer this session talks to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.transport.peer_addr()
    }

    /// Whether engine discovery has already populated the engine id.
    pub fn engine_known(&self) -> bool {
        self.security.engine_known()
    }

    fn next_msg_id(&self) -> i32 {
        self.msg_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Probe with an empty-USM-params GetRequest and fold the Report's
    /// engine id/boots/time into session state.
    #[tracing::instrument(skip(self), fields(peer = %self.peer_addr()))]
    async fn discover_engine(&mut self) -> Result<()> {
        let msg_id = self.next_msg_id();
        let probe = v3::build_discovery_probe(msg_id);
        let response = self
            .transport
            .send_one_request(probe, true, self.config.timeout, self.config.retries)
            .await
            .map_err(|err| self.retag_timeout(err, msg_id))?;

        let state = v3::parse_discovery_response(response).map_err(|err| Error::DiscoveryFailed {
            target: Some(self.peer_addr()),
            reason: err.to_string(),
        })?;
        tracing::debug!(
            engine_boots = state.engine_boots,
            engine_time = state.engine_time,
            "engine discovered"
        );
        self.security.refresh_from_engine(&state);
        if self.config.context_engine_id.is_none() {
            self.config.context_engine_id = Some(state.engine_id.clone());
        }
        self.derive_keys()?;
        Ok(())
    }

    /// Derive (or re-derive) the localized auth/priv keys for the current
    /// engine id. Safe to call repeatedly: keys are pure functions of
    /// `(protocol, passphrase, engine_id)`, invalidated here whenever the
    /// engine id changes.
    fn derive_keys(&mut self) -> Result<()> {
        if self.config.auth_protocol.is_auth() {
            let passphrase = self
                .config
                .auth_passphrase
                .as_deref()
                .ok_or(Error::Auth { kind: AuthErrorKind::NoCredentials })?;
            let key = v3::auth::derive_key(self.config.auth_protocol, passphrase, &self.security.engine_id)?;
            self.security.auth_key = Some(key);
        }
        if self.config.priv_protocol.is_priv() {
            let priv_passphrase = self
                .config
                .priv_passphrase
                .as_deref()
                .ok_or(Error::CryptoInit {
                    kind: crate::error::CryptoErrorKind::NoPrivKey,
                })?;
            // The priv key is localized with the *auth* protocol's hash —
            // intentional, load-bearing RFC behavior, not a typo.
            let localized =
                v3::auth::derive_key(self.config.auth_protocol, priv_passphrase, &self.security.engine_id)?;
            let priv_key = v3::PrivKey::new(self.config.priv_protocol, localized.as_bytes())?;
            self.security.priv_key = Some(priv_key);
        }
        Ok(())
    }

    fn retag_timeout(&self, err: Error, msg_id: i32) -> Error {
        match err {
            Error::Timeout {
                target,
                elapsed,
                retries,
                ..
            } => Error::Timeout {
                target,
                elapsed,
                request_id: msg_id as u32,
                retries,
            },
            other => other,
        }
    }

    /// Build a packet-level copy of the session's security parameters,
    /// refreshed from session state and, for `AuthPriv`, carrying a freshly
    /// allocated salt.
    fn prepare_packet_security(&self) -> Result<UsmSecurityParams> {
        let mut packet = self.security.copy();
        packet.refresh_from(&self.security);
        if self.msg_flags.has_priv() {
            match self.config.priv_protocol {
                PrivProtocol::Des => {
                    let salt = packet.allocate_des_salt();
                    packet.set_wire_salt(v3::des_wire_salt(packet.engine_boots, salt));
                }
                PrivProtocol::Aes128 => {
                    let salt = packet.allocate_aes_salt();
                    packet.set_wire_salt(v3::aes_wire_salt(salt));
                }
                PrivProtocol::NoPriv => {}
            }
        }
        Ok(packet)
    }

    /// Marshal, authenticate, and hand the datagram to the transport.
    async fn marshal_and_send(&self, scoped_pdu: ScopedPdu, msg_id: i32) -> Result<Bytes> {
        let security_params = self.prepare_packet_security()?;
        let msg = V3Message {
            msg_id,
            max_msg_size: v3::DEFAULT_MSG_MAX_SIZE,
            msg_flags: self.msg_flags,
            security_params,
            scoped_pdu,
        };

        let marshalled = v3::marshal(&msg)?;
        let mut bytes = marshalled.bytes.to_vec();
        if let Some(offset) = marshalled.auth_offset {
            let auth_key = msg
                .security_params
                .auth_key
                .as_ref()
                .ok_or(Error::Auth { kind: AuthErrorKind::NoAuthKey })?;
            let mac = v3::auth::compute(self.config.auth_protocol, auth_key, &bytes)?;
            bytes[offset..offset + 12].copy_from_slice(&mac);
        }
        let response = self
            .transport
            .send_one_request(Bytes::from(bytes), true, self.config.timeout, self.config.retries)
            .await
            .map_err(|err| self.retag_timeout(err, msg_id))?;
        Ok(response)
    }

    /// Unmarshal the response, verify it, and fold engine state from it.
    fn receive(&mut self, response: Bytes, expected_msg_id: i32) -> Result<OpaquePdu> {
        let unmarshalled = v3::unmarshal(response, Some(&self.security))?;

        if unmarshalled.msg_id != expected_msg_id {
            return Err(Error::MsgIdMismatch {
                expected: expected_msg_id as u32,
                actual: unmarshalled.msg_id as u32,
            });
        }

        if self.msg_flags.has_auth() {
            let scratch = unmarshalled
                .auth_scratch()
                .ok_or(Error::Auth { kind: AuthErrorKind::AuthParamsNotFound })?;
            let auth_key = self
                .security
                .auth_key
                .as_ref()
                .ok_or(Error::Auth { kind: AuthErrorKind::NoAuthKey })?;
            v3::auth::verify(
                self.config.auth_protocol,
                auth_key,
                &scratch,
                &unmarshalled.security_params.auth_params,
            )
            .map_err(|_| {
                tracing::warn!(peer = %self.peer_addr(), "MAC verification failed, discarding response");
                Error::AuthMismatch {
                    target: Some(self.peer_addr()),
                }
            })?;
        }

        self.security.refresh_from_wire(&unmarshalled.security_params);
        Ok(unmarshalled.scoped_pdu.pdu)
    }

    /// Send one request PDU body, running engine discovery first if needed,
    /// and retrying once if the reply is an out-of-time-window Report.
    pub async fn send(&mut self, pdu: OpaquePdu) -> Result<OpaquePdu> {
        if !self.engine_known() {
            self.discover_engine().await?;
        }

        let context_engine_id = self.config.context_engine_id.clone().unwrap_or_default();
        let context_name = self.config.context_name.clone();

        for attempt in 0..2 {
            let msg_id = self.next_msg_id();
            let scoped_pdu = ScopedPdu {
                context_engine_id: context_engine_id.clone(),
                context_name: context_name.clone(),
                pdu: pdu.clone(),
            };
            let response = self.marshal_and_send(scoped_pdu, msg_id).await?;
            let reply = self.receive(response, msg_id)?;
            if reply.is_report() && attempt == 0 {
                tracing::debug!(peer = %self.peer_addr(), "report received, retrying once with refreshed engine state");
                continue;
            }
            return Ok(reply);
        }
        unreachable!("loop always returns within two attempts")
    }
}
