//! USM security parameters store (RFC 3414 §3).

use std::sync::Arc;

use super::auth::LocalizedKey;
use super::privacy::{PrivKey, SaltCounter};
use super::{AuthProtocol, PrivProtocol};

/// Per-session/per-packet USM security parameters.
///
/// Value-copyable: [`UsmSecurityParams::copy`] produces an independent
/// snapshot, so mutating the session's copy (engine id/boots/time) never
/// retroactively changes a copy already attached to an in-flight packet.
/// The salt counter is the one field kept behind an `Arc` so that all
/// copies derived from one session share and atomically advance it.
#[derive(Clone, Debug)]
pub struct UsmSecurityParams {
    pub engine_id: Vec<u8>,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub user_name: Vec<u8>,
    pub auth_params: Vec<u8>,
    pub priv_params: Vec<u8>,
    pub auth_protocol: AuthProtocol,
    pub priv_protocol: PrivProtocol,
    pub auth_key: Option<LocalizedKey>,
    pub priv_key: Option<PrivKey>,
    salt: Arc<SaltCounter>,
}

impl UsmSecurityParams {
    /// Construct fresh session-level parameters with a newly seeded salt counter.
    pub fn new(
        user_name: Vec<u8>,
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
    ) -> crate::error::Result<Self> {
        Ok(Self {
            engine_id: Vec::new(),
            engine_boots: 0,
            engine_time: 0,
            user_name,
            auth_params: Vec::new(),
            priv_params: Vec::new(),
            auth_protocol,
            priv_protocol,
            auth_key: None,
            priv_key: None,
            salt: Arc::new(SaltCounter::new()?),
        })
    }

    /// Deep-copy these parameters. The returned copy shares the same salt
    /// counter `Arc` — allocating a salt on either copy advances the same
    /// atomic counter.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Copy only engine id/boots/time from `other` into `self`.
    pub fn refresh_from(&mut self, other: &UsmSecurityParams) {
        self.engine_id = other.engine_id.clone();
        self.engine_boots = other.engine_boots;
        self.engine_time = other.engine_time;
    }

    /// Copy discovered engine state into `self`.
    pub fn refresh_from_engine(&mut self, state: &super::EngineState) {
        self.engine_id = state.engine_id.clone();
        self.engine_boots = state.engine_boots;
        self.engine_time = state.engine_time;
    }

    /// Copy engine id/boots/time out of a just-parsed response's wire
    /// security parameters (RFC 3414 §3.2 step 7 bookkeeping).
    pub fn refresh_from_wire(&mut self, wire: &super::message::WireUsmParams) {
        self.engine_id = wire.engine_id.clone();
        self.engine_boots = wire.engine_boots;
        self.engine_time = wire.engine_time;
    }

    /// Set the wire-form `msgPrivacyParameters` (the 8-byte salt field).
    pub fn set_wire_salt(&mut self, salt: [u8; 8]) {
        self.priv_params = salt.to_vec();
    }

    /// Whether engine discovery has populated the engine id.
    pub fn engine_known(&self) -> bool {
        !self.engine_id.is_empty()
    }

    /// Atomically allocate the next DES salt for this session.
    pub fn allocate_des_salt(&self) -> u32 {
        self.salt.allocate_des()
    }

    /// Atomically allocate the next AES salt for this session.
    pub fn allocate_aes_salt(&self) -> u64 {
        self.salt.allocate_aes()
    }
}
