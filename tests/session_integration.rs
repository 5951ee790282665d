//! End-to-end session tests: engine discovery followed by an authenticated
//! (and, separately, authenticated+encrypted) request/response exchange,
//! driven over a real loopback UDP socket standing in for the agent.
//!
//! These exercise the session orchestrator against engine discovery, the
//! V3 codec, authentication, and privacy together, rather than any one
//! piece in isolation — the unit tests colocated with each module already
//! cover the RFC 3414 Appendix A vectors and the component-level round
//! trips.

use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use snmp3_usm::ber::{Decoder, EncodeBuf, tag};
use snmp3_usm::prelude::*;
use snmp3_usm::v3::{self, MsgFlags, ScopedPdu, UsmSecurityParams, V3Message};

const ENGINE_ID: &[u8] = &[0x80, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03];
const ENGINE_BOOTS: u32 = 3;
const ENGINE_TIME: u32 = 1234;

/// Install an `EnvFilter`-driven subscriber once, so `RUST_LOG=trace cargo
/// test -- --nocapture` shows the session/engine-discovery traces these
/// tests exercise. Safe to call from every test; only the first call wins.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// Read only the V3 header's `msgID`, without touching (or requiring
/// decryption of) the Scoped PDU — mirrors what an agent needs before it
/// has derived any session-specific crypto material.
fn peek_msg_id(datagram: &[u8]) -> i32 {
    let mut dec = Decoder::new(Bytes::copy_from_slice(datagram));
    dec.expect_tag(tag::universal::SEQUENCE).unwrap();
    let _version = dec.read_integer().unwrap();
    let mut header = dec.read_sequence().unwrap();
    header.read_integer().unwrap()
}

fn response_pdu(request_id: i32) -> OpaquePdu {
    let mut buf = EncodeBuf::new();
    buf.push_constructed(tag::pdu::RESPONSE, |buf| {
        buf.push_sequence(|_| {}); // empty varbind list
        buf.push_integer(0); // error-index
        buf.push_integer(0); // error-status
        buf.push_integer(request_id);
    });
    OpaquePdu::new(buf.finish())
}

/// Build the Report PDU an agent sends in reply to the empty-USM-params
/// discovery probe.
fn report_response(msg_id: i32) -> Bytes {
    let mut params =
        UsmSecurityParams::new(Vec::new(), AuthProtocol::NoAuth, PrivProtocol::NoPriv).unwrap();
    params.engine_id = ENGINE_ID.to_vec();
    params.engine_boots = ENGINE_BOOTS;
    params.engine_time = ENGINE_TIME;

    let msg = V3Message {
        msg_id,
        max_msg_size: v3::DEFAULT_MSG_MAX_SIZE,
        msg_flags: MsgFlags::no_auth_no_priv(false),
        security_params: params,
        scoped_pdu: ScopedPdu {
            context_engine_id: ENGINE_ID.to_vec(),
            context_name: Vec::new(),
            pdu: response_pdu(msg_id),
        },
    };
    v3::marshal(&msg).unwrap().bytes
}

/// Build an `AuthNoPriv` Response, authenticated with the same credentials
/// the client session derives on its side.
fn authenticated_response(
    msg_id: i32,
    auth_protocol: AuthProtocol,
    auth_passphrase: &[u8],
    user_name: &[u8],
) -> Bytes {
    let auth_key = v3::auth::derive_key(auth_protocol, auth_passphrase, ENGINE_ID).unwrap();
    let mut params =
        UsmSecurityParams::new(user_name.to_vec(), auth_protocol, PrivProtocol::NoPriv).unwrap();
    params.engine_id = ENGINE_ID.to_vec();
    params.engine_boots = ENGINE_BOOTS;
    params.engine_time = ENGINE_TIME;
    params.auth_key = Some(auth_key.clone());

    let msg = V3Message {
        msg_id,
        max_msg_size: v3::DEFAULT_MSG_MAX_SIZE,
        msg_flags: MsgFlags::auth_no_priv(false),
        security_params: params,
        scoped_pdu: ScopedPdu {
            context_engine_id: ENGINE_ID.to_vec(),
            context_name: Vec::new(),
            pdu: response_pdu(msg_id),
        },
    };

    let marshalled = v3::marshal(&msg).unwrap();
    let mut bytes = marshalled.bytes.to_vec();
    let offset = marshalled.auth_offset.unwrap();
    let mac = v3::auth::compute(auth_protocol, &auth_key, &bytes).unwrap();
    bytes[offset..offset + 12].copy_from_slice(&mac);
    Bytes::from(bytes)
}

/// Build an `AuthPriv` Response: authenticated like above, with its Scoped
/// PDU additionally encrypted under the given privacy protocol.
fn authenticated_priv_response(
    msg_id: i32,
    auth_protocol: AuthProtocol,
    auth_passphrase: &[u8],
    priv_protocol: PrivProtocol,
    priv_passphrase: &[u8],
    user_name: &[u8],
) -> Bytes {
    let auth_key = v3::auth::derive_key(auth_protocol, auth_passphrase, ENGINE_ID).unwrap();
    // The priv key is localized with the auth protocol's hash, same as the client.
    let priv_localized = v3::auth::derive_key(auth_protocol, priv_passphrase, ENGINE_ID).unwrap();
    let priv_key = v3::PrivKey::new(priv_protocol, priv_localized.as_bytes()).unwrap();

    let mut params = UsmSecurityParams::new(user_name.to_vec(), auth_protocol, priv_protocol).unwrap();
    params.engine_id = ENGINE_ID.to_vec();
    params.engine_boots = ENGINE_BOOTS;
    params.engine_time = ENGINE_TIME;
    params.auth_key = Some(auth_key.clone());
    params.priv_key = Some(priv_key);
    params.set_wire_salt(v3::aes_wire_salt(99));

    let msg = V3Message {
        msg_id,
        max_msg_size: v3::DEFAULT_MSG_MAX_SIZE,
        msg_flags: MsgFlags::auth_priv(false),
        security_params: params,
        scoped_pdu: ScopedPdu {
            context_engine_id: ENGINE_ID.to_vec(),
            context_name: Vec::new(),
            pdu: response_pdu(msg_id),
        },
    };

    let marshalled = v3::marshal(&msg).unwrap();
    let mut bytes = marshalled.bytes.to_vec();
    let offset = marshalled.auth_offset.unwrap();
    let mac = v3::auth::compute(auth_protocol, &auth_key, &bytes).unwrap();
    bytes[offset..offset + 12].copy_from_slice(&mac);
    Bytes::from(bytes)
}

#[tokio::test]
async fn session_discovers_engine_and_completes_auth_no_priv_exchange() {
    init_tracing();
    let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let agent_addr = agent.local_addr().unwrap();

    let user = b"authuser".to_vec();
    let passphrase = b"authpassword1".to_vec();

    let agent_task = tokio::spawn({
        let passphrase = passphrase.clone();
        let user = user.clone();
        async move {
            let mut buf = [0u8; 2048];

            let (n, from) = agent.recv_from(&mut buf).await.unwrap();
            let probe_msg_id = peek_msg_id(&buf[..n]);
            let report = report_response(probe_msg_id);
            agent.send_to(&report, from).await.unwrap();

            let (n, from) = agent.recv_from(&mut buf).await.unwrap();
            let req_msg_id = peek_msg_id(&buf[..n]);
            let response = authenticated_response(req_msg_id, AuthProtocol::Sha1, &passphrase, &user);
            agent.send_to(&response, from).await.unwrap();
        }
    });

    let transport = UdpTransport::connect(agent_addr).await.unwrap();
    let config = SessionConfig::new(user)
        .auth(AuthProtocol::Sha1, passphrase)
        .timeout(Duration::from_secs(2));
    let mut session = Session::new(transport, config).unwrap();

    assert!(!session.engine_known());
    let reply = session.send(OpaquePdu::empty_get_request(1)).await.unwrap();
    assert_eq!(reply.tag().unwrap(), tag::pdu::RESPONSE);
    assert!(session.engine_known());

    agent_task.await.unwrap();
}

#[tokio::test]
async fn session_completes_auth_priv_aes_exchange() {
    init_tracing();
    let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let agent_addr = agent.local_addr().unwrap();

    let user = b"privuser".to_vec();
    let auth_pass = b"authpassword1".to_vec();
    let priv_pass = b"privpassword1".to_vec();

    let agent_task = tokio::spawn({
        let auth_pass = auth_pass.clone();
        let priv_pass = priv_pass.clone();
        let user = user.clone();
        async move {
            let mut buf = [0u8; 2048];

            let (n, from) = agent.recv_from(&mut buf).await.unwrap();
            let probe_msg_id = peek_msg_id(&buf[..n]);
            let report = report_response(probe_msg_id);
            agent.send_to(&report, from).await.unwrap();

            let (n, from) = agent.recv_from(&mut buf).await.unwrap();
            let req_msg_id = peek_msg_id(&buf[..n]);
            let response = authenticated_priv_response(
                req_msg_id,
                AuthProtocol::Sha1,
                &auth_pass,
                PrivProtocol::Aes128,
                &priv_pass,
                &user,
            );
            agent.send_to(&response, from).await.unwrap();
        }
    });

    let transport = UdpTransport::connect(agent_addr).await.unwrap();
    let config = SessionConfig::new(user)
        .auth(AuthProtocol::Sha1, auth_pass)
        .privacy(PrivProtocol::Aes128, priv_pass)
        .timeout(Duration::from_secs(2));
    let mut session = Session::new(transport, config).unwrap();

    let reply = session.send(OpaquePdu::empty_get_request(5)).await.unwrap();
    assert_eq!(reply.tag().unwrap(), tag::pdu::RESPONSE);

    agent_task.await.unwrap();
}

#[tokio::test]
async fn session_rejects_response_with_mismatched_msg_id() {
    init_tracing();
    let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let agent_addr = agent.local_addr().unwrap();

    let user = b"authuser".to_vec();
    let passphrase = b"authpassword1".to_vec();

    let agent_task = tokio::spawn({
        let passphrase = passphrase.clone();
        let user = user.clone();
        async move {
            let mut buf = [0u8; 2048];

            let (n, from) = agent.recv_from(&mut buf).await.unwrap();
            let probe_msg_id = peek_msg_id(&buf[..n]);
            let report = report_response(probe_msg_id);
            agent.send_to(&report, from).await.unwrap();

            let (n, from) = agent.recv_from(&mut buf).await.unwrap();
            let req_msg_id = peek_msg_id(&buf[..n]);
            // Respond with a deliberately wrong msgID.
            let response =
                authenticated_response(req_msg_id.wrapping_add(1), AuthProtocol::Sha1, &passphrase, &user);
            agent.send_to(&response, from).await.unwrap();
        }
    });

    let transport = UdpTransport::connect(agent_addr).await.unwrap();
    let config = SessionConfig::new(user)
        .auth(AuthProtocol::Sha1, passphrase)
        .timeout(Duration::from_secs(2))
        .retries(0);
    let mut session = Session::new(transport, config).unwrap();

    let err = session.send(OpaquePdu::empty_get_request(1)).await.unwrap_err();
    assert!(matches!(err, Error::MsgIdMismatch { .. }));

    agent_task.await.unwrap();
}
