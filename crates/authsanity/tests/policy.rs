use std::sync::{Arc, Mutex};

use authsanity::{
    AuthConfig, AuthPolicy, AuthRequest, EVERYONE, Error, Header, MemorySession,
    MemoryTicketStore, RequestHead, Session, share,
};
use serde_json::json;

const HOST: &str = "example.com";

fn policy(source: &str) -> AuthPolicy {
    let cfg = AuthConfig::from_settings([
        ("authsanity.source", source),
        ("authsanity.secret", "sekrit"),
    ])
    .unwrap();
    AuthPolicy::from_config(&cfg).unwrap()
}

/// Cookie credentials on a host that attaches a session to every request.
fn cookie_policy_with_sessions() -> AuthPolicy {
    let cfg = AuthConfig::from_settings([
        ("authsanity.source", "cookie"),
        ("authsanity.secret", "sekrit"),
        ("authsanity.session.facility", "true"),
    ])
    .unwrap();
    AuthPolicy::from_config(&cfg).unwrap()
}

fn store() -> Arc<MemoryTicketStore> {
    let store = MemoryTicketStore::new();
    store.add_principal("alice", ["editors"]);
    store.add_principal("bob", Vec::<String>::new());
    store
}

fn request(policy: &AuthPolicy, store: &Arc<MemoryTicketStore>, head: RequestHead) -> AuthRequest {
    policy.request(head).with_verification(store.verifier())
}

/// Turn `Set-Cookie` response headers into the `Cookie` header a browser
/// would send back.
fn cookies_from(headers: &[Header]) -> Header {
    let pairs: Vec<&str> = headers
        .iter()
        .filter(|h| h.name == "Set-Cookie")
        .filter_map(|h| h.value.split(';').next())
        .collect();
    Header::new("Cookie", pairs.join("; "))
}

fn tamper(cookie: &Header) -> Header {
    let mut value = cookie.value.clone();
    let at = value.len() / 2;
    let c = value.as_bytes()[at];
    let replacement = if c == b'A' { "B" } else { "A" };
    value.replace_range(at..=at, replacement);
    Header::new(&cookie.name, value)
}

#[test]
fn cookie_round_trip() {
    let policy = policy("cookie");
    let store = store();

    let mut login = request(&policy, &store, RequestHead::new(HOST));
    let headers = policy.remember(&mut login, "alice").unwrap();
    assert_eq!(headers.len(), 1);
    assert!(headers[0].value.starts_with("auth="));
    assert!(headers[0].value.contains("HttpOnly"));

    let head = RequestHead::new(HOST).with_headers([cookies_from(&headers)]);
    let mut next = request(&policy, &store, head);
    assert_eq!(
        policy.authenticated_userid(&mut next).unwrap().as_deref(),
        Some("alice")
    );
    assert_eq!(
        policy.effective_principals(&mut next).unwrap(),
        vec![EVERYONE, "system.Authenticated", "alice", "editors"]
    );
}

#[test]
fn header_round_trip() {
    let policy = policy("header");
    let store = store();

    let mut login = request(&policy, &store, RequestHead::new(HOST));
    let headers = policy.remember(&mut login, "alice").unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].name, "Authorization");
    assert!(headers[0].value.starts_with("Bearer "));

    let mut next = request(&policy, &store, RequestHead::new(HOST).with_headers(headers));
    assert_eq!(
        policy.authenticated_userid(&mut next).unwrap().as_deref(),
        Some("alice")
    );

    // Stateless: nothing to clear on logout.
    assert!(policy.forget(&mut next).unwrap().is_empty());
}

#[test]
fn session_round_trip() {
    let policy = policy("session");
    let store = store();
    let session = MemorySession::new().shared();

    let head = || RequestHead::new(HOST).with_session(share(&session));

    let mut login = request(&policy, &store, head());
    assert!(policy.remember(&mut login, "alice").unwrap().is_empty());

    let mut next = request(&policy, &store, head());
    assert_eq!(
        policy.authenticated_userid(&mut next).unwrap().as_deref(),
        Some("alice")
    );
}

#[test]
fn tampered_cookie_is_anonymous() {
    let policy = policy("cookie");
    let store = store();

    let mut login = request(&policy, &store, RequestHead::new(HOST));
    let headers = policy.remember(&mut login, "alice").unwrap();

    let head = RequestHead::new(HOST).with_headers([tamper(&cookies_from(&headers))]);
    let mut next = request(&policy, &store, head);
    assert_eq!(policy.authenticated_userid(&mut next).unwrap(), None);
    assert_eq!(policy.effective_principals(&mut next).unwrap(), vec![EVERYONE]);
}

#[test]
fn tampered_bearer_token_is_anonymous() {
    let policy = policy("header");
    let store = store();

    let mut login = request(&policy, &store, RequestHead::new(HOST));
    let headers = policy.remember(&mut login, "alice").unwrap();

    let mut next = request(
        &policy,
        &store,
        RequestHead::new(HOST).with_headers([tamper(&headers[0])]),
    );
    assert_eq!(policy.authenticated_userid(&mut next).unwrap(), None);
}

#[test]
fn forgotten_ticket_no_longer_authenticates() {
    let policy = policy("cookie");
    let store = store();

    let mut login = request(&policy, &store, RequestHead::new(HOST));
    let cookie = cookies_from(&policy.remember(&mut login, "alice").unwrap());
    assert_eq!(store.ticket_count(), 1);

    let head = RequestHead::new(HOST).with_headers([cookie.clone()]);
    let mut logout = request(&policy, &store, head);
    let cleared = policy.forget(&mut logout).unwrap();
    assert_eq!(cleared.len(), 1);
    assert!(cleared[0].value.contains("Max-Age=0"));
    assert_eq!(store.ticket_count(), 0);

    // A client that ignores the cleared cookie gets nowhere.
    let mut replay = request(&policy, &store, RequestHead::new(HOST).with_headers([cookie]));
    assert_eq!(policy.authenticated_userid(&mut replay).unwrap(), None);
}

#[test]
fn unknown_principal_is_rejected_without_headers() {
    let policy = policy("cookie");
    let store = store();

    let mut login = request(&policy, &store, RequestHead::new(HOST));
    let err = policy.remember(&mut login, "mallory").unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(store.ticket_count(), 0);
}

fn login_with_session(
    policy: &AuthPolicy,
    store: &Arc<MemoryTicketStore>,
    session: &Arc<Mutex<MemorySession>>,
    principal: &str,
) -> Header {
    let head = RequestHead::new(HOST).with_session(share(session));
    let mut req = request(policy, store, head);
    cookies_from(&policy.remember(&mut req, principal).unwrap())
}

#[test]
fn identity_change_invalidates_session() {
    let policy = cookie_policy_with_sessions();
    let store = store();
    let session = MemorySession::new().shared();

    let cookie = login_with_session(&policy, &store, &session, "alice");
    session
        .lock()
        .unwrap()
        .insert("draft".to_string(), json!("alice's draft"));
    let id_before = session.lock().unwrap().id().to_string();

    let head = RequestHead::new(HOST)
        .with_headers([cookie])
        .with_session(share(&session));
    let mut req = request(&policy, &store, head);
    assert_eq!(
        policy.authenticated_userid(&mut req).unwrap().as_deref(),
        Some("alice")
    );
    policy.remember(&mut req, "bob").unwrap();

    let session = session.lock().unwrap();
    assert_eq!(session.get("draft"), None);
    assert_ne!(session.id(), id_before);
}

#[test]
fn same_identity_keeps_data_but_rotates() {
    let policy = cookie_policy_with_sessions();
    let store = store();
    let session = MemorySession::new().shared();

    let cookie = login_with_session(&policy, &store, &session, "alice");
    session
        .lock()
        .unwrap()
        .insert("draft".to_string(), json!("alice's draft"));
    let (id_before, token_before) = {
        let s = session.lock().unwrap();
        (s.id().to_string(), s.csrf_token().to_string())
    };

    let head = RequestHead::new(HOST)
        .with_headers([cookie])
        .with_session(share(&session));
    let mut req = request(&policy, &store, head);
    policy.remember(&mut req, "alice").unwrap();

    let session = session.lock().unwrap();
    assert_eq!(session.get("draft"), Some(json!("alice's draft")));
    assert_ne!(session.id(), id_before);
    assert_ne!(session.csrf_token(), token_before);
}

#[test]
fn session_transport_relogin_stores_new_ticket() {
    let policy = policy("session");
    let store = store();
    let session = MemorySession::new().shared();
    let head = || RequestHead::new(HOST).with_session(share(&session));

    let mut first = request(&policy, &store, head());
    policy.remember(&mut first, "alice").unwrap();
    let stored = session.lock().unwrap().get("sanity.value").unwrap();

    let mut second = request(&policy, &store, head());
    policy.remember(&mut second, "alice").unwrap();
    let restored = session.lock().unwrap().get("sanity.value").unwrap();

    assert_eq!(stored[0], json!("alice"));
    assert_eq!(restored[0], json!("alice"));
    assert_ne!(stored[1], restored[1]);
}

#[test]
fn forget_invalidates_session() {
    let policy = policy("session");
    let store = store();
    let session = MemorySession::new().shared();
    let head = || RequestHead::new(HOST).with_session(share(&session));

    let mut login = request(&policy, &store, head());
    policy.remember(&mut login, "alice").unwrap();

    let mut logout = request(&policy, &store, head());
    assert!(policy.forget(&mut logout).unwrap().is_empty());
    assert!(session.lock().unwrap().items().is_empty());
    assert_eq!(store.ticket_count(), 0);

    let mut after = request(&policy, &store, head());
    assert_eq!(policy.authenticated_userid(&mut after).unwrap(), None);
}

#[test]
fn registered_session_facility_requires_a_session() {
    let policy = cookie_policy_with_sessions();
    let store = store();
    let session = MemorySession::new().shared();

    login_with_session(&policy, &store, &session, "alice");

    let mut bare = request(&policy, &store, RequestHead::new(HOST));
    assert!(matches!(
        policy.remember(&mut bare, "alice"),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn sessionless_login_does_not_disable_rotation() {
    let policy = cookie_policy_with_sessions();
    let store = store();

    let mut bare = request(&policy, &store, RequestHead::new(HOST));
    assert!(matches!(
        policy.remember(&mut bare, "alice"),
        Err(Error::Configuration(_))
    ));

    let session = MemorySession::new().shared();
    session
        .lock()
        .unwrap()
        .insert("pre".to_string(), json!("planted before login"));
    let id_before = session.lock().unwrap().id().to_string();

    login_with_session(&policy, &store, &session, "bob");

    let session = session.lock().unwrap();
    assert_eq!(session.get("pre"), None);
    assert_ne!(session.id(), id_before);
}

#[test]
fn huge_max_age_is_a_configuration_error() {
    let err = AuthConfig::from_settings([
        ("authsanity.source", "cookie"),
        ("authsanity.secret", "sekrit"),
        ("authsanity.cookie.max_age", "300000000000"),
    ])
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn long_max_age_still_logs_in() {
    let cfg = AuthConfig::from_settings([
        ("authsanity.source", "cookie"),
        ("authsanity.secret", "sekrit"),
        ("authsanity.cookie.max_age", "31536000"),
    ])
    .unwrap();
    let policy = AuthPolicy::from_config(&cfg).unwrap();
    let store = store();

    let mut login = request(&policy, &store, RequestHead::new(HOST));
    let headers = policy.remember(&mut login, "alice").unwrap();
    assert!(headers[0].value.contains("Max-Age=31536000"));
    assert!(headers[0].value.contains("Expires="));
}

#[test]
fn response_varies_on_cookie() {
    let policy = policy("cookie");
    let store = store();

    let mut req = request(&policy, &store, RequestHead::new(HOST));
    policy.effective_principals(&mut req).unwrap();
    policy.authenticated_userid(&mut req).unwrap();

    let mut response = Vec::new();
    req.finish(&mut response);
    assert_eq!(response, vec![Header::new("Vary", "Cookie")]);
}
