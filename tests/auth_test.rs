use dedkolya::gateway::auth::verify_bearer;

#[test]
fn valid_token_authenticates() {
    let expected = Some("my-secret-token".to_string());
    assert!(verify_bearer(Some("Bearer my-secret-token"), &expected));
}

#[test]
fn invalid_token_rejected() {
    let expected = Some("my-secret-token".to_string());
    assert!(!verify_bearer(Some("Bearer wrong-token"), &expected));
    assert!(!verify_bearer(Some("Bearer my-secret-token-longer"), &expected));
}

#[test]
fn no_token_configured_allows_all() {
    // Loopback mode: no token required
    assert!(verify_bearer(None, &None));
    assert!(verify_bearer(Some("Bearer anything"), &None));
}

#[test]
fn missing_or_non_bearer_header_rejected() {
    let expected = Some("secret".to_string());
    assert!(!verify_bearer(None, &expected));
    assert!(!verify_bearer(Some("secret"), &expected));
    assert!(!verify_bearer(Some("Basic c2VjcmV0"), &expected));
}
