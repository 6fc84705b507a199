use std::sync::Arc;
use typed_auth::wire::ErrorBody;
use typed_auth::{
    Argon2Hasher, AuthConfig, AuthPolicy, AuthRequest, AuthService, AuthStrategy, AuthType,
    BasicCredentials, DebugTokenGenerator, Error, ExpiringStore, Gate, Lookup,
    MemoryDirectory, MemoryStore, ResetTokenManager, SessionPolicy, UserDirectory,
    DEFAULT_TOKEN_LENGTH,
};

const EMAIL: &str = "bob@example.com";
const PASSWORD: &str = "hunter2";
const COOKIE: &str = "_my_session_id";

struct Fixture {
    directory: Arc<MemoryDirectory>,
    service: AuthService,
    policy: AuthPolicy,
}

fn fixture(strategy: AuthStrategy) -> Fixture {
    let directory = Arc::new(MemoryDirectory::new());
    let sessions = Arc::new(ExpiringStore::new(MemoryStore::new(), SessionPolicy::new(3600)));
    let hasher = Arc::new(Argon2Hasher::new());

    let service = AuthService::new(directory.clone(), sessions.clone(), hasher.clone());
    let policy = AuthPolicy::new(
        strategy,
        AuthConfig::default().exempt(),
        directory.clone(),
        sessions,
        hasher,
    );
    Fixture {
        directory,
        service,
        policy,
    }
}

fn session_fixture() -> Fixture {
    fixture(AuthStrategy::Session {
        cookie_name: COOKIE.to_owned(),
    })
}

async fn stored_user(directory: &MemoryDirectory) -> typed_auth::UserRecord {
    directory.find_one(Lookup::Email(EMAIL)).await.unwrap().unwrap()
}

/// Exempt paths pass without any credential, regardless of the strategy.
#[async_std::test]
async fn test_exempt_paths_pass() {
    for strategy in [AuthStrategy::None, AuthStrategy::Basic] {
        let Fixture { policy, .. } = fixture(strategy);
        for path in ["/api/v1/status", "/api/v1/status/", "/api/v1/auth_session/login/"] {
            let gate = policy.gate(&AuthRequest::new(path)).await.unwrap();
            assert_eq!(gate, Gate::Allow(None), "{path}");
        }
    }
}

/// Requests without credential are unauthenticated, requests with an unknown one are forbidden.
#[async_std::test]
async fn test_session_gate() {
    let Fixture {
        service, policy, ..
    } = session_fixture();
    service.register_user(EMAIL, PASSWORD).await.unwrap();

    let request = AuthRequest::new("/api/v1/users/me");
    let gate = policy.gate(&request).await.unwrap();
    assert_eq!(gate, Gate::Unauthenticated);
    assert_eq!(gate.status(), 401);
    assert_eq!(gate.error_body(), Some(ErrorBody::unauthorized()));

    // A cookie with another name is no credential.
    let request = AuthRequest::new("/api/v1/users/me").with_cookie("session_id", "whatever");
    assert_eq!(policy.gate(&request).await.unwrap(), Gate::Unauthenticated);

    let request = AuthRequest::new("/api/v1/users/me").with_cookie(COOKIE, "whatever");
    let gate = policy.gate(&request).await.unwrap();
    assert_eq!(gate, Gate::Forbidden);
    assert_eq!(gate.status(), 403);

    let token = service.login(EMAIL, PASSWORD).await.unwrap().unwrap();
    let request = AuthRequest::new("/api/v1/users/me").with_cookie(COOKIE, token);
    let Gate::Allow(Some(user)) = policy.gate(&request).await.unwrap() else {
        panic!("session was not accepted");
    };
    assert_eq!(user.email, EMAIL);
}

/// Basic credentials are checked against the directory.
#[async_std::test]
async fn test_basic_gate() {
    let Fixture {
        service, policy, ..
    } = fixture(AuthStrategy::Basic);
    service.register_user(EMAIL, PASSWORD).await.unwrap();

    let valid = BasicCredentials::new(EMAIL, PASSWORD).to_header();
    let request = AuthRequest::new("/api/v1/users").with_header("Authorization", valid);
    let Gate::Allow(Some(user)) = policy.gate(&request).await.unwrap() else {
        panic!("credentials were not accepted");
    };
    assert_eq!(user.email, EMAIL);

    for header in [
        BasicCredentials::new(EMAIL, "wrong").to_header(),
        BasicCredentials::new("alice@example.com", PASSWORD).to_header(),
        "Basic not base64!".to_owned(),
        "Bearer abc".to_owned(),
        "Basic".to_owned(),
    ] {
        let request = AuthRequest::new("/api/v1/users").with_header("Authorization", header.clone());
        assert_eq!(policy.gate(&request).await.unwrap(), Gate::Forbidden, "{header}");
    }

    assert_eq!(
        policy.gate(&AuthRequest::new("/api/v1/users")).await.unwrap(),
        Gate::Unauthenticated
    );
}

/// Without an accepting strategy, credentials never resolve.
#[async_std::test]
async fn test_no_strategy_refuses_everything() {
    let Fixture {
        service, policy, ..
    } = fixture(AuthStrategy::None);
    service.register_user(EMAIL, PASSWORD).await.unwrap();

    let header = BasicCredentials::new(EMAIL, PASSWORD).to_header();
    let request = AuthRequest::new("/api/v1/users").with_header("Authorization", header);
    assert_eq!(policy.gate(&request).await.unwrap(), Gate::Forbidden);
    assert_eq!(policy.resolve_identity(&request).await.unwrap(), None);
}

/// Registering an email twice fails, and does not touch the first registration.
#[async_std::test]
async fn test_duplicate_registration() {
    let Fixture {
        directory, service, ..
    } = session_fixture();

    let user = service.register_user(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(user.email, EMAIL);
    assert_ne!(user.hashed_password, PASSWORD);

    assert!(matches!(
        service.register_user(EMAIL, "other").await,
        Err(Error::DuplicateRegistration { email }) if email == EMAIL
    ));
    assert_eq!(directory.len(), 1);
    assert!(service.valid_login(EMAIL, PASSWORD).await.unwrap());
}

/// Of two concurrent registrations of the same email, exactly one succeeds.
#[async_std::test]
async fn test_concurrent_registration() {
    for _ in 0..5 {
        let Fixture {
            directory, service, ..
        } = session_fixture();

        let tasks: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|password| {
                let service = service.clone();
                async_std::task::spawn(async move { service.register_user(EMAIL, password).await })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            match task.await {
                Ok(user) => {
                    assert_eq!(user.email, EMAIL);
                    successes += 1;
                }
                Err(error) => assert!(matches!(error, Error::DuplicateRegistration { .. })),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(directory.len(), 1);
    }
}

/// A login only succeeds with the right password.
#[async_std::test]
async fn test_login_validation() {
    let Fixture {
        directory, service, ..
    } = session_fixture();
    service.register_user(EMAIL, PASSWORD).await.unwrap();

    assert!(!service.valid_login(EMAIL, "wrong").await.unwrap());
    assert!(!service.valid_login("alice@example.com", PASSWORD).await.unwrap());
    assert!(!service.valid_login(EMAIL, "").await.unwrap());
    assert!(!service.valid_login("", "").await.unwrap());
    assert_eq!(service.login(EMAIL, "wrong").await.unwrap(), None);
    assert_eq!(stored_user(&directory).await.session_id, None);

    let token = service.login(EMAIL, PASSWORD).await.unwrap().unwrap();
    assert_eq!(stored_user(&directory).await.session_id, Some(token));
}

/// The full life of an account: registration, session, logout and password reset.
#[async_std::test]
async fn test_account_lifecycle() {
    let Fixture {
        directory,
        service,
        policy,
    } = session_fixture();

    service.register_user(EMAIL, PASSWORD).await.unwrap();
    let token = service.login(EMAIL, PASSWORD).await.unwrap().unwrap();

    let profile = service.profile(Some(&token)).await.unwrap().unwrap();
    assert_eq!(profile.email, EMAIL);
    assert_eq!(service.profile(None).await.unwrap(), None);
    assert_eq!(service.profile(Some("bogus")).await.unwrap(), None);

    assert!(service.logout(Some(&token)).await.unwrap());
    assert_eq!(service.profile(Some(&token)).await.unwrap(), None);
    assert_eq!(stored_user(&directory).await.session_id, None);
    assert!(!service.logout(Some(&token)).await.unwrap());
    assert!(!service.logout(None).await.unwrap());

    let request = AuthRequest::new("/api/v1/users/me").with_cookie(COOKIE, token);
    assert_eq!(policy.gate(&request).await.unwrap(), Gate::Forbidden);

    let reset_token = service.reset_password_token(EMAIL).await.unwrap();
    assert_eq!(stored_user(&directory).await.reset_token.as_ref(), Some(&reset_token));
    service.update_password(&reset_token, "correct horse").await.unwrap();
    assert_eq!(stored_user(&directory).await.reset_token, None);

    assert!(!service.valid_login(EMAIL, PASSWORD).await.unwrap());
    assert!(service.valid_login(EMAIL, "correct horse").await.unwrap());
    assert!(service.login(EMAIL, "correct horse").await.unwrap().is_some());
}

/// A second login replaces the session remembered by the user, but both stay valid.
#[async_std::test]
async fn test_logout_of_older_session() {
    let Fixture {
        directory, service, ..
    } = session_fixture();
    service.register_user(EMAIL, PASSWORD).await.unwrap();

    let first = service.login(EMAIL, PASSWORD).await.unwrap().unwrap();
    let second = service.login(EMAIL, PASSWORD).await.unwrap().unwrap();
    assert_ne!(first, second);

    assert!(service.logout(Some(&first)).await.unwrap());
    assert_eq!(stored_user(&directory).await.session_id, Some(second.clone()));
    assert!(service.profile(Some(&second)).await.unwrap().is_some());
}

/// Reset tokens can be used once, and only for known users.
#[async_std::test]
async fn test_reset_tokens() {
    let Fixture { service, .. } = session_fixture();
    service.register_user(EMAIL, PASSWORD).await.unwrap();

    assert!(matches!(
        service.reset_password_token("alice@example.com").await,
        Err(Error::UserNotFound)
    ));
    assert!(matches!(
        service.update_password("", "new").await,
        Err(Error::InvalidToken)
    ));
    assert!(matches!(
        service.update_password("unknown", "new").await,
        Err(Error::InvalidToken)
    ));

    let replaced = service.reset_password_token(EMAIL).await.unwrap();
    let token = service.reset_password_token(EMAIL).await.unwrap();
    assert_ne!(replaced, token);
    assert_eq!(token.len(), DEFAULT_TOKEN_LENGTH);
    assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    assert!(matches!(
        service.update_password(&replaced, "new").await,
        Err(Error::InvalidToken)
    ));

    service.update_password(&token, "new").await.unwrap();
    assert!(matches!(
        service.update_password(&token, "newer").await,
        Err(Error::InvalidToken)
    ));
    assert!(service.valid_login(EMAIL, "new").await.unwrap());
}

/// Of two concurrent consumptions of the same reset token, exactly one succeeds.
#[async_std::test]
async fn test_concurrent_reset() {
    let directory = Arc::new(MemoryDirectory::new());
    let hasher = Arc::new(Argon2Hasher::new());
    let resets = ResetTokenManager::new_with_generator(
        directory.clone(),
        hasher.clone(),
        Arc::new(DebugTokenGenerator::<32>::default()),
    );
    let service = AuthService::new_with_resets(
        directory.clone(),
        Arc::new(MemoryStore::new()),
        hasher,
        resets,
    );
    service.register_user(EMAIL, PASSWORD).await.unwrap();

    let token = service.reset_password_token(EMAIL).await.unwrap();
    assert_eq!(token, "0".repeat(32));

    let tasks: Vec<_> = ["first", "second"]
        .into_iter()
        .map(|password| {
            let resets = service.resets().clone();
            let token = token.clone();
            async_std::task::spawn(async move { resets.consume(&token, password).await })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        match task.await {
            Ok(()) => successes += 1,
            Err(error) => assert!(matches!(error, Error::InvalidToken)),
        }
    }
    assert_eq!(successes, 1);
    assert!(
        service.valid_login(EMAIL, "first").await.unwrap()
            ^ service.valid_login(EMAIL, "second").await.unwrap()
    );
}

/// The configured session store and strategy work together.
#[async_std::test]
async fn test_configured_persistent_sessions() {
    let directory = tempfile::tempdir().unwrap();
    let config = AuthConfig {
        auth_type: AuthType::SessionDbAuth,
        session_name: Some(COOKIE.to_owned()),
        session_duration: 60,
        sessions_file: directory.path().join("sessions.json"),
        ..Default::default()
    };

    let users = Arc::new(MemoryDirectory::new());
    let hasher = Arc::new(Argon2Hasher::new());
    let service = AuthService::new(users.clone(), config.session_store(), hasher.clone());
    service.register_user(EMAIL, PASSWORD).await.unwrap();
    let token = service.login(EMAIL, PASSWORD).await.unwrap().unwrap();

    // A policy over a freshly built store finds the session in the file.
    let policy = AuthPolicy::new(
        config.strategy(),
        config.exempt(),
        users,
        config.session_store(),
        hasher,
    );
    let request = AuthRequest::new("/api/v1/users/me").with_cookie(COOKIE, token);
    assert!(matches!(
        policy.gate(&request).await.unwrap(),
        Gate::Allow(Some(user)) if user.email == EMAIL
    ));
    assert!(config.sessions_file.exists());
}
