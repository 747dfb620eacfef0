//! End-to-end authentication flows against the in-memory stores

use argon2::Params;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use common::{PageRequest, StoreError};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Barrier, Notify};
use uuid::Uuid;

use auth::memory::{MemoryCredentialStore, MemorySessionStore};
use auth::models::{Capability, NewUser, Role, Session, User};
use auth::{
    AuthError, AuthService, CredentialStore, JwtConfig, PasswordHasher, SessionStore, TokenCodec,
};

const SECRET: &str = "integration-test-secret-that-is-long-enough";
const AGENT: &str = "test-agent/1.0";
const IP: &str = "127.0.0.1";

fn jwt_config() -> JwtConfig {
    JwtConfig::new(SecretString::from(SECRET))
}

fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::with_params(Params::new(1024, 1, 1, None).unwrap())
}

struct Harness {
    service: AuthService,
    users: MemoryCredentialStore,
    sessions: MemorySessionStore,
}

fn harness_with(config: JwtConfig) -> Harness {
    let users = MemoryCredentialStore::new();
    let sessions = MemorySessionStore::new();
    let service = AuthService::new(
        Arc::new(users.clone()),
        Arc::new(sessions.clone()),
        TokenCodec::new(config).unwrap(),
        cheap_hasher(),
    );
    Harness {
        service,
        users,
        sessions,
    }
}

fn harness() -> Harness {
    harness_with(jwt_config())
}

fn candidate(username: &str, email: &str, password: &str) -> NewUser {
    NewUser {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password: SecretString::from(password),
        role: Role::User,
    }
}

async fn login(
    service: &AuthService,
    username: &str,
    password: &str,
) -> Result<(User, Session), AuthError> {
    service
        .login(username, SecretString::from(password), AGENT, IP)
        .await
}

#[tokio::test]
async fn test_alice_login_validate_logout() {
    let h = harness();
    h.service
        .register(candidate("alice", "alice@x.com", "Secret123"))
        .await
        .unwrap();

    let (user, session) = login(&h.service, "alice", "Secret123").await.unwrap();
    assert_eq!(user.username, "alice");
    assert!(user.last_login_at.is_some());
    assert!(!session.access_token.is_empty());
    assert!(!session.refresh_token.is_empty());
    assert!(session.access_expires_at < session.refresh_expires_at);

    let claims = h.service.validate_access_token(&session.access_token).await.unwrap();
    assert_eq!(claims.role, Role::User);
    assert_eq!(claims.user_id, user.id);

    h.service.logout(&session.access_token).await.unwrap();

    let err = h.service.validate_access_token(&session.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));
}

#[tokio::test]
async fn test_register_hashes_password() {
    let h = harness();
    let user = h
        .service
        .register(candidate("bob", "bob@x.com", "hunter22"))
        .await
        .unwrap();

    assert!(user.active);
    assert_eq!(user.role, Role::User);
    assert_ne!(user.password_hash, "hunter22");
    assert!(user.password_hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn test_duplicate_email_or_username_rejected() {
    let h = harness();
    h.service
        .register(candidate("carol", "carol@x.com", "pw-one"))
        .await
        .unwrap();

    let same_email = h
        .service
        .register(candidate("someone-else", "carol@x.com", "pw-two"))
        .await
        .unwrap_err();
    assert!(matches!(same_email, AuthError::UserAlreadyExists));

    let same_username = h
        .service
        .register(candidate("carol", "other@x.com", "pw-two"))
        .await
        .unwrap_err();
    assert!(matches!(same_username, AuthError::UserAlreadyExists));
}

#[tokio::test]
async fn test_concurrent_registration_admits_one() {
    let h = harness();

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .register(candidate("dave", &format!("dave{}@x.com", i), "pw"))
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AuthError::UserAlreadyExists) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_bad_credentials_are_indistinguishable() {
    let h = harness();
    h.service
        .register(candidate("erin", "erin@x.com", "right-password"))
        .await
        .unwrap();

    let wrong_password = login(&h.service, "erin", "wrong-password").await.unwrap_err();
    assert!(matches!(wrong_password, AuthError::InvalidCredentials));

    let unknown_user = login(&h.service, "nobody", "right-password").await.unwrap_err();
    assert!(matches!(unknown_user, AuthError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
}

#[tokio::test]
async fn test_inactive_user_cannot_login() {
    let h = harness();
    let user = h
        .service
        .register(candidate("frank", "frank@x.com", "pw"))
        .await
        .unwrap();

    h.service.update_user_status(user.id, false).await.unwrap();
    let err = login(&h.service, "frank", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::UserInactive));

    h.service.update_user_status(user.id, true).await.unwrap();
    login(&h.service, "frank", "pw").await.unwrap();
}

#[tokio::test]
async fn test_deactivation_keeps_existing_sessions() {
    let h = harness();
    let user = h
        .service
        .register(candidate("gina", "gina@x.com", "pw"))
        .await
        .unwrap();
    let (_, session) = login(&h.service, "gina", "pw").await.unwrap();

    h.service.update_user_status(user.id, false).await.unwrap();

    h.service.validate_access_token(&session.access_token).await.unwrap();
}

#[tokio::test]
async fn test_status_change_for_unknown_user() {
    let h = harness();
    let err = h.service.update_user_status(Uuid::new_v4(), false).await.unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound));
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let h = harness();
    h.service
        .register(candidate("hank", "hank@x.com", "pw"))
        .await
        .unwrap();
    let (_, first) = login(&h.service, "hank", "pw").await.unwrap();

    let second = h
        .service
        .refresh_tokens(&first.refresh_token, "other-agent", "10.0.0.1")
        .await
        .unwrap();

    assert_ne!(second.id, first.id);
    assert_ne!(second.access_token, first.access_token);
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_eq!(second.user_agent, "other-agent");
    assert_eq!(second.ip_address, "10.0.0.1");

    h.service.validate_access_token(&second.access_token).await.unwrap();

    let replay = h
        .service
        .refresh_tokens(&first.refresh_token, AGENT, IP)
        .await
        .unwrap_err();
    assert!(matches!(replay, AuthError::RefreshTokenExpired));

    let old_access = h.service.validate_access_token(&first.access_token).await.unwrap_err();
    assert!(matches!(old_access, AuthError::SessionInvalid));
}

#[tokio::test]
async fn test_expired_refresh_token_reports_expiry() {
    let config = JwtConfig {
        refresh_token_ttl: TimeDelta::seconds(-5),
        ..jwt_config()
    };
    let h = harness_with(config);
    h.service
        .register(candidate("ivy", "ivy@x.com", "pw"))
        .await
        .unwrap();
    let (_, session) = login(&h.service, "ivy", "pw").await.unwrap();

    let err = h
        .service
        .refresh_tokens(&session.refresh_token, AGENT, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenExpired));
}

#[tokio::test]
async fn test_session_side_refresh_expiry() {
    let h = harness();
    let user = h
        .service
        .register(candidate("jack", "jack@x.com", "pw"))
        .await
        .unwrap();

    let codec = TokenCodec::new(jwt_config()).unwrap();
    let (access, mut refresh) = codec.issue_pair(&user).unwrap();
    refresh.expires_at = Utc::now() - TimeDelta::seconds(1);
    h.sessions
        .create(Session::new(user.id, access, refresh.clone(), AGENT, IP))
        .await
        .unwrap();

    let err = h
        .service
        .refresh_tokens(&refresh.token, AGENT, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenExpired));
}

#[tokio::test]
async fn test_token_kinds_are_not_interchangeable() {
    let h = harness();
    h.service
        .register(candidate("kate", "kate@x.com", "pw"))
        .await
        .unwrap();
    let (_, session) = login(&h.service, "kate", "pw").await.unwrap();

    let access_as_refresh = h
        .service
        .refresh_tokens(&session.access_token, AGENT, IP)
        .await
        .unwrap_err();
    assert!(matches!(access_as_refresh, AuthError::InvalidToken));

    let refresh_as_access = h
        .service
        .validate_access_token(&session.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(refresh_as_access, AuthError::InvalidToken));
}

#[tokio::test]
async fn test_foreign_and_garbage_tokens_rejected() {
    let h = harness();
    let user = h
        .service
        .register(candidate("liam", "liam@x.com", "pw"))
        .await
        .unwrap();

    let err = h.service.validate_access_token("not-a-token").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken));

    let foreign = TokenCodec::new(JwtConfig::new(SecretString::from(
        "a-completely-different-secret-of-enough-length",
    )))
    .unwrap();
    let (access, _) = foreign.issue_pair(&user).unwrap();
    let err = h.service.validate_access_token(&access.token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken));
}

#[tokio::test]
async fn test_signed_token_without_session_is_rejected() {
    let h = harness();
    let user = h
        .service
        .register(candidate("mia", "mia@x.com", "pw"))
        .await
        .unwrap();

    let codec = TokenCodec::new(jwt_config()).unwrap();
    let (access, _) = codec.issue_pair(&user).unwrap();

    let err = h.service.validate_access_token(&access.token).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));
}

#[tokio::test]
async fn test_logout_is_per_session_and_repeatable() {
    let h = harness();
    h.service
        .register(candidate("noah", "noah@x.com", "pw"))
        .await
        .unwrap();
    let (_, session) = login(&h.service, "noah", "pw").await.unwrap();
    let (_, other) = login(&h.service, "noah", "pw").await.unwrap();

    h.service.logout(&session.access_token).await.unwrap();
    h.service.logout(&session.access_token).await.unwrap();
    h.service.validate_access_token(&other.access_token).await.unwrap();

    let unknown = h.service.logout("never-issued").await.unwrap_err();
    assert!(matches!(unknown, AuthError::SessionInvalid));
}

#[tokio::test]
async fn test_delete_user_revokes_every_session() {
    let h = harness();
    let user = h
        .service
        .register(candidate("olga", "olga@x.com", "pw"))
        .await
        .unwrap();
    let (_, first) = login(&h.service, "olga", "pw").await.unwrap();
    let (_, second) = login(&h.service, "olga", "pw").await.unwrap();

    h.service.delete_user(user.id).await.unwrap();

    for token in [&first.access_token, &second.access_token] {
        let err = h.service.validate_access_token(token).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
    }

    let err = login(&h.service, "olga", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(h.users.get_by_id(user.id).await.unwrap().is_none());

    let again = h.service.delete_user(user.id).await.unwrap_err();
    assert!(matches!(again, AuthError::UserNotFound));
}

#[tokio::test]
async fn test_deleted_username_can_be_registered_again() {
    let h = harness();
    let user = h
        .service
        .register(candidate("pete", "pete@x.com", "pw"))
        .await
        .unwrap();
    h.service.delete_user(user.id).await.unwrap();

    let reborn = h
        .service
        .register(candidate("pete", "pete@x.com", "pw"))
        .await
        .unwrap();
    assert_ne!(reborn.id, user.id);
}

#[tokio::test]
async fn test_revoke_all_sessions_counts_live_sessions() {
    let h = harness();
    let user = h
        .service
        .register(candidate("quinn", "quinn@x.com", "pw"))
        .await
        .unwrap();
    let (_, first) = login(&h.service, "quinn", "pw").await.unwrap();
    login(&h.service, "quinn", "pw").await.unwrap();
    h.service.logout(&first.access_token).await.unwrap();

    assert_eq!(h.service.revoke_all_sessions(user.id).await.unwrap(), 1);
    assert_eq!(h.service.revoke_all_sessions(user.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_bootstrap_admin_only_once() {
    let h = harness();
    assert!(!h.service.admin_exists().await.unwrap());

    let admin = h
        .service
        .bootstrap_admin(candidate("root", "root@x.com", "pw"))
        .await
        .unwrap();
    assert_eq!(admin.role, Role::Admin);
    assert!(h.service.admin_exists().await.unwrap());

    let err = h
        .service
        .bootstrap_admin(candidate("root2", "root2@x.com", "pw"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AdminAlreadyExists));
}

#[tokio::test]
async fn test_authorize_by_role() {
    let h = harness();
    h.service
        .register(candidate("rita", "rita@x.com", "pw"))
        .await
        .unwrap();
    h.service
        .bootstrap_admin(candidate("sam", "sam@x.com", "pw"))
        .await
        .unwrap();

    let (_, user_session) = login(&h.service, "rita", "pw").await.unwrap();
    let (_, admin_session) = login(&h.service, "sam", "pw").await.unwrap();

    h.service
        .authorize(&user_session.access_token, Capability::ReadCatalog)
        .await
        .unwrap();
    let err = h
        .service
        .authorize(&user_session.access_token, Capability::ManageUsers)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));

    let claims = h
        .service
        .authorize(&admin_session.access_token, Capability::ManageUsers)
        .await
        .unwrap();
    assert_eq!(claims.role, Role::Admin);
}

#[tokio::test]
async fn test_list_users_pages_live_users() {
    let h = harness();
    let mut ids = Vec::new();
    for name in ["tom", "uma", "vic"] {
        let user = h
            .service
            .register(candidate(name, &format!("{name}@x.com"), "pw"))
            .await
            .unwrap();
        ids.push(user.id);
    }

    let (page, total) = h.service.list_users(PageRequest::new(1, 2)).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(total, 3);

    h.service.delete_user(ids[0]).await.unwrap();
    let (page, total) = h.service.list_users(PageRequest::new(1, 10)).await.unwrap();
    assert_eq!(total, 2);
    assert!(page.iter().all(|u| u.id != ids[0]));
}

/// Session store whose `rotate` always fails
struct FailingRotation {
    inner: MemorySessionStore,
}

#[async_trait]
impl SessionStore for FailingRotation {
    async fn create(&self, session: Session) -> Result<Session, StoreError> {
        self.inner.create(session).await
    }

    async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_by_access_token(token).await
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_by_refresh_token(token).await
    }

    async fn revoke_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.revoke_by_id(id).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        self.inner.revoke_all_for_user(user_id).await
    }

    async fn rotate(&self, _old: Uuid, _replacement: Session) -> Result<Session, StoreError> {
        Err(StoreError::Corrupt("injected failure".to_string()))
    }
}

#[tokio::test]
async fn test_failed_rotation_consumes_refresh_token() {
    let users = MemoryCredentialStore::new();
    let sessions = MemorySessionStore::new();
    let service = AuthService::new(
        Arc::new(users),
        Arc::new(FailingRotation {
            inner: sessions.clone(),
        }),
        TokenCodec::new(jwt_config()).unwrap(),
        cheap_hasher(),
    );
    service
        .register(candidate("wendy", "wendy@x.com", "pw"))
        .await
        .unwrap();
    let (_, session) = login(&service, "wendy", "pw").await.unwrap();

    let err = service
        .refresh_tokens(&session.refresh_token, AGENT, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RotationFailed(_)));

    let stored = sessions
        .get_by_refresh_token(&session.refresh_token)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.revoked);

    let retry = service
        .refresh_tokens(&session.refresh_token, AGENT, IP)
        .await
        .unwrap_err();
    assert!(matches!(retry, AuthError::RefreshTokenExpired));
}

/// Session store that stalls on `create`
struct StalledSessions {
    inner: MemorySessionStore,
}

#[async_trait]
impl SessionStore for StalledSessions {
    async fn create(&self, session: Session) -> Result<Session, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.inner.create(session).await
    }

    async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_by_access_token(token).await
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_by_refresh_token(token).await
    }

    async fn revoke_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.revoke_by_id(id).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        self.inner.revoke_all_for_user(user_id).await
    }

    async fn rotate(&self, old: Uuid, replacement: Session) -> Result<Session, StoreError> {
        self.inner.rotate(old, replacement).await
    }
}

#[tokio::test]
async fn test_store_deadline_surfaces_timeout() {
    let service = AuthService::new(
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(StalledSessions {
            inner: MemorySessionStore::new(),
        }),
        TokenCodec::new(jwt_config()).unwrap(),
        cheap_hasher(),
    )
    .with_store_timeout(Duration::from_millis(50));

    service
        .register(candidate("xena", "xena@x.com", "pw"))
        .await
        .unwrap();

    let err = login(&service, "xena", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::Store(StoreError::Timeout(_))));
}

/// Session store that holds refresh-token lookups until two callers arrive
struct PairedLookups {
    inner: MemorySessionStore,
    barrier: Barrier,
}

#[async_trait]
impl SessionStore for PairedLookups {
    async fn create(&self, session: Session) -> Result<Session, StoreError> {
        self.inner.create(session).await
    }

    async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_by_access_token(token).await
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.barrier.wait().await;
        self.inner.get_by_refresh_token(token).await
    }

    async fn revoke_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.revoke_by_id(id).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        self.inner.revoke_all_for_user(user_id).await
    }

    async fn rotate(&self, old: Uuid, replacement: Session) -> Result<Session, StoreError> {
        self.inner.rotate(old, replacement).await
    }
}

#[tokio::test]
async fn test_concurrent_refreshes_mint_one_session() {
    let sessions = MemorySessionStore::new();
    let service = AuthService::new(
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(PairedLookups {
            inner: sessions.clone(),
            barrier: Barrier::new(2),
        }),
        TokenCodec::new(jwt_config()).unwrap(),
        cheap_hasher(),
    );
    service
        .register(candidate("yara", "yara@x.com", "pw"))
        .await
        .unwrap();
    let (_, session) = login(&service, "yara", "pw").await.unwrap();

    let (first, second) = tokio::join!(
        service.refresh_tokens(&session.refresh_token, AGENT, IP),
        service.refresh_tokens(&session.refresh_token, AGENT, IP),
    );

    let (winner, loser) = match (first, second) {
        (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
        (first, second) => panic!("expected one rotation, got {first:?} and {second:?}"),
    };
    assert!(matches!(loser, AuthError::RefreshTokenExpired));

    let stored = sessions
        .get_by_access_token(&winner.access_token)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.revoked);
    assert_eq!(sessions.revoke_all_for_user(winner.user_id).await.unwrap(), 1);
}

/// Session store whose `create` parks until released
struct ParkedCreate {
    inner: MemorySessionStore,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl SessionStore for ParkedCreate {
    async fn create(&self, session: Session) -> Result<Session, StoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.create(session).await
    }

    async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_by_access_token(token).await
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_by_refresh_token(token).await
    }

    async fn revoke_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.revoke_by_id(id).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        self.inner.revoke_all_for_user(user_id).await
    }

    async fn rotate(&self, old: Uuid, replacement: Session) -> Result<Session, StoreError> {
        self.inner.rotate(old, replacement).await
    }
}

#[tokio::test]
async fn test_login_racing_delete_leaves_no_live_session() {
    let sessions = MemorySessionStore::new();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let service = AuthService::new(
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(ParkedCreate {
            inner: sessions.clone(),
            entered: entered.clone(),
            release: release.clone(),
        }),
        TokenCodec::new(jwt_config()).unwrap(),
        cheap_hasher(),
    );
    let user = service
        .register(candidate("zoe", "zoe@x.com", "pw"))
        .await
        .unwrap();

    let racing = service.clone();
    let pending = tokio::spawn(async move { login(&racing, "zoe", "pw").await });

    entered.notified().await;
    service.delete_user(user.id).await.unwrap();
    release.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound));
    assert_eq!(sessions.revoke_all_for_user(user.id).await.unwrap(), 0);
}
