//! Integration tests for the Role, User and Session repositories using
//! in-memory SurrealDB.

use bastion_core::error::BastionError;
use bastion_core::models::capability::Capability;
use bastion_core::models::role::{CapabilityMap, CreateRole, UpdateRole};
use bastion_core::models::session::CreateSession;
use bastion_core::models::tenant::CreateTenant;
use bastion_core::models::user::{CreateUser, UpdateUser, UserStatus};
use bastion_core::repository::{
    Pagination, RoleRepository, SessionRepository, TenantRepository, UserRepository,
};
use bastion_db::repository::{
    SurrealRoleRepository, SurrealSessionRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    bastion_db::run_migrations(&db).await.unwrap();
    db
}

async fn create_tenant(db: &Surreal<Db>, slug: &str) -> Uuid {
    SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: slug.to_uppercase(),
            slug: slug.into(),
            metadata: None,
        })
        .await
        .unwrap()
        .id
}

fn editor(tenant_id: Option<Uuid>) -> CreateRole {
    let mut capabilities = CapabilityMap::new();
    capabilities.insert(Capability::Publish, true);
    capabilities.insert(Capability::DeleteTenant, false);
    CreateRole {
        tenant_id,
        name: "editor".into(),
        description: "Edits and publishes content".into(),
        is_superuser: false,
        capabilities,
    }
}

// -----------------------------------------------------------------------
// Roles
// -----------------------------------------------------------------------

#[tokio::test]
async fn role_capabilities_persist() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealRoleRepository::new(db);

    let role = repo.create(editor(Some(tenant))).await.unwrap();
    let fetched = repo.get_by_id(tenant, role.id).await.unwrap();

    assert_eq!(fetched.tenant_id, Some(tenant));
    assert!(fetched.grants(Capability::Publish));
    assert!(!fetched.grants(Capability::DeleteTenant));
    assert!(!fetched.grants(Capability::ManageSeo));
}

#[tokio::test]
async fn tenant_role_is_invisible_to_other_tenants() {
    let db = setup().await;
    let acme = create_tenant(&db, "acme").await;
    let globex = create_tenant(&db, "globex").await;
    let repo = SurrealRoleRepository::new(db);

    let role = repo.create(editor(Some(acme))).await.unwrap();

    let err = repo.get_by_id(globex, role.id).await.unwrap_err();
    assert!(matches!(err, BastionError::NotFound { .. }));
}

#[tokio::test]
async fn global_roles_are_listed_for_every_tenant() {
    let db = setup().await;
    let acme = create_tenant(&db, "acme").await;
    let globex = create_tenant(&db, "globex").await;
    let repo = SurrealRoleRepository::new(db);

    let global = repo
        .create(CreateRole {
            tenant_id: None,
            name: "superadmin".into(),
            description: "Everything everywhere".into(),
            is_superuser: true,
            capabilities: CapabilityMap::new(),
        })
        .await
        .unwrap();
    repo.create(editor(Some(acme))).await.unwrap();

    let acme_roles = repo.list(acme, Pagination::default()).await.unwrap();
    assert_eq!(acme_roles.total, 2);

    let globex_roles = repo.list(globex, Pagination::default()).await.unwrap();
    assert_eq!(globex_roles.total, 1);
    assert_eq!(globex_roles.items[0].id, global.id);
    assert!(globex_roles.items[0].is_global());

    assert_eq!(repo.list_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn update_role_capabilities() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealRoleRepository::new(db);
    let role = repo.create(editor(Some(tenant))).await.unwrap();

    let mut capabilities = CapabilityMap::new();
    capabilities.insert(Capability::ManageSeo, true);
    let updated = repo
        .update(
            tenant,
            role.id,
            UpdateRole {
                capabilities: Some(capabilities),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.grants(Capability::ManageSeo));
    assert!(!updated.grants(Capability::Publish));
}

#[tokio::test]
async fn global_role_cannot_be_edited_through_a_tenant() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealRoleRepository::new(db);
    let global = repo.create(editor(None)).await.unwrap();

    let err = repo
        .update(
            tenant,
            global.id,
            UpdateRole {
                is_superuser: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BastionError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_role_name_within_tenant_is_rejected() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealRoleRepository::new(db);

    repo.create(editor(Some(tenant))).await.unwrap();
    let err = repo.create(editor(Some(tenant))).await.unwrap_err();
    assert!(matches!(err, BastionError::AlreadyExists { .. }));
}

#[tokio::test]
async fn unknown_stored_capability_never_grants() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealRoleRepository::new(db.clone());
    let role = repo.create(editor(Some(tenant))).await.unwrap();

    db.query("UPDATE type::record('role', $id) SET capabilities.launch_rockets = true")
        .bind(("id", role.id.to_string()))
        .await
        .unwrap()
        .check()
        .unwrap();

    let fetched = repo.get_by_id(tenant, role.id).await.unwrap();
    assert_eq!(fetched.capabilities.len(), 2);
}

// -----------------------------------------------------------------------
// Users
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_user_hashes_password_and_starts_pending() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let role = SurrealRoleRepository::new(db.clone())
        .create(editor(Some(tenant)))
        .await
        .unwrap();
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(CreateUser {
            tenant_id: tenant,
            role_id: role.id,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "correct horse battery".into(),
            metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(user.status, UserStatus::PendingVerification);
    assert_eq!(user.role_id, role.id);
    assert_ne!(user.password_hash, "correct horse battery");

    let by_name = repo.get_by_username(tenant, "alice").await.unwrap();
    assert_eq!(by_name.id, user.id);
    let by_email = repo.get_by_email(tenant, "alice@example.com").await.unwrap();
    assert_eq!(by_email.id, user.id);
}

#[tokio::test]
async fn users_are_tenant_scoped() {
    let db = setup().await;
    let acme = create_tenant(&db, "acme").await;
    let globex = create_tenant(&db, "globex").await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(CreateUser {
            tenant_id: acme,
            role_id: Uuid::new_v4(),
            username: "bob".into(),
            email: "bob@example.com".into(),
            password: "another long password".into(),
            metadata: None,
        })
        .await
        .unwrap();

    assert!(repo.get_by_id(globex, user.id).await.is_err());
    assert!(repo.get_by_username(globex, "bob").await.is_err());
    assert_eq!(repo.list(globex, Pagination::default()).await.unwrap().total, 0);
    assert_eq!(repo.list(acme, Pagination::default()).await.unwrap().total, 1);
}

#[tokio::test]
async fn update_and_soft_delete_user() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealUserRepository::new(db);
    let user = repo
        .create(CreateUser {
            tenant_id: tenant,
            role_id: Uuid::new_v4(),
            username: "carol".into(),
            email: "carol@example.com".into(),
            password: "yet another password".into(),
            metadata: None,
        })
        .await
        .unwrap();

    let new_role = Uuid::new_v4();
    let updated = repo
        .update(
            tenant,
            user.id,
            UpdateUser {
                role_id: Some(new_role),
                status: Some(UserStatus::Active),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.role_id, new_role);
    assert!(updated.is_active());

    repo.delete(tenant, user.id).await.unwrap();
    let fetched = repo.get_by_id(tenant, user.id).await.unwrap();
    assert_eq!(fetched.status, UserStatus::Inactive);
}

#[tokio::test]
async fn foreign_tenant_cannot_deactivate_user() {
    let db = setup().await;
    let acme = create_tenant(&db, "acme").await;
    let globex = create_tenant(&db, "globex").await;
    let repo = SurrealUserRepository::new(db);
    let user = repo
        .create(CreateUser {
            tenant_id: acme,
            role_id: Uuid::new_v4(),
            username: "dana".into(),
            email: "dana@example.com".into(),
            password: "yet another long password".into(),
            metadata: None,
        })
        .await
        .unwrap();

    let err = repo.delete(globex, user.id).await.unwrap_err();
    assert!(matches!(err, BastionError::NotFound { .. }));
    let fetched = repo.get_by_id(acme, user.id).await.unwrap();
    assert_eq!(fetched.status, UserStatus::PendingVerification);
}

// -----------------------------------------------------------------------
// Sessions
// -----------------------------------------------------------------------

fn session(tenant_id: Uuid, user_id: Uuid, hash: &str, ttl: Duration) -> CreateSession {
    CreateSession {
        tenant_id,
        user_id,
        token_hash: hash.into(),
        ip_address: Some("203.0.113.7".into()),
        user_agent: None,
        expires_at: Utc::now() + ttl,
    }
}

#[tokio::test]
async fn session_lookup_by_token_hash() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealSessionRepository::new(db);
    let user = Uuid::new_v4();

    let created = repo
        .create(session(tenant, user, "abc123", Duration::hours(1)))
        .await
        .unwrap();

    let fetched = repo.get_by_token_hash(tenant, "abc123").await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.user_id, user);

    assert!(repo.invalidate(tenant, created.id).await.unwrap());
    assert!(repo.get_by_id(tenant, created.id).await.is_err());
    assert!(!repo.invalidate(tenant, created.id).await.unwrap());
}

#[tokio::test]
async fn foreign_tenant_cannot_invalidate_session() {
    let db = setup().await;
    let acme = create_tenant(&db, "acme").await;
    let globex = create_tenant(&db, "globex").await;
    let repo = SurrealSessionRepository::new(db);

    let created = repo
        .create(session(acme, Uuid::new_v4(), "abc123", Duration::hours(1)))
        .await
        .unwrap();

    assert!(!repo.invalidate(globex, created.id).await.unwrap());
    assert!(repo.get_by_id(acme, created.id).await.is_ok());
}

#[tokio::test]
async fn invalidate_user_sessions_removes_all() {
    let db = setup().await;
    let tenant = create_tenant(&db, "acme").await;
    let repo = SurrealSessionRepository::new(db);
    let user = Uuid::new_v4();

    repo.create(session(tenant, user, "one", Duration::hours(1)))
        .await
        .unwrap();
    repo.create(session(tenant, user, "two", Duration::hours(1)))
        .await
        .unwrap();

    repo.invalidate_user_sessions(tenant, user).await.unwrap();
    assert!(repo.get_by_token_hash(tenant, "one").await.is_err());
    assert!(repo.get_by_token_hash(tenant, "two").await.is_err());
}

#[tokio::test]
async fn cleanup_expired_sweeps_every_tenant() {
    let db = setup().await;
    let acme = create_tenant(&db, "acme").await;
    let globex = create_tenant(&db, "globex").await;
    let repo = SurrealSessionRepository::new(db);
    let user = Uuid::new_v4();

    for tenant in [acme, globex] {
        repo.create(session(tenant, user, "stale", Duration::hours(-1)))
            .await
            .unwrap();
        repo.create(session(tenant, user, "fresh", Duration::hours(1)))
            .await
            .unwrap();
    }

    assert_eq!(repo.cleanup_expired().await.unwrap(), 2);
    for tenant in [acme, globex] {
        assert!(repo.get_by_token_hash(tenant, "fresh").await.is_ok());
        assert!(repo.get_by_token_hash(tenant, "stale").await.is_err());
    }
    assert_eq!(repo.cleanup_expired().await.unwrap(), 0);
}
