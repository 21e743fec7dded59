//! PostgreSQL store adapter built on sqlx.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{Group, Item, Provider, ServiceEntry, User};

use super::{ResourceKind, RevokeOutcome, Store, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn subject_column(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => "google_subject",
        Provider::Github => "github_subject",
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            return StoreError::Conflict(constraint);
        }
    }
    StoreError::Unavailable(anyhow::Error::new(e))
}

#[async_trait]
impl Store for PgStore {
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_user_by_provider_subject(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT * FROM users WHERE {} = $1", subject_column(provider));
        sqlx::query_as::<_, User>(&sql)
            .bind(subject)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users
                (user_id, username, password_hash, email, google_subject, github_subject,
                 is_active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.google_subject)
        .bind(&user.github_subject)
        .bind(user.is_active)
        .bind(user.created_utc)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn set_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET is_active = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn create_group(&self, group: &Group, creator: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query("INSERT INTO groups (group_id, name, created_utc) VALUES ($1, $2, $3)")
            .bind(group.group_id)
            .bind(&group.name)
            .bind(group.created_utc)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2)")
            .bind(group.group_id)
            .bind(creator)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)
    }

    async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn list_groups_for_user(&self, user_id: Uuid) -> Result<Vec<Group>, StoreError> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT g.* FROM groups g
            JOIN group_members m ON m.group_id = g.group_id
            WHERE m.user_id = $1
            ORDER BY g.created_utc
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn create_item(&self, item: &Item, creator: Uuid) -> Result<(), StoreError> {
        // Item and creator grant commit together or not at all.
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query(
            r#"
            INSERT INTO items (item_id, name, description, category, tags, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.item_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(&item.tags)
        .bind(item.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        sqlx::query("INSERT INTO item_principals (item_id, user_id) VALUES ($1, $2)")
            .bind(item.item_id)
            .bind(creator)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<Item>, StoreError> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE item_id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn list_items_for_user(
        &self,
        user_id: Uuid,
        category: Option<&str>,
    ) -> Result<Vec<Item>, StoreError> {
        sqlx::query_as::<_, Item>(
            r#"
            SELECT i.* FROM items i
            JOIN item_principals p ON p.item_id = i.item_id
            WHERE p.user_id = $1 AND ($2::text IS NULL OR i.category = $2)
            ORDER BY i.created_utc
            "#,
        )
        .bind(user_id)
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn update_item(&self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE items SET name = $2, description = $3, category = $4, tags = $5
            WHERE item_id = $1
            "#,
        )
        .bind(item.item_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(&item.tags)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn delete_item(&self, item_id: Uuid) -> Result<(), StoreError> {
        // Cascades to principals and nested service entries.
        sqlx::query("DELETE FROM items WHERE item_id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn create_service(
        &self,
        service: &ServiceEntry,
        creator: Uuid,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query(
            r#"
            INSERT INTO services (service_id, item_id, name, host, port, login, secret, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(service.service_id)
        .bind(service.item_id)
        .bind(&service.name)
        .bind(&service.host)
        .bind(service.port)
        .bind(&service.login)
        .bind(&service.secret)
        .bind(service.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        sqlx::query("INSERT INTO service_principals (service_id, user_id) VALUES ($1, $2)")
            .bind(service.service_id)
            .bind(creator)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)
    }

    async fn get_service(&self, service_id: Uuid) -> Result<Option<ServiceEntry>, StoreError> {
        sqlx::query_as::<_, ServiceEntry>("SELECT * FROM services WHERE service_id = $1")
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn list_services_for_item(
        &self,
        item_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ServiceEntry>, StoreError> {
        sqlx::query_as::<_, ServiceEntry>(
            r#"
            SELECT s.* FROM services s
            JOIN service_principals p ON p.service_id = s.service_id
            WHERE s.item_id = $1 AND p.user_id = $2
            ORDER BY s.created_utc
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn update_service(&self, service: &ServiceEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE services SET name = $2, host = $3, port = $4, login = $5, secret = $6
            WHERE service_id = $1
            "#,
        )
        .bind(service.service_id)
        .bind(&service.name)
        .bind(&service.host)
        .bind(service.port)
        .bind(&service.login)
        .bind(&service.secret)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn delete_service(&self, service_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM services WHERE service_id = $1")
            .bind(service_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn is_principal_allowed(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE {id} = $1 AND user_id = $2)",
            table = kind.principals_table(),
            id = kind.id_column(),
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(resource_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn grant_principal(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {table} ({id}, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            table = kind.principals_table(),
            id = kind.id_column(),
        );
        sqlx::query(&sql)
            .bind(resource_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn revoke_principal(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<RevokeOutcome, StoreError> {
        // The count guard keeps the delete from orphaning the resource;
        // checking and deleting in one statement keeps it atomic.
        let sql = format!(
            r#"
            DELETE FROM {table}
            WHERE {id} = $1 AND user_id = $2
              AND (SELECT COUNT(*) FROM {table} WHERE {id} = $1) > 1
            "#,
            table = kind.principals_table(),
            id = kind.id_column(),
        );
        let result = sqlx::query(&sql)
            .bind(resource_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        if result.rows_affected() > 0 {
            return Ok(RevokeOutcome::Revoked);
        }

        if self.is_principal_allowed(kind, resource_id, user_id).await? {
            Ok(RevokeOutcome::LastPrincipal)
        } else {
            Ok(RevokeOutcome::NotAPrincipal)
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
