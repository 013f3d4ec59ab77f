//! User repository for accounts and stored checkout defaults.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use coffee_hub_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::{Role, User, UserProfile};
use crate::models::ContactDetails;

/// Raw user row; parsed into [`User`] with validation.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = Role::parse(&self.role).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("unknown role in database: {}", self.role))
        })?;

        Ok(User {
            id: self.id,
            email,
            role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email or role
    /// is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, role, created_at, updated_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// Create a new user with email and password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (email, role)
            VALUES ($1, 'customer')
            RETURNING id, email, role, created_at, updated_at
            ",
        )
        .bind(email.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email"))?;

        sqlx::query(
            r"
            INSERT INTO user_password (user_id, password_hash)
            VALUES ($1, $2)
            ",
        )
        .bind(row.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        row.into_user()
    }

    /// Get a user and their password hash by email.
    ///
    /// Returns `None` if the user doesn't exist or has no password set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: UserId,
            email: String,
            role: String,
            created_at: DateTime<Utc>,
            updated_at: DateTime<Utc>,
            password_hash: Option<String>,
        }

        let row = sqlx::query_as::<_, Row>(
            r"
            SELECT u.id, u.email, u.role, u.created_at, u.updated_at, p.password_hash
            FROM users u
            LEFT JOIN user_password p ON u.id = p.user_id
            WHERE u.email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Some(password_hash) = row.password_hash else {
            return Ok(None);
        };

        let user = UserRow {
            id: row.id,
            email: row.email,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
        .into_user()?;

        Ok(Some((user, password_hash)))
    }

    /// Get a user's stored checkout defaults.
    ///
    /// Returns an empty profile if none has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn profile(&self, user_id: UserId) -> Result<UserProfile, RepositoryError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r"
            SELECT full_name, phone_number, country, postcode, town_or_city,
                   street_address1, street_address2, county
            FROM user_profile
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(profile.unwrap_or_default())
    }

    /// Replace a user's stored checkout defaults.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_profile(
        &self,
        user_id: UserId,
        profile: &UserProfile,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO user_profile (user_id, full_name, phone_number, country,
                                      postcode, town_or_city, street_address1,
                                      street_address2, county)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id)
            DO UPDATE SET full_name = EXCLUDED.full_name,
                          phone_number = EXCLUDED.phone_number,
                          country = EXCLUDED.country,
                          postcode = EXCLUDED.postcode,
                          town_or_city = EXCLUDED.town_or_city,
                          street_address1 = EXCLUDED.street_address1,
                          street_address2 = EXCLUDED.street_address2,
                          county = EXCLUDED.county
            ",
        )
        .bind(user_id)
        .bind(&profile.full_name)
        .bind(&profile.phone_number)
        .bind(&profile.country)
        .bind(&profile.postcode)
        .bind(&profile.town_or_city)
        .bind(&profile.street_address1)
        .bind(&profile.street_address2)
        .bind(&profile.county)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Snapshot committed order contact details as the user's new defaults.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_profile_from_contact(
        &self,
        user_id: UserId,
        contact: &ContactDetails,
    ) -> Result<(), RepositoryError> {
        let profile = UserProfile {
            full_name: Some(contact.full_name.clone()),
            phone_number: Some(contact.phone_number.clone()),
            country: Some(contact.country.clone()),
            postcode: contact.postcode.clone(),
            town_or_city: Some(contact.town_or_city.clone()),
            street_address1: Some(contact.street_address1.clone()),
            street_address2: contact.street_address2.clone(),
            county: contact.county.clone(),
        };
        self.save_profile(user_id, &profile).await
    }
}
