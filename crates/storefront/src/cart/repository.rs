//! Storage backends for cart contents.
//!
//! `CartRepository` is the single interface the cart store is written
//! against; the session-backed and database-backed implementations are
//! selected by identity kind at request time.

use tower_sessions::Session;

use coffee_hub_core::{ProductId, UserId};

use super::CartError;
use crate::db::CartEntryRepository;
use crate::models::SessionCart;
use crate::models::session_keys;

/// One stored cart line, before any stock validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCartLine {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: u32,
}

/// Which representation a backend stores into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartKind {
    /// Anonymous, request-session-scoped mapping.
    Session,
    /// Per-user persistent rows.
    Persistent,
}

/// Storage interface for one identity's cart.
///
/// Implementations confine side effects to their own identity's storage;
/// cross-identity mutation happens only in [`super::reconcile`].
pub trait CartRepository {
    /// Which representation this backend stores into.
    fn kind(&self) -> CartKind;

    /// All stored lines for this identity.
    async fn lines(&self) -> Result<Vec<RawCartLine>, CartError>;

    /// Add `quantity` to the line for `(product, size)`, creating it if
    /// absent.
    async fn add(&self, product: ProductId, size: &str, quantity: u32) -> Result<(), CartError>;

    /// Set an absolute quantity; zero deletes the line. Returns `false` if
    /// the line was absent.
    async fn set_quantity(
        &self,
        product: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<bool, CartError>;

    /// Remove the line for `(product, size)`. Returns `false` if absent.
    async fn remove(&self, product: ProductId, size: &str) -> Result<bool, CartError>;

    /// Remove every line for this identity.
    async fn clear(&self) -> Result<(), CartError>;
}

/// Session-backed cart storage for anonymous visitors.
pub struct SessionCartRepository<'a> {
    session: &'a Session,
}

impl<'a> SessionCartRepository<'a> {
    /// Create a repository over the request's session.
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    async fn load(&self) -> Result<SessionCart, CartError> {
        Ok(self
            .session
            .get::<SessionCart>(session_keys::CART)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, cart: &SessionCart) -> Result<(), CartError> {
        if cart.is_empty() {
            self.session
                .remove::<SessionCart>(session_keys::CART)
                .await?;
        } else {
            self.session.insert(session_keys::CART, cart).await?;
        }
        Ok(())
    }
}

impl CartRepository for SessionCartRepository<'_> {
    fn kind(&self) -> CartKind {
        CartKind::Session
    }

    async fn lines(&self) -> Result<Vec<RawCartLine>, CartError> {
        let cart = self.load().await?;
        Ok(cart
            .lines()
            .map(|(product_id, size, quantity)| RawCartLine {
                product_id,
                size: size.to_owned(),
                quantity,
            })
            .collect())
    }

    async fn add(&self, product: ProductId, size: &str, quantity: u32) -> Result<(), CartError> {
        let mut cart = self.load().await?;
        cart.add(product, size, quantity);
        self.save(&cart).await
    }

    async fn set_quantity(
        &self,
        product: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<bool, CartError> {
        let mut cart = self.load().await?;
        let found = cart.set(product, size, quantity);
        if found {
            self.save(&cart).await?;
        }
        Ok(found)
    }

    async fn remove(&self, product: ProductId, size: &str) -> Result<bool, CartError> {
        let mut cart = self.load().await?;
        let removed = cart.remove(product, size);
        if removed {
            self.save(&cart).await?;
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.session
            .remove::<SessionCart>(session_keys::CART)
            .await?;
        Ok(())
    }
}

/// Database-backed cart storage for authenticated users.
pub struct PersistentCartRepository<'a> {
    entries: CartEntryRepository<'a>,
    user_id: UserId,
}

impl<'a> PersistentCartRepository<'a> {
    /// Create a repository over the user's cart entries.
    #[must_use]
    pub const fn new(pool: &'a sqlx::PgPool, user_id: UserId) -> Self {
        Self {
            entries: CartEntryRepository::new(pool),
            user_id,
        }
    }
}

impl CartRepository for PersistentCartRepository<'_> {
    fn kind(&self) -> CartKind {
        CartKind::Persistent
    }

    async fn lines(&self) -> Result<Vec<RawCartLine>, CartError> {
        let entries = self.entries.list(self.user_id).await?;
        Ok(entries
            .into_iter()
            .map(|entry| RawCartLine {
                product_id: entry.product_id,
                size: entry.size,
                quantity: u32::try_from(entry.quantity).unwrap_or(0),
            })
            .collect())
    }

    async fn add(&self, product: ProductId, size: &str, quantity: u32) -> Result<(), CartError> {
        self.entries.add(self.user_id, product, size, quantity).await?;
        Ok(())
    }

    async fn set_quantity(
        &self,
        product: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<bool, CartError> {
        Ok(self
            .entries
            .set_quantity(self.user_id, product, size, quantity)
            .await?)
    }

    async fn remove(&self, product: ProductId, size: &str) -> Result<bool, CartError> {
        Ok(self.entries.remove(self.user_id, product, size).await?)
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.entries.clear(self.user_id).await?;
        Ok(())
    }
}

/// Backend selected by identity kind: session storage for anonymous
/// visitors, the `cart_entry` table for authenticated users.
pub enum CartBackend<'a> {
    Session(SessionCartRepository<'a>),
    Persistent(PersistentCartRepository<'a>),
}

impl<'a> CartBackend<'a> {
    /// Select the backend for the current identity.
    #[must_use]
    pub const fn select(
        session: &'a Session,
        pool: &'a sqlx::PgPool,
        user_id: Option<UserId>,
    ) -> Self {
        match user_id {
            Some(user_id) => Self::Persistent(PersistentCartRepository::new(pool, user_id)),
            None => Self::Session(SessionCartRepository::new(session)),
        }
    }
}

impl CartRepository for CartBackend<'_> {
    fn kind(&self) -> CartKind {
        match self {
            Self::Session(repo) => repo.kind(),
            Self::Persistent(repo) => repo.kind(),
        }
    }

    async fn lines(&self) -> Result<Vec<RawCartLine>, CartError> {
        match self {
            Self::Session(repo) => repo.lines().await,
            Self::Persistent(repo) => repo.lines().await,
        }
    }

    async fn add(&self, product: ProductId, size: &str, quantity: u32) -> Result<(), CartError> {
        match self {
            Self::Session(repo) => repo.add(product, size, quantity).await,
            Self::Persistent(repo) => repo.add(product, size, quantity).await,
        }
    }

    async fn set_quantity(
        &self,
        product: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<bool, CartError> {
        match self {
            Self::Session(repo) => repo.set_quantity(product, size, quantity).await,
            Self::Persistent(repo) => repo.set_quantity(product, size, quantity).await,
        }
    }

    async fn remove(&self, product: ProductId, size: &str) -> Result<bool, CartError> {
        match self {
            Self::Session(repo) => repo.remove(product, size).await,
            Self::Persistent(repo) => repo.remove(product, size).await,
        }
    }

    async fn clear(&self) -> Result<(), CartError> {
        match self {
            Self::Session(repo) => repo.clear().await,
            Self::Persistent(repo) => repo.clear().await,
        }
    }
}
