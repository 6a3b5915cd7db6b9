//! # Persistence Collaborator
//!
//! The [`Store`] trait is the boundary contract with persistence: typed CRUD
//! per resource, existence checks, and the derived inverse-relation views.
//! The core never embeds mutual object references; relations are owning
//! foreign keys on the referencing row, and the inverse collections
//! (`shop.items`, `category.items`, `user.shops`) are computed here from
//! those keys. Removing or re-pointing an owning key therefore updates both
//! relation sides in one step, with no half-linked state observable.
//!
//! [`InMemoryStore`] is the shipped implementation: arena maps keyed by a
//! server-assigned `u64` sequence, guarded by a single mutex so that the
//! referential-integrity and uniqueness checks performed at commit time are
//! atomic with the write they protect.
//!
//! Uniqueness (user email, category slug) and referential integrity are
//! ultimately enforced here, at the commit boundary. The validation layer
//! only pre-checks; a concurrent writer can still lose the race and receives
//! [`StoreError::Conflict`].

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{Category, EntityKind, Item, Shop, User};

/// Errors signaled by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested row does not exist.
    NotFound,
    /// A storage-level constraint was violated at commit time
    /// (uniqueness, or a referenced row missing/still referenced).
    Conflict(String),
    /// An internal storage failure.
    Internal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "row not found"),
            StoreError::Conflict(msg) => write!(f, "storage conflict: {}", msg),
            StoreError::Internal(msg) => write!(f, "internal storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// The persistence boundary for the marketplace resources.
///
/// Implementations must be thread-safe; every operation is an independent
/// unit of work and the store is the concurrency boundary. Create operations
/// assign the row key and return the stored row; update operations return
/// `Ok(false)` when the row does not exist, in the same shape the other
/// read-modify operations use.
pub trait Store: Send + Sync {
    // User operations

    /// Stores a new user, assigning its key. Fails with
    /// [`StoreError::Conflict`] if the email is already in use.
    fn create_user(&self, user: User) -> Result<User, StoreError>;

    /// Retrieves a user by key.
    fn get_user(&self, key: u64) -> Result<Option<User>, StoreError>;

    /// Lists all users, ordered by key.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Replaces a stored user. Returns `Ok(false)` if the row does not exist;
    /// fails with [`StoreError::Conflict`] if the new email collides with a
    /// different user.
    fn update_user(&self, user: &User) -> Result<bool, StoreError>;

    /// Deletes a user. Fails with [`StoreError::Conflict`] while any shop
    /// still references the user as owner.
    fn delete_user(&self, key: u64) -> Result<bool, StoreError>;

    /// Looks up a user by exact email.
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    // Shop operations

    /// Stores a new shop, assigning its key. The owner key must resolve.
    fn create_shop(&self, shop: Shop) -> Result<Shop, StoreError>;

    /// Retrieves a shop by key.
    fn get_shop(&self, key: u64) -> Result<Option<Shop>, StoreError>;

    /// Lists all shops, ordered by key.
    fn list_shops(&self) -> Result<Vec<Shop>, StoreError>;

    /// Replaces a stored shop. The owner key must resolve.
    fn update_shop(&self, shop: &Shop) -> Result<bool, StoreError>;

    /// Deletes a shop. Fails with [`StoreError::Conflict`] while any item
    /// still references it.
    fn delete_shop(&self, key: u64) -> Result<bool, StoreError>;

    /// Derived inverse view: all shops owned by the given user.
    fn shops_for_owner(&self, owner: u64) -> Result<Vec<Shop>, StoreError>;

    // Category operations

    /// Stores a new category, assigning its key. Fails with
    /// [`StoreError::Conflict`] if the slug is already in use.
    fn create_category(&self, category: Category) -> Result<Category, StoreError>;

    /// Retrieves a category by key.
    fn get_category(&self, key: u64) -> Result<Option<Category>, StoreError>;

    /// Lists all categories, ordered by key.
    fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Replaces a stored category, with the same slug constraint as create.
    fn update_category(&self, category: &Category) -> Result<bool, StoreError>;

    /// Deletes a category. Fails with [`StoreError::Conflict`] while any
    /// item still references it.
    fn delete_category(&self, key: u64) -> Result<bool, StoreError>;

    // Item operations

    /// Stores a new item, assigning its key. The shop and category keys must
    /// resolve; a reference that vanished since validation is a
    /// [`StoreError::Conflict`], not a silent success.
    fn create_item(&self, item: Item) -> Result<Item, StoreError>;

    /// Retrieves an item by key.
    fn get_item(&self, key: u64) -> Result<Option<Item>, StoreError>;

    /// Lists all items, ordered by key.
    fn list_items(&self) -> Result<Vec<Item>, StoreError>;

    /// Replaces a stored item. The shop and category keys must resolve.
    fn update_item(&self, item: &Item) -> Result<bool, StoreError>;

    /// Deletes an item. Inverse membership in `shop.items` and
    /// `category.items` disappears with the row.
    fn delete_item(&self, key: u64) -> Result<bool, StoreError>;

    /// Derived inverse view: all items belonging to the given shop.
    fn items_for_shop(&self, shop: u64) -> Result<Vec<Item>, StoreError>;

    /// Derived inverse view: all items belonging to the given category.
    fn items_for_category(&self, category: u64) -> Result<Vec<Item>, StoreError>;

    // Generic operations

    /// Reports whether a row of the given kind exists under the given key.
    fn contains(&self, kind: EntityKind, key: u64) -> Result<bool, StoreError>;
}

//////////////////////////////////////////// InMemoryStore /////////////////////////////////////////

#[derive(Default)]
struct Shelves {
    users: HashMap<u64, User>,
    shops: HashMap<u64, Shop>,
    categories: HashMap<u64, Category>,
    items: HashMap<u64, Item>,
    next_key: u64,
}

impl Shelves {
    fn assign_key(&mut self) -> u64 {
        self.next_key += 1;
        self.next_key
    }
}

/// Thread-safe in-memory implementation of [`Store`].
///
/// One mutex guards all four arenas so cross-arena integrity checks are
/// atomic with their writes. Keys come from a single sequence shared across
/// kinds.
///
/// # Examples
///
/// ```rust
/// use brocante::{InMemoryStore, Store, User};
///
/// let store = InMemoryStore::new();
/// let user = store
///     .create_user(User {
///         key: 0,
///         email: "vendeur@collector.shop".to_string(),
///         pseudo: "RetroHunter".to_string(),
///         password: "hashed".to_string(),
///         roles: vec!["ROLE_USER".to_string()],
///         is_verified: true,
///     })
///     .unwrap();
/// assert!(user.key > 0);
/// assert_eq!(store.get_user(user.key).unwrap().unwrap().email, user.email);
/// ```
pub struct InMemoryStore {
    inner: Mutex<Shelves>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        InMemoryStore {
            inner: Mutex::new(Shelves::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_key<T: Clone>(map: &HashMap<u64, T>) -> Vec<T> {
    let mut keys: Vec<&u64> = map.keys().collect();
    keys.sort();
    keys.into_iter().map(|k| map[k].clone()).collect()
}

impl Store for InMemoryStore {
    fn create_user(&self, mut user: User) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {:?} already in use",
                user.email
            )));
        }
        user.key = inner.assign_key();
        inner.users.insert(user.key, user.clone());
        Ok(user)
    }

    fn get_user(&self, key: u64) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&key).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(sorted_by_key(&inner.users))
    }

    fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&user.key) {
            return Ok(false);
        }
        if inner
            .users
            .values()
            .any(|u| u.key != user.key && u.email == user.email)
        {
            return Err(StoreError::Conflict(format!(
                "email {:?} already in use",
                user.email
            )));
        }
        inner.users.insert(user.key, user.clone());
        Ok(true)
    }

    fn delete_user(&self, key: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&key) {
            return Ok(false);
        }
        if inner.shops.values().any(|s| s.owner == key) {
            return Err(StoreError::Conflict(
                "user still owns shops".to_string(),
            ));
        }
        inner.users.remove(&key);
        Ok(true)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    fn create_shop(&self, mut shop: Shop) -> Result<Shop, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&shop.owner) {
            return Err(StoreError::Conflict(
                "shop owner no longer resolves".to_string(),
            ));
        }
        shop.key = inner.assign_key();
        inner.shops.insert(shop.key, shop.clone());
        Ok(shop)
    }

    fn get_shop(&self, key: u64) -> Result<Option<Shop>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.shops.get(&key).cloned())
    }

    fn list_shops(&self) -> Result<Vec<Shop>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(sorted_by_key(&inner.shops))
    }

    fn update_shop(&self, shop: &Shop) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.shops.contains_key(&shop.key) {
            return Ok(false);
        }
        if !inner.users.contains_key(&shop.owner) {
            return Err(StoreError::Conflict(
                "shop owner no longer resolves".to_string(),
            ));
        }
        inner.shops.insert(shop.key, shop.clone());
        Ok(true)
    }

    fn delete_shop(&self, key: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.shops.contains_key(&key) {
            return Ok(false);
        }
        if inner.items.values().any(|i| i.shop == key) {
            return Err(StoreError::Conflict(
                "shop still contains items".to_string(),
            ));
        }
        inner.shops.remove(&key);
        Ok(true)
    }

    fn shops_for_owner(&self, owner: u64) -> Result<Vec<Shop>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut shops: Vec<Shop> = inner
            .shops
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect();
        shops.sort_by_key(|s| s.key);
        Ok(shops)
    }

    fn create_category(&self, mut category: Category) -> Result<Category, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.categories.values().any(|c| c.slug == category.slug) {
            return Err(StoreError::Conflict(format!(
                "slug {:?} already in use",
                category.slug
            )));
        }
        category.key = inner.assign_key();
        inner.categories.insert(category.key, category.clone());
        Ok(category)
    }

    fn get_category(&self, key: u64) -> Result<Option<Category>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.categories.get(&key).cloned())
    }

    fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(sorted_by_key(&inner.categories))
    }

    fn update_category(&self, category: &Category) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.categories.contains_key(&category.key) {
            return Ok(false);
        }
        if inner
            .categories
            .values()
            .any(|c| c.key != category.key && c.slug == category.slug)
        {
            return Err(StoreError::Conflict(format!(
                "slug {:?} already in use",
                category.slug
            )));
        }
        inner.categories.insert(category.key, category.clone());
        Ok(true)
    }

    fn delete_category(&self, key: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.categories.contains_key(&key) {
            return Ok(false);
        }
        if inner.items.values().any(|i| i.category == key) {
            return Err(StoreError::Conflict(
                "category still contains items".to_string(),
            ));
        }
        inner.categories.remove(&key);
        Ok(true)
    }

    fn create_item(&self, mut item: Item) -> Result<Item, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.shops.contains_key(&item.shop) {
            return Err(StoreError::Conflict(
                "item shop no longer resolves".to_string(),
            ));
        }
        if !inner.categories.contains_key(&item.category) {
            return Err(StoreError::Conflict(
                "item category no longer resolves".to_string(),
            ));
        }
        item.key = inner.assign_key();
        inner.items.insert(item.key, item.clone());
        Ok(item)
    }

    fn get_item(&self, key: u64) -> Result<Option<Item>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.items.get(&key).cloned())
    }

    fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(sorted_by_key(&inner.items))
    }

    fn update_item(&self, item: &Item) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.items.contains_key(&item.key) {
            return Ok(false);
        }
        if !inner.shops.contains_key(&item.shop) {
            return Err(StoreError::Conflict(
                "item shop no longer resolves".to_string(),
            ));
        }
        if !inner.categories.contains_key(&item.category) {
            return Err(StoreError::Conflict(
                "item category no longer resolves".to_string(),
            ));
        }
        inner.items.insert(item.key, item.clone());
        Ok(true)
    }

    fn delete_item(&self, key: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.items.remove(&key).is_some())
    }

    fn items_for_shop(&self, shop: u64) -> Result<Vec<Item>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<Item> = inner
            .items
            .values()
            .filter(|i| i.shop == shop)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.key);
        Ok(items)
    }

    fn items_for_category(&self, category: u64) -> Result<Vec<Item>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<Item> = inner
            .items
            .values()
            .filter(|i| i.category == category)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.key);
        Ok(items)
    }

    fn contains(&self, kind: EntityKind, key: u64) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        let present = match kind {
            EntityKind::User => inner.users.contains_key(&key),
            EntityKind::Shop => inner.shops.contains_key(&key),
            EntityKind::Category => inner.categories.contains_key(&key),
            EntityKind::Item => inner.items.contains_key(&key),
        };
        Ok(present)
    }
}
