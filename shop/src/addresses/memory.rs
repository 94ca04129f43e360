//! In-memory address book.

use super::{address_not_found, Address, AddressBook, AddressFields, AddressFuture};
use crate::error::ShopError;
use crate::types::{AddressId, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Address book keeping each user's addresses in creation order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressBook {
    books: Arc<Mutex<HashMap<UserId, Vec<Address>>>>,
}

impl InMemoryAddressBook {
    /// Create an empty address book
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ShopError {
    ShopError::Storage("address lock poisoned".to_string())
}

fn make_only_default(addresses: &mut [Address], id: AddressId) {
    for address in addresses.iter_mut() {
        address.is_default = address.id == id;
    }
}

impl AddressBook for InMemoryAddressBook {
    fn add(
        &self,
        user: &UserId,
        fields: AddressFields,
        make_default: bool,
        now: DateTime<Utc>,
    ) -> AddressFuture<'_, Address> {
        let books = Arc::clone(&self.books);
        let user = user.clone();
        Box::pin(async move {
            let mut books = books.lock().map_err(|_| poisoned())?;
            let addresses = books.entry(user.clone()).or_default();
            let address = Address {
                id: AddressId::new(),
                user_id: user,
                fields,
                is_default: addresses.is_empty() || make_default,
                created_at: now,
            };
            addresses.push(address.clone());
            if address.is_default {
                make_only_default(addresses, address.id);
            }
            Ok(address)
        })
    }

    fn update(
        &self,
        user: &UserId,
        id: AddressId,
        fields: AddressFields,
        make_default: bool,
    ) -> AddressFuture<'_, Address> {
        let books = Arc::clone(&self.books);
        let user = user.clone();
        Box::pin(async move {
            let mut books = books.lock().map_err(|_| poisoned())?;
            let addresses = books.get_mut(&user).ok_or_else(address_not_found)?;
            let index = addresses
                .iter()
                .position(|a| a.id == id)
                .ok_or_else(address_not_found)?;

            addresses[index].fields = fields;
            addresses[index].is_default = make_default;
            if make_default || !addresses.iter().any(|a| a.is_default) {
                make_only_default(addresses, id);
            }
            Ok(addresses[index].clone())
        })
    }

    fn list(&self, user: &UserId) -> AddressFuture<'_, Vec<Address>> {
        let books = Arc::clone(&self.books);
        let user = user.clone();
        Box::pin(async move {
            let books = books.lock().map_err(|_| poisoned())?;
            let mut addresses: Vec<Address> = books
                .get(&user)
                .map(|list| list.iter().rev().cloned().collect())
                .unwrap_or_default();
            // Stable: newest-first order survives within each group.
            addresses.sort_by_key(|a| !a.is_default);
            Ok(addresses)
        })
    }

    fn delete(&self, user: &UserId, id: AddressId) -> AddressFuture<'_, ()> {
        let books = Arc::clone(&self.books);
        let user = user.clone();
        Box::pin(async move {
            let mut books = books.lock().map_err(|_| poisoned())?;
            let addresses = books.get_mut(&user).ok_or_else(address_not_found)?;
            let index = addresses
                .iter()
                .position(|a| a.id == id)
                .ok_or_else(address_not_found)?;

            let removed = addresses.remove(index);
            if removed.is_default {
                if let Some(newest) = addresses.last_mut() {
                    newest.is_default = true;
                }
            }
            Ok(())
        })
    }

    fn set_default(&self, user: &UserId, id: AddressId) -> AddressFuture<'_, Address> {
        let books = Arc::clone(&self.books);
        let user = user.clone();
        Box::pin(async move {
            let mut books = books.lock().map_err(|_| poisoned())?;
            let addresses = books.get_mut(&user).ok_or_else(address_not_found)?;
            let address = addresses
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .ok_or_else(address_not_found)?;
            make_only_default(addresses, id);
            Ok(Address {
                is_default: true,
                ..address
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use storefront_testing::mocks::epoch;

    fn fields(name: &str) -> AddressFields {
        AddressFields {
            name: name.to_string(),
            phone: "1".into(),
            street: "s".into(),
            city: "c".into(),
            state: "st".into(),
            pincode: "p".into(),
            country: "India".into(),
        }
    }

    async fn defaults(book: &InMemoryAddressBook, user: &UserId) -> Vec<String> {
        book.list(user)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.fields.name)
            .collect()
    }

    #[tokio::test]
    async fn first_address_is_default() {
        let book = InMemoryAddressBook::new();
        let user = UserId::new("u");
        let first = book.add(&user, fields("home"), false, epoch()).await.unwrap();
        assert!(first.is_default);
        let second = book.add(&user, fields("work"), false, epoch()).await.unwrap();
        assert!(!second.is_default);
    }

    #[tokio::test]
    async fn adding_a_default_unsets_the_previous_one() {
        let book = InMemoryAddressBook::new();
        let user = UserId::new("u");
        book.add(&user, fields("home"), false, epoch()).await.unwrap();
        book.add(&user, fields("work"), true, epoch()).await.unwrap();
        assert_eq!(defaults(&book, &user).await, vec!["work"]);
    }

    #[tokio::test]
    async fn deleting_the_default_promotes_the_newest() {
        let book = InMemoryAddressBook::new();
        let user = UserId::new("u");
        let home = book.add(&user, fields("home"), false, epoch()).await.unwrap();
        book.add(&user, fields("old"), false, epoch() + Duration::minutes(1)).await.unwrap();
        book.add(&user, fields("new"), false, epoch() + Duration::minutes(2)).await.unwrap();

        book.delete(&user, home.id).await.unwrap();
        assert_eq!(defaults(&book, &user).await, vec!["new"]);
    }

    #[tokio::test]
    async fn unchecking_the_only_default_keeps_it() {
        let book = InMemoryAddressBook::new();
        let user = UserId::new("u");
        let home = book.add(&user, fields("home"), false, epoch()).await.unwrap();
        let updated = book.update(&user, home.id, fields("home2"), false).await.unwrap();
        assert!(updated.is_default);
        assert_eq!(updated.fields.name, "home2");
    }

    #[tokio::test]
    async fn list_puts_default_first_then_newest() {
        let book = InMemoryAddressBook::new();
        let user = UserId::new("u");
        book.add(&user, fields("a"), false, epoch()).await.unwrap();
        book.add(&user, fields("b"), false, epoch()).await.unwrap();
        book.add(&user, fields("c"), false, epoch()).await.unwrap();
        let names: Vec<String> = book
            .list(&user)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.fields.name)
            .collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn other_users_addresses_are_not_found() {
        let book = InMemoryAddressBook::new();
        let owner = UserId::new("owner");
        let address = book.add(&owner, fields("home"), false, epoch()).await.unwrap();
        let intruder = UserId::new("intruder");
        assert!(matches!(
            book.set_default(&intruder, address.id).await,
            Err(ShopError::NotFound(_))
        ));
        assert!(matches!(
            book.delete(&intruder, address.id).await,
            Err(ShopError::NotFound(_))
        ));
    }
}
