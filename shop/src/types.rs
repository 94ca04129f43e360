//! Shared value types for the storefront.
//!
//! Identifiers, money and the small enums that cross module boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Catalog product identifier.
///
/// The only product id type used end to end. At the HTTP boundary it is
/// accepted as a JSON number or a decimal string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "ProductIdRepr", into = "u32")]
pub struct ProductId(u32);

impl ProductId {
    /// Create a product id
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The id following this one
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ProductId> for u32 {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl FromStr for ProductId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| format!("invalid product id: {s:?}"))
    }
}

/// Wire forms a product id may arrive in.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProductIdRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<ProductIdRepr> for ProductId {
    type Error = String;

    fn try_from(repr: ProductIdRepr) -> Result<Self, Self::Error> {
        match repr {
            ProductIdRepr::Number(n) => u32::try_from(n)
                .map(Self)
                .map_err(|_| format!("product id out of range: {n}")),
            ProductIdRepr::Text(s) => s.parse(),
        }
    }
}

/// Verified user identifier supplied by the auth collaborator.
///
/// Opaque to the storefront.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a verified identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a committed order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random `OrderId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrderId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a saved address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressId(Uuid);

impl AddressId {
    /// Creates a new random `AddressId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `AddressId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AddressId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an admin notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(Uuid);

impl NotificationId {
    /// Creates a new random `NotificationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `NotificationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one user's copy of a notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InboxEntryId(Uuid);

impl InboxEntryId {
    /// Creates a new random `InboxEntryId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `InboxEntryId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InboxEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InboxEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a product review
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(Uuid);

impl ReviewId {
    /// Creates a new random `ReviewId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReviewId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Money (minor units to avoid floating point errors)
// ============================================================================

/// A non-negative amount in minor currency units (paise).
///
/// JSON carries major units (rupees) as a number; conversion rounds to the
/// nearest minor unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates a `Money` value from whole major units
    #[must_use]
    pub const fn from_major(major: u64) -> Option<Self> {
        match major.checked_mul(100) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Convert a major-unit amount such as `99.5`, rounding to the nearest
    /// minor unit. Negative and non-finite amounts are rejected.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn try_from_major(amount: f64) -> Option<Self> {
        // 2^53 / 100 keeps the minor value exactly representable
        const MAX_MAJOR: f64 = 90_071_992_547_409.0;
        if !amount.is_finite() || amount < 0.0 || amount > MAX_MAJOR {
            return None;
        }
        Some(Self((amount * 100.0).round() as u64))
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(self) -> u64 {
        self.0
    }

    /// Returns the amount in major units
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Multiplies by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(product) => Some(Self(product)),
            None => None,
        }
    }

    /// Subtracts, stopping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl TryFrom<f64> for Money {
    type Error = String;

    fn try_from(amount: f64) -> Result<Self, Self::Error> {
        Self::try_from_major(amount)
            .ok_or_else(|| format!("amount must be a finite, non-negative number, got {amount}"))
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.major()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Lifecycle status of a committed order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Recorded but not yet paid
    Created,
    /// Payment verified
    Paid,
    /// Payment failed
    Failed,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled by an admin
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Created,
        Self::Paid,
        Self::Failed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether an admin may move an order from `self` to `next`.
    ///
    /// Re-applying the current status is always allowed (and changes nothing).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Created | Self::Paid | Self::Failed | Self::Cancelled)
                | (Self::Paid, Self::Paid | Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Shipped | Self::Delivered | Self::Cancelled)
                | (Self::Failed, Self::Failed)
                | (Self::Delivered, Self::Delivered)
                | (Self::Cancelled, Self::Cancelled)
        )
    }

    /// Statuses from which `self` may be reached.
    #[must_use]
    pub fn predecessors(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }

    /// Stable textual form, also used as the database value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Paid => "Paid",
            Self::Failed => "Failed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown order status: {s:?}"))
    }
}

/// Role carried by a verified identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular shopper
    #[default]
    Customer,
    /// Store administrator
    Admin,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn product_id_accepts_number_or_string() {
        let from_number: ProductId = serde_json::from_str("7").unwrap();
        let from_text: ProductId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(from_number, ProductId::new(7));
        assert_eq!(from_text, ProductId::new(7));
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "7");
    }

    #[test]
    fn product_id_rejects_garbage() {
        assert!(serde_json::from_str::<ProductId>("\"seven\"").is_err());
        assert!(serde_json::from_str::<ProductId>("-1").is_err());
        assert!(serde_json::from_str::<ProductId>("true").is_err());
    }

    #[test]
    fn money_rounds_major_units() {
        assert_eq!(Money::try_from_major(90.0), Some(Money::from_minor(9_000)));
        assert_eq!(Money::try_from_major(0.125), Some(Money::from_minor(13)));
        assert_eq!(Money::try_from_major(-1.0), None);
        assert_eq!(Money::try_from_major(f64::NAN), None);
        assert_eq!(Money::from_minor(9_005).to_string(), "90.05");
    }

    #[test]
    fn money_json_is_major_units() {
        let money: Money = serde_json::from_str("49.99").unwrap();
        assert_eq!(money.minor(), 4_999);
        assert_eq!(serde_json::to_string(&Money::from_minor(9_000)).unwrap(), "90.0");
        assert!(serde_json::from_str::<Money>("-5").is_err());
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let fifty = Money::from_major(50).unwrap();
        let eighty = Money::from_major(80).unwrap();
        assert_eq!(fifty.saturating_sub(eighty), Money::ZERO);
    }

    #[test]
    fn status_transitions_are_guarded() {
        use OrderStatus::*;
        assert!(Paid.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Paid.can_transition_to(Cancelled));
        assert!(Delivered.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Created));
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Delivered));
        assert_eq!(Shipped.predecessors(), vec![Paid, Shipped]);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
