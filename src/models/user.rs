use std::{borrow::Cow, fmt, str::FromStr};

use bcrypt::{hash, verify};
use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::{validate_email, Validate, ValidationError, ValidationErrors};

use crate::error::UserError;

/// Work factor used for every stored password hash.
pub const BCRYPT_COST: u32 = 10;

const USER_NAME_TOO_SHORT: &str = "Le nom d'utilisateur doit contenir au moins 3 caractères.";
const USER_NAME_TOO_LONG: &str = "Le nom d'utilisateur ne peut pas dépasser 40 caractères.";
const EMAIL_REQUIRED: &str = "L'adresse e-mail est requise.";
const EMAIL_INVALID: &str = "L'adresse e-mail n'est pas valide.";
const PASSWORD_TOO_SHORT: &str = "Le mot de passe doit contenir au moins 8 caractères.";

#[derive(Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_user_name")]
    pub user_name: Option<String>,
    /// bcrypt hash; absent when the document was read with the default projection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    /// Plaintext waiting to be hashed by `prepare_for_write`.
    #[serde(skip)]
    pending_password: Option<String>,
    #[validate(custom = "validate_user_email")]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(
        equal = 10,
        message = "Le numéro de téléphone doit contenir exactement 10 chiffres."
    ))]
    pub phone: Option<String>,
    #[validate]
    pub profile_image: ProfileImage,
    #[serde(default)]
    pub payment_methods: PaymentMethods,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub unpaid_commission: f64,
    #[serde(default)]
    pub auctions_won: i64,
    #[serde(default)]
    pub money_spent: f64,
    #[serde(default = "DateTime::now")]
    pub created_at: DateTime,
    #[serde(skip)]
    is_new: bool,
}

/// Reference into the external image store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Validate)]
pub struct ProfileImage {
    #[validate(length(min = 1, message = "L'identifiant de l'image de profil est requis."))]
    pub public_id: String,
    #[validate(length(min = 1, message = "L'URL de l'image de profil est requise."))]
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethods {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_transfer: Option<BankTransfer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_payment: Option<MobilePayment>,
    #[serde(default)]
    pub cash_on_delivery: CashOnDelivery,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BankTransfer {
    pub bank_account_number: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MobilePayment {
    pub mobile_account_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CashOnDelivery {
    #[serde(default = "default_available")]
    pub available: bool,
}

impl Default for CashOnDelivery {
    fn default() -> Self {
        Self { available: true }
    }
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Auctioneer,
    #[default]
    Bidder,
    #[serde(rename = "Super Admin")]
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Auctioneer => "Auctioneer",
            Role::Bidder => "Bidder",
            Role::SuperAdmin => "Super Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown role `{0}`, expected one of Auctioneer, Bidder, Super Admin")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Auctioneer" => Ok(Role::Auctioneer),
            "Bidder" => Ok(Role::Bidder),
            "Super Admin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Registration payload.
#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub profile_image: ProfileImage,
    #[serde(default)]
    pub payment_methods: PaymentMethods,
    #[serde(default)]
    pub role: Role,
}

impl From<NewUser> for User {
    fn from(new_user: NewUser) -> Self {
        User {
            id: ObjectId::new(),
            user_name: new_user.user_name,
            password: None,
            pending_password: new_user.password,
            email: new_user.email.trim().to_string(),
            address: new_user.address,
            phone: new_user.phone,
            profile_image: new_user.profile_image,
            payment_methods: new_user.payment_methods,
            role: new_user.role,
            unpaid_commission: 0.0,
            auctions_won: 0,
            money_spent: 0.0,
            created_at: DateTime::now(),
            is_new: true,
        }
    }
}

/// Partial update; absent fields are left as they are.
#[derive(Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub profile_image: Option<ProfileImage>,
    pub payment_methods: Option<PaymentMethods>,
    pub role: Option<Role>,
}

impl User {
    /// Queues a new plaintext password; it is hashed on the next write.
    pub fn set_password(&mut self, plain: impl Into<String>) {
        self.pending_password = Some(plain.into());
    }

    pub fn is_password_modified(&self) -> bool {
        self.pending_password.is_some()
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// True until the first successful insert.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    pub(crate) fn strip_password(&mut self) {
        self.password = None;
    }

    pub(crate) fn restore_password_hash(&mut self, hash: String) {
        self.password = Some(hash);
    }

    pub fn apply(&mut self, update: UserUpdate) {
        if let Some(user_name) = update.user_name {
            self.user_name = Some(user_name);
        }
        if let Some(password) = update.password {
            self.set_password(password);
        }
        if let Some(email) = update.email {
            self.email = email.trim().to_string();
        }
        if let Some(address) = update.address {
            self.address = Some(address);
        }
        if let Some(phone) = update.phone {
            self.phone = Some(phone);
        }
        if let Some(profile_image) = update.profile_image {
            self.profile_image = profile_image;
        }
        if let Some(payment_methods) = update.payment_methods {
            self.payment_methods = payment_methods;
        }
        if let Some(role) = update.role {
            self.role = role;
        }
    }

    /// Normalises, validates and hashes a pending password. Must run before
    /// any insert or update reaches the store.
    pub fn prepare_for_write(&mut self) -> Result<(), UserError> {
        self.prepare_with_cost(BCRYPT_COST)
    }

    pub(crate) fn prepare_with_cost(&mut self, cost: u32) -> Result<(), UserError> {
        let trimmed = self.email.trim();
        if trimmed.len() != self.email.len() {
            self.email = trimmed.to_string();
        }
        let mut errors = self.validate().err().unwrap_or_else(ValidationErrors::new);
        if let Some(plain) = self.pending_password.as_deref() {
            if plain.chars().count() < 8 {
                errors.add("password", validation_error("length", PASSWORD_TOO_SHORT));
            }
        }
        if !errors.errors().is_empty() {
            return Err(errors.into());
        }

        if let Some(plain) = self.pending_password.as_deref() {
            let hashed = hash(plain, cost)?;
            self.password = Some(hashed);
            self.pending_password = None;
        }
        Ok(())
    }

    /// Checks a candidate against the stored hash. The user must have been
    /// loaded with the password projection.
    pub fn compare_password(&self, candidate: &str) -> Result<bool, UserError> {
        let stored = self.password.as_deref().ok_or(UserError::PasswordNotLoaded)?;
        Ok(verify(candidate, stored)?)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("password_modified", &self.pending_password.is_some())
            .field("email", &self.email)
            .field("address", &self.address)
            .field("phone", &self.phone)
            .field("profile_image", &self.profile_image)
            .field("payment_methods", &self.payment_methods)
            .field("role", &self.role)
            .field("unpaid_commission", &self.unpaid_commission)
            .field("auctions_won", &self.auctions_won)
            .field("money_spent", &self.money_spent)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// What callers outside the store get to see of a user.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub profile_image: ProfileImage,
    pub payment_methods: PaymentMethods,
    pub role: Role,
    pub unpaid_commission: f64,
    pub auctions_won: i64,
    pub money_spent: f64,
    pub created_at: ChronoDateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id.to_hex(),
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            address: user.address.clone(),
            phone: user.phone.clone(),
            profile_image: user.profile_image.clone(),
            payment_methods: user.payment_methods.clone(),
            role: user.role,
            unpaid_commission: user.unpaid_commission,
            auctions_won: user.auctions_won,
            money_spent: user.money_spent,
            created_at: user.created_at.to_chrono(),
        }
    }
}

fn validate_user_name(user_name: &str) -> Result<(), ValidationError> {
    let length = user_name.chars().count();
    let message = if length < 3 {
        USER_NAME_TOO_SHORT
    } else if length > 40 {
        USER_NAME_TOO_LONG
    } else {
        return Ok(());
    };
    Err(validation_error("length", message))
}

// same rule as the login payload, so every registered address can sign in
fn validate_user_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(validation_error("required", EMAIL_REQUIRED));
    }
    if !validate_email(email) {
        return Err(validation_error("email", EMAIL_INVALID));
    }
    Ok(())
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, from_document, to_document};

    fn new_user() -> NewUser {
        NewUser {
            user_name: Some("bob".to_string()),
            password: Some("longenough".to_string()),
            email: "bob@x.com".to_string(),
            address: None,
            phone: Some("0123456789".to_string()),
            profile_image: ProfileImage {
                public_id: "p1".to_string(),
                url: "http://x/p1.png".to_string(),
            },
            payment_methods: PaymentMethods::default(),
            role: Role::default(),
        }
    }

    fn fields(err: &UserError) -> Vec<&str> {
        err.field_errors().iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn user_name_length_bounds() {
        let forty = "x".repeat(40);
        let forty_one = "x".repeat(41);
        for (name, ok) in [("bo", false), ("bob", true), (forty.as_str(), true), (forty_one.as_str(), false)] {
            let mut user = User::from(NewUser {
                user_name: Some(name.to_string()),
                password: None,
                ..new_user()
            });
            let result = user.prepare_for_write();
            assert_eq!(result.is_ok(), ok, "userName of {} chars", name.len());
            if let Err(err) = result {
                assert_eq!(fields(&err), vec!["userName"]);
            }
        }
    }

    #[test]
    fn user_name_counts_characters_not_bytes() {
        let mut user = User::from(NewUser {
            user_name: Some("éé".to_string()),
            password: None,
            ..new_user()
        });
        let err = user.prepare_for_write().unwrap_err();
        assert_eq!(err.field_errors()[0].message, USER_NAME_TOO_SHORT);
    }

    #[test]
    fn phone_must_be_exactly_ten_characters() {
        for (phone, ok) in [("012345678", false), ("0123456789", true), ("01234567890", false)] {
            let mut user = User::from(NewUser {
                phone: Some(phone.to_string()),
                password: None,
                ..new_user()
            });
            let result = user.prepare_for_write();
            assert_eq!(result.is_ok(), ok, "phone {phone}");
            if let Err(err) = result {
                assert_eq!(
                    err.field_errors()[0].message,
                    "Le numéro de téléphone doit contenir exactement 10 chiffres."
                );
            }
        }
    }

    #[test]
    fn short_password_is_rejected_before_hashing() {
        let mut user = User::from(NewUser {
            password: Some("short".to_string()),
            ..new_user()
        });
        let err = user.prepare_for_write().unwrap_err();
        assert_eq!(fields(&err), vec!["password"]);
        assert_eq!(err.field_errors()[0].message, PASSWORD_TOO_SHORT);
        assert!(user.password_hash().is_none());
        assert!(user.is_password_modified());
    }

    #[test]
    fn blank_email_and_profile_image_are_reported_per_field() {
        let mut user = User::from(NewUser {
            email: "   ".to_string(),
            profile_image: ProfileImage {
                public_id: String::new(),
                url: String::new(),
            },
            password: None,
            ..new_user()
        });
        let err = user.prepare_for_write().unwrap_err();
        assert_eq!(
            fields(&err),
            vec!["email", "profileImage.public_id", "profileImage.url"]
        );
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut user = User::from(NewUser {
            email: "bob".to_string(),
            password: None,
            ..new_user()
        });
        let err = user.prepare_for_write().unwrap_err();
        assert_eq!(fields(&err), vec!["email"]);
        assert_eq!(err.field_errors()[0].message, EMAIL_INVALID);
    }

    #[test]
    fn email_is_trimmed() {
        let mut user = User::from(NewUser {
            email: "  bob@x.com \n".to_string(),
            password: None,
            ..new_user()
        });
        assert_eq!(user.email, "bob@x.com");
        user.email = " bob@y.com ".to_string();
        user.prepare_for_write().unwrap();
        assert_eq!(user.email, "bob@y.com");
    }

    #[test]
    fn prepare_hashes_pending_password_once() {
        let mut user = User::from(new_user());
        user.prepare_for_write().unwrap();

        let stored = user.password_hash().unwrap().to_string();
        assert_ne!(stored, "longenough");
        assert!(stored.starts_with("$2b$10$"));
        assert!(!user.is_password_modified());

        user.address = Some("1 rue de la Paix".to_string());
        user.prepare_for_write().unwrap();
        assert_eq!(user.password_hash(), Some(stored.as_str()));
    }

    #[test]
    fn hashing_failure_leaves_the_plaintext_pending() {
        let mut user = User::from(new_user());
        let err = user.prepare_with_cost(3).unwrap_err();
        assert!(matches!(err, UserError::Hashing(_)));
        assert!(user.password_hash().is_none());
        assert!(user.is_password_modified());
    }

    #[test]
    fn compare_password_matches_only_the_original() {
        let mut user = User::from(new_user());
        user.prepare_for_write().unwrap();
        assert!(user.compare_password("longenough").unwrap());
        assert!(!user.compare_password("longenougH").unwrap());
    }

    #[test]
    fn compare_password_requires_the_hash_to_be_loaded() {
        let mut user = User::from(new_user());
        user.prepare_for_write().unwrap();
        user.strip_password();
        assert!(matches!(
            user.compare_password("longenough"),
            Err(UserError::PasswordNotLoaded)
        ));
    }

    #[test]
    fn role_accepts_only_the_three_values() {
        assert_eq!("Auctioneer".parse::<Role>(), Ok(Role::Auctioneer));
        assert_eq!("Bidder".parse::<Role>(), Ok(Role::Bidder));
        assert_eq!("Super Admin".parse::<Role>(), Ok(Role::SuperAdmin));
        assert!("Admin".parse::<Role>().is_err());
        assert!("bidder".parse::<Role>().is_err());

        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"Super Admin\"");
        let update: Result<UserUpdate, _> = serde_json::from_str(r#"{"role":"Admin"}"#);
        assert!(update.is_err());
    }

    #[test]
    fn registration_defaults() {
        let payload = r#"{
            "userName": "bob",
            "email": "bob@x.com",
            "password": "longenough",
            "phone": "0123456789",
            "profileImage": {"public_id": "p1", "url": "http://x/p1.png"}
        }"#;
        let user = User::from(serde_json::from_str::<NewUser>(payload).unwrap());
        assert_eq!(user.role, Role::Bidder);
        assert_eq!(user.unpaid_commission, 0.0);
        assert_eq!(user.auctions_won, 0);
        assert_eq!(user.money_spent, 0.0);
        assert!(user.payment_methods.cash_on_delivery.available);
        assert!(user.is_new());
    }

    #[test]
    fn stored_document_never_carries_plaintext() {
        let mut user = User::from(new_user());
        let document = to_document(&user).unwrap();
        assert!(document.get("password").is_none());
        assert!(document.get("pendingPassword").is_none());
        assert!(!format!("{user:?}").contains("longenough"));

        user.prepare_for_write().unwrap();
        let document = to_document(&user).unwrap();
        assert_eq!(document.get_str("password").ok(), user.password_hash());
        assert_eq!(document.get_str("role").ok(), Some("Bidder"));
        assert!(document.get_datetime("createdAt").is_ok());
    }

    #[test]
    fn stored_document_reads_back_with_defaults() {
        let document = doc! {
            "_id": ObjectId::new(),
            "email": "ann@x.com",
            "profileImage": { "public_id": "p2", "url": "http://x/p2.png" },
            "paymentMethods": { "bankTransfer": { "bankName": "BNP" } },
        };
        let user: User = from_document(document).unwrap();
        assert_eq!(user.role, Role::Bidder);
        assert!(user.payment_methods.cash_on_delivery.available);
        assert_eq!(
            user.payment_methods.bank_transfer.as_ref().and_then(|b| b.bank_name.as_deref()),
            Some("BNP")
        );
        assert!(user.password_hash().is_none());
        assert!(!user.is_new());
    }

    #[test]
    fn apply_queues_new_password_and_keeps_other_fields() {
        let mut user = User::from(new_user());
        user.prepare_for_write().unwrap();
        let first_hash = user.password_hash().unwrap().to_string();

        user.apply(UserUpdate {
            password: Some("another-secret".to_string()),
            role: Some(Role::Auctioneer),
            ..UserUpdate::default()
        });
        assert!(user.is_password_modified());
        assert_eq!(user.user_name.as_deref(), Some("bob"));

        user.prepare_for_write().unwrap();
        assert_ne!(user.password_hash().unwrap(), first_hash);
        assert!(user.compare_password("another-secret").unwrap());
        assert_eq!(user.role, Role::Auctioneer);
    }

    #[test]
    fn public_view_omits_password() {
        let mut user = User::from(new_user());
        user.prepare_for_write().unwrap();
        let public = serde_json::to_value(PublicUser::from(&user)).unwrap();
        assert!(public.get("password").is_none());
        assert_eq!(public["id"], user.id.to_hex());
        assert_eq!(public["role"], "Bidder");
    }

    #[test]
    fn public_view_keeps_the_stored_creation_time() {
        let mut user = User::from(new_user());
        user.created_at = DateTime::from_millis(1_700_000_000_123);
        let public = PublicUser::from(&user);
        assert_eq!(public.created_at.timestamp_millis(), 1_700_000_000_123);
    }
}
