pub mod token;
pub mod user;

pub use token::TokenClaims;
pub use user::{
    BankTransfer, CashOnDelivery, MobilePayment, NewUser, PaymentMethods, ProfileImage,
    PublicUser, Role, UnknownRole, User, UserUpdate, BCRYPT_COST,
};
