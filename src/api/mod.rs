pub mod shift;
pub mod user;

pub use self::{shift::Shift, user::User};
