//! Data models for the authentication service

pub mod device;
pub mod session;
pub mod user;

pub use device::{DeviceClass, DeviceProfile};
pub use session::{LoginMethod, Session};
pub use user::{User, UserRole};
