//! Storage traits implemented by persistence backends.
//!
//! The authorization engine only ever talks to these traits; backends
//! implement them over whatever medium they like. All traits are
//! object-safe so backends can be carried as trait objects.

pub mod account;
pub mod device;
pub mod request;
pub mod token;

pub use account::AccountStorage;
pub use device::DeviceStorage;
pub use request::RequestStorage;
pub use token::TokenStorage;
