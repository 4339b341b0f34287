//! Domain types shared between the authorization engine and storage
//! backends.

pub mod account;
pub mod device;
pub mod request;
pub mod token;

pub use account::{
    Account, AuthorizedClientGrant, AuthorizedClients, CreateAccountInput, DeviceAccount,
};
pub use device::{DeviceData, DevicePatch};
pub use request::{RequestData, RequestInfo, RequestPatch};
pub use token::{TokenData, TokenInfo, TokenPatch};
