//! Commands of the health card application
//!
//! Each command implements [`ApduCommand`](egk_apdu_core::ApduCommand) and
//! carries the status table of its family.

pub mod general_authenticate;
pub mod manage_security_environment;
pub mod read_binary;
pub mod select;

pub use general_authenticate::{
    DynamicAuthenticationDataError, GeneralAuthenticateCommand, dynamic_authentication_data,
};
pub use manage_security_environment::MseSetAtCommand;
pub use read_binary::{ReadAddress, ReadBinaryCommand};
pub use select::SelectCommand;
