mod channel;
mod error;
mod traits;

pub use self::channel::*;
pub use self::error::{Error, Result};
pub use self::traits::SerialLink;
