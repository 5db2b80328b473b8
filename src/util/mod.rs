pub mod macros;
pub mod str;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub mod prelude {
    pub use super::str as str_util;
    #[cfg(target_arch = "wasm32")]
    pub use super::web as web_util;
    pub use crate::{error, log};
}
