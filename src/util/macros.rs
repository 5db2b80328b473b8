#[macro_export]
macro_rules! log {
    ($($t:tt)*) => {
        #[cfg(debug_assertions)]
        {
            $crate::util::macros::console_log(format!($($t)*));
        }
    }
}

/// Unlike [`log!`](crate::log), error output survives release builds.
#[macro_export]
macro_rules! error {
    ($($t:tt)*) => {
        $crate::util::macros::console_error(format!($($t)*));
    }
}

#[cfg(target_arch = "wasm32")]
pub fn console_log(s: String) {
    web_sys::console::log_1(&s.into());
}

#[cfg(target_arch = "wasm32")]
pub fn console_error(s: String) {
    web_sys::console::error_1(&s.into());
}

#[cfg(not(target_arch = "wasm32"))]
pub fn console_log(s: String) {
    eprintln!("{s}");
}

#[cfg(not(target_arch = "wasm32"))]
pub fn console_error(s: String) {
    eprintln!("{s}");
}
