//! Logging shim.
//!
//! Forwards to `defmt` or `log` depending on the enabled feature. With neither
//! enabled the macros only borrow their arguments so call sites stay warning free.

#![allow(unused_macros)]

cfg_if::cfg_if! {
    if #[cfg(feature = "defmt")] {
        macro_rules! debug {
            ($s:literal $(, $x:expr)* $(,)?) => {
                ::defmt::debug!($s $(, $x)*)
            };
        }
        macro_rules! warn {
            ($s:literal $(, $x:expr)* $(,)?) => {
                ::defmt::warn!($s $(, $x)*)
            };
        }
        macro_rules! error {
            ($s:literal $(, $x:expr)* $(,)?) => {
                ::defmt::error!($s $(, $x)*)
            };
        }
    } else if #[cfg(feature = "log")] {
        macro_rules! debug {
            ($s:literal $(, $x:expr)* $(,)?) => {
                ::log::debug!($s $(, $x)*)
            };
        }
        macro_rules! warn {
            ($s:literal $(, $x:expr)* $(,)?) => {
                ::log::warn!($s $(, $x)*)
            };
        }
        macro_rules! error {
            ($s:literal $(, $x:expr)* $(,)?) => {
                ::log::error!($s $(, $x)*)
            };
        }
    } else {
        macro_rules! debug {
            ($s:literal $(, $x:expr)* $(,)?) => {{
                let _ = ($( & $x ),*);
            }};
        }
        macro_rules! warn {
            ($s:literal $(, $x:expr)* $(,)?) => {{
                let _ = ($( & $x ),*);
            }};
        }
        macro_rules! error {
            ($s:literal $(, $x:expr)* $(,)?) => {{
                let _ = ($( & $x ),*);
            }};
        }
    }
}
