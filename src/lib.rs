pub mod form;
pub mod i18n;
pub mod prelude;

pub use i18n::{I18nManager, Locale};

#[cfg(test)]
mod test_public_api;
