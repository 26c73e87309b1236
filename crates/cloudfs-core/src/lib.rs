pub mod browser;
pub mod config;
pub mod display;
pub mod uploads;

#[cfg(test)]
pub(crate) mod testing;
