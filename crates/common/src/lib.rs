pub mod logging;
pub mod ring;
