#[cfg(feature = "google-drive")]
pub mod google_drive;
#[cfg(feature = "google-sheets")]
pub mod google_sheets;
