//! Supporting documents (medical forms, payment vouchers, rosters) attached to people.

pub mod router;
pub mod service;
pub mod store;

pub use router::upload_router;
pub use service::{UploadError, UploadRecord, UploadService, ALLOWED_EXTENSIONS};
pub use store::{sanitize_file_name, FileStore, LocalFileStore, StoreError};
