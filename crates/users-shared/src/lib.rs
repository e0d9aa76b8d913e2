pub mod api;
pub mod models;
pub mod pagination;

pub use models::*;
pub use pagination::{PageParams, PagedResponse};

/// Input that failed a shape check before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("displayname must not be blank")]
    BlankDisplayname,

    #[error("displayname must be at most {max} characters")]
    DisplaynameTooLong { max: usize },

    #[error("page must be >= 1")]
    PageOutOfRange,

    #[error("size must be between 1 and {max}")]
    SizeOutOfRange { max: u32 },
}
