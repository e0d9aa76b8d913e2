//! Page/size query parameters and the paged response envelope.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::ValidationError;

pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Rows per page, at most 100.
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
        }
    }
}

impl PageParams {
    pub fn new(page: u32, size: u32) -> Result<Self, ValidationError> {
        let params = Self { page, size };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.page < 1 {
            return Err(ValidationError::PageOutOfRange);
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.size) {
            return Err(ValidationError::SizeOutOfRange { max: MAX_PAGE_SIZE });
        }
        Ok(())
    }

    /// Zero-based row offset of the first row on this page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PagedResponse<T> {
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub results: Vec<T>,
}

impl<T> PagedResponse<T> {
    pub fn new(params: PageParams, total: i64, results: Vec<T>) -> Self {
        Self {
            total,
            page: params.page,
            size: params.size,
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResponse<U> {
        PagedResponse {
            total: self.total,
            page: self.page,
            size: self.size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
