pub mod client;
pub mod pager;
pub mod request;

pub use client::{Credentials, Download, KoboClient};
pub use pager::{DEFAULT_PAGE_SIZE, Page, PageBody, fetch_all};
pub use request::ApiRequest;
