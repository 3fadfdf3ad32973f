pub mod constants;
pub mod text;
pub mod url_utils;

pub use constants::*;
pub use text::normalize_text;
pub use url_utils::{is_valid_url, last_path_segment, resolve_link, with_query};
