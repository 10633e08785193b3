pub mod multipart;
pub mod pagination;
