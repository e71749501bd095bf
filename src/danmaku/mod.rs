pub mod color;
pub mod comment;
pub mod play_url;
