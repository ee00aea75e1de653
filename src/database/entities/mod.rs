pub mod failed_jobs;
pub mod generation_jobs;
pub mod media_assets;
pub mod stories;
pub mod story_pages;
pub mod vocab_entries;
