// Library interface for dailybrief modules
// This allows tests and other binaries to import modules

pub mod contracts;
pub mod digest;
pub mod ingestion;
pub mod llm;
pub mod mailer;
pub mod models;
pub mod pipeline;
pub mod run_log;
pub mod scraping;
pub mod scoring;
