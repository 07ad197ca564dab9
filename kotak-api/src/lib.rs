//! # Kotak Cloud API Client
//!
//! A small Rust client for the Kotak Cloud storage API.
//!
//! ## Features
//!
//! - Bearer token storage shared by every request
//! - Versioned base URL selection
//! - Type-safe chunk upload request
//!
//! ## Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use kotak_api::api::UploadApi;
//! use kotak_api::models::upload::ChunkUploadParams;
//! use kotak_api::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientConfig::default())?;
//!     client.set_token("my-access-token").await;
//!
//!     let params = ChunkUploadParams::new("notes.txt", 5, "text/plain", 1);
//!     let file = client.upload_chunk(&params, 0, Bytes::from_static(b"hello")).await?;
//!     println!("remote record: {:?}", file.id);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod models;

pub use client::{ApiVersion, Client, ClientConfig};
pub use error::{ApiError, ApiResult};
