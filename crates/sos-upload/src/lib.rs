//! SoS Upload Library
//!
//! Moves SoS (State of Science) discharge granules from the Confluence
//! bucket to the PO.DAAC archive bucket and publishes a CNM notification
//! per complete granule to trigger downstream ingestion.
//!
//! # Pipeline
//!
//! 1. Stage source files into local scratch storage
//! 2. Group files into granules by continent key and role
//! 3. Rename and upload to the archive collection prefix
//! 4. Enrich granule entries with MD5 checksum and byte size
//! 5. Build and publish one CNM message per complete granule
//! 6. Release every staged copy, on every exit path

pub mod attrs;
pub mod config;
pub mod credentials;
pub mod enrich;
pub mod event;
pub mod granule;
pub mod message;
pub mod pipeline;
pub mod publisher;
pub mod staging;
pub mod storage;
