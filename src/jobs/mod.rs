/*!
 * Generation job management.
 *
 * This module provides:
 * - Job creation with an input fingerprint
 * - Resume checks for failed jobs
 * - The status surface and job listing
 * - The per-job run lease
 */

pub mod manager;
pub mod models;

pub use manager::JobManager;
pub use models::{JobCreateParams, JobStatusView, ResumeCheck};
