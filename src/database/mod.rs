/*!
 * SQLite persistence for generation jobs.
 *
 * - `connection`: shared connection with async access via `spawn_blocking`
 * - `schema`: tables and schema versioning
 * - `models`: `GenerationJob`, `JobStatus`, `StageOutputRecord`
 * - `repository`: every query the pipeline needs
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{DatabaseStats, GenerationJob, JobStatus, StageOutputRecord};
pub use repository::Repository;
