pub mod file_index; // Resumable output-slot resolution
pub mod dataset; // Snapshot sidecar + data folder layout
pub mod labels; // Classifier label tables
pub mod completion; // Retry / fallback / backoff around chat completions
