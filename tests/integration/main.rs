//! End-to-end scans against scripted sources.

mod mock_source;
mod scan;
