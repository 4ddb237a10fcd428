//! Integration tests: the full fetch → normalise → score → publish
//! pipeline over deterministic in-memory sources.

mod mock_source;
mod pipeline;
