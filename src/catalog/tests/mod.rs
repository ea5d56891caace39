//! Unit tests for catalog adapters and header resolution.
