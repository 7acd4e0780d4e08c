//! Unit tests for the flag-combination driver
