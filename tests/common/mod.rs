/// Common test utilities and fake collaborators
///
/// This module provides shared functionality for integration tests including:
/// - Fake enumerator, attribute query and mount table for the inventory
/// - Fake unmounter and overwriters for the orchestrator
/// - Device fixtures
pub mod fake_collaborators;
pub mod fixtures;
