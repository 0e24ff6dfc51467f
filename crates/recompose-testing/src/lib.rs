//! Headless harness for recompose-core: an in-memory node tree, a small view
//! DSL over the composer, structural validation and a test rule driving
//! compose, apply and recompose cycles.

pub mod mock_tree;
pub mod testing;
pub mod validator;
pub mod view_dsl;

pub use mock_tree::{EditStats, MockAdapter, MockNode};
pub use testing::{run_test_composition, ComposeTestRule};
pub use validator::{validate_composition, validate_slots, ValidationError};
pub use view_dsl::{component, edit, linear, memoize, repeat, text, FnComponent, MockComposer};
