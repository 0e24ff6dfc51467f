//! Composer calls shaped like the code a declarative front end would emit.
//!
//! Each helper takes the key of its call site. Helpers that emit a node open a
//! node group; helpers that only scope content open a plain group.

use crate::mock_tree::MockNode;
use recompose_core::{hash_key, join_key, Composer, Key, Recomposable, RecomposeTrigger};
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

pub type MockComposer = Composer<MockNode>;

/// A `linear` container holding whatever `content` emits.
pub fn linear(composer: &mut MockComposer, key: Key, content: impl FnOnce(&mut MockComposer)) {
    composer.start_node(key);
    composer.emit_node(|| MockNode::new("linear"));
    content(composer);
    composer.end_node();
}

/// A `text` leaf showing `value`.
pub fn text(composer: &mut MockComposer, key: Key, value: &str) {
    labelled(composer, key, "text", value);
}

/// An `edit` leaf holding `value`.
pub fn edit(composer: &mut MockComposer, key: Key, value: &str) {
    labelled(composer, key, "edit", value);
}

fn labelled(composer: &mut MockComposer, key: Key, kind: &'static str, value: &str) {
    composer.start_node(key);
    composer.emit_node(|| MockNode::new(kind));
    if composer.changed(value.to_string()) {
        composer.apply(value.to_string(), |node: &mut MockNode, value: String| {
            node.set_text(value)
        });
    }
    composer.end_node();
}

/// Emit `body` once per item, keyed by the item itself so reordering the
/// items moves their nodes instead of rebuilding them.
pub fn repeat<T: Hash>(
    composer: &mut MockComposer,
    key: Key,
    items: &[T],
    mut body: impl FnMut(&mut MockComposer, &T),
) {
    composer.start_group(key);
    for item in items {
        composer.start_group(join_key(key, hash_key(item)));
        body(composer, item);
        composer.end_group();
    }
    composer.end_group();
}

/// Run `content` only when `value` differs from the previous pass.
pub fn memoize<T: PartialEq + 'static>(
    composer: &mut MockComposer,
    key: Key,
    value: T,
    content: impl FnOnce(&mut MockComposer),
) {
    composer.start_group(key);
    if composer.changed(value) {
        content(composer);
    } else {
        composer.skip_group();
    }
    composer.end_group();
}

/// Component whose body is a plain function of its props.
pub struct FnComponent<P> {
    props: P,
    body: fn(&mut MockComposer, &P),
    trigger: Option<RecomposeTrigger>,
}

impl<P> FnComponent<P> {
    pub fn props(&self) -> &P {
        &self.props
    }

    /// Request that the body re-runs on the next recomposition. Returns
    /// `false` before the component has been inserted or after its
    /// composition is gone.
    pub fn invalidate(&self) -> bool {
        self.trigger
            .as_ref()
            .map_or(false, RecomposeTrigger::invalidate)
    }
}

impl<P> Recomposable<MockNode> for FnComponent<P> {
    fn compose(&mut self, composer: &mut MockComposer) {
        (self.body)(composer, &self.props);
    }

    fn set_recompose(&mut self, trigger: RecomposeTrigger) {
        self.trigger = Some(trigger);
    }
}

/// Compose `body(props)` as a component. The body is skipped while `props`
/// equal the props of the previous pass and the component is not invalidated.
pub fn component<P: Clone + PartialEq + 'static>(
    composer: &mut MockComposer,
    key: Key,
    props: &P,
    body: fn(&mut MockComposer, &P),
) -> Rc<RefCell<FnComponent<P>>> {
    composer.compose_component(
        key,
        || FnComponent {
            props: props.clone(),
            body,
            trigger: None,
        },
        |instance| {
            if instance.props == *props {
                false
            } else {
                instance.props = props.clone();
                true
            }
        },
    )
}

#[cfg(test)]
#[path = "tests/view_dsl_tests.rs"]
mod tests;
