//! Selection state over the path tree.

use std::fmt;

use serde::Serialize;

use crate::app::pattern::PatternMatcher;
use crate::app::tree::PathTree;
use crate::domain::model::{ChangeScope, CheckState, ClassifiedPath, NodeId, NodeKind, TreeChange};

type Observer = Box<dyn Fn(&TreeChange) + Send + Sync>;

/// The tree of one build together with the entries it was built from.
#[derive(Debug, Clone, Default)]
pub struct TreeState {
    tree: PathTree,
    entries: Vec<ClassifiedPath>,
    generation: u64,
}

impl TreeState {
    pub fn tree(&self) -> &PathTree {
        &self.tree
    }

    pub fn entries(&self) -> &[ClassifiedPath] {
        &self.entries
    }

    /// Incremented on every rebuild and every selection mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owns the current [`TreeState`] and applies selection operations to it.
///
/// File nodes carry the authoritative selection. A directory's flag only records the last value
/// written to it by a toggle or bulk operation.
#[derive(Default)]
pub struct SelectionEngine {
    state: TreeState,
    matcher: PatternMatcher,
    observers: Vec<Observer>,
}

impl fmt::Debug for SelectionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("state", &self.state)
            .field("matcher", &self.matcher)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SelectionEngine {
    /// Create an engine with an empty tree.
    pub fn new(matcher: PatternMatcher) -> Self {
        Self {
            state: TreeState::default(),
            matcher,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> &TreeState {
        &self.state
    }

    pub fn tree(&self) -> &PathTree {
        &self.state.tree
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Register a callback fired after every mutation.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&TreeChange) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Replace the tree with one built from `paths`, treating every path as a file.
    pub fn rebuild<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = paths
            .into_iter()
            .map(|path| ClassifiedPath::file(path.as_ref()))
            .collect();
        self.rebuild_classified(entries);
    }

    /// Replace the tree with one built from classified entries.
    pub fn rebuild_classified(&mut self, entries: Vec<ClassifiedPath>) {
        let mut tree = PathTree::build_classified(&entries);
        apply_patterns(&mut tree, &self.matcher);

        let generation = self.state.generation + 1;
        tracing::debug!(
            nodes = tree.len(),
            roots = tree.roots().len(),
            generation,
            "rebuilt selection tree"
        );
        self.state = TreeState {
            tree,
            entries,
            generation,
        };
        self.notify(ChangeScope::Tree);
    }

    /// Swap the pattern configuration and re-derive selection from the stored entries.
    pub fn reconfigure(&mut self, matcher: PatternMatcher) {
        self.matcher = matcher;
        let entries = std::mem::take(&mut self.state.entries);
        self.rebuild_classified(entries);
    }

    /// Flip the selection of `id` and write the new value to every descendant.
    ///
    /// Returns the new value, or `None` when `id` does not belong to the current tree.
    pub fn toggle(&mut self, id: NodeId) -> Option<bool> {
        let value = !self.state.tree.node(id)?.is_selected();
        self.set_selected(id, value).then_some(value)
    }

    /// Toggle the node stored under `path`.
    pub fn toggle_path(&mut self, path: &str) -> Option<bool> {
        let id = self.state.tree.lookup(path)?;
        self.toggle(id)
    }

    /// Set `id` and its whole subtree to `value`. Ancestors are left untouched.
    pub fn set_selected(&mut self, id: NodeId, value: bool) -> bool {
        if !self.state.tree.set_subtree_selected(id, value) {
            tracing::debug!(%id, "ignoring selection change for unknown node");
            return false;
        }
        self.state.generation += 1;
        self.notify(ChangeScope::Subtree(id));
        true
    }

    pub fn select_all(&mut self) {
        self.set_everything(true);
    }

    pub fn select_none(&mut self) {
        self.set_everything(false);
    }

    /// Relative paths of every selected file in display order.
    pub fn selected_files(&self) -> Vec<String> {
        let tree = &self.state.tree;
        tree.iter_depth_first()
            .filter_map(|id| tree.node(id))
            .filter(|node| node.kind() == NodeKind::File && node.is_selected())
            .map(|node| node.relative_path().to_owned())
            .collect()
    }

    /// Display state of a node derived from the files beneath it.
    ///
    /// A directory without files reports its own flag.
    pub fn check_state(&self, id: NodeId) -> Option<CheckState> {
        let tree = &self.state.tree;
        let node = tree.node(id)?;
        if !node.is_dir() {
            return Some(flag_state(node.is_selected()));
        }

        let (mut selected, mut total) = (0usize, 0usize);
        for file in tree
            .walk(id)
            .filter_map(|id| tree.node(id))
            .filter(|node| !node.is_dir())
        {
            total += 1;
            if file.is_selected() {
                selected += 1;
            }
        }

        Some(match (selected, total) {
            (_, 0) => flag_state(node.is_selected()),
            (0, _) => CheckState::Unchecked,
            (selected, total) if selected == total => CheckState::Checked,
            _ => CheckState::Partial,
        })
    }

    /// Serializable nested view of the current tree.
    pub fn view(&self) -> Vec<NodeView> {
        self.state
            .tree
            .roots()
            .iter()
            .filter_map(|id| self.view_node(*id))
            .collect()
    }

    fn view_node(&self, id: NodeId) -> Option<NodeView> {
        let node = self.state.tree.node(id)?;
        Some(NodeView {
            name: node.name().to_owned(),
            path: node.relative_path().to_owned(),
            kind: node.kind(),
            selected: node.is_selected(),
            state: self.check_state(id)?,
            children: node.is_dir().then(|| {
                node.children()
                    .iter()
                    .filter_map(|child| self.view_node(*child))
                    .collect()
            }),
        })
    }

    fn set_everything(&mut self, value: bool) {
        let roots = self.state.tree.roots().to_vec();
        for root in roots {
            self.state.tree.set_subtree_selected(root, value);
        }
        self.state.generation += 1;
        self.notify(ChangeScope::Tree);
    }

    fn notify(&self, scope: ChangeScope) {
        let change = TreeChange {
            generation: self.state.generation,
            scope,
        };
        for observer in &self.observers {
            observer(&change);
        }
    }
}

/// Nested, serializable rendition of a node and its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    pub selected: bool,
    pub state: CheckState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeView>>,
}

fn apply_patterns(tree: &mut PathTree, matcher: &PatternMatcher) {
    let files: Vec<NodeId> = tree
        .iter_depth_first()
        .filter(|id| tree.node(*id).is_some_and(|node| !node.is_dir()))
        .collect();
    for id in files {
        if let Some(node) = tree.node_mut(id) {
            node.selected = matcher.is_included(&node.relative_path);
        }
    }
}

fn flag_state(selected: bool) -> CheckState {
    if selected {
        CheckState::Checked
    } else {
        CheckState::Unchecked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::Mutex;

    fn matcher(include: &[&str], exclude: &[&str]) -> PatternMatcher {
        let include: Vec<String> = include.iter().map(|p| p.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|p| p.to_string()).collect();
        PatternMatcher::new(&include, &exclude, true).unwrap()
    }

    fn engine_with(paths: &[&str], include: &[&str], exclude: &[&str]) -> SelectionEngine {
        let mut engine = SelectionEngine::new(matcher(include, exclude));
        engine.rebuild(paths.iter().copied());
        engine
    }

    fn snapshot(engine: &SelectionEngine) -> Vec<(String, bool)> {
        let tree = engine.tree();
        tree.iter_depth_first()
            .map(|id| {
                let node = tree.node(id).unwrap();
                (node.relative_path().to_owned(), node.is_selected())
            })
            .collect()
    }

    fn selected(engine: &SelectionEngine, path: &str) -> bool {
        let tree = engine.tree();
        tree.node(tree.lookup(path).unwrap()).unwrap().is_selected()
    }

    #[test]
    fn default_selection_follows_patterns() {
        let engine = engine_with(&["src/a.ts", "src/b/b1.js"], &["src/**/*.ts"], &[]);

        assert!(selected(&engine, "src/a.ts"));
        assert!(!selected(&engine, "src/b/b1.js"));
        assert!(!selected(&engine, "src"));
        assert!(!selected(&engine, "src/b"));
        assert_eq!(engine.selected_files(), ["src/a.ts"]);
    }

    #[test]
    fn empty_include_selects_everything_not_excluded() {
        let engine = engine_with(
            &["README.md", "node_modules/x/index.js", "src/lib.rs"],
            &[],
            &["**/node_modules/**"],
        );
        assert_eq!(engine.selected_files(), ["src/lib.rs", "README.md"]);
    }

    #[test]
    fn toggling_directory_overwrites_every_descendant() {
        let mut engine = engine_with(
            &["src/a.ts", "src/b/b1.js", "src/b/b2.ts", "other.ts"],
            &["**/*.ts"],
            &[],
        );
        let src = engine.tree().lookup("src").unwrap();

        assert_eq!(engine.toggle(src), Some(true));
        assert!(selected(&engine, "src"));
        assert!(selected(&engine, "src/b"));
        assert!(selected(&engine, "src/b/b1.js"));
        assert!(selected(&engine, "src/b/b2.ts"));

        assert_eq!(engine.toggle(src), Some(false));
        assert!(!selected(&engine, "src/a.ts"));
        assert!(!selected(&engine, "src/b/b2.ts"));
        assert!(selected(&engine, "other.ts"));
    }

    #[test]
    fn toggling_leaf_changes_nothing_else() {
        let mut engine = engine_with(&["src/a.ts", "src/b.ts"], &["**/*"], &[]);
        let before = snapshot(&engine);

        assert_eq!(engine.toggle_path("src/a.ts"), Some(false));

        let after = snapshot(&engine);
        let changed: Vec<&str> = before
            .iter()
            .zip(&after)
            .filter(|(a, b)| a.1 != b.1)
            .map(|(a, _)| a.0.as_str())
            .collect();
        assert_eq!(changed, ["src/a.ts"]);
    }

    #[test]
    fn toggle_never_touches_ancestors() {
        let mut engine = engine_with(&["a/b/c.txt"], &["**/*"], &[]);
        let b = engine.tree().lookup("a/b").unwrap();
        engine.toggle(b);
        assert!(selected(&engine, "a/b"));
        assert!(!selected(&engine, "a"));
    }

    #[test]
    fn double_toggle_restores_leaf() {
        let mut engine = engine_with(&["a/x.txt", "a/y.txt", "b.txt"], &["**/*"], &[]);
        let x = engine.tree().lookup("a/x.txt").unwrap();
        let before = snapshot(&engine);

        engine.toggle(x);
        engine.toggle(x);
        assert_eq!(snapshot(&engine), before);
    }

    #[test]
    fn double_toggle_restores_uniform_directory_subtree() {
        let paths = ["a/b/c.txt", "a/b/d.txt", "a/e.txt", "f.txt"];
        let mut engine = engine_with(&paths, &["nothing"], &[]);
        let a = engine.tree().lookup("a").unwrap();

        for uniform in [true, false] {
            if uniform {
                engine.select_all();
            } else {
                engine.select_none();
            }
            let before = snapshot(&engine);

            assert_eq!(engine.toggle(a), Some(!uniform));
            assert_ne!(snapshot(&engine), before);
            assert_eq!(engine.toggle(a), Some(uniform));
            assert_eq!(snapshot(&engine), before);
        }
    }

    #[test]
    fn select_all_and_none_cover_every_node() {
        let mut engine = engine_with(&["a/b/c.txt", "d.txt"], &["nothing"], &[]);
        assert!(engine.selected_files().is_empty());

        engine.select_all();
        assert!(snapshot(&engine).iter().all(|(_, selected)| *selected));
        assert_eq!(engine.selected_files(), ["a/b/c.txt", "d.txt"]);

        engine.select_none();
        assert!(snapshot(&engine).iter().all(|(_, selected)| !*selected));
        assert!(engine.selected_files().is_empty());
    }

    #[test]
    fn bulk_operations_on_empty_tree_are_harmless() {
        let mut engine = SelectionEngine::new(PatternMatcher::match_all());
        engine.rebuild(Vec::<String>::new());
        engine.select_all();
        engine.select_none();
        assert!(engine.tree().roots().is_empty());
        assert!(engine.selected_files().is_empty());
    }

    #[test]
    fn selected_files_ignores_directory_flags() {
        let mut engine = engine_with(&["a/x.txt", "a/y.txt"], &["**/x.txt"], &[]);
        let a = engine.tree().lookup("a").unwrap();
        engine.state.tree.node_mut(a).unwrap().selected = true;

        assert_eq!(engine.selected_files(), ["a/x.txt"]);
        assert_eq!(engine.selected_files(), engine.selected_files());
    }

    #[test]
    fn duplicate_names_are_selectable_independently() {
        let mut engine = engine_with(&["src/a/file.ts", "src/b/file.ts"], &["**/*"], &[]);
        engine.toggle_path("src/a/file.ts");
        assert_eq!(engine.selected_files(), ["src/b/file.ts"]);
    }

    #[test]
    fn invalidated_children_are_treated_as_empty() {
        let mut engine = engine_with(&["a/b/c.txt", "a/d.txt"], &["**/*"], &[]);
        let b = engine.tree().lookup("a/b").unwrap();
        engine.state.tree.node_mut(b).unwrap().children = None;

        assert_eq!(engine.selected_files(), ["a/d.txt"]);
        assert_eq!(engine.toggle(b), Some(true));
        assert_eq!(engine.check_state(b), Some(CheckState::Checked));
    }

    #[test]
    fn unknown_node_is_ignored() {
        let mut engine = engine_with(&["a.txt"], &["**/*"], &[]);
        let generation = engine.generation();
        assert_eq!(engine.toggle(NodeId(42)), None);
        assert_eq!(engine.toggle_path("missing.txt"), None);
        assert_eq!(engine.generation(), generation);
    }

    #[test]
    fn rebuild_is_deterministic_and_discards_toggles() {
        let paths = ["src/a.ts", "src/b/b1.js", "README.md"];
        let mut engine = engine_with(&paths, &["**/*.ts"], &[]);
        let initial = snapshot(&engine);

        engine.toggle_path("src/b/b1.js");
        let mut reversed = paths;
        reversed.reverse();
        engine.rebuild(reversed);

        assert_eq!(snapshot(&engine), initial);
    }

    #[test]
    fn reconfigure_rederives_selection() {
        let mut engine = engine_with(&["src/a.ts", "src/b.js"], &["**/*.ts"], &[]);
        engine.reconfigure(matcher(&["**/*.js"], &[]));
        assert_eq!(engine.selected_files(), ["src/b.js"]);
        assert_eq!(engine.state().entries().len(), 2);
    }

    #[test]
    fn check_state_aggregates_files() {
        let mut engine = engine_with(&["a/x.txt", "a/y.txt"], &["**/x.txt"], &[]);
        let a = engine.tree().lookup("a").unwrap();
        assert_eq!(engine.check_state(a), Some(CheckState::Partial));

        engine.toggle(a);
        assert_eq!(engine.check_state(a), Some(CheckState::Checked));
        engine.toggle(a);
        assert_eq!(engine.check_state(a), Some(CheckState::Unchecked));
    }

    #[test]
    fn observers_receive_generation_and_scope() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut engine = SelectionEngine::new(PatternMatcher::match_all());
        engine.subscribe({
            let seen = Arc::clone(&seen);
            move |change| seen.lock().unwrap().push(*change)
        });

        engine.rebuild(["a/b.txt"]);
        let a = engine.tree().lookup("a").unwrap();
        engine.toggle(a);
        engine.select_all();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            [
                TreeChange {
                    generation: 1,
                    scope: ChangeScope::Tree
                },
                TreeChange {
                    generation: 2,
                    scope: ChangeScope::Subtree(a)
                },
                TreeChange {
                    generation: 3,
                    scope: ChangeScope::Tree
                },
            ]
        );
    }

    #[test]
    fn view_nests_children_for_directories_only() {
        let engine = engine_with(&["a/x.txt"], &["**/*"], &[]);
        let view = engine.view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].kind, NodeKind::Directory);
        assert_eq!(view[0].state, CheckState::Checked);
        let children = view[0].children.as_ref().unwrap();
        assert_eq!(children[0].path, "a/x.txt");
        assert!(children[0].children.is_none());
    }
}
