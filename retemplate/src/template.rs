use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use crate::error::TemplateError;
use crate::escape::escape_literal;
use crate::fragment::{Fragment, IntoFragment};
use crate::pattern::Pattern;
use crate::scanner::{Part, parts, scan_placeholders};

/// Index of a node in a template's arena. Assigned in creation order.
pub type NodeId = usize;

const ROOT: NodeId = 0;

/// Slot positions within one node's content.
type Positions = BTreeSet<usize>;

#[derive(Debug, Clone)]
enum Slot {
    Literal(String),
    Placeholder(String),
    Node(NodeId),
    Template(Arc<Template>),
}

impl Slot {
    fn node(&self) -> Option<NodeId> {
        match self {
            Slot::Node(id) => Some(*id),
            _ => None,
        }
    }
}

/// A fragment that contained at least one placeholder (or the root).
#[derive(Debug, Clone, Default)]
struct Node {
    content: Vec<Slot>,
    /// Nodes whose content references this one.
    parents: BTreeSet<NodeId>,
    /// Referenced child -> slots in `content` holding it.
    children: BTreeMap<NodeId, Positions>,
    /// Visible placeholder -> slots in `content` through which it is reached:
    /// either the placeholder itself or a child that still exposes it.
    placeholders: BTreeMap<String, Positions>,
}

/// A composite pattern built from fragments with named placeholders.
///
/// Internally a DAG of nodes stored in an arena and rooted at node `0`.
/// A node bound into several placeholder sites is shared, not copied, and is
/// rendered once per compilation.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Build a template from an ordered sequence of fragments.
    pub fn new<I>(fragments: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator,
        I::Item: IntoFragment,
    {
        let mut template = Template {
            nodes: vec![Node::default()],
        };
        for fragment in fragments {
            let slot = template.process_fragment(fragment.into_fragment()?);
            template.push_root_slot(slot);
        }
        tracing::debug!(
            nodes = template.nodes.len(),
            unassigned = ?template.unassigned_vars(),
            "built template"
        );
        Ok(template)
    }

    /// Bind each `(name, value)` pair in order.
    ///
    /// A value may itself contain placeholders; later pairs in the same call
    /// can bind them. Names that do not occur in the template are ignored.
    /// On error, pairs processed before the failing one stay bound.
    pub fn apply_vars<I, K, V>(&mut self, vars: I) -> Result<&mut Self, TemplateError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoFragment,
    {
        for (name, value) in vars {
            self.bind(name.as_ref(), value)?;
        }
        Ok(self)
    }

    /// Owned form of [`Template::apply_vars`], convenient right after [`Template::new`].
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoFragment,
    {
        self.apply_vars(vars)?;
        Ok(self)
    }

    /// Bind one placeholder everywhere it is reachable from the root.
    pub fn bind(&mut self, name: &str, value: impl IntoFragment) -> Result<&mut Self, TemplateError> {
        let fragment = value.into_fragment()?;

        if !self.nodes[ROOT].placeholders.contains_key(name) {
            tracing::trace!(name, kind = fragment.kind(), "ignoring binding for unknown placeholder");
            return Ok(self);
        }

        let slot = self.process_fragment(fragment);
        let overwritten = self.replace(name, &slot);

        if let Some(id) = slot.node() {
            for (parent, positions) in overwritten {
                self.attach(id, parent, positions);
            }
            self.propagate(id);
        }

        tracing::debug!(name, unassigned = ?self.unassigned_vars(), "bound placeholder");
        Ok(self)
    }

    /// Placeholder names not yet bound, in sorted order.
    pub fn unassigned_vars(&self) -> Vec<&str> {
        self.nodes[ROOT]
            .placeholders
            .keys()
            .map(String::as_str)
            .collect()
    }

    /// Whether every placeholder has been bound.
    pub fn is_complete(&self) -> bool {
        self.nodes[ROOT].placeholders.is_empty()
    }

    /// Number of nodes in the graph, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Compile into a flagless [`Pattern`].
    pub fn compile(&self) -> Result<Pattern, TemplateError> {
        self.compile_source().map(Pattern::new)
    }

    /// Compile and hand the result to the regex engine.
    pub fn compile_regex(&self) -> Result<regex::Regex, TemplateError> {
        self.compile()?.to_regex()
    }

    /// Compile into the final pattern text.
    ///
    /// Nodes are rendered from the highest index down. A child is always
    /// created after every node that references it, so its text is ready
    /// before any parent needs it. A nested template bound at several sites
    /// is rendered once per call.
    pub fn compile_source(&self) -> Result<String, TemplateError> {
        self.render(&mut HashMap::new())
    }

    /// Render this template, sharing `nested` with every template it nests.
    fn render(&self, nested: &mut HashMap<*const Template, String>) -> Result<String, TemplateError> {
        if !self.is_complete() {
            let names = self.unassigned_vars().into_iter().map(String::from).collect();
            return Err(TemplateError::UnboundPlaceholder(names));
        }

        let mut compiled: Vec<Option<String>> = vec![None; self.nodes.len()];

        for id in (0..self.nodes.len()).rev() {
            let mut text = String::new();
            for slot in &self.nodes[id].content {
                match slot {
                    Slot::Literal(literal) => text.push_str(literal),
                    Slot::Template(template) => {
                        let key = Arc::as_ptr(template);
                        if !nested.contains_key(&key) {
                            let rendered = template.render(nested)?;
                            nested.insert(key, rendered);
                        }
                        text.push_str(&nested[&key]);
                    }
                    Slot::Node(child) => {
                        debug_assert!(*child > id, "child node {child} rendered after parent {id}");
                        text.push_str(compiled[*child].as_deref().unwrap_or_default());
                    }
                    // The root reports every name still held by a descendant.
                    Slot::Placeholder(name) => {
                        return Err(TemplateError::UnboundPlaceholder(vec![name.clone()]));
                    }
                }
            }
            tracing::trace!(node = id, len = text.len(), "compiled node");
            compiled[id] = Some(text);
        }

        Ok(compiled.into_iter().next().flatten().unwrap_or_default())
    }

    fn process_fragment(&mut self, fragment: Fragment) -> Slot {
        match fragment {
            Fragment::Pattern(pattern) => self.process_pattern(pattern.as_str()),
            Fragment::Template(template) => Slot::Template(Arc::new(template)),
            Fragment::Literal(raw) => Slot::Literal(escape_literal(&raw)),
        }
    }

    /// Plain text becomes a literal slot; text with placeholders becomes a new
    /// detached node. The caller wires it into its parents.
    fn process_pattern(&mut self, text: &str) -> Slot {
        let split = scan_placeholders(text);
        if split.len() == 1 {
            return Slot::Literal(text.to_string());
        }

        let id = self.nodes.len();
        let mut node = Node::default();
        for (position, part) in parts(&split).enumerate() {
            match part {
                Part::Literal(literal) => node.content.push(Slot::Literal(literal.to_string())),
                Part::Placeholder(name) => {
                    node.placeholders
                        .entry(name.to_string())
                        .or_default()
                        .insert(position);
                    node.content.push(Slot::Placeholder(name.to_string()));
                }
            }
        }

        tracing::debug!(
            node = id,
            placeholders = ?node.placeholders.keys().collect::<Vec<_>>(),
            "created template node"
        );
        self.nodes.push(node);
        Slot::Node(id)
    }

    fn push_root_slot(&mut self, slot: Slot) {
        let position = self.nodes[ROOT].content.len();
        let child = slot.node();
        self.nodes[ROOT].content.push(slot);
        if let Some(child) = child {
            self.attach(child, ROOT, [position]);
            self.propagate(child);
        }
    }

    fn attach(&mut self, child: NodeId, parent: NodeId, positions: impl IntoIterator<Item = usize>) {
        self.nodes[child].parents.insert(parent);
        self.nodes[parent]
            .children
            .entry(child)
            .or_default()
            .extend(positions);
    }

    /// Make every ancestor of `start` aware of the names visible on it.
    ///
    /// A parent records the slots where it holds the child, not the child's
    /// own positions. A parent is revisited only when it learns a new name.
    fn propagate(&mut self, start: NodeId) {
        let mut queue = VecDeque::from([start]);

        while let Some(child) = queue.pop_front() {
            let names: Vec<String> = self.nodes[child].placeholders.keys().cloned().collect();
            if names.is_empty() {
                continue;
            }
            let parents: Vec<NodeId> = self.nodes[child].parents.iter().copied().collect();

            for parent in parents {
                let node = &mut self.nodes[parent];
                let positions = node.children.get(&child).cloned().unwrap_or_default();
                let mut gained = false;

                for name in &names {
                    match node.placeholders.entry(name.clone()) {
                        Entry::Vacant(entry) => {
                            gained = true;
                            entry.insert(positions.clone());
                        }
                        Entry::Occupied(mut entry) => entry.get_mut().extend(positions.iter().copied()),
                    }
                }

                tracing::trace!(child, parent, gained, "propagated placeholders");
                if gained {
                    queue.push_back(parent);
                }
            }
        }
    }

    /// Overwrite every reachable occurrence of `name` with `value`, walking
    /// down from the root. Returns the slots overwritten directly, per node.
    fn replace(&mut self, name: &str, value: &Slot) -> BTreeMap<NodeId, Positions> {
        let mut overwritten: BTreeMap<NodeId, Positions> = BTreeMap::new();
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![ROOT];

        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id], true) {
                continue;
            }
            let node = &mut self.nodes[id];
            let Some(positions) = node.placeholders.remove(name) else {
                continue;
            };

            for position in positions {
                if let Slot::Node(child) = node.content[position] {
                    stack.push(child);
                    continue;
                }
                if matches!(&node.content[position], Slot::Placeholder(current) if current == name) {
                    node.content[position] = value.clone();
                    overwritten.entry(id).or_default().insert(position);
                } else {
                    tracing::warn!(node = id, position, name, "placeholder position holds no occurrence");
                }
            }
            tracing::trace!(node = id, name, "replaced placeholder");
        }

        overwritten
    }
}
