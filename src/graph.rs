// Copyright (c) 2022 Bastiaan Marinus van de Weerd

//! Named nodes with unit-cost tunnels, and a lazily filled hop-count index.

use std::{collections::HashMap, fmt, str::FromStr, sync::{PoisonError, RwLock}};


/// Two upper-case letters, packed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(u16);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected an upper-case letter at column {column}, found {}", Found(.found))]
pub struct LabelError { pub column: usize, pub found: Option<u8> }

struct Found<'a>(&'a Option<u8>);

impl fmt::Display for Found<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0 {
			Some(b) => write!(f, "{:?}", *b as char),
			None => f.write_str("end of input"),
		}
	}
}

impl Label {
	/// Both bytes must be upper-case ASCII letters.
	pub const fn new([b0, b1]: [u8; 2]) -> Label {
		Label((((b0 - b'A') as u16) << 8) + (b1 - b'A') as u16)
	}

	/// Splits a label off the front of `s`.
	pub fn split_from_str(s: &str) -> Result<(Label, &str), LabelError> {
		let mut bytes = s.bytes();
		match (bytes.next(), bytes.next()) {
			(None, _) => Err(LabelError { column: 1, found: None }),
			(Some(b), _) if !b.is_ascii_uppercase() =>
				Err(LabelError { column: 1, found: Some(b) }),
			(_, None) => Err(LabelError { column: 2, found: None }),
			(_, Some(b)) if !b.is_ascii_uppercase() =>
				Err(LabelError { column: 2, found: Some(b) }),
			(Some(b0), Some(b1)) => Ok((Label::new([b0, b1]), &s[2..])),
		}
	}
}

impl FromStr for Label {
	type Err = LabelError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match Label::split_from_str(s)? {
			(label, "") => Ok(label),
			(_, rest) => Err(LabelError { column: 3, found: rest.bytes().next() }),
		}
	}
}

impl fmt::Display for Label {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		use fmt::Write as _;
		f.write_char((b'A' + ((self.0 & 0xff00) >> 8) as u8) as char)?;
		f.write_char((b'A' + (self.0 & 0x00ff) as u8) as char)?;
		Ok(())
	}
}

impl fmt::Debug for Label {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "\"{self}\"")
	}
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
pub struct Node {
	pub label: Label,
	pub value: usize,
	adjacent: Vec<NodeId>,
}

impl Node {
	pub fn adjacent(&self) -> &[NodeId] { &self.adjacent }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
	#[error("node {0} already exists")]
	Duplicate(Label),
	#[error("node {0} does not exist")]
	NotFound(Label),
}


#[derive(Debug, Default)]
pub struct Graph {
	nodes: Vec<Node>,
	ids: HashMap<Label, NodeId>,
	/// Hop counts keyed by ordered pair (lower id first).
	distances: RwLock<HashMap<(NodeId, NodeId), usize>>,
}

fn pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
	if a <= b { (a, b) } else { (b, a) }
}

impl Graph {
	pub fn add_node(&mut self, label: Label, value: usize) -> Result<NodeId, GraphError> {
		use std::collections::hash_map::Entry;
		match self.ids.entry(label) {
			Entry::Occupied(_) => Err(GraphError::Duplicate(label)),
			Entry::Vacant(entry) => {
				let id = NodeId(self.nodes.len());
				self.nodes.push(Node { label, value, adjacent: vec![] });
				entry.insert(id);
				Ok(id)
			}
		}
	}

	/// Adds a tunnel between `a` and `b`, usable in both directions.
	pub fn connect(&mut self, a: Label, b: Label) -> Result<(), GraphError> {
		let a = self.get(a).ok_or(GraphError::NotFound(a))?;
		let b = self.get(b).ok_or(GraphError::NotFound(b))?;
		if a == b { return Ok(()) }
		for (from, to) in [(a, b), (b, a)] {
			let adjacent = &mut self.nodes[from.0].adjacent;
			if !adjacent.contains(&to) { adjacent.push(to) }
		}
		Ok(())
	}

	pub fn get(&self, label: Label) -> Option<NodeId> {
		self.ids.get(&label).copied()
	}

	pub fn node(&self, id: NodeId) -> &Node {
		&self.nodes[id.0]
	}

	pub fn len(&self) -> usize { self.nodes.len() }

	pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
		self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
	}

	/// Hop counts from `from` to every node (`None` where unreachable).
	fn relax_from(&self, from: NodeId) -> Vec<Option<usize>> {
		use std::{cmp::Reverse, collections::BinaryHeap};

		// Dijkstra; every tunnel takes one minute
		let mut settled = vec![false; self.nodes.len()];
		let mut tentative = vec![None; self.nodes.len()];
		let mut heap = BinaryHeap::new();
		tentative[from.0] = Some(0);
		heap.push(Reverse((0, from)));

		while let Some(Reverse((distance, id))) = heap.pop() {
			if settled[id.0] { continue }
			settled[id.0] = true;

			for &next in self.nodes[id.0].adjacent() {
				if settled[next.0] { continue }
				if tentative[next.0].map_or(true, |d| distance + 1 < d) {
					tentative[next.0] = Some(distance + 1);
					heap.push(Reverse((distance + 1, next)));
				}
			}
		}

		tentative
	}

	/// Minimum number of tunnels between `a` and `b`.
	///
	/// On a miss, every distance from `a` is computed and cached at once.
	///
	/// # Panics
	///
	/// If `b` cannot be reached from `a`.
	pub fn distance(&self, a: NodeId, b: NodeId) -> usize {
		if a == b { return 0 }
		let key = pair(a, b);

		if let Some(&distance) = self.distances.read()
				.unwrap_or_else(PoisonError::into_inner)
				.get(&key) {
			return distance
		}

		let from_a = self.relax_from(a);
		let mut distances = self.distances.write().unwrap_or_else(PoisonError::into_inner);
		for (i, distance) in from_a.into_iter().enumerate() {
			let Some(distance) = distance else { continue };
			if i != a.0 { distances.entry(pair(a, NodeId(i))).or_insert(distance); }
		}
		log::trace!("cached distances from {}", self.nodes[a.0].label);

		match distances.get(&key) {
			Some(&distance) => distance,
			None => panic!("no path between {} and {}",
				self.nodes[a.0].label, self.nodes[b.0].label),
		}
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	fn label(s: &str) -> Label { s.parse().unwrap() }

	fn ring(n: usize) -> Graph {
		let mut graph = Graph::default();
		let labels = (0..n)
			.map(|i| Label::split_from_str(&format!("A{}", (b'A' + i as u8) as char)).unwrap().0)
			.collect::<Vec<_>>();
		for &l in &labels { graph.add_node(l, 1).unwrap(); }
		for (i, &l) in labels.iter().enumerate() { graph.connect(l, labels[(i + 1) % n]).unwrap(); }
		graph
	}

	#[test]
	fn labels() {
		assert_eq!(label("JJ").to_string(), "JJ");
		assert_eq!("Jj".parse::<Label>(), Err(LabelError { column: 2, found: Some(b'j') }));
		assert_eq!("J".parse::<Label>(), Err(LabelError { column: 2, found: None }));
		assert_eq!("JJJ".parse::<Label>(), Err(LabelError { column: 3, found: Some(b'J') }));
		assert_eq!(Label::split_from_str("AB, CD").unwrap(), (label("AB"), ", CD"));
		assert_eq!(LabelError { column: 2, found: Some(b'j') }.to_string(),
			"expected an upper-case letter at column 2, found 'j'");
		assert_eq!(LabelError { column: 1, found: None }.to_string(),
			"expected an upper-case letter at column 1, found end of input");
	}

	#[test]
	fn building() {
		let mut graph = Graph::default();
		let aa = graph.add_node(label("AA"), 0).unwrap();
		let bb = graph.add_node(label("BB"), 13).unwrap();
		assert_eq!(graph.add_node(label("AA"), 1), Err(GraphError::Duplicate(label("AA"))));
		assert_eq!(graph.connect(label("AA"), label("ZZ")), Err(GraphError::NotFound(label("ZZ"))));
		graph.connect(label("AA"), label("BB")).unwrap();
		graph.connect(label("BB"), label("AA")).unwrap();
		assert_eq!(graph.node(aa).adjacent(), &[bb]);
		assert_eq!(graph.node(bb).adjacent(), &[aa]);
		assert_eq!(graph.get(label("BB")), Some(bb));
		assert_eq!(graph.node(bb).value, 13);
		assert_eq!(graph.len(), 2);
	}

	#[test]
	fn ring_distances() {
		let graph = ring(7);
		let ids = graph.nodes().map(|(id, _)| id).collect::<Vec<_>>();
		for (i, &a) in ids.iter().enumerate() {
			for (j, &b) in ids.iter().enumerate() {
				let around = i.abs_diff(j);
				assert_eq!(graph.distance(a, b), around.min(7 - around));
				assert_eq!(graph.distance(a, b), graph.distance(b, a));
			}
		}
	}

	#[test]
	#[should_panic(expected = "no path")]
	fn disconnected() {
		let mut graph = Graph::default();
		let aa = graph.add_node(label("AA"), 0).unwrap();
		let bb = graph.add_node(label("BB"), 0).unwrap();
		graph.distance(aa, bb);
	}
}
