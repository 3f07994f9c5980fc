// Copyright (c) 2022 Bastiaan Marinus van de Weerd

//! Proboscidea Volcanium: open valves to release as much pressure as possible.

use crate::{graph::{Graph, Label, NodeId}, search::{self, Outcome, Problem}};

pub use parsing::ValvesError;


const START: Label = Label::new(*b"AA");
const MINUTES: usize = 30;
/// Minutes spent teaching the elephant before either of you can move.
const TEACHING_MINUTES: usize = 4;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Actor {
	at: NodeId,
	budget: usize,
}

/// Search state: where each actor stands with how many minutes left, which
/// valves are open (bits index into [`Tunnels::valves`]) and the pressure their
/// opening will have released by the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Route<const N: usize> {
	actors: [Actor; N],
	opened: u64,
	reward: usize,
}

impl<const N: usize> Route<N> {
	fn start(at: NodeId, budget: usize) -> Self {
		Route { actors: [Actor { at, budget }; N], opened: 0, reward: 0 }
	}

	fn is_open(&self, valve: usize) -> bool {
		self.opened & 1 << valve != 0
	}

	/// The actor whose schedule gets extended next: the one with the most
	/// minutes left, so every combination of schedules is reached exactly once.
	fn next_actor(&self) -> usize {
		(0..N).rev().max_by_key(|&i| self.actors[i].budget).unwrap_or(0)
	}
}


/// The tunnel network, restricted to valves worth opening.
struct Tunnels<'g, const N: usize> {
	graph: &'g Graph,
	/// Nodes with a nonzero flow rate, highest first.
	valves: Vec<NodeId>,
}

impl<'g, const N: usize> Tunnels<'g, N> {
	fn new(graph: &'g Graph) -> Result<Self, ValvesError> {
		use itertools::Itertools as _;
		let valves = graph.nodes()
			.filter(|(_, node)| node.value > 0)
			.sorted_by_key(|(_, node)| std::cmp::Reverse(node.value))
			.map(|(id, _)| id)
			.collect::<Vec<_>>();
		// One bit of `Route::opened` per valve
		if valves.len() > u64::BITS as usize { return Err(ValvesError::TooManyValves(valves.len())) }
		Ok(Tunnels { graph, valves })
	}

	fn flow_rate(&self, valve: usize) -> usize {
		self.graph.node(self.valves[valve]).value
	}

	/// Walks `actor` to `valve` and opens it, if that leaves at least one minute
	/// of flow before the deadline.
	fn open(&self, route: &Route<N>, actor: usize, valve: usize) -> Option<Route<N>> {
		let Actor { at, budget } = route.actors[actor];
		let to = self.valves[valve];
		let budget = budget.checked_sub(self.graph.distance(at, to) + 1)
			.filter(|&budget| budget > 0)?;

		let mut next = route.clone();
		next.actors[actor] = Actor { at: to, budget };
		next.opened |= 1 << valve;
		next.reward += self.flow_rate(valve) * budget;
		Some(next)
	}
}

impl<const N: usize> Problem for Tunnels<'_, N> {
	type State = Route<N>;

	fn reward(&self, route: &Route<N>) -> usize {
		route.reward
	}

	// Every closed valve opened as soon as the nearest actor could reach it,
	// ignoring the time spent on every other valve.
	fn ceiling(&self, route: &Route<N>) -> usize {
		(0..self.valves.len())
			.filter(|&valve| !route.is_open(valve))
			.map(|valve| {
				let minutes = route.actors.iter()
					.map(|actor| actor.budget
						.saturating_sub(self.graph.distance(actor.at, self.valves[valve]) + 1))
					.max()
					.unwrap_or(0);
				self.flow_rate(valve) * minutes
			})
			.sum()
	}

	fn branches(&self, route: &Route<N>) -> Vec<Route<N>> {
		use itertools::Itertools as _;

		let actor = route.next_actor();
		if route.actors[actor].budget == 0 { return vec![] }

		let mut branches = (0..self.valves.len())
			.filter(|&valve| !route.is_open(valve))
			.filter_map(|valve| self.open(route, actor, valve))
			.sorted_by_key(|next| std::cmp::Reverse(next.reward))
			.collect::<Vec<_>>();

		// Stop this actor early, leaving the remaining valves to the others
		if route.actors.iter().enumerate().any(|(i, other)| i != actor && other.budget > 0) {
			let mut retired = route.clone();
			retired.actors[actor].budget = 0;
			branches.push(retired);
		}

		log::trace!("{} minutes left at {}: {} branches",
			route.actors[actor].budget,
			self.graph.node(route.actors[actor].at).label,
			branches.len());

		branches
	}
}


/// Most pressure `N` actors starting at [`START`] can release in `minutes`.
fn release_pressure<const N: usize>(graph: &Graph, minutes: usize)
-> Result<Outcome, ValvesError> {
	let start = graph.get(START).ok_or(ValvesError::NoStart(START))?;
	let tunnels = Tunnels::<N>::new(graph)?;
	log::debug!("{} valves worth opening among {} nodes", tunnels.valves.len(), graph.len());
	Ok(search::par_branch_and_bound(&tunnels, Route::start(start, minutes)))
}


pub fn part1(input: &str) -> Result<usize, ValvesError> {
	let graph = parsing::graph_from_str(input)?;
	Ok(release_pressure::<1>(&graph, MINUTES)?.reward)
}

pub fn part2(input: &str) -> Result<usize, ValvesError> {
	let graph = parsing::graph_from_str(input)?;
	Ok(release_pressure::<2>(&graph, MINUTES - TEACHING_MINUTES)?.reward)
}


mod parsing {
	use std::num::ParseIntError;
	use crate::graph::{Graph, GraphError, Label, LabelError};

	#[derive(Debug, PartialEq, Eq, thiserror::Error)]
	pub enum ValveError {
		#[error("unexpected text at column {column}")]
		Format { column: usize },
		#[error("invalid valve label: {0}")]
		Label(LabelError),
		#[error("invalid flow rate: {0}")]
		FlowRate(ParseIntError),
		#[error("invalid label for tunnel at index {offset}: {source}")]
		Tunnel { offset: usize, source: LabelError },
	}

	#[derive(Debug, PartialEq, Eq, thiserror::Error)]
	pub enum ValvesError {
		#[error("line {line}: {source}")]
		Valve { line: usize, source: ValveError },
		#[error("line {line}: {source}")]
		Graph { line: usize, source: GraphError },
		#[error("no valve {0} to start from")]
		NoStart(Label),
		#[error("{0} valves worth opening, at most 64 supported")]
		TooManyValves(usize),
	}

	#[cfg_attr(test, derive(Debug, PartialEq))]
	pub(super) struct ValveLine {
		pub(super) label: Label,
		pub(super) flow_rate: usize,
		pub(super) tunnels: Vec<Label>,
	}

	/// On mismatch, returns the rest of `s` starting at the first differing byte.
	fn try_strip_prefix<'s>(s: &'s str, prefix: &str) -> Result<&'s str, &'s str> {
		s.strip_prefix(prefix).ok_or_else(|| {
			let p = s.bytes().zip(prefix.bytes()).position(|(s, p)| s != p)
				.unwrap_or_else(|| s.len().min(prefix.len()));
			&s[p..]
		})
	}

	pub(super) fn try_valve_from_str(s: &str) -> Result<ValveLine, ValveError> {
		use ValveError as E;
		let s0 = s;
		macro_rules! c { ( $s:expr ) => { s0.len() - $s.len() } }

		let s = try_strip_prefix(s, "Valve ")
			.map_err(|s| E::Format { column: c!(s) + 1 })?;
		let (label, s) = Label::split_from_str(s).map_err(|e|
			E::Label(LabelError { column: c!(s) + e.column, ..e }))?;
		let s = try_strip_prefix(s, " has flow rate=")
			.map_err(|s| E::Format { column: c!(s) + 1 })?;
		let (flow_rate, s) = s.split_once(';')
			.ok_or(E::Format { column: c!(s) + 1 })?;
		let flow_rate = flow_rate.parse::<usize>().map_err(E::FlowRate)?;
		let s = try_strip_prefix(s, " tunnel")
			.map_err(|s| E::Format { column: c!(s) + 1 })?;

		let (tunnels, s) = if s.starts_with('s') {
			let mut s = try_strip_prefix(s, "s lead to valves ")
				.map_err(|s| E::Format { column: c!(s) + 1 })?;
			let mut tunnels = vec![];
			for offset in 0.. {
				let (tunnel, rest) = Label::split_from_str(s)
					.map_err(|e| E::Tunnel { offset, source: e })?;
				tunnels.push(tunnel);
				s = rest;
				if !s.starts_with(',') { break }
				s = try_strip_prefix(s, ", ")
					.map_err(|s| E::Format { column: c!(s) + 1 })?;
			}
			(tunnels, s)
		} else {
			let s = try_strip_prefix(s, " leads to valve ")
				.map_err(|s| E::Format { column: c!(s) + 1 })?;
			let (tunnel, s) = Label::split_from_str(s)
				.map_err(|e| E::Tunnel { offset: 0, source: e })?;
			(vec![tunnel], s)
		};

		if !s.is_empty() { return Err(E::Format { column: c!(s) + 1 }) }
		Ok(ValveLine { label, flow_rate, tunnels })
	}

	/// Adds every valve first, so tunnels may point at valves described later on.
	pub(super) fn graph_from_str(s: &str) -> Result<Graph, ValvesError> {
		let lines = s.lines()
			.enumerate()
			.filter(|(_, line)| !line.trim().is_empty())
			.map(|(l, line)| try_valve_from_str(line.trim_end())
				.map(|valve| (l + 1, valve))
				.map_err(|e| ValvesError::Valve { line: l + 1, source: e }))
			.collect::<Result<Vec<_>, _>>()?;

		let mut graph = Graph::default();
		for (line, valve) in &lines {
			graph.add_node(valve.label, valve.flow_rate)
				.map_err(|e| ValvesError::Graph { line: *line, source: e })?;
		}
		for (line, valve) in &lines {
			for &tunnel in &valve.tunnels {
				graph.connect(valve.label, tunnel)
					.map_err(|e| ValvesError::Graph { line: *line, source: e })?;
			}
		}
		Ok(graph)
	}
}


#[cfg(test)]
const INPUT: &str = indoc::indoc! { "
	Valve AA has flow rate=0; tunnels lead to valves DD, II, BB
	Valve BB has flow rate=13; tunnels lead to valves CC, AA
	Valve CC has flow rate=2; tunnels lead to valves DD, BB
	Valve DD has flow rate=20; tunnels lead to valves CC, AA, EE
	Valve EE has flow rate=3; tunnels lead to valves FF, DD
	Valve FF has flow rate=0; tunnels lead to valves EE, GG
	Valve GG has flow rate=0; tunnels lead to valves FF, HH
	Valve HH has flow rate=22; tunnel leads to valve GG
	Valve II has flow rate=0; tunnels lead to valves AA, JJ
	Valve JJ has flow rate=21; tunnel leads to valve II
" };

#[cfg(test)]
fn sample_graph() -> Graph {
	parsing::graph_from_str(INPUT).unwrap()
}

#[cfg(test)]
fn id(graph: &Graph, label: &str) -> NodeId {
	graph.get(label.parse().unwrap()).unwrap()
}


#[test]
fn tests() {
	assert_eq!(part1(INPUT), Ok(1651));
	assert_eq!(part2(INPUT), Ok(1707));
}

#[cfg(test)]
use test_case::test_case;

#[cfg(test)]
#[test_case("AA", "DD", 1)]
#[test_case("DD", "BB", 2)]
#[test_case("BB", "JJ", 3)]
#[test_case("JJ", "HH", 7)]
#[test_case("EE", "HH", 3)]
#[test_case("EE", "CC", 2)]
fn distances(from: &str, to: &str, expected: usize) {
	let graph = sample_graph();
	let (a, b) = (id(&graph, from), id(&graph, to));
	assert_eq!(graph.distance(a, b), expected);
	assert_eq!(graph.distance(b, a), expected);
	assert_eq!(graph.distance(a, b), expected);
}

#[test]
fn distances_symmetric() {
	let graph = sample_graph();
	for (a, _) in graph.nodes() {
		assert_eq!(graph.distance(a, a), 0);
		for (b, _) in graph.nodes() {
			assert_eq!(graph.distance(a, b), graph.distance(b, a));
		}
	}
}

#[test]
fn sequential_matches_parallel() {
	let graph = sample_graph();
	let tunnels = Tunnels::<1>::new(&graph).unwrap();
	let root = Route::start(id(&graph, "AA"), MINUTES);
	let outcome = search::branch_and_bound(&tunnels, root.clone());
	assert_eq!(outcome.reward, 1651);
	assert!(outcome.pruned > 0);
	assert_eq!(search::par_branch_and_bound(&tunnels, root).reward, 1651);
}

#[cfg(test)]
fn check_invariants<const N: usize>(minutes: usize) {
	let graph = sample_graph();
	let tunnels = Tunnels::<N>::new(&graph).unwrap();
	let root = Route::start(id(&graph, "AA"), minutes);
	let mut states = 0;
	search::walk(&tunnels, &root, &mut |parent, route| {
		states += 1;
		assert!(route.actors.iter().all(|actor| actor.budget <= minutes));
		if let Some(parent) = parent {
			assert!(route.reward >= parent.reward);
			assert!(route.actors.iter().zip(&parent.actors).all(|(a, p)| a.budget <= p.budget));
			assert!(route.opened & parent.opened == parent.opened);
		}
		let best = search::exhaustive(&tunnels, route);
		assert!(route.reward + tunnels.ceiling(route) >= best,
			"ceiling {} below {} for {route:?}", tunnels.ceiling(route), best - route.reward);
	});
	assert!(states > 1);
}

#[test]
fn invariants_alone() {
	check_invariants::<1>(MINUTES);
}

#[test]
fn invariants_with_elephant() {
	check_invariants::<2>(12);
}

#[test]
fn parse_errors() {
	use crate::graph::GraphError;
	use parsing::{try_valve_from_str as valve, ValveError};
	assert_eq!(valve("Valve HH has flow rate=22; tunnel leads to valve GG"), Ok(parsing::ValveLine {
		label: "HH".parse().unwrap(), flow_rate: 22, tunnels: vec!["GG".parse().unwrap()] }));
	assert_eq!(valve("Valve HH has flow rate=22; tunnels lead to valves GG, AA").map(|v| v.tunnels.len()),
		Ok(2));
	assert_eq!(valve("Vault HH has flow rate=22; tunnel leads to valve GG"),
		Err(ValveError::Format { column: 3 }));
	assert!(matches!(valve("Valve HH has flow rate=x; tunnel leads to valve GG"),
		Err(ValveError::FlowRate(_))));
	assert!(matches!(valve("Valve Hh has flow rate=1; tunnel leads to valve GG"),
		Err(ValveError::Label(e)) if e.column == 8));
	assert!(matches!(valve("Valve HH has flow rate=1; tunnels lead to valves GG, a"),
		Err(ValveError::Tunnel { offset: 1, .. })));
	assert_eq!(valve("Valve HH has flow rate=1; tunnel leads to valve GG!"),
		Err(ValveError::Format { column: 51 }));

	assert!(matches!(parsing::graph_from_str("Valve AA has flow rate=0; tunnel leads to valve BB"),
		Err(ValvesError::Graph { line: 1, .. })));
	let duplicate = [INPUT.trim_end(), "Valve BB has flow rate=1; tunnel leads to valve AA"].join("\n");
	assert_eq!(parsing::graph_from_str(&duplicate).map(|_| ()), Err(ValvesError::Graph {
		line: 11, source: GraphError::Duplicate("BB".parse().unwrap()) }));
	assert!(matches!(part1("Valve BB has flow rate=1; tunnel leads to valve BB"),
		Err(ValvesError::NoStart(_))));
}

#[test]
fn too_many_valves() {
	let input = (0..65)
		.map(|i| format!("Valve {}{} has flow rate=1; tunnel leads to valve AA",
			(b'A' + i / 26) as char, (b'A' + i % 26) as char))
		.collect::<Vec<_>>()
		.join("\n");
	assert_eq!(part1(&input), Err(ValvesError::TooManyValves(65)));
	assert_eq!(part2(&input), Err(ValvesError::TooManyValves(65)));
}
