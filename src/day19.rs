// Copyright (c) 2022 Bastiaan Marinus van de Weerd

//! Not Enough Minerals: pick which robots to build to crack the most geodes.

use std::ops::{Add, Index, IndexMut, Mul, Sub};
use crate::search::{self, Problem};

pub use parsing::BlueprintsError;


const MINUTES: usize = 24;
const HUNGRY_MINUTES: usize = 32;
/// Blueprints the elephants left intact.
const INTACT_BLUEPRINTS: usize = 3;


macro_rules! resources { ( $( $name:ident ),+ ) => { paste::paste! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub enum Resource { $( $name ),+ }

	impl Resource {
		const ALL: [Resource; Resource::COUNT] = [ $( Resource::$name ),+ ];
		const COUNT: usize = [ $( stringify!($name) ),+ ].len();

		fn name(self) -> &'static str {
			match self { $( Resource::$name => stringify!([<$name:lower>]) ),+ }
		}
	}
} } }
resources!(Ore, Clay, Obsidian, Geode);

impl std::fmt::Display for Resource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

impl std::str::FromStr for Resource {
	type Err = String;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Resource::ALL.into_iter().find(|r| r.name() == s).ok_or_else(|| s.to_owned())
	}
}


/// An amount of every resource.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourcePack([usize; Resource::COUNT]);

impl ResourcePack {
	fn unit(resource: Resource) -> Self {
		let mut pack = Self::default();
		pack[resource] = 1;
		pack
	}

	fn covers(&self, other: &Self) -> bool {
		self.0.iter().zip(other.0).all(|(have, need)| *have >= need)
	}
}

impl Index<Resource> for ResourcePack {
	type Output = usize;
	fn index(&self, resource: Resource) -> &usize { &self.0[resource as usize] }
}

impl IndexMut<Resource> for ResourcePack {
	fn index_mut(&mut self, resource: Resource) -> &mut usize { &mut self.0[resource as usize] }
}

macro_rules! impl_pack_op { ( $trait:ident, $fn:ident, $op:tt ) => {
	impl $trait for ResourcePack {
		type Output = Self;
		fn $fn(mut self, rhs: Self) -> Self {
			for (l, r) in self.0.iter_mut().zip(rhs.0) { *l = *l $op r }
			self
		}
	}
} }
impl_pack_op!(Add, add, +);
impl_pack_op!(Sub, sub, -);

impl Mul<usize> for ResourcePack {
	type Output = Self;
	fn mul(mut self, rhs: usize) -> Self {
		for amount in &mut self.0 { *amount *= rhs }
		self
	}
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blueprint {
	id: usize,
	/// Robot costs, indexed by what the robot collects.
	costs: [ResourcePack; Resource::COUNT],
}

impl Blueprint {
	fn cost(&self, robot: Resource) -> &ResourcePack {
		&self.costs[robot as usize]
	}

	/// Robots of a kind beyond the most of its resource any recipe spends per
	/// minute are useless, as only one robot is built per minute.
	fn robot_caps(&self) -> ResourcePack {
		let mut caps = ResourcePack::default();
		for resource in Resource::ALL {
			caps[resource] = match resource {
				Resource::Geode => usize::MAX,
				_ => self.costs.iter().map(|cost| cost[resource]).max().unwrap_or(0),
			}
		}
		caps
	}

	fn max_geodes(&self, minutes: usize) -> usize {
		let outcome = search::branch_and_bound(&Optimizer::new(self), Factory::start(minutes));
		log::debug!("blueprint {}: {} geodes in {minutes} minutes", self.id, outcome.reward);
		outcome.reward
	}

	fn quality_level(&self, minutes: usize) -> usize {
		self.id * self.max_geodes(minutes)
	}
}


/// Search state: minutes left, what is in stock and what the robots collect
/// per minute.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Factory {
	budget: usize,
	stock: ResourcePack,
	output: ResourcePack,
}

impl Factory {
	fn start(budget: usize) -> Self {
		Factory { budget, stock: ResourcePack::default(), output: ResourcePack::unit(Resource::Ore) }
	}

	/// Waits until `robot` is affordable and builds it, if it gets at least one
	/// minute to collect before the deadline.
	fn produce(&self, blueprint: &Blueprint, robot: Resource) -> Option<Factory> {
		let cost = blueprint.cost(robot);
		let mut wait = 0;
		for resource in Resource::ALL {
			let short = cost[resource].saturating_sub(self.stock[resource]);
			if short == 0 { continue }
			let output = self.output[resource];
			if output == 0 { return None }
			wait = wait.max((short + output - 1) / output);
		}

		let minutes = wait + 1;
		let budget = self.budget.checked_sub(minutes).filter(|&budget| budget > 0)?;
		let stock = self.stock + self.output * minutes;
		debug_assert!(stock.covers(cost));

		Some(Factory {
			budget,
			stock: stock - *cost,
			output: self.output + ResourcePack::unit(robot),
		})
	}
}


struct Optimizer<'bp> {
	blueprint: &'bp Blueprint,
	caps: ResourcePack,
}

impl<'bp> Optimizer<'bp> {
	fn new(blueprint: &'bp Blueprint) -> Self {
		Optimizer { blueprint, caps: blueprint.robot_caps() }
	}

	/// Whether more robots collecting `resource` could still make a difference.
	fn is_wanted(&self, factory: &Factory, resource: Resource) -> bool {
		let cap = self.caps[resource];
		cap == usize::MAX || (factory.output[resource] < cap
			&& factory.stock[resource] + factory.output[resource] * factory.budget
				< cap * factory.budget)
	}
}

impl Problem for Optimizer<'_> {
	type State = Factory;

	/// Geodes cracked by the deadline if no more robots get built.
	fn reward(&self, factory: &Factory) -> usize {
		factory.stock[Resource::Geode] + factory.output[Resource::Geode] * factory.budget
	}

	// A new geode robot every remaining minute
	fn ceiling(&self, factory: &Factory) -> usize {
		factory.budget * factory.budget.saturating_sub(1) / 2
	}

	fn branches(&self, factory: &Factory) -> Vec<Factory> {
		use Resource::*;
		[Geode, Obsidian, Clay, Ore].into_iter()
			.filter(|&robot| self.is_wanted(factory, robot))
			.filter_map(|robot| factory.produce(self.blueprint, robot))
			.collect()
	}
}


fn blueprints(input: &str) -> Result<Vec<Blueprint>, BlueprintsError> {
	let blueprints = parsing::blueprints_from_str(input)?;
	if blueprints.is_empty() { return Err(BlueprintsError::Empty) }
	Ok(blueprints)
}

pub fn part1(input: &str) -> Result<usize, BlueprintsError> {
	use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};
	Ok(blueprints(input)?
		.par_iter()
		.map(|bp| bp.quality_level(MINUTES))
		.sum())
}

pub fn part2(input: &str) -> Result<usize, BlueprintsError> {
	use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};
	let blueprints = blueprints(input)?;
	Ok(blueprints[..blueprints.len().min(INTACT_BLUEPRINTS)]
		.par_iter()
		.map(|bp| bp.max_geodes(HUNGRY_MINUTES))
		.product())
}


mod parsing {
	use std::num::ParseIntError;
	use super::{Blueprint, Resource, ResourcePack};

	#[derive(Debug, PartialEq, Eq, thiserror::Error)]
	pub enum BlueprintError {
		#[error("expected {expected:?}, found {found:?}")]
		Format { expected: &'static str, found: String },
		#[error("invalid blueprint id: {0}")]
		Id(ParseIntError),
		#[error("invalid amount: {0}")]
		Amount(ParseIntError),
		#[error("unknown resource {0:?}")]
		Resource(String),
		#[error("second recipe for {0} robots")]
		Duplicate(Resource),
		#[error("no recipe for {0} robots")]
		Missing(Resource),
	}

	#[derive(Debug, PartialEq, Eq, thiserror::Error)]
	pub enum BlueprintsError {
		#[error("blueprint #{ordinal}: {source}")]
		Blueprint { ordinal: usize, source: BlueprintError },
		#[error("unexpected text before the first blueprint: {0:?}")]
		Preamble(String),
		#[error("no blueprints")]
		Empty,
	}

	fn try_strip_prefix<'s>(s: &'s str, prefix: &'static str) -> Result<&'s str, BlueprintError> {
		s.strip_prefix(prefix).ok_or_else(|| BlueprintError::Format {
			expected: prefix,
			found: s.chars().take(prefix.len()).collect(),
		})
	}

	fn try_split_once<'s>(s: &'s str, delimiter: &'static str)
	-> Result<(&'s str, &'s str), BlueprintError> {
		s.split_once(delimiter).ok_or_else(|| BlueprintError::Format {
			expected: delimiter,
			found: s.to_owned(),
		})
	}

	/// One recipe sentence, without its period (`Each geode robot costs 2 ore and 7 obsidian`).
	fn try_recipe_from_str(s: &str) -> Result<(Resource, ResourcePack), BlueprintError> {
		use BlueprintError as E;
		let s = try_strip_prefix(s, "Each ")?;
		let (robot, s) = try_split_once(s, " robot costs ")?;
		let robot = robot.parse::<Resource>().map_err(E::Resource)?;

		let mut cost = ResourcePack::default();
		for term in s.split(" and ") {
			let (amount, resource) = try_split_once(term, " ")?;
			let amount = amount.parse::<usize>().map_err(E::Amount)?;
			let resource: Resource = resource.parse().map_err(E::Resource)?;
			cost[resource] += amount;
		}
		Ok((robot, cost))
	}

	/// Any whitespace (including line breaks) separates words.
	impl std::str::FromStr for Blueprint {
		type Err = BlueprintError;
		fn from_str(s: &str) -> Result<Self, Self::Err> {
			use {itertools::Itertools as _, BlueprintError as E};

			let s = s.split_whitespace().join(" ");
			let rest = try_strip_prefix(&s, "Blueprint ")?;
			let (id, rest) = try_split_once(rest, ":")?;
			let id = id.parse::<usize>().map_err(E::Id)?;

			let mut costs = [None; Resource::COUNT];
			for sentence in rest.split('.').map(str::trim).filter(|s| !s.is_empty()) {
				let (robot, cost) = try_recipe_from_str(sentence)?;
				if costs[robot as usize].replace(cost).is_some() { return Err(E::Duplicate(robot)) }
			}

			let mut blueprint = Blueprint { id, costs: Default::default() };
			for robot in Resource::ALL {
				blueprint.costs[robot as usize] = costs[robot as usize].ok_or(E::Missing(robot))?;
			}
			Ok(blueprint)
		}
	}

	pub(super) fn blueprints_from_str(s: &str) -> Result<Vec<Blueprint>, BlueprintsError> {
		use itertools::Itertools as _;

		let starts = s.match_indices("Blueprint").map(|(i, _)| i).collect::<Vec<_>>();
		let preamble = s[..starts.first().copied().unwrap_or(s.len())].trim();
		if !preamble.is_empty() { return Err(BlueprintsError::Preamble(preamble.to_owned())) }

		starts.into_iter()
			.chain([s.len()])
			.tuple_windows()
			.enumerate()
			.map(|(i, (start, end))| s[start..end].parse::<Blueprint>()
				.map_err(|e| BlueprintsError::Blueprint { ordinal: i + 1, source: e }))
			.collect()
	}
}


#[cfg(test)]
const INPUT: &str = indoc::indoc! { "
	Blueprint 1:
	  Each ore robot costs 4 ore.
	  Each clay robot costs 2 ore.
	  Each obsidian robot costs 3 ore and 14 clay.
	  Each geode robot costs 2 ore and 7 obsidian.

	Blueprint 2:
	  Each ore robot costs 2 ore.
	  Each clay robot costs 3 ore.
	  Each obsidian robot costs 3 ore and 8 clay.
	  Each geode robot costs 3 ore and 12 obsidian.
" };

#[cfg(test)]
fn sample_blueprint(id: usize) -> Blueprint {
	parsing::blueprints_from_str(INPUT).unwrap().swap_remove(id - 1)
}

#[cfg(test)]
use test_case::test_case;


#[test]
fn tests() {
	assert_eq!(part1(INPUT), Ok(33));
	assert_eq!(part2(INPUT), Ok(56 * 62));
	assert_eq!(sample_blueprint(1).quality_level(MINUTES), 9);
}

#[cfg(test)]
#[test_case(1, MINUTES, 9)]
#[test_case(2, MINUTES, 12)]
#[test_case(1, HUNGRY_MINUTES, 56)]
#[test_case(2, HUNGRY_MINUTES, 62)]
fn geodes(id: usize, minutes: usize, expected: usize) {
	assert_eq!(sample_blueprint(id).max_geodes(minutes), expected);
}

#[test]
fn one_line_blueprint() {
	let blueprint: Blueprint = "Blueprint 1: Each ore robot costs 4 ore. Each clay robot costs 2 ore. \
		Each obsidian robot costs 3 ore and 14 clay. Each geode robot costs 2 ore and 7 obsidian."
		.parse().unwrap();
	assert_eq!(blueprint, sample_blueprint(1));
	assert_eq!(blueprint.cost(Resource::Obsidian), &ResourcePack([3, 14, 0, 0]));
	assert_eq!(blueprint.robot_caps(), ResourcePack([4, 14, 7, usize::MAX]));
}

#[test]
fn produce() {
	let blueprint = sample_blueprint(1);
	let factory = Factory::start(MINUTES);

	// Two minutes collecting ore, one building
	let clay = factory.produce(&blueprint, Resource::Clay).unwrap();
	assert_eq!(clay, Factory {
		budget: 21,
		stock: ResourcePack([1, 0, 0, 0]),
		output: ResourcePack([1, 1, 0, 0]),
	});

	assert_eq!(factory.produce(&blueprint, Resource::Obsidian), None);
	assert_eq!(factory.produce(&blueprint, Resource::Geode), None);
	assert_eq!(Factory::start(3).produce(&blueprint, Resource::Clay), None);
	assert!(Factory::start(4).produce(&blueprint, Resource::Clay).is_some());
}

#[test]
fn invariants() {
	const BUDGET: usize = 16;
	let blueprint = sample_blueprint(2);
	let optimizer = Optimizer::new(&blueprint);
	let root = Factory::start(BUDGET);
	let mut states = 0;
	search::walk(&optimizer, &root, &mut |parent, factory| {
		states += 1;
		assert!(factory.budget <= BUDGET);
		if let Some(parent) = parent {
			assert!(factory.budget < parent.budget);
			assert!(optimizer.reward(factory) >= optimizer.reward(parent));
		}
		let best = search::exhaustive(&optimizer, factory);
		assert!(optimizer.reward(factory) + optimizer.ceiling(factory) >= best);
	});
	assert!(states > 1);
}

#[test]
fn parse_errors() {
	use parsing::BlueprintError as E;
	macro_rules! blueprint_err { ( $s:expr ) => { $s.parse::<Blueprint>().unwrap_err() } }

	assert!(matches!(blueprint_err!("Blueprint x: Each ore robot costs 4 ore."), E::Id(_)));
	assert_eq!(blueprint_err!("Blueprint 1: Each ore robot costs 4 ore."), E::Missing(Resource::Clay));
	assert_eq!(blueprint_err!("Blueprint 1: Each ore robot costs 4 ore. Each ore robot costs 1 ore."),
		E::Duplicate(Resource::Ore));
	assert_eq!(blueprint_err!("Blueprint 1: Each diamond robot costs 4 ore."),
		E::Resource("diamond".to_owned()));
	assert!(matches!(blueprint_err!("Blueprint 1: Each ore robot costs lots of ore."), E::Amount(_)));
	assert!(matches!(blueprint_err!("Blueprint 1: Any ore robot costs 4 ore."),
		E::Format { expected: "Each ", .. }));

	assert!(matches!(parsing::blueprints_from_str(&INPUT.replace("Blueprint 2:", "Blueprint 2;")),
		Err(BlueprintsError::Blueprint { ordinal: 2, .. })));
	assert!(matches!(parsing::blueprints_from_str("Blueberry 1"), Err(BlueprintsError::Preamble(_))));
	assert_eq!(part1("\n"), Err(BlueprintsError::Empty));
}
