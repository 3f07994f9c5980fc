// Copyright (c) 2022 Bastiaan Marinus van de Weerd

//! Depth-first branch-and-bound over a puzzle's decision tree.

use std::{cell::Cell, sync::atomic::{AtomicUsize, Ordering}};


/// A maximization problem explored one decision at a time.
pub trait Problem {
	type State;

	/// Reward already secured by `state`; never decreases from a state to its branches.
	fn reward(&self, state: &Self::State) -> usize;

	/// Upper bound on the reward that can still be added to `state`.
	/// Must never underestimate, or pruning would discard the optimum.
	fn ceiling(&self, state: &Self::State) -> usize;

	/// States reachable by committing to one more decision, most promising first.
	fn branches(&self, state: &Self::State) -> Vec<Self::State>;
}


/// “Replace if greater” register holding the best reward seen so far.
pub trait Best {
	fn get(&self) -> usize;

	/// Returns whether `reward` replaced the previous best.
	fn offer(&self, reward: usize) -> bool;
}

impl Best for Cell<usize> {
	fn get(&self) -> usize { Cell::get(self) }

	fn offer(&self, reward: usize) -> bool {
		let improved = reward > Cell::get(self);
		if improved { self.set(reward) }
		improved
	}
}

impl Best for AtomicUsize {
	fn get(&self) -> usize { self.load(Ordering::Relaxed) }

	fn offer(&self, reward: usize) -> bool {
		self.fetch_max(reward, Ordering::Relaxed) < reward
	}
}


#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
	/// Best reward found.
	pub reward: usize,
	/// Number of states whose bound was evaluated.
	pub visited: usize,
	/// Number of states discarded because their bound could not beat the best.
	pub pruned: usize,
}

struct Driver<'s, P: ?Sized, B> {
	problem: &'s P,
	best: &'s B,
	visited: usize,
	pruned: usize,
}

impl<'s, P: Problem + ?Sized, B: Best> Driver<'s, P, B> {
	fn new(problem: &'s P, best: &'s B) -> Self {
		Driver { problem, best, visited: 0, pruned: 0 }
	}

	/// Returns whether `state` is worth branching from.
	fn bound(&mut self, state: &P::State) -> bool {
		self.visited += 1;
		let reward = self.problem.reward(state);
		if self.best.offer(reward) {
			log::trace!("new best reward: {reward}");
		}
		match self.problem.ceiling(state) {
			0 => false,
			ceiling if reward + ceiling <= self.best.get() => {
				self.pruned += 1;
				false
			}
			_ => true,
		}
	}

	fn explore(&mut self, state: &P::State) {
		if !self.bound(state) { return }
		for branch in self.problem.branches(state) {
			self.explore(&branch);
		}
	}
}


/// Explores every branch of `root` that could beat the best reward found so far,
/// on the current thread.
pub fn branch_and_bound<P: Problem + ?Sized>(problem: &P, root: P::State) -> Outcome {
	let best = Cell::new(0);
	let mut driver = Driver::new(problem, &best);
	driver.explore(&root);

	let outcome = Outcome { reward: best.get(), visited: driver.visited, pruned: driver.pruned };
	log::debug!("branch-and-bound: best {} after {} states ({} pruned)",
		outcome.reward, outcome.visited, outcome.pruned);
	outcome
}

/// Like [`branch_and_bound`], but with the first-level branches spread across the
/// rayon thread pool, all sharing one best-reward register.
pub fn par_branch_and_bound<P>(problem: &P, root: P::State) -> Outcome
where P: Problem + Sync + ?Sized, P::State: Send {
	use rayon::iter::{IntoParallelIterator as _, ParallelIterator as _};

	let best = AtomicUsize::new(0);
	let mut driver = Driver::new(problem, &best);
	let (visited, pruned) = if driver.bound(&root) {
		problem.branches(&root)
			.into_par_iter()
			.map(|branch| {
				let mut driver = Driver::new(problem, &best);
				driver.explore(&branch);
				(driver.visited, driver.pruned)
			})
			.reduce(|| (0, 0), |(v0, p0), (v1, p1)| (v0 + v1, p0 + p1))
	} else {
		(0, 0)
	};

	let outcome = Outcome {
		reward: best.get(),
		visited: driver.visited + visited,
		pruned: driver.pruned + pruned,
	};
	log::debug!("parallel branch-and-bound: best {} after {} states ({} pruned)",
		outcome.reward, outcome.visited, outcome.pruned);
	outcome
}


/// Best reward in the subtree of `state`, without any pruning.
#[cfg(test)]
pub(crate) fn exhaustive<P: Problem + ?Sized>(problem: &P, state: &P::State) -> usize {
	problem.branches(state).iter()
		.map(|branch| exhaustive(problem, branch))
		.fold(problem.reward(state), usize::max)
}

/// Calls `f` with every reachable state and (except for `root`) its parent.
#[cfg(test)]
pub(crate) fn walk<P: Problem + ?Sized>(
	problem: &P,
	root: &P::State,
	f: &mut impl FnMut(Option<&P::State>, &P::State),
) {
	fn inner<P: Problem + ?Sized>(
		problem: &P,
		state: &P::State,
		f: &mut impl FnMut(Option<&P::State>, &P::State),
	) {
		for branch in problem.branches(state) {
			f(Some(state), &branch);
			inner(problem, &branch, f);
		}
	}

	f(None, root);
	inner(problem, root, f);
}


#[cfg(test)]
mod tests {
	use super::*;

	/// 0/1 knapsack: items may only be taken in increasing index order.
	struct Knapsack(Vec<(usize, usize)>);

	#[derive(Clone, Debug)]
	struct Pack { capacity: usize, next: usize, value: usize }

	impl Problem for Knapsack {
		type State = Pack;

		fn reward(&self, pack: &Pack) -> usize { pack.value }

		fn ceiling(&self, pack: &Pack) -> usize {
			self.0[pack.next..].iter()
				.filter(|(weight, _)| *weight <= pack.capacity)
				.map(|(_, value)| value)
				.sum()
		}

		fn branches(&self, pack: &Pack) -> Vec<Pack> {
			self.0.iter()
				.enumerate()
				.skip(pack.next)
				.filter(|(_, (weight, _))| *weight <= pack.capacity)
				.map(|(i, (weight, value))| Pack {
					capacity: pack.capacity - weight,
					next: i + 1,
					value: pack.value + value,
				})
				.collect()
		}
	}

	fn knapsack() -> (Knapsack, Pack) {
		let items = vec![(12, 4), (2, 2), (1, 1), (1, 2), (4, 10), (3, 7), (5, 3), (7, 8)];
		(Knapsack(items), Pack { capacity: 15, next: 0, value: 0 })
	}

	#[test]
	fn matches_exhaustive() {
		let (problem, root) = knapsack();
		let expected = exhaustive(&problem, &root);
		assert_eq!(expected, 27);
		let outcome = branch_and_bound(&problem, root);
		assert_eq!(outcome.reward, expected);
		assert!(outcome.pruned > 0);
	}

	#[test]
	fn parallel() {
		let (problem, root) = knapsack();
		assert_eq!(par_branch_and_bound(&problem, root.clone()).reward,
			branch_and_bound(&problem, root).reward);
	}

	#[test]
	fn best_registers() {
		let cell = Cell::new(3);
		assert!(!Best::offer(&cell, 2));
		assert!(!Best::offer(&cell, 3));
		assert!(Best::offer(&cell, 5));
		assert_eq!(Best::get(&cell), 5);

		let atomic = AtomicUsize::new(3);
		assert!(!atomic.offer(3));
		assert!(atomic.offer(7));
		assert_eq!(Best::get(&atomic), 7);
	}

	#[test]
	fn empty_tree() {
		let (problem, _) = knapsack();
		let outcome = branch_and_bound(&problem, Pack { capacity: 0, next: 0, value: 6 });
		assert_eq!(outcome, Outcome { reward: 6, visited: 1, pruned: 0 });
	}
}
