//! Parallel weighted draw of winners without replacement.
//!
//! The population is cut into one contiguous partition per worker, each
//! partition into subgroups of bounded size, and every subgroup is drawn from
//! its own [`WeightedIndex`]. Quotas are split with truncating division, so a
//! pass can come up short; the shortfall is drawn in further passes according
//! to the configured [`DeficitStrategy`].

use crate::{Error, Participant, Result, WeightedIndex};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use roaring::RoaringTreemap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace, warn};

/// Largest number of entries a subgroup aims for.
pub const DEFAULT_SUBGROUP_CAP: usize = 5000;
/// Consecutive rejected draws tolerated before an index is declared corrupt.
pub const DEFAULT_RETRY_BUDGET: u32 = 64;

/// Where the winners that make up a shortfall are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeficitStrategy {
    /// Redraw from the winners of the previous pass. A participant can then
    /// appear more than once in the final result.
    FromWinners,
    /// Redraw from the participants that have not been selected yet. Every
    /// participant appears at most once, provided IDs are unique.
    #[default]
    FromComplement,
}

/// Settings for a [`Picker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerConfig {
    /// Number of partitions drawn in parallel. `0` uses the host's
    /// available parallelism, which also caps any other value.
    pub workers: usize,
    /// Partitions are split into `len / subgroup_cap` subgroups (at least one).
    pub subgroup_cap: usize,
    /// Seeds the picker's generator. Unseeded pickers draw from entropy.
    pub seed: Option<u64>,
    pub deficit: DeficitStrategy,
    pub retry_budget: u32,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            subgroup_cap: DEFAULT_SUBGROUP_CAP,
            seed: None,
            deficit: DeficitStrategy::default(),
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

impl PickerConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_subgroup_cap(mut self, subgroup_cap: usize) -> Self {
        self.subgroup_cap = subgroup_cap;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_deficit(mut self, deficit: DeficitStrategy) -> Self {
        self.deficit = deficit;
        self
    }

    #[must_use]
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }
}

/// The outcome of one draw, with diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawReport {
    /// Selected participants, in partition order.
    pub winners: Vec<Participant>,
    /// The winner count that was asked for.
    pub requested: usize,
    /// Weight left undrawn in every subgroup, summed over all passes.
    /// Purely informational.
    pub leftover_weight: u64,
    /// Number of passes run, the primary pass included.
    pub passes: u32,
}

impl DrawReport {
    fn empty(requested: usize) -> Self {
        Self { winners: Vec::new(), requested, leftover_weight: 0, passes: 0 }
    }

    /// True if fewer winners were found than requested.
    ///
    /// Under [`DeficitStrategy::FromComplement`] this only happens once the
    /// eligible weight runs out. Under [`DeficitStrategy::FromWinners`] it also
    /// happens when truncating the quota across partitions and subgroups
    /// leaves a pass with nothing to draw, even though weight remains.
    pub fn is_degraded(&self) -> bool {
        self.winners.len() < self.requested
    }
}

/// How one pass slices its population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    partitions: usize,
    subgroup_cap: usize,
}

impl Layout {
    /// One partition, one subgroup: every requested winner is drawn from a
    /// single index, so the pass cannot lose quota to rounding.
    const SINGLE: Layout = Layout { partitions: 1, subgroup_cap: usize::MAX };
}

/// Draws weighted winners from a population on a dedicated worker pool.
///
/// ```
/// use segment_winner::{Participant, Picker, PickerConfig};
///
/// let population: Vec<Participant> =
///     (1..=1000).map(|id| Participant::new(id, id % 7 + 1)).collect();
/// let picker = Picker::with_config(PickerConfig::default().with_seed(3)).unwrap();
/// let winners = picker.draw(&population, 100).unwrap();
/// assert_eq!(winners.len(), 100);
/// ```
#[derive(Debug)]
pub struct Picker {
    pool: rayon::ThreadPool,
    workers: usize,
    config: PickerConfig,
    /// Hands out one seed per partition and pass. Only touched between
    /// parallel sections.
    master: Mutex<StdRng>,
}

impl Picker {
    /// Creates a picker with `workers` parallel partitions (`0` for one per
    /// available core) and default settings otherwise.
    pub fn new(workers: usize) -> Result<Self> {
        Self::with_config(PickerConfig::default().with_workers(workers))
    }

    pub fn with_config(config: PickerConfig) -> Result<Self> {
        let host = std::thread::available_parallelism().map_or(1, |n| n.get());
        let workers = match config.workers {
            0 => host,
            n => n.min(host),
        };
        Self::with_partitions(config, workers)
    }

    /// Like [`with_config`](Self::with_config) with an exact partition count,
    /// regardless of how many cores the host has.
    #[cfg(test)]
    fn uncapped(config: PickerConfig, workers: usize) -> Result<Self> {
        Self::with_partitions(config, workers.max(1))
    }

    fn with_partitions(mut config: PickerConfig, workers: usize) -> Result<Self> {
        config.subgroup_cap = config.subgroup_cap.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("picker-worker-{i}"))
            .build()?;
        let master = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!(workers, subgroup_cap = config.subgroup_cap, deficit = ?config.deficit, "picker ready");
        Ok(Self { pool, workers, config, master: Mutex::new(master) })
    }

    /// Effective number of partitions per pass.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    /// Draws up to `winner_count` participants, each with probability
    /// proportional to its weight, without replacement.
    ///
    /// Fewer winners are returned if the population's positive-weight
    /// entries run out; that is not an error.
    pub fn draw(&self, population: &[Participant], winner_count: usize) -> Result<Vec<Participant>> {
        self.draw_with_report(population, winner_count).map(|report| report.winners)
    }

    /// Like [`draw`](Self::draw), for callers holding a signed count.
    pub fn draw_signed(&self, population: &[Participant], winner_count: i64) -> Result<Vec<Participant>> {
        let count = usize::try_from(winner_count).map_err(|_| Error::NegativeWinnerCount(winner_count))?;
        self.draw(population, count)
    }

    pub fn draw_with_report(&self, population: &[Participant], winner_count: usize) -> Result<DrawReport> {
        let total = population
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(p.weight))
            .ok_or(Error::WeightOverflow)?;
        debug!(population = population.len(), total, winner_count, workers = self.workers, "starting draw");
        if winner_count == 0 || total == 0 {
            return Ok(DrawReport::empty(winner_count));
        }

        let leftover = AtomicU64::new(0);
        let mut winners = self.run_pass(population, winner_count, self.layout(), &leftover)?;
        let mut passes = 1;

        match self.config.deficit {
            DeficitStrategy::FromWinners => {
                let mut pool = winners.clone();
                while winners.len() < winner_count && !pool.is_empty() {
                    let deficit = winner_count - winners.len();
                    debug!(deficit, pool = pool.len(), "redrawing shortfall from winners");
                    pool = self.run_pass(&pool, deficit, self.layout(), &leftover)?;
                    passes += 1;
                    winners.extend_from_slice(&pool);
                }
            }
            DeficitStrategy::FromComplement => {
                let mut selected: RoaringTreemap = winners.iter().map(|p| p.id).collect();
                let mut layout = self.layout();
                while winners.len() < winner_count {
                    let rest: Vec<Participant> = population
                        .iter()
                        .filter(|p| p.weight > 0 && !selected.contains(p.id))
                        .copied()
                        .collect();
                    if rest.is_empty() {
                        break;
                    }
                    let deficit = winner_count - winners.len();
                    debug!(deficit, pool = rest.len(), "redrawing shortfall from unselected participants");
                    let extra = self.run_pass(&rest, deficit, layout, &leftover)?;
                    passes += 1;
                    if extra.is_empty() {
                        if layout == Layout::SINGLE {
                            break;
                        }
                        // Every quota truncated to zero. Draw the rest from one index.
                        layout = Layout::SINGLE;
                        continue;
                    }
                    selected.extend(extra.iter().map(|p| p.id));
                    winners.extend(extra);
                }
            }
        }

        let report = DrawReport {
            winners,
            requested: winner_count,
            leftover_weight: leftover.into_inner(),
            passes,
        };
        if report.is_degraded() {
            warn!(
                requested = winner_count,
                drawn = report.winners.len(),
                deficit = ?self.config.deficit,
                "winner count not reached: eligible weight exhausted, or quotas truncated to zero when redrawing from winners"
            );
        }
        debug!(drawn = report.winners.len(), passes, leftover = report.leftover_weight, "draw finished");
        Ok(report)
    }

    fn layout(&self) -> Layout {
        Layout { partitions: self.workers, subgroup_cap: self.config.subgroup_cap }
    }

    /// One fork-join pass: every partition draws `target / partitions`
    /// winners on its own generator, results are concatenated in partition
    /// order after all tasks finish.
    fn run_pass(
        &self,
        population: &[Participant],
        target: usize,
        layout: Layout,
        leftover: &AtomicU64,
    ) -> Result<Vec<Participant>> {
        let partitions = layout.partitions;
        let seeds: Vec<u64> = {
            let mut master = self.master.lock().unwrap_or_else(PoisonError::into_inner);
            (0..partitions).map(|_| master.gen()).collect()
        };
        let size = population.len() / partitions;
        let quota = target / partitions;
        let retry_budget = self.config.retry_budget;

        let results = self.pool.install(|| {
            seeds
                .into_par_iter()
                .enumerate()
                .map(|(i, seed)| {
                    let start = i * size;
                    // The last partition absorbs the remainder.
                    let end = if i == partitions - 1 { population.len() } else { start + size };
                    let mut rng = StdRng::seed_from_u64(seed);
                    draw_partition(&population[start..end], quota, layout.subgroup_cap, retry_budget, &mut rng, leftover)
                })
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(results.concat())
    }
}

fn draw_partition(
    partition: &[Participant],
    quota: usize,
    subgroup_cap: usize,
    retry_budget: u32,
    rng: &mut StdRng,
    leftover: &AtomicU64,
) -> Result<Vec<Participant>> {
    let subgroups = (partition.len() / subgroup_cap).max(1);
    let size = partition.len() / subgroups;
    let subgroup_quota = quota / subgroups;
    let mut winners = Vec::with_capacity(quota.min(partition.len()));
    for i in 0..subgroups {
        let start = i * size;
        let end = if i == subgroups - 1 { partition.len() } else { start + size };
        winners.extend(draw_subgroup(&partition[start..end], subgroup_quota, retry_budget, rng, leftover)?);
    }
    Ok(winners)
}

/// Draws up to `quota` winners from `group`, tombstoning each one, until the
/// quota is met or the group's weight is exhausted.
fn draw_subgroup(
    group: &[Participant],
    quota: usize,
    retry_budget: u32,
    rng: &mut StdRng,
    leftover: &AtomicU64,
) -> Result<Vec<Participant>> {
    let index = WeightedIndex::from_participants(group)?;
    draw_from_index(index, group, quota, retry_budget, rng, leftover)
}

/// The draw loop of [`draw_subgroup`], over an index built from `group`.
fn draw_from_index(
    mut index: WeightedIndex,
    group: &[Participant],
    quota: usize,
    retry_budget: u32,
    rng: &mut StdRng,
    leftover: &AtomicU64,
) -> Result<Vec<Participant>> {
    let mut remaining = index.sum(0, group.len());
    let mut winners = Vec::with_capacity(quota.min(group.len()));
    let mut rejected = 0u32;

    while winners.len() < quota && remaining > 0 {
        let target = rng.gen_range(1..=remaining);
        match index.find_by_prefix_sum(target) {
            Some(i) if !index.is_deleted(i) && group[i].weight > 0 => {
                winners.push(group[i]);
                remaining -= group[i].weight;
                index.mark_deleted(i);
                rejected = 0;
            }
            _ => {
                rejected += 1;
                if rejected > retry_budget {
                    warn!(draw_target = target, rejected, "weighted index keeps resolving to removed entries");
                    return Err(Error::InvariantViolation { target, retries: rejected });
                }
            }
        }
    }

    leftover.fetch_add(remaining, Ordering::Relaxed);
    trace!(size = group.len(), quota, drawn = winners.len(), remaining, "subgroup done");
    Ok(winners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::{HashMap, HashSet};
    use std::hash::{Hash, Hasher};

    fn generate_participants(n: u64, rng: &mut StdRng) -> Vec<Participant> {
        (1..=n).map(|id| Participant::new(id, rng.gen_range(10..=3000))).collect()
    }

    fn unit_weights(n: u64) -> Vec<Participant> {
        (1..=n).map(|id| Participant::new(id, 1)).collect()
    }

    fn seeded(workers: usize, seed: u64) -> PickerConfig {
        PickerConfig::default().with_workers(workers).with_seed(seed)
    }

    fn distinct(winners: &[Participant]) -> usize {
        winners.iter().map(|p| p.id).collect::<HashSet<_>>().len()
    }

    #[test]
    fn test_boundaries_return_empty() {
        let picker = Picker::with_config(seeded(0, 1)).unwrap();
        let population = unit_weights(100);
        assert!(picker.draw(&population, 0).unwrap().is_empty());
        assert!(picker.draw(&[], 10).unwrap().is_empty());
        let zeros: Vec<Participant> = (1..=50).map(|id| Participant::new(id, 0)).collect();
        assert!(picker.draw(&zeros, 10).unwrap().is_empty());
    }

    #[test]
    fn test_pick_winners_count_and_uniqueness() {
        let mut rng = StdRng::seed_from_u64(11);
        let population = generate_participants(60_000, &mut rng);
        let winner_count = population.len() * 9 / 10;
        let picker = Picker::with_config(seeded(0, 5)).unwrap();

        let winners = picker.draw(&population, winner_count).unwrap();
        assert_eq!(winners.len(), winner_count);
        assert_eq!(distinct(&winners), winner_count, "duplicate winner found");
    }

    // One worker, four subgroups: 4 x 4499 in the primary pass, then three
    // subgroups of winners cover the remaining three.
    #[test]
    fn test_from_winners_still_meets_count() {
        let mut rng = StdRng::seed_from_u64(12);
        let population = generate_participants(20_000, &mut rng);
        let picker =
            Picker::with_config(seeded(1, 6).with_deficit(DeficitStrategy::FromWinners)).unwrap();
        assert_eq!(picker.draw(&population, 17_999).unwrap().len(), 17_999);
    }

    #[test]
    fn test_primary_pass_is_unique() {
        let mut rng = StdRng::seed_from_u64(13);
        let population = generate_participants(30_000, &mut rng);
        let picker = Picker::with_config(seeded(0, 7).with_subgroup_cap(1000)).unwrap();
        let leftover = AtomicU64::new(0);
        let winners = picker.run_pass(&population, 20_000, picker.layout(), &leftover).unwrap();
        assert!(!winners.is_empty());
        assert_eq!(distinct(&winners), winners.len());
    }

    #[test]
    fn test_zero_weight_never_wins() {
        let population: Vec<Participant> =
            (1..=10_000).map(|id| Participant::new(id, if id % 3 == 0 { 0 } else { id })).collect();
        let picker = Picker::with_config(seeded(0, 8).with_subgroup_cap(500)).unwrap();
        let winners = picker.draw(&population, 5_000).unwrap();
        assert_eq!(winners.len(), 5_000);
        assert!(winners.iter().all(|p| p.weight > 0));
    }

    #[test]
    fn test_degraded_result_when_weight_runs_out() {
        let population: Vec<Participant> =
            (1..=100).map(|id| Participant::new(id, u64::from(id <= 40))).collect();
        let picker = Picker::with_config(seeded(0, 9)).unwrap();
        let report = picker.draw_with_report(&population, 60).unwrap();
        assert!(report.is_degraded());
        assert_eq!(report.winners.len(), 40);
        assert_eq!(distinct(&report.winners), 40);
        assert!(report.winners.iter().all(|p| p.id <= 40));
    }

    #[test]
    fn test_leftover_weight_is_reported() {
        let picker = Picker::with_config(seeded(1, 10)).unwrap();
        let report = picker.draw_with_report(&unit_weights(10), 4).unwrap();
        assert_eq!(report.winners.len(), 4);
        assert_eq!(report.passes, 1);
        assert_eq!(report.leftover_weight, 6);
    }

    // Four unit weights in two subgroups of two: asking for three gives each
    // subgroup a quota of one, so the primary pass always comes up one short.
    #[test]
    fn test_from_winners_redraws_a_previous_winner() {
        let config = seeded(1, 21).with_subgroup_cap(2).with_deficit(DeficitStrategy::FromWinners);
        let picker = Picker::with_config(config).unwrap();
        let report = picker.draw_with_report(&unit_weights(4), 3).unwrap();
        assert_eq!(report.winners.len(), 3);
        assert_eq!(report.passes, 2);
        assert_eq!(distinct(&report.winners), 2);
    }

    #[test]
    fn test_from_complement_draws_fresh_participants() {
        let config = seeded(1, 21).with_subgroup_cap(2).with_deficit(DeficitStrategy::FromComplement);
        let picker = Picker::with_config(config).unwrap();
        let report = picker.draw_with_report(&unit_weights(4), 3).unwrap();
        assert_eq!(report.winners.len(), 3);
        assert_eq!(report.passes, 2);
        assert_eq!(distinct(&report.winners), 3);
    }

    // A single winner split over two subgroups truncates every quota to zero.
    #[test]
    fn test_zero_quota_passes() {
        let population = unit_weights(4);

        let config = seeded(1, 22).with_subgroup_cap(2).with_deficit(DeficitStrategy::FromWinners);
        let from_winners = Picker::with_config(config).unwrap();
        let report = from_winners.draw_with_report(&population, 1).unwrap();
        assert!(report.winners.is_empty());
        assert!(report.is_degraded());

        let config = seeded(1, 22).with_subgroup_cap(2);
        let from_complement = Picker::with_config(config).unwrap();
        let report = from_complement.draw_with_report(&population, 1).unwrap();
        assert_eq!(report.winners.len(), 1);
        assert_eq!(report.passes, 3);
    }

    #[test]
    fn test_seeded_pickers_repeat_their_draws() {
        let mut rng = StdRng::seed_from_u64(14);
        let population = generate_participants(25_000, &mut rng);
        let a = Picker::with_config(seeded(2, 99).with_subgroup_cap(3000)).unwrap();
        let b = Picker::with_config(seeded(2, 99).with_subgroup_cap(3000)).unwrap();
        for _ in 0..3 {
            assert_eq!(a.draw(&population, 2_500).unwrap(), b.draw(&population, 2_500).unwrap());
        }
    }

    #[test]
    fn test_heavy_participant_share() {
        let mut population = vec![Participant::new(1, 100)];
        population.extend((2..=10).map(|id| Participant::new(id, 1)));
        let picker = Picker::with_config(seeded(1, 42)).unwrap();

        const TRIALS: u32 = 10_000;
        let mut heavy = 0;
        for _ in 0..TRIALS {
            let winners = picker.draw(&population, 1).unwrap();
            assert_eq!(winners.len(), 1);
            if winners[0].id == 1 {
                heavy += 1;
            }
        }
        let share = f64::from(heavy) / f64::from(TRIALS);
        assert!((share - 100.0 / 109.0).abs() < 0.02, "heavy share {share:.4}");
    }

    #[test]
    fn test_distribution_of_prizes() {
        const SIMULATIONS: usize = 2000;
        let mut rng = StdRng::seed_from_u64(15);
        let population = generate_participants(60_000, &mut rng);
        let winner_count = population.len() / 10;
        let picker = Picker::new(0).unwrap();

        let mut win_counts: HashMap<u64, u32> = HashMap::new();
        let mut draws: HashSet<u64> = HashSet::with_capacity(SIMULATIONS);
        for _ in 0..SIMULATIONS {
            let winners = picker.draw(&population, winner_count).unwrap();
            let ids: Vec<u64> = winners.iter().map(|p| p.id).collect();
            for &id in &ids {
                *win_counts.entry(id).or_default() += 1;
            }
            let mut hasher = DefaultHasher::new();
            ids.hash(&mut hasher);
            draws.insert(hasher.finish());
        }
        assert_eq!(draws.len(), SIMULATIONS, "two simulations produced identical winners");

        let (mut high, mut low) = (0u64, 0u64);
        for p in &population {
            let wins = u64::from(win_counts.get(&p.id).copied().unwrap_or(0));
            if p.weight >= 1500 {
                high += wins;
            } else {
                low += wins;
            }
        }
        println!("Total wins with high weights: {high}, with low weights: {low}");
        assert!(high > low, "higher weights should win more often: {high} <= {low}");
    }

    #[test]
    fn test_rejects_bad_input() {
        let picker = Picker::with_config(seeded(1, 0)).unwrap();
        assert!(matches!(
            picker.draw_signed(&unit_weights(3), -1),
            Err(Error::NegativeWinnerCount(-1))
        ));
        let huge = [Participant::new(1, u64::MAX), Participant::new(2, 1)];
        assert!(matches!(picker.draw(&huge, 1), Err(Error::WeightOverflow)));
    }

    #[test]
    fn test_workers_are_capped_by_host() {
        let host = std::thread::available_parallelism().map_or(1, |n| n.get());
        assert_eq!(Picker::new(0).unwrap().workers(), host);
        assert_eq!(Picker::new(usize::MAX).unwrap().workers(), host);
        assert_eq!(Picker::new(1).unwrap().workers(), 1);
    }

    // Ten entries over four partitions: 2 + 2 + 2 + 4, the last one taking
    // the remainder.
    #[test]
    fn test_partitions_merge_in_order() {
        let picker = Picker::uncapped(seeded(4, 30), 4).unwrap();
        let leftover = AtomicU64::new(0);
        let winners = picker.run_pass(&unit_weights(10), 8, picker.layout(), &leftover).unwrap();
        assert_eq!(winners.len(), 8);
        assert_eq!(distinct(&winners), 8);
        let expected: [&[u64]; 4] = [&[1, 2], &[3, 4], &[5, 6], &[7, 8, 9, 10]];
        for (chunk, ids) in winners.chunks(2).zip(expected) {
            assert!(chunk.iter().all(|p| ids.contains(&p.id)), "{chunk:?} not from partition {ids:?}");
        }
        assert_eq!(leftover.into_inner(), 2);
    }

    #[test]
    fn test_last_partition_absorbs_remainder() {
        let population: Vec<Participant> =
            (1..=10).map(|id| Participant::new(id, u64::from(id > 8))).collect();
        let picker = Picker::uncapped(seeded(4, 31), 4).unwrap();
        let leftover = AtomicU64::new(0);
        let mut ids: Vec<u64> = picker
            .run_pass(&population, 8, picker.layout(), &leftover)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, [9, 10]);
    }

    #[test]
    fn test_four_partitions_count_and_uniqueness() {
        let mut rng = StdRng::seed_from_u64(32);
        let population = generate_participants(1003, &mut rng);
        let picker = Picker::uncapped(seeded(4, 33), 4).unwrap();
        assert_eq!(picker.workers(), 4);

        let report = picker.draw_with_report(&population, 900).unwrap();
        assert_eq!((report.winners.len(), report.passes), (900, 1));
        assert_eq!(distinct(&report.winners), 900);

        // 4 x 2 in the primary pass, then the remaining two from one index.
        let report = picker.draw_with_report(&population, 10).unwrap();
        assert_eq!((report.winners.len(), report.passes), (10, 3));
        assert_eq!(distinct(&report.winners), 10);

        // 4 x 250 in the primary pass leaves three of the last partition's 253.
        let report = picker.draw_with_report(&population, 1003).unwrap();
        assert_eq!((report.winners.len(), report.passes), (1003, 3));
        assert_eq!(distinct(&report.winners), 1003);
    }

    #[test]
    fn test_seeded_four_partition_pickers_repeat_their_draws() {
        let mut rng = StdRng::seed_from_u64(34);
        let population = generate_participants(25_003, &mut rng);
        let a = Picker::uncapped(seeded(4, 99).with_subgroup_cap(3000), 4).unwrap();
        let b = Picker::uncapped(seeded(4, 99).with_subgroup_cap(3000), 4).unwrap();
        for _ in 0..3 {
            let winners = a.draw(&population, 2_501).unwrap();
            assert_eq!(winners.len(), 2_501);
            assert_eq!(winners, b.draw(&population, 2_501).unwrap());
        }
    }

    #[test]
    fn test_from_winners_truncates_small_requests_to_nothing() {
        let population = unit_weights(1000);
        let config = seeded(4, 35).with_deficit(DeficitStrategy::FromWinners);
        let picker = Picker::uncapped(config, 4).unwrap();
        let report = picker.draw_with_report(&population, 3).unwrap();
        assert!(report.winners.is_empty());
        assert!(report.is_degraded());
        assert_eq!(report.passes, 1);
        assert_eq!(report.leftover_weight, 1000);
    }

    #[test]
    fn test_heavy_participant_share_with_four_partitions() {
        let mut population = vec![Participant::new(1, 100)];
        population.extend((2..=10).map(|id| Participant::new(id, 1)));
        let picker = Picker::uncapped(seeded(4, 36), 4).unwrap();

        const TRIALS: u32 = 5_000;
        let mut heavy = 0;
        for _ in 0..TRIALS {
            let winners = picker.draw(&population, 1).unwrap();
            assert_eq!(winners.len(), 1);
            if winners[0].id == 1 {
                heavy += 1;
            }
        }
        let share = f64::from(heavy) / f64::from(TRIALS);
        assert!((share - 100.0 / 109.0).abs() < 0.02, "heavy share {share:.4}");
    }

    #[test]
    fn test_corrupt_index_surfaces_invariant_violation() {
        let group = [Participant::new(1, 5), Participant::new(2, 0)];
        let mut index = WeightedIndex::from_participants(&group).unwrap();
        index.corrupt_tombstone(0);
        let mut rng = StdRng::seed_from_u64(37);
        let leftover = AtomicU64::new(0);
        match draw_from_index(index, &group, 1, 8, &mut rng, &leftover) {
            Err(Error::InvariantViolation { target, retries }) => {
                assert_eq!(retries, 9);
                assert!((1..=5).contains(&target));
            }
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
    }
}
