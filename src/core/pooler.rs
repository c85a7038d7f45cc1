//! Spatial pooler.
//!
//! Maps a binary input vector to a sparse set of active columns and learns
//! a stable mapping by adjusting synaptic permanences under competitive
//! inhibition. The learned mapping can be partially inverted: given a set
//! of active columns, `reconstruct` returns the summed permanence each
//! input index receives from them.

use std::fmt;

use hashbrown::HashMap;

use crate::prng::Prng;
use crate::sdr::Sdr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const MIN_PERMANENCE: f32 = 0.0;
pub const MAX_PERMANENCE: f32 = 1.0;

#[derive(Debug)]
pub enum PoolerError {
    /// A configuration field failed validation at construction.
    InvalidConfig {
        name: &'static str,
        message: String,
    },
    /// An input vector of the wrong size was presented.
    InputSize { expected: usize, actual: usize },
    /// A column index outside the column space was passed to `reconstruct`.
    ColumnIndex { index: usize, columns: usize },
}

impl fmt::Display for PoolerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolerError::InvalidConfig { name, message } => {
                write!(f, "invalid pooler config `{name}`: {message}")
            }
            PoolerError::InputSize { expected, actual } => {
                write!(f, "input vector has {actual} bits, pooler expects {expected}")
            }
            PoolerError::ColumnIndex { index, columns } => {
                write!(f, "column index {index} out of range (columns: {columns})")
            }
        }
    }
}

impl std::error::Error for PoolerError {}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolerConfig {
    /// Number of input bits.
    pub input_count: usize,
    /// Number of mini-columns competing over the input.
    pub column_count: usize,

    /// Receptive-field radius around each column's mapped input centre.
    pub potential_radius: usize,
    /// Fraction of the receptive field a column actually synapses onto (0, 1].
    pub potential_pct: f32,

    /// Columns left active per presentation under global inhibition.
    pub active_columns_per_round: usize,
    /// Minimum connected overlap for a column to be eligible at all.
    pub stimulus_threshold: u32,

    /// Permanence at or above which a synapse conducts.
    pub perm_connected: f32,
    /// Permanence increment for synapses on active inputs.
    pub perm_active_inc: f32,
    /// Permanence decrement for synapses on inactive inputs.
    pub perm_inactive_dec: f32,

    /// Window, in presentations, for duty-cycle averaging.
    pub duty_cycle_period: u32,
    /// Columns whose overlap duty cycle falls below this fraction of the
    /// best column's get their permanences bumped.
    pub min_pct_overlap_duty_cycles: f32,
    /// Upper bound on the activity boost applied to starved columns.
    /// 1.0 disables boosting.
    pub max_boost: f32,

    /// If set, makes initialization and learning reproducible.
    pub seed: Option<u64>,
}

impl Default for PoolerConfig {
    fn default() -> Self {
        Self {
            input_count: 784,
            column_count: 4096,
            potential_radius: 117,
            potential_pct: 0.5,
            active_columns_per_round: 246,
            stimulus_threshold: 10,
            perm_connected: 0.5,
            perm_active_inc: 0.05,
            perm_inactive_dec: 0.008,
            duty_cycle_period: 100,
            min_pct_overlap_duty_cycles: 1.0,
            max_boost: 5.0,
            seed: Some(42),
        }
    }
}

/// One mini-column: its potential pool and per-synapse permanences.
///
/// `pool` is sorted ascending; `permanences[i]` belongs to `pool[i]`.
#[derive(Debug, Clone)]
struct Column {
    pool: Vec<usize>,
    permanences: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct SpatialPooler {
    cfg: PoolerConfig,
    columns: Vec<Column>,

    boost_factors: Vec<f32>,
    overlap_duty_cycles: Vec<f32>,
    active_duty_cycles: Vec<f32>,
    min_overlap_duty_cycle: f32,

    iteration: u64,
}

impl SpatialPooler {
    pub fn new(cfg: PoolerConfig) -> Result<Self, PoolerError> {
        if cfg.input_count == 0 {
            return Err(PoolerError::InvalidConfig {
                name: "input_count",
                message: "must be non-zero".to_string(),
            });
        }
        if cfg.column_count == 0 {
            return Err(PoolerError::InvalidConfig {
                name: "column_count",
                message: "must be non-zero".to_string(),
            });
        }
        if cfg.potential_pct <= 0.0 || cfg.potential_pct > 1.0 {
            return Err(PoolerError::InvalidConfig {
                name: "potential_pct",
                message: format!("must be in (0, 1], got {}", cfg.potential_pct),
            });
        }
        if cfg.active_columns_per_round == 0 || cfg.active_columns_per_round > cfg.column_count {
            return Err(PoolerError::InvalidConfig {
                name: "active_columns_per_round",
                message: format!(
                    "must be in [1, {}], got {}",
                    cfg.column_count, cfg.active_columns_per_round
                ),
            });
        }
        if cfg.max_boost < 1.0 {
            return Err(PoolerError::InvalidConfig {
                name: "max_boost",
                message: format!("must be >= 1.0, got {}", cfg.max_boost),
            });
        }

        let mut rng = Prng::new(cfg.seed.unwrap_or(1));

        let mut columns = Vec::with_capacity(cfg.column_count);
        for col in 0..cfg.column_count {
            columns.push(Self::init_column(&cfg, col, &mut rng));
        }

        Ok(Self {
            columns,
            boost_factors: vec![1.0; cfg.column_count],
            overlap_duty_cycles: vec![0.0; cfg.column_count],
            active_duty_cycles: vec![0.0; cfg.column_count],
            min_overlap_duty_cycle: 0.0,
            iteration: 0,
            cfg,
        })
    }

    /// Build one column: a window of input indices around the column's
    /// mapped input centre, subsampled by `potential_pct`, each synapse
    /// given a random initial permanence straddling `perm_connected`.
    fn init_column(cfg: &PoolerConfig, col: usize, rng: &mut Prng) -> Column {
        let centre = col * cfg.input_count / cfg.column_count;
        let lo = centre.saturating_sub(cfg.potential_radius);
        let hi = (centre + cfg.potential_radius).min(cfg.input_count - 1);
        let window: Vec<usize> = (lo..=hi).collect();

        let want = (((window.len() as f32) * cfg.potential_pct).round() as usize).max(1);
        let picks = rng.sample_indices(window.len(), want);

        let pool: Vec<usize> = picks.into_iter().map(|i| window[i]).collect();
        let permanences = pool
            .iter()
            .map(|_| {
                if rng.next_f32_01() < 0.5 {
                    // Connected at birth.
                    (cfg.perm_connected + rng.next_f32_01() * cfg.perm_active_inc / 4.0)
                        .min(MAX_PERMANENCE)
                } else {
                    (cfg.perm_connected * rng.next_f32_01()).max(MIN_PERMANENCE)
                }
            })
            .collect();

        Column { pool, permanences }
    }

    /// Present one input vector, returning a fresh set of active column
    /// indices (sorted ascending).
    ///
    /// With `learn = false` the call leaves all pooler state untouched, so
    /// post-training evaluation cannot disturb the learned mapping.
    pub fn compute(&mut self, input: &Sdr, learn: bool) -> Result<Vec<usize>, PoolerError> {
        if input.size() != self.cfg.input_count {
            return Err(PoolerError::InputSize {
                expected: self.cfg.input_count,
                actual: input.size(),
            });
        }

        let mut active_mask = vec![false; self.cfg.input_count];
        for &i in input.active() {
            active_mask[i] = true;
        }

        let overlaps = self.calculate_overlaps(&active_mask);
        let active = self.inhibit_columns(&overlaps);

        if learn {
            self.iteration += 1;
            self.adapt_synapses(&active_mask, &active);
            self.update_duty_cycles(&overlaps, &active);
            self.bump_weak_columns();
            self.update_boost_factors();
        }

        Ok(active)
    }

    /// Connected-synapse overlap per column.
    fn calculate_overlaps(&self, active_mask: &[bool]) -> Vec<u32> {
        self.columns
            .iter()
            .map(|col| {
                col.pool
                    .iter()
                    .zip(&col.permanences)
                    .filter(|&(&input, &perm)| perm >= self.cfg.perm_connected && active_mask[input])
                    .count() as u32
            })
            .collect()
    }

    /// Global inhibition: boost the raw overlaps, then keep the top-k
    /// columns above the stimulus threshold. Ties break toward the lower
    /// column index so runs are reproducible.
    fn inhibit_columns(&self, overlaps: &[u32]) -> Vec<usize> {
        let mut candidates: Vec<(usize, f32)> = overlaps
            .iter()
            .enumerate()
            .filter(|&(_, &o)| o >= self.cfg.stimulus_threshold)
            .map(|(col, &o)| (col, o as f32 * self.boost_factors[col]))
            .collect();

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        candidates.truncate(self.cfg.active_columns_per_round);

        let mut active: Vec<usize> = candidates.into_iter().map(|(col, _)| col).collect();
        active.sort_unstable();
        active
    }

    /// Hebbian update for the winning columns: synapses on active inputs
    /// are strengthened, the rest decay.
    fn adapt_synapses(&mut self, active_mask: &[bool], active: &[usize]) {
        for &col in active {
            let column = &mut self.columns[col];
            for (i, &input) in column.pool.iter().enumerate() {
                let perm = column.permanences[i];
                column.permanences[i] = if active_mask[input] {
                    (perm + self.cfg.perm_active_inc).min(MAX_PERMANENCE)
                } else {
                    (perm - self.cfg.perm_inactive_dec).max(MIN_PERMANENCE)
                };
            }
        }
    }

    fn update_duty_cycles(&mut self, overlaps: &[u32], active: &[usize]) {
        let period = self.cfg.duty_cycle_period.max(1) as f32;

        for (col, &overlap) in overlaps.iter().enumerate() {
            let value = if overlap > 0 { 1.0 } else { 0.0 };
            self.overlap_duty_cycles[col] =
                ((period - 1.0) * self.overlap_duty_cycles[col] + value) / period;
        }

        let mut is_active = vec![false; self.cfg.column_count];
        for &col in active {
            is_active[col] = true;
        }
        for col in 0..self.cfg.column_count {
            let value = if is_active[col] { 1.0 } else { 0.0 };
            self.active_duty_cycles[col] =
                ((period - 1.0) * self.active_duty_cycles[col] + value) / period;
        }

        let max_overlap_duty = self
            .overlap_duty_cycles
            .iter()
            .copied()
            .fold(0.0f32, f32::max);
        self.min_overlap_duty_cycle = self.cfg.min_pct_overlap_duty_cycles * max_overlap_duty;
    }

    /// Columns that rarely overlap the input get all their permanences
    /// nudged up so they can re-enter the competition.
    fn bump_weak_columns(&mut self) {
        let bump = self.cfg.perm_connected / 10.0;
        for col in 0..self.cfg.column_count {
            if self.overlap_duty_cycles[col] < self.min_overlap_duty_cycle {
                for perm in &mut self.columns[col].permanences {
                    *perm = (*perm + bump).min(MAX_PERMANENCE);
                }
            }
        }
    }

    fn update_boost_factors(&mut self) {
        if self.cfg.max_boost <= 1.0 {
            return;
        }
        let target = self.cfg.active_columns_per_round as f32 / self.cfg.column_count as f32;
        for col in 0..self.cfg.column_count {
            let duty = self.active_duty_cycles[col];
            self.boost_factors[col] = if duty >= target {
                1.0
            } else {
                1.0 + (self.cfg.max_boost - 1.0) * (1.0 - duty / target)
            };
        }
    }

    /// Partial inversion of the learned mapping: for the given active
    /// columns, sum the permanence each input index receives from them.
    ///
    /// The result is sparse; input indices no active column synapses onto
    /// are absent (the consumer densifies them to 0.0).
    pub fn reconstruct(&self, active: &[usize]) -> Result<HashMap<usize, f32>, PoolerError> {
        let mut map: HashMap<usize, f32> = HashMap::new();
        for &col in active {
            let column = self
                .columns
                .get(col)
                .ok_or(PoolerError::ColumnIndex {
                    index: col,
                    columns: self.cfg.column_count,
                })?;
            for (&input, &perm) in column.pool.iter().zip(&column.permanences) {
                *map.entry(input).or_insert(0.0) += perm;
            }
        }
        Ok(map)
    }

    pub fn config(&self) -> &PoolerConfig {
        &self.cfg
    }

    pub fn input_count(&self) -> usize {
        self.cfg.input_count
    }

    pub fn column_count(&self) -> usize {
        self.cfg.column_count
    }

    /// Learning iterations seen so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Pool and permanences of one column, for inspection.
    pub fn column_synapses(&self, column: usize) -> Option<(&[usize], &[f32])> {
        self.columns
            .get(column)
            .map(|c| (c.pool.as_slice(), c.permanences.as_slice()))
    }
}
