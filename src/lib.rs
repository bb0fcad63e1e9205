//! `segment_winner` draws K winners from N weighted participants without
//! replacement, each with probability proportional to its integer weight.
//!
//! It is built for populations of tens of millions: the population is split
//! across parallel workers, each worker draws from small [`WeightedIndex`]
//! segment trees in O(log n) per winner, and any shortfall caused by dividing
//! the quota is topped up afterwards.
//!
//! Total weight must fit in a `u64`; larger populations are rejected with
//! [`Error::WeightOverflow`].

mod error;
mod picker;
mod weighted_index;

pub use error::{Error, Result};
pub use picker::{
    DeficitStrategy, DrawReport, Picker, PickerConfig, DEFAULT_RETRY_BUDGET, DEFAULT_SUBGROUP_CAP,
};
pub use weighted_index::WeightedIndex;

/// Someone taking part in a draw.
///
/// IDs are assigned by the caller and expected to be unique within a
/// population. A weight of zero can never be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Participant {
    pub id: u64,
    pub weight: u64,
}

impl Participant {
    #[must_use]
    pub const fn new(id: u64, weight: u64) -> Self {
        Self { id, weight }
    }

    /// Builds a participant from a signed weight, rejecting negative values.
    pub fn try_new(id: u64, weight: i64) -> Result<Self> {
        let weight = u64::try_from(weight).map_err(|_| Error::NegativeWeight { id, weight })?;
        Ok(Self { id, weight })
    }
}

#[cfg(feature = "python-bindings")]
mod python {
    use super::*; // Import parent module's items
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    fn to_py_err(err: Error) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    #[pyclass(name = "Picker")]
    struct PyPicker {
        picker: Picker,
    }

    #[pymethods]
    impl PyPicker {
        #[new]
        #[pyo3(signature = (workers=0, seed=None))]
        fn new(workers: usize, seed: Option<u64>) -> PyResult<Self> {
            let mut config = PickerConfig::default().with_workers(workers);
            config.seed = seed;
            Picker::with_config(config).map(|picker| PyPicker { picker }).map_err(to_py_err)
        }

        /// Takes `(id, weight)` pairs and returns the winning pairs.
        fn draw(&self, participants: Vec<(u64, i64)>, winners: i64) -> PyResult<Vec<(u64, u64)>> {
            let population = participants
                .into_iter()
                .map(|(id, weight)| Participant::try_new(id, weight))
                .collect::<Result<Vec<_>>>()
                .map_err(to_py_err)?;
            let drawn = self.picker.draw_signed(&population, winners).map_err(to_py_err)?;
            Ok(drawn.into_iter().map(|p| (p.id, p.weight)).collect())
        }

        fn workers(&self) -> usize {
            self.picker.workers()
        }
    }

    #[pymodule]
    fn segment_winner(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_class::<PyPicker>()?;
        Ok(())
    }
}
