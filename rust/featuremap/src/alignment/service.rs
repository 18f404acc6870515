//! Parallel per-sample work feeding a single grid writer.
//!
//! Workers send `(index, Sample)` over a bounded channel. The writer thread is
//! the only owner of the reference grid: it holds early arrivals back until
//! every lower index has been aligned, so the grid grows in input order no
//! matter how the workers were scheduled.

use super::grid::ReferenceGrid;
use crate::models::Sample;
use crossbeam_channel::{
    Receiver,
    bounded,
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{
    debug,
    error,
};

/// Reorders items that arrive out of order by their index.
#[derive(Debug)]
pub struct Collator<T> {
    next: usize,
    waiting: BTreeMap<usize, T>,
}

impl<T> Collator<T> {
    pub fn new(first_index: usize) -> Self {
        Self {
            next: first_index,
            waiting: BTreeMap::new(),
        }
    }

    pub fn receive(&mut self, index: usize, item: T) {
        self.waiting.insert(index, item);
    }

    /// Next item in index order, if it has arrived.
    pub fn try_next(&mut self) -> Option<T> {
        let item = self.waiting.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    pub fn pending(&self) -> usize {
        self.waiting.len()
    }
}

fn write_samples(grid: &mut ReferenceGrid, receiver: Receiver<(usize, Sample)>) -> Vec<Sample> {
    let mut collator = Collator::new(0);
    let mut done = Vec::new();
    let mut align_ready = |collator: &mut Collator<Sample>, done: &mut Vec<Sample>| {
        while let Some(mut sample) = collator.try_next() {
            if sample.is_valid() {
                grid.add_sample(&mut sample);
            } else {
                debug!("Sample {} is invalid, not aligned", sample.name);
            }
            done.push(sample);
        }
    };
    for (index, sample) in receiver.iter() {
        collator.receive(index, sample);
        align_ready(&mut collator, &mut done);
    }
    if collator.pending() > 0 {
        error!(
            "{} samples never became alignable, a lower index was lost",
            collator.pending()
        );
    }
    done
}

/// Runs `process` on every input in parallel and aligns the results into `grid`
/// one at a time, in input order.
///
/// Returns the processed samples in input order. Samples that come out of
/// `process` invalid are returned but never touch the grid.
pub fn process_and_align<I, F>(grid: &mut ReferenceGrid, inputs: Vec<I>, process: F) -> Vec<Sample>
where
    I: Send,
    F: Fn(I) -> Sample + Sync,
{
    let capacity = rayon::current_num_threads().max(1) * 2;
    let (sender, receiver) = bounded::<(usize, Sample)>(capacity);

    std::thread::scope(|scope| {
        let writer = scope.spawn(move || write_samples(grid, receiver));

        inputs
            .into_par_iter()
            .enumerate()
            .for_each_with(sender, |sender, (index, input)| {
                let sample = process(input);
                if let Err(e) = sender.send((index, sample)) {
                    error!("Failed to send sample {} to the grid writer: {}", index, e);
                }
            });

        match writer.join() {
            Ok(samples) => samples,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::AnchorGuidedAligner;
    use crate::config::ProcessingConfig;
    use crate::models::{
        InvalidReason,
        MassTrace,
    };

    fn sample(id: usize, mz: &[f64]) -> Sample {
        let traces = mz
            .iter()
            .enumerate()
            .map(|(i, m)| MassTrace::try_new(i, *m, vec![0.0, 1.0], vec![1.0, 2.0]).unwrap())
            .collect();
        Sample::new(id, format!("s{}", id), traces)
    }

    fn grid() -> ReferenceGrid {
        ReferenceGrid::new(AnchorGuidedAligner::from(&ProcessingConfig::default()))
    }

    #[test]
    fn test_collator_releases_in_order() {
        let mut c = Collator::new(0);
        c.receive(2, "c");
        c.receive(1, "b");
        assert_eq!(c.try_next(), None);
        c.receive(0, "a");
        assert_eq!(c.try_next(), Some("a"));
        assert_eq!(c.try_next(), Some("b"));
        assert_eq!(c.try_next(), Some("c"));
        assert_eq!(c.try_next(), None);
        assert_eq!(c.pending(), 0);
    }

    #[test]
    fn test_grid_is_identical_across_runs() {
        let inputs: Vec<Vec<f64>> = (0..24)
            .map(|k| {
                (0..30)
                    .map(|i| 100.0 + 10.0 * i as f64 + 0.37 * ((k * 7 + i) % 5) as f64)
                    .collect()
            })
            .collect();
        let run = || {
            let mut g = grid();
            let samples = process_and_align(
                &mut g,
                inputs.iter().cloned().enumerate().collect(),
                |(id, mz)| sample(id, &mz),
            );
            (g.mz_list().to_vec(), samples.iter().map(|s| s.id).collect::<Vec<_>>())
        };
        let (first_grid, first_order) = run();
        for _ in 0..4 {
            let (grid_again, order_again) = run();
            assert_eq!(grid_again, first_grid);
            assert_eq!(order_again, first_order);
        }
        assert_eq!(first_order, (0..24).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_samples_do_not_touch_the_grid() {
        let mut g = grid();
        let inputs = vec![vec![100.0, 200.0], vec![300.0], vec![400.0]];
        let samples = process_and_align(&mut g, inputs.into_iter().enumerate().collect(), |(id, mz)| {
            let mut s = sample(id, &mz);
            if id == 1 {
                s.invalidate(InvalidReason::TooFewMassMatches {
                    found: 0,
                    required: 10,
                });
            }
            s
        });
        assert_eq!(samples.len(), 3);
        assert_eq!(g.mz_list(), &[100.0, 200.0, 400.0]);
        assert!(g.sample_map(1).is_none());
    }
}
