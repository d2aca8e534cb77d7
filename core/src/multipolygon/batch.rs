use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use crossbeam_channel::{bounded, unbounded};
use tracing::debug;

use crate::model::Relation;

use super::{fill_areas, Area};

/// The areas built for one relation of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct RelationAreas {
    /// Position of the relation in the batch
    pub index: usize,
    pub relation_id: i64,
    pub areas: Vec<Area>,
}

/// Builds the areas of many relations on `workers` threads (all available
/// cores if `0`).
///
/// `cancel` is checked between relations. Once it is set, no further
/// relations are started, and the ones not processed are missing from the
/// result. The result is ordered like `relations`.
pub fn fill_areas_batch(
    relations: &[Relation],
    workers: usize,
    cancel: &AtomicBool,
) -> Vec<RelationAreas> {
    let workers = match workers {
        0 => num_cpus::get(),
        n => n,
    }
    .min(relations.len().max(1));

    let (work_send, work_recv) = bounded::<(usize, &Relation)>(workers * 4);
    let (result_send, result_recv) = unbounded::<RelationAreas>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let work_recv = work_recv.clone();
            let result_send = result_send.clone();
            scope.spawn(move || {
                for (index, relation) in work_recv {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let mut areas = Vec::new();
                    fill_areas(relation, &mut areas);
                    if result_send
                        .send(RelationAreas {
                            index,
                            relation_id: relation.id,
                            areas,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }
        drop(work_recv);
        drop(result_send);

        for (index, relation) in relations.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                debug!(remaining = relations.len() - index, "batch cancelled");
                break;
            }
            if work_send.send((index, relation)).is_err() {
                break;
            }
        }
        drop(work_send);
    });

    let mut results = result_recv.into_iter().collect::<Vec<_>>();
    results.sort_unstable_by_key(|r| r.index);
    results
}
