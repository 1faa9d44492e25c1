//! Datapoint assignment: which text an annotator sees next.
//!
//! A call walks four states in priority order:
//!
//! 1. **Resume open**: re-serve the entry shown but not yet acted on.
//!    A forced switch skips it instead.
//! 2. **Last submitted**: in manual mode, keep showing the datapoint the
//!    annotator just submitted until they ask for a new one.
//! 3. **Fresh selection**: draw from the attached sources according to the
//!    project's data order, honouring exclusions.
//! 4. **Exhausted**: resurrect the most recently deferred datapoint, or
//!    report that nothing is left.
//!
//! Entries whose datasource left the project are skipped as stale and the
//! walk continues; configuration drift never fails a call. Entries on a
//! source that is merely unreachable are left untouched for a later call.

mod selection;

use std::collections::HashSet;

use rand::RngCore;

use crate::{
    model::{
        AccessLogEntry, Assignment, DataOrder, DataSourceDefinition, DatapointHandle,
        DatapointId, Disposition, NewEntry, Origin, Project,
    },
    source::{self, DataSource, SourceError, SourceSettings},
    storage::{AssignOutcome, Storage, StorageError},
};

/// Errors that stop an assignment.
///
/// Data source faults are absorbed as empty sources; only storage failures
/// and malformed definitions get here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Configuration(#[from] SourceError),
}

pub type Result<T> = core::result::Result<T, EngineError>;

/// Hands out datapoints, keeping the access log in step.
pub struct Engine<'a> {
    storage: &'a Storage,
    settings: SourceSettings,
}

impl<'a> Engine<'a> {
    pub fn new(storage: &'a Storage, settings: SourceSettings) -> Self {
        Self { storage, settings }
    }

    /// Decide what `user` should annotate next in `project`.
    ///
    /// `force_switch` is the explicit "give me a new text" request: the open
    /// entry is skipped and manual-mode persistence is bypassed.
    pub fn next(
        &self,
        user: &str,
        project: &Project,
        force_switch: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Assignment> {
        let request = Request {
            storage: self.storage,
            settings: &self.settings,
            user,
            project,
            definitions: self.storage.attached_datasources(project)?,
        };
        request.run(force_switch, rng)
    }
}

/// One `next` call: the annotator, the project, and its attached definitions.
struct Request<'a> {
    storage: &'a Storage,
    settings: &'a SourceSettings,
    user: &'a str,
    project: &'a Project,
    definitions: Vec<DataSourceDefinition>,
}

/// An instantiated source taking part in fresh selection.
struct Candidate<'d> {
    definition: &'d DataSourceDefinition,
    source: Box<dyn DataSource>,
    size: u64,
}

/// What happened when a selected datapoint was written to the access log.
enum Commit {
    Served(DatapointHandle),

    /// Lost a race for the datapoint; select again.
    Retry,

    /// A concurrent call opened an entry that cannot be shown right now.
    Blocked,
}

/// Outcome of re-resolving a logged entry.
enum Resolution {
    Ready(DatapointHandle),

    /// The entry was marked stale; move on.
    Stale,

    /// The source is unreachable; the entry is kept as it is.
    Unavailable,
}

impl Request<'_> {
    fn run(&self, force_switch: bool, rng: &mut dyn RngCore) -> Result<Assignment> {
        let project_id = self.project.id;

        if let Some(open) = self.storage.find_open(self.user, project_id)? {
            if force_switch {
                tracing::debug!(entry = open.id, "forced switch, skipping open entry");
                self.storage.record_disposition(open.id, Disposition::Skipped)?;
            } else {
                match self.resolve(&open, Origin::Open)? {
                    Resolution::Ready(handle) => {
                        tracing::debug!(entry = open.id, "resuming open entry");
                        return Ok(Assignment::Datapoint(handle));
                    }
                    Resolution::Stale => {}
                    // The open entry still holds the annotator's slot.
                    Resolution::Unavailable => return self.unavailable(),
                }
            }
        }

        if !self.project.auto_advance
            && !force_switch
            && let Some(last) = self.storage.find_last_submitted(self.user, project_id)?
            && let Resolution::Ready(handle) = self.resolve(&last, Origin::LastSubmitted)?
        {
            self.storage.delete_open(self.user, project_id)?;
            tracing::debug!(entry = last.id, "keeping last submitted datapoint");
            return Ok(Assignment::Datapoint(handle));
        }

        let candidates = self
            .definitions
            .iter()
            .map(|definition| {
                let source = source::instantiate(definition, self.settings)?;
                let size = source.size();
                Ok::<_, EngineError>(Candidate {
                    definition,
                    source,
                    size,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if candidates.iter().all(|c| c.size == 0) {
            tracing::debug!("project has no data");
            return Ok(Assignment::NoData);
        }

        let fresh = if self.project.data_order.is_random() {
            self.select_random(&candidates, rng)?
        } else {
            self.select_sequential(&candidates)?
        };
        if let Some(handle) = fresh {
            return Ok(Assignment::Datapoint(handle));
        }
        if self.storage.find_open(self.user, project_id)?.is_some() {
            tracing::debug!("concurrent call holds an unavailable open entry");
            return Ok(Assignment::Empty);
        }

        for deferred in self.storage.list_deferred(self.user, project_id)? {
            if let Resolution::Ready(handle) = self.resolve(&deferred, Origin::Deferred)? {
                self.storage.reopen(deferred.id)?;
                tracing::debug!(entry = deferred.id, "resurrecting deferred entry");
                return Ok(Assignment::Datapoint(handle));
            }
        }

        tracing::debug!("nothing left to annotate");
        Ok(Assignment::Empty)
    }

    /// Answer for a call that cannot serve its open entry right now.
    fn unavailable(&self) -> Result<Assignment> {
        for definition in &self.definitions {
            if source::instantiate(definition, self.settings)?.size() > 0 {
                return Ok(Assignment::Empty);
            }
        }
        Ok(Assignment::NoData)
    }

    /// Random modes: pick a source weighted by size, then an unexcluded datapoint.
    fn select_random(
        &self,
        candidates: &[Candidate<'_>],
        rng: &mut dyn RngCore,
    ) -> Result<Option<DatapointHandle>> {
        let without_replacement = self.project.data_order == DataOrder::RandomWithoutReplacement;
        let claim = without_replacement && self.project.disjoint_annotation;
        let scope = if self.project.disjoint_annotation {
            None
        } else {
            Some(self.user)
        };

        let mut exclusions = candidates
            .iter()
            .map(|c| -> Result<HashSet<DatapointId>> {
                if without_replacement && !c.source.is_interactive() {
                    self.storage
                        .logged_ids(self.project.id, scope, c.definition.id)
                        .map_err(EngineError::from)
                } else {
                    Ok(HashSet::new())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let weights: Vec<u64> = candidates.iter().map(|c| c.size).collect();
        let mut active: Vec<bool> = weights.iter().map(|w| *w > 0).collect();

        while let Some(index) = selection::pick_weighted(&weights, &active, rng) {
            let candidate = &candidates[index];
            let excluded = &exclusions[index];

            if selection::is_exhausted(candidate.size, excluded) {
                tracing::debug!(datasource = %candidate.definition.id, "datasource exhausted");
                active[index] = false;
                continue;
            }
            let Some((datapoint, raw)) =
                selection::draw_unexcluded(candidate.source.as_ref(), candidate.size, excluded, rng)
            else {
                active[index] = false;
                continue;
            };

            match self.commit(candidate, datapoint, &raw, claim)? {
                Commit::Served(handle) => return Ok(Some(handle)),
                Commit::Retry => {
                    exclusions[index].insert(datapoint);
                }
                Commit::Blocked => return Ok(None),
            }
        }

        tracing::debug!("all datasources exhausted");
        Ok(None)
    }

    /// Sequential modes: continue each source from its per-annotator cursor.
    ///
    /// Interactive sources are never logged and so never move the cursor or
    /// the round-robin position; they are visited only after every logged
    /// source has run dry.
    fn select_sequential(&self, candidates: &[Candidate<'_>]) -> Result<Option<DatapointHandle>> {
        let round_robin = self.project.data_order == DataOrder::ParallelSequential;
        let current = self
            .storage
            .find_latest(self.user, self.project.id)?
            .and_then(|e| {
                candidates
                    .iter()
                    .position(|c| c.definition.id == e.datasource_id)
            });

        let (logged, interactive): (Vec<usize>, Vec<usize>) =
            selection::sequential_order(candidates.len(), current, round_robin)
                .partition(|&index| !candidates[index].source.is_interactive());

        for index in logged.into_iter().chain(interactive) {
            let candidate = &candidates[index];
            let cursor = if candidate.source.is_interactive() {
                0
            } else {
                self.storage
                    .cursor(self.project.id, self.user, candidate.definition.id)?
            };
            if cursor >= candidate.size {
                continue;
            }
            let Some(raw) = candidate.source.get(cursor) else {
                continue;
            };

            match self.commit(candidate, cursor, &raw, false)? {
                Commit::Served(handle) => return Ok(Some(handle)),
                Commit::Retry => {}
                Commit::Blocked => return Ok(None),
            }
        }

        Ok(None)
    }

    /// Log a freshly selected datapoint and build its handle.
    fn commit(
        &self,
        candidate: &Candidate<'_>,
        datapoint: DatapointId,
        raw: &str,
        claim: bool,
    ) -> Result<Commit> {
        let source = candidate.source.as_ref();
        if source.is_interactive() {
            return Ok(Commit::Served(handle(
                candidate.definition,
                source,
                datapoint,
                raw,
                Origin::Fresh,
                None,
            )));
        }

        let new = NewEntry {
            user: self.user,
            project_id: self.project.id,
            datasource_id: candidate.definition.id,
            datapoint,
        };
        match self.storage.assign(&new, claim)? {
            AssignOutcome::Created(entry) => {
                tracing::info!(
                    user = self.user,
                    project = %self.project.id,
                    datasource = %candidate.definition.id,
                    datapoint,
                    "assigned datapoint"
                );
                Ok(Commit::Served(handle(
                    candidate.definition,
                    source,
                    datapoint,
                    raw,
                    Origin::Fresh,
                    Some(entry.id),
                )))
            }
            AssignOutcome::Claimed => {
                tracing::debug!(datapoint, "datapoint claimed by another annotator");
                Ok(Commit::Retry)
            }
            AssignOutcome::OpenExists(open) => {
                // A concurrent call for the same annotator won; serve its pick.
                match self.resolve(&open, Origin::Open)? {
                    Resolution::Ready(handle) => Ok(Commit::Served(handle)),
                    Resolution::Stale => Ok(Commit::Retry),
                    Resolution::Unavailable => Ok(Commit::Blocked),
                }
            }
        }
    }

    /// Re-resolve a logged datapoint.
    ///
    /// The entry is marked stale when its datasource is gone from the project,
    /// or when the source answers but no longer has the datapoint. A source
    /// that reads as empty may just be unreachable, so the entry is kept.
    fn resolve(&self, entry: &AccessLogEntry, origin: Origin) -> Result<Resolution> {
        let Some(definition) = self
            .definitions
            .iter()
            .find(|d| d.id == entry.datasource_id)
        else {
            tracing::warn!(
                entry = entry.id,
                datasource = %entry.datasource_id,
                "datasource no longer attached, skipping entry"
            );
            self.storage.mark_stale(entry.id)?;
            return Ok(Resolution::Stale);
        };

        let source = source::instantiate(definition, self.settings)?;
        let Some(raw) = source.get(entry.datapoint) else {
            let size = source.size();
            if size > 0 && entry.datapoint >= size {
                tracing::warn!(
                    entry = entry.id,
                    datapoint = entry.datapoint,
                    size,
                    "datapoint no longer exists, skipping entry"
                );
                self.storage.mark_stale(entry.id)?;
                return Ok(Resolution::Stale);
            }
            tracing::warn!(
                entry = entry.id,
                datasource = %definition.id,
                "datasource unavailable, keeping entry"
            );
            return Ok(Resolution::Unavailable);
        };

        Ok(Resolution::Ready(handle(
            definition,
            source.as_ref(),
            entry.datapoint,
            &raw,
            origin,
            Some(entry.id),
        )))
    }
}

fn handle(
    definition: &DataSourceDefinition,
    source: &dyn DataSource,
    datapoint: DatapointId,
    raw: &str,
    origin: Origin,
    entry_id: Option<i64>,
) -> DatapointHandle {
    DatapointHandle {
        datapoint,
        text: definition.formatting.apply(raw),
        datasource_id: definition.id,
        source_name: source.source_name(datapoint),
        is_deferred: origin == Origin::Deferred,
        origin,
        entry_id,
    }
}
