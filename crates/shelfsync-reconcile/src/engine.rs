//! Runs the detectors over single pairs, index-aligned batches and identity
//! groups.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures::StreamExt;
use serde::Serialize;
use shelfsync_core::config::DEFAULT_BATCH_SIZE;
use shelfsync_core::{BookRecord, ShelfsyncConfig};
use tracing::{debug, info, warn};

use crate::conflict::{
    ConflictDetector, ConflictRecord, DetectorKind, ProgressConflictDetector,
    TagConflictDetector, TitleConflictDetector,
};
use crate::error::Result;
use crate::identity::{Identity, StableIdResolver};

/// Which detector kinds a run should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectorSet {
    pub progress: bool,
    pub tags: bool,
    pub title: bool,
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self::all()
    }
}

impl DetectorSet {
    pub fn all() -> Self {
        Self {
            progress: true,
            tags: true,
            title: true,
        }
    }

    pub fn only(kinds: &[DetectorKind]) -> Self {
        Self {
            progress: kinds.contains(&DetectorKind::Progress),
            tags: kinds.contains(&DetectorKind::Tags),
            title: kinds.contains(&DetectorKind::Title),
        }
    }

    pub fn contains(&self, kind: DetectorKind) -> bool {
        match kind {
            DetectorKind::Progress => self.progress,
            DetectorKind::Tags => self.tags,
            DetectorKind::Title => self.title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Pairs per chunk. Zero is treated as one.
    pub batch_size: usize,
    pub detectors: DetectorSet,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            detectors: DetectorSet::all(),
        }
    }
}

impl BatchOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_detectors(mut self, detectors: DetectorSet) -> Self {
        self.detectors = detectors;
        self
    }
}

/// Records sharing one resolved identity. Indices point into the input slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityGroup {
    pub identity: Identity,
    pub canonical: usize,
    pub members: Vec<usize>,
}

/// A conflict between a group member and the group's canonical record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConflict {
    pub identity: Identity,
    pub canonical: usize,
    pub member: usize,
    pub conflict: ConflictRecord,
}

pub struct ConflictDetectionEngine {
    resolver: StableIdResolver,
    detectors: Vec<Box<dyn ConflictDetector>>,
    batch_size: usize,
}

impl Default for ConflictDetectionEngine {
    fn default() -> Self {
        Self {
            resolver: StableIdResolver::default(),
            detectors: vec![
                Box::new(ProgressConflictDetector::default()),
                Box::new(TagConflictDetector::default()),
                Box::new(TitleConflictDetector::default()),
            ],
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl std::fmt::Debug for ConflictDetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<DetectorKind> = self.detectors.iter().map(|d| d.kind()).collect();
        f.debug_struct("ConflictDetectionEngine")
            .field("resolver", &self.resolver)
            .field("detectors", &kinds)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ConflictDetectionEngine {
    /// Validates the configuration and indexes the tag vocabulary.
    pub fn from_config(config: &ShelfsyncConfig) -> Result<Self> {
        config.validate()?;
        let tags = TagConflictDetector::try_new(&config.vocabulary, config.tags.clone())?;
        Ok(Self {
            resolver: StableIdResolver::new(&config.identity),
            detectors: vec![
                Box::new(ProgressConflictDetector::new(config.progress.clone())),
                Box::new(tags),
                Box::new(TitleConflictDetector::new(config.title.clone())),
            ],
            batch_size: config.batch.batch_size,
        })
    }

    /// An engine that runs only the given detectors.
    pub fn with_detectors(detectors: Vec<Box<dyn ConflictDetector>>) -> Self {
        Self {
            detectors,
            ..Self::default()
        }
    }

    pub fn resolver(&self) -> &StableIdResolver {
        &self.resolver
    }

    /// Options carrying the configured batch size and every detector.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::default().with_batch_size(self.batch_size)
    }

    pub fn resolve(&self, record: &BookRecord) -> Identity {
        self.resolver.resolve_record(record)
    }

    pub fn detect_pair(&self, left: &BookRecord, right: &BookRecord) -> Vec<ConflictRecord> {
        self.detect_pair_with(left, right, &DetectorSet::all())
    }

    pub fn detect_pair_with(
        &self,
        left: &BookRecord,
        right: &BookRecord,
        detectors: &DetectorSet,
    ) -> Vec<ConflictRecord> {
        self.detectors
            .iter()
            .filter(|detector| detectors.contains(detector.kind()))
            .filter_map(|detector| detector.detect(left, right))
            .collect()
    }

    /// Compares `left[i]` with `right[i]` for every index present in both
    /// lists. Results keep index order and carry their pair index.
    pub async fn detect_batch(
        &self,
        left: &[BookRecord],
        right: &[BookRecord],
        options: &BatchOptions,
    ) -> Vec<ConflictRecord> {
        let pairs: Vec<(usize, &BookRecord, &BookRecord)> = left
            .iter()
            .zip(right)
            .enumerate()
            .filter(|(_, (l, r))| !l.is_empty() && !r.is_empty())
            .map(|(index, (l, r))| (index, l, r))
            .collect();

        let skipped = left.len().max(right.len()) - pairs.len();
        if skipped > 0 {
            debug!(skipped, "pairs without a counterpart skipped");
        }

        let outcome = self.run_chunked(pairs, options).await;
        let conflicts: Vec<ConflictRecord> = outcome
            .completed
            .into_iter()
            .flat_map(|(index, records)| {
                records
                    .into_iter()
                    .map(move |record| record.with_pair_index(index))
            })
            .collect();

        info!(
            pairs = outcome.attempted,
            failed = outcome.failed,
            skipped,
            conflicts = conflicts.len(),
            "batch detection finished"
        );
        conflicts
    }

    /// Groups records by resolved identity, first occurrence first.
    ///
    /// Records that resolve to the undefined identity share no signal with
    /// anything and stay in groups of their own.
    pub fn group_by_identity(&self, records: &[BookRecord]) -> Vec<IdentityGroup> {
        let mut positions: HashMap<Identity, usize> = HashMap::new();
        let mut groups: Vec<IdentityGroup> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let identity = self.resolver.resolve_record(record);
            let undefined = identity == Identity::undefined();
            match positions.get(&identity) {
                Some(&position) if !undefined => groups[position].members.push(index),
                _ => {
                    if !undefined {
                        positions.insert(identity.clone(), groups.len());
                    }
                    groups.push(IdentityGroup {
                        identity,
                        canonical: index,
                        members: vec![index],
                    });
                }
            }
        }

        for group in &mut groups {
            group.canonical = choose_canonical_index(&group.members, records);
        }
        groups
    }

    /// Compares every group member with its group's canonical record.
    pub async fn detect_grouped(
        &self,
        records: &[BookRecord],
        options: &BatchOptions,
    ) -> Vec<GroupConflict> {
        let groups = self.group_by_identity(records);
        let mut owner: HashMap<usize, &IdentityGroup> = HashMap::new();
        let mut pairs = Vec::new();
        for group in groups.iter().filter(|g| g.members.len() > 1) {
            for &member in group.members.iter().filter(|&&m| m != group.canonical) {
                owner.insert(member, group);
                pairs.push((member, &records[group.canonical], &records[member]));
            }
        }

        let outcome = self.run_chunked(pairs, options).await;
        let conflicts: Vec<GroupConflict> = outcome
            .completed
            .into_iter()
            .filter_map(|(member, found)| owner.get(&member).map(|group| (member, group, found)))
            .flat_map(|(member, group, found)| {
                found.into_iter().map(move |conflict| GroupConflict {
                    identity: group.identity.clone(),
                    canonical: group.canonical,
                    member,
                    conflict: conflict.with_pair_index(member),
                })
            })
            .collect();

        info!(
            records = records.len(),
            groups = groups.len(),
            failed = outcome.failed,
            conflicts = conflicts.len(),
            "grouped detection finished"
        );
        conflicts
    }

    /// Runs pairs in chunks of `options.batch_size`, yielding to the scheduler
    /// between chunks. Each entry of `completed` holds the caller's tag and the
    /// pair's non-empty findings, in input order.
    async fn run_chunked(
        &self,
        pairs: Vec<(usize, &BookRecord, &BookRecord)>,
        options: &BatchOptions,
    ) -> ChunkOutcome {
        let batch_size = options.batch_size.max(1);
        let detectors = options.detectors;
        let mut outcome = ChunkOutcome {
            attempted: pairs.len(),
            ..ChunkOutcome::default()
        };

        for chunk in pairs.chunks(batch_size) {
            let results: Vec<(usize, Option<Vec<ConflictRecord>>)> =
                futures::stream::iter(chunk.iter().copied())
                    .map(|(tag, left, right)| async move {
                        (tag, self.detect_isolated(tag, left, right, &detectors))
                    })
                    .buffered(batch_size)
                    .collect()
                    .await;

            for (tag, result) in results {
                match result {
                    Some(records) if !records.is_empty() => outcome.completed.push((tag, records)),
                    Some(_) => {}
                    None => outcome.failed += 1,
                }
            }

            tokio::task::yield_now().await;
        }

        outcome
    }

    /// One pair with panics contained. `None` means a detector panicked.
    fn detect_isolated(
        &self,
        tag: usize,
        left: &BookRecord,
        right: &BookRecord,
        detectors: &DetectorSet,
    ) -> Option<Vec<ConflictRecord>> {
        match catch_unwind(AssertUnwindSafe(|| {
            self.detect_pair_with(left, right, detectors)
        })) {
            Ok(records) => Some(records),
            Err(_) => {
                warn!(pair = tag, "conflict detection panicked; pair skipped");
                None
            }
        }
    }
}

#[derive(Debug, Default)]
struct ChunkOutcome {
    attempted: usize,
    failed: usize,
    completed: Vec<(usize, Vec<ConflictRecord>)>,
}

fn choose_canonical_index(members: &[usize], records: &[BookRecord]) -> usize {
    let mut best_index = members[0];
    let mut best_score = completeness_score(&records[best_index]);

    for index in members.iter().copied().skip(1) {
        let score = completeness_score(&records[index]);
        if score > best_score {
            best_score = score;
            best_index = index;
        }
    }

    best_index
}

/// More populated fields score higher. Ties keep the earlier record.
fn completeness_score(record: &BookRecord) -> usize {
    let present = |value: &Option<String>| {
        value.as_deref().is_some_and(|v| !v.trim().is_empty())
    };

    let mut score = 0usize;
    if present(&record.title) {
        score += 2;
    }
    if present(&record.cover_url) {
        score += 2;
    }
    if present(&record.reader_link_id) {
        score += 1;
    }
    if let Some(tags) = &record.tags {
        score += tags.len().min(5);
    }
    if record.progress.is_some() && record.last_updated.is_some() {
        score += 1;
    }
    if present(&record.source) {
        score += 1;
    }
    score
}
