//! AnnotationEngine: coordinator for scanning, annotating, and rescanning
//!
//! # Design Principles
//! 1. State machine: Idle → Scanning → Idle, driven by `step()`
//! 2. Collaborators are injected: tree host, clock, options
//! 3. Best effort: pattern and tree failures degrade, never abort the pass
//!
//! # Usage
//! ```rust,ignore
//! let mut engine = AnnotationEngine::new(tree, InstantClock::new(), EngineOptions::default());
//! engine.apply_configuration(Configuration::highlight(&["cat"], "#ffeb3b"))?;
//! while let StepOutcome::Yielded { .. } = engine.step() {
//!     // hand control back to the host between chunks
//! }
//! ```

use crate::annotator::{AnnotationStyle, Annotator};
use crate::clock::{Clock, InstantClock};
use crate::config::{Configuration, EngineOptions, Mode, SettingsSource};
use crate::diagnostics;
use crate::error::EngineError;
use crate::message::{Command, CommandResponse};
use crate::pattern::{self, Pattern};
use crate::registry::{Annotation, AnnotationRegistry};
use crate::scheduler::{
    affected_roots, normalize_roots, ChangeRecord, PassKind, ScanPass, ScanReport, Scheduler,
    SchedulerState, StepOutcome,
};
use crate::tracker::UnitTracker;
use crate::tree::{NodeId, TreeSource};

#[cfg(test)]
mod tests;

/// What an accepted apply/rescan did
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// A pass was scheduled; drive it with `step()`
    Started { generation: u64, removed: usize },
    /// No usable keywords; existing annotations were cleared
    NoPattern { removed: usize },
}

type CompletionListener = Box<dyn FnMut(&ScanReport)>;

pub struct AnnotationEngine<T: TreeSource, C: Clock = InstantClock> {
    tree: T,
    clock: C,
    config: Option<Configuration>,
    pattern: Option<Pattern>,
    registry: AnnotationRegistry,
    tracker: UnitTracker,
    annotator: Annotator,
    scheduler: Scheduler,
    last_report: Option<ScanReport>,
    on_complete: Option<CompletionListener>,
}

impl<T: TreeSource> AnnotationEngine<T, InstantClock> {
    /// Engine over `tree` with a real clock and default options
    pub fn with_tree(tree: T) -> Self {
        Self::new(tree, InstantClock::new(), EngineOptions::default())
    }
}

impl<T: TreeSource, C: Clock> AnnotationEngine<T, C> {
    pub fn new(tree: T, clock: C, options: EngineOptions) -> Self {
        Self {
            tree,
            clock,
            config: None,
            pattern: None,
            registry: AnnotationRegistry::new(),
            tracker: UnitTracker::new(),
            annotator: Annotator::new(&options.id_prefix),
            scheduler: Scheduler::new(options.chunk_size, options.debounce_ms),
            last_report: None,
            on_complete: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Host-side edits; report them through `notify_mutations`
    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.config.as_ref()
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn registry(&self) -> &AnnotationRegistry {
        &self.registry
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.registry.get(id)
    }

    pub fn annotation_count(&self) -> usize {
        self.registry.len()
    }

    pub fn tracked_units(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_scanning(&self) -> bool {
        self.scheduler.is_scanning()
    }

    /// A mutation-triggered rescan is queued
    pub fn pending_rescan(&self) -> bool {
        self.scheduler.debounce.is_pending()
    }

    pub fn generation(&self) -> u64 {
        self.scheduler.generation()
    }

    pub fn state_name(&self) -> &'static str {
        self.scheduler.state_name()
    }

    pub fn last_report(&self) -> Option<&ScanReport> {
        self.last_report.as_ref()
    }

    pub fn set_completion_listener(&mut self, listener: impl FnMut(&ScanReport) + 'static) {
        self.on_complete = Some(Box::new(listener));
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Apply the stored configuration, if any, and start the initial scan
    pub fn bootstrap<S: SettingsSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<Option<ApplyOutcome>, EngineError> {
        match source.load() {
            Some(config) => self.apply_configuration(config).map(Some),
            None => Ok(None),
        }
    }

    /// Install a new configuration and schedule a full pass.
    /// Rejected with `EngineError::Busy` while a pass is in flight.
    pub fn apply_configuration(&mut self, config: Configuration) -> Result<ApplyOutcome, EngineError> {
        self.ensure_idle()?;

        let generation = self.scheduler.bump_generation();
        self.tracker.clear();

        let previous = self.config.replace(config.clone());
        let mut removed = 0;
        if previous.as_ref().is_some_and(|p| p.invalidates(&config)) {
            removed = self.registry.clear(&mut self.tree);
        }

        let recompile = match &previous {
            Some(p) => p.pattern_differs(&config) || self.pattern.is_none(),
            None => true,
        };
        if recompile {
            self.pattern = pattern::compile(&config.keywords, config.case_sensitive);
        }

        let Some(pattern) = self.pattern.clone() else {
            removed += self.registry.clear(&mut self.tree);
            self.scheduler.debounce.clear();
            return Ok(ApplyOutcome::NoPattern { removed });
        };

        let root = self.tree.root();
        self.begin_pass(generation, PassKind::Full, &[root], pattern, AnnotationStyle::from(&config));
        Ok(ApplyOutcome::Started { generation, removed })
    }

    /// Full pass with the current pattern, keeping the tracker.
    /// Already visited units are not evaluated again.
    pub fn rescan(&mut self) -> Result<ApplyOutcome, EngineError> {
        self.ensure_idle()?;
        let (Some(pattern), Some(config)) = (self.pattern.clone(), self.config.as_ref()) else {
            return Ok(ApplyOutcome::NoPattern { removed: 0 });
        };
        let style = AnnotationStyle::from(config);
        let generation = self.scheduler.generation();
        let root = self.tree.root();
        self.begin_pass(generation, PassKind::Full, &[root], pattern, style);
        Ok(ApplyOutcome::Started {
            generation,
            removed: 0,
        })
    }

    /// Remove every annotation. Any in-flight pass is superseded and any
    /// queued rescan dropped. Safe on an empty registry.
    pub fn clear_all(&mut self) -> usize {
        self.scheduler.bump_generation();
        self.scheduler.debounce.clear();
        self.tracker.clear();
        self.registry.clear(&mut self.tree)
    }

    /// Remove one annotation, restoring its text
    pub fn remove(&mut self, id: &str) -> bool {
        self.registry.remove(&mut self.tree, id)
    }

    /// Removal affordance: only highlight annotations react to interaction
    pub fn handle_interaction(&mut self, id: &str) -> bool {
        match self.registry.get(id) {
            Some(annotation) if annotation.mode == Mode::Highlight => self.remove(id),
            _ => false,
        }
    }

    /// Queue affected subtrees for a debounced rescan.
    /// Returns the number of roots taken from this batch.
    pub fn notify_mutations(&mut self, records: &[ChangeRecord]) -> usize {
        let enabled = self.pattern.is_some() && self.config.as_ref().is_some_and(|c| c.auto_update);
        if !enabled {
            return 0;
        }
        let roots = affected_roots(&self.tree, records);
        if roots.is_empty() {
            return 0;
        }
        let count = roots.len();
        let now = self.clock.now_ms();
        self.scheduler.debounce.push(roots, now);
        count
    }

    /// Messaging entry point
    pub fn handle_command(&mut self, command: Command) -> CommandResponse {
        match command.configuration() {
            Some(config) => match self.apply_configuration(config) {
                Ok(ApplyOutcome::Started { removed, .. }) => CommandResponse {
                    ok: true,
                    removed,
                    ..CommandResponse::default()
                },
                Ok(ApplyOutcome::NoPattern { removed }) => CommandResponse::removed(removed),
                Err(EngineError::Busy { .. }) => CommandResponse::busy(),
            },
            None => CommandResponse::removed(self.clear_all()),
        }
    }

    /// `handle_command` for hosts that drive passes synchronously: an
    /// accepted apply runs to completion and the response carries its report
    pub fn handle_command_sync(&mut self, command: Command) -> CommandResponse {
        let response = self.handle_command(command);
        if !response.ok || !self.scheduler.is_scanning() {
            return response;
        }
        match self.run_until_idle() {
            Some(report) => CommandResponse::from_report(&report, response.removed),
            None => response,
        }
    }

    // -------------------------------------------------------------------------
    // Driving
    // -------------------------------------------------------------------------

    /// Advance the scheduler by one unit of work: one chunk of the active
    /// pass, or the start of a due rescan. Hosts call this once per frame.
    pub fn step(&mut self) -> StepOutcome {
        let now = self.clock.now_ms();

        if !self.scheduler.is_scanning() {
            if self.scheduler.debounce.is_ready(now) {
                if !self.begin_incremental(now) {
                    return StepOutcome::Idle;
                }
            } else if let Some(until_ms) = self.scheduler.debounce.deadline() {
                return StepOutcome::Waiting { until_ms };
            } else {
                return StepOutcome::Idle;
            }
        }

        self.run_chunk(now)
    }

    /// Drive the active pass to completion without waiting on debounce
    pub fn run_until_idle(&mut self) -> Option<ScanReport> {
        while self.scheduler.is_scanning() {
            match self.step() {
                StepOutcome::Yielded { .. } => continue,
                StepOutcome::Completed(report) => return Some(report),
                _ => return None,
            }
        }
        None
    }

    /// Apply a configuration and drive the pass synchronously
    pub fn apply_and_run(&mut self, config: Configuration) -> Result<ScanReport, EngineError> {
        match self.apply_configuration(config)? {
            ApplyOutcome::Started { generation, .. } => Ok(self
                .run_until_idle()
                .unwrap_or_else(|| ScanReport::empty(PassKind::Full, generation))),
            ApplyOutcome::NoPattern { .. } => {
                Ok(ScanReport::empty(PassKind::Full, self.scheduler.generation()))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ensure_idle(&self) -> Result<(), EngineError> {
        if self.scheduler.is_scanning() {
            let generation = self.scheduler.generation();
            diagnostics::debug("AnnotationEngine", format!("busy with pass {}", generation));
            return Err(EngineError::Busy { generation });
        }
        Ok(())
    }

    fn begin_pass(
        &mut self,
        generation: u64,
        kind: PassKind,
        roots: &[NodeId],
        pattern: Pattern,
        style: AnnotationStyle,
    ) {
        self.tracker.prune(&self.tree);
        let now = self.clock.now_ms();
        self.scheduler
            .begin(ScanPass::new(generation, kind, roots, pattern, style, now));
    }

    /// Start the queued rescan. False when nothing is left to scan.
    fn begin_incremental(&mut self, now: u64) -> bool {
        let queued = self.scheduler.debounce.take();
        let (Some(pattern), Some(config)) = (self.pattern.clone(), self.config.as_ref()) else {
            return false;
        };
        let style = AnnotationStyle::from(config);
        let roots = normalize_roots(&self.tree, &queued);
        if roots.is_empty() {
            return false;
        }
        for &root in &roots {
            self.tracker.forget_subtree(&self.tree, root);
        }
        let generation = self.scheduler.generation();
        self.tracker.prune(&self.tree);
        self.scheduler.begin(ScanPass::new(
            generation,
            PassKind::Incremental,
            &roots,
            pattern,
            style,
            now,
        ));
        true
    }

    fn run_chunk(&mut self, now: u64) -> StepOutcome {
        let current_generation = self.scheduler.generation();
        let chunk_size = self.scheduler.chunk_size;

        let SchedulerState::Scanning(pass) = &mut self.scheduler.state else {
            return StepOutcome::Idle;
        };

        if pass.generation != current_generation {
            diagnostics::debug(
                "AnnotationEngine",
                format!("pass {} superseded by {}", pass.generation, current_generation),
            );
            self.scheduler.finish();
            return StepOutcome::Superseded;
        }

        let chunk = pass.walker.next_chunk(&self.tree, &self.tracker, chunk_size);
        let mut matches = 0;
        for unit in &chunk {
            matches += self.annotator.apply(
                &mut self.tree,
                unit,
                &pass.pattern,
                &pass.style,
                &mut self.registry,
                &mut self.tracker,
            );
        }
        pass.units += chunk.len();
        pass.matches += matches;

        if !pass.walker.is_exhausted() {
            return StepOutcome::Yielded {
                units: chunk.len(),
                matches,
            };
        }

        let report = pass.report(self.clock.now_ms().max(now));
        self.scheduler.finish();
        diagnostics::debug(
            "AnnotationEngine",
            format!(
                "{:?} pass {} done: {} matches in {} units ({} ms)",
                report.pass,
                report.generation,
                report.match_count,
                report.units_scanned,
                report.process_time_millis
            ),
        );
        if let Some(listener) = self.on_complete.as_mut() {
            listener(&report);
        }
        self.last_report = Some(report.clone());
        StepOutcome::Completed(report)
    }
}
