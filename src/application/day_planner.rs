use crate::domain::models::ExternalEvent;
use crate::domain::occurrence::Occurrence;
use crate::domain::time::{DayWindow, MINUTES_PER_SLOT, SLOT_GRID_WINDOW};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::repository::{RoutineRepository, ScheduleRepository};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;

/// Merged view of one operating day: persisted schedules, ghosts for
/// routines due that day but not yet materialized, and external calendar
/// events, ordered by operating-day time.
#[derive(Debug, Clone)]
pub struct DayView {
    pub date: NaiveDate,
    pub occurrences: Vec<Occurrence>,
}

/// Proportional placement of one occurrence on a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub occurrence: usize,
    pub top_percent: f64,
    pub height_percent: f64,
}

/// One cell of the 10-minute slot grid. `occurrence` indexes into the
/// view's occurrence list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCell {
    pub occurrence: Option<usize>,
    pub is_start: bool,
}

impl DayView {
    /// Percent-based placement for every occurrence in the view.
    pub fn timeline_entries(&self, window: DayWindow) -> Result<Vec<TimelineEntry>, PlannerError> {
        let mut entries = Vec::with_capacity(self.occurrences.len());
        for (index, occurrence) in self.occurrences.iter().enumerate() {
            let start = occurrence.start_time();
            let end = occurrence.end_time();
            let top_percent = window
                .position_percent(&start)
                .map_err(PlannerError::Validation)?;
            let height_percent = window
                .height_percent(&start, &end)
                .map_err(PlannerError::Validation)?;
            entries.push(TimelineEntry {
                occurrence: index,
                top_percent,
                height_percent,
            });
        }
        Ok(entries)
    }

    /// Fills the slot grid. Concrete entries claim their cells first; ghosts
    /// only take cells nothing concrete occupies.
    pub fn slot_grid(&self, window: DayWindow) -> Result<Vec<SlotCell>, PlannerError> {
        let mut cells = vec![SlotCell::default(); window.slot_count()];
        for ghost_pass in [false, true] {
            for (index, occurrence) in self.occurrences.iter().enumerate() {
                if occurrence.is_ghost() != ghost_pass {
                    continue;
                }
                let start = occurrence.start_time();
                let end = occurrence.end_time();
                let start_slot = window
                    .slot_index(&start)
                    .map_err(PlannerError::Validation)?;
                let end_minute = window.day_minute(&end).map_err(PlannerError::Validation)?;
                // The end slot is exclusive: a block ending partway through a
                // slot leaves that slot free. Blocks shorter than one slot
                // still claim one so they stay visible.
                let end_slot = ((end_minute / MINUTES_PER_SLOT) as usize)
                    .min(cells.len())
                    .max(start_slot + 1);
                let mut is_start = true;
                for cell in &mut cells[start_slot..end_slot] {
                    if cell.occurrence.is_none() {
                        *cell = SlotCell {
                            occurrence: Some(index),
                            is_start,
                        };
                    }
                    is_start = false;
                }
            }
        }
        Ok(cells)
    }
}

pub struct DayPlanner<S, R>
where
    S: ScheduleRepository,
    R: RoutineRepository,
{
    schedules: Arc<S>,
    routines: Arc<R>,
}

impl<S, R> DayPlanner<S, R>
where
    S: ScheduleRepository,
    R: RoutineRepository,
{
    pub fn new(schedules: Arc<S>, routines: Arc<R>) -> Self {
        Self { schedules, routines }
    }

    /// Builds the merged day view. Routines with a schedule already
    /// materialized for the day are occluded and produce no ghost. External
    /// events are filtered down to ones whose day span contains `date`.
    pub async fn view_for(
        &self,
        date: NaiveDate,
        external_events: &[ExternalEvent],
    ) -> Result<DayView, PlannerError> {
        let schedules = self.schedules.list_schedules_on(date).await?;
        let materialized: HashSet<String> = schedules
            .iter()
            .filter_map(|schedule| schedule.routine_id.clone())
            .collect();

        let mut occurrences: Vec<Occurrence> = Vec::new();
        occurrences.extend(schedules.into_iter().map(Occurrence::Schedule));
        occurrences.extend(
            self.routines
                .list_routines()
                .await?
                .into_iter()
                .filter(|routine| routine.is_active_on(date))
                .filter(|routine| !materialized.contains(&routine.id))
                .map(|routine| Occurrence::RoutineGhost { routine, date }),
        );
        occurrences.extend(
            external_events
                .iter()
                .filter(|event| event.occurs_on(date))
                .cloned()
                .map(Occurrence::External),
        );

        occurrences.sort_by_key(|occurrence| occurrence.day_order(SLOT_GRID_WINDOW));
        Ok(DayView { date, occurrences })
    }
}
