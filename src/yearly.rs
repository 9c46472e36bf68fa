use std::collections::BTreeMap;

use tracing::warn;

use crate::calendar;
use crate::config::{AppConfiguration, CoverageRule, CoverageRuleKind, RotationRule};
use crate::model::{
    AcademicYear, CoverageViolation, ExternalRotator, Resident, ResidentId, RotationAssignment,
    RotationBlock, RotationType, Team,
};
use crate::scheduler::ScheduleError;

pub const CHRISTMAS_BLOCK: u8 = 6;
pub const NEW_YEAR_BLOCK: u8 = 7;
const CORE_ROTATION_NAME: &str = "Core Neurosurgery";

/// Phased placement of rotations over the 13-block grid. Construct per
/// request; the engine owns no state beyond its inputs.
pub struct YearlyEngine<'a> {
    residents: Vec<Resident>,
    rotators: Vec<ExternalRotator>,
    config: &'a AppConfiguration,
}

/// One cell per (block, resident); phases only ever write to empty cells.
type Grid = Vec<BTreeMap<ResidentId, RotationAssignment>>;

impl<'a> YearlyEngine<'a> {
    pub fn new(
        residents: &[Resident],
        rotators: &[ExternalRotator],
        config: &'a AppConfiguration,
    ) -> Self {
        let mut residents = residents.to_vec();
        residents.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            residents,
            rotators: rotators.to_vec(),
            config,
        }
    }

    /// Builds the academic year starting July 1 of the id's first year.
    /// Coverage violations are recorded on the result, never fatal; a
    /// malformed input aborts the run instead.
    pub fn generate(&self, academic_year_id: &str) -> Result<AcademicYear, ScheduleError> {
        let start_year = calendar::parse_academic_year_id(academic_year_id)
            .ok_or_else(|| ScheduleError::BadAcademicYearId(academic_year_id.to_string()))?;
        if self.residents.is_empty() {
            return Err(ScheduleError::EmptyRoster);
        }

        let spans = calendar::block_spans(start_year);
        let mut grid: Grid = vec![BTreeMap::new(); spans.len()];

        self.check_rotators()?;
        self.place_rules(
            &mut grid,
            &self.config.yearly_scheduler.mandatory_rotations,
            RotationType::MandatoryOffService,
        );
        self.place_rules(
            &mut grid,
            &self.config.yearly_scheduler.exam_leave,
            RotationType::ExamLeave,
        );
        self.place_holiday_leave(&mut grid);
        self.fill_core(&mut grid);
        self.place_electives(&mut grid);
        self.balance_teams(&mut grid);

        let blocks: Vec<RotationBlock> = spans
            .iter()
            .map(|(number, start, end)| RotationBlock {
                block_number: *number,
                start_date: *start,
                end_date: *end,
                assignments: grid[usize::from(number - 1)].values().cloned().collect(),
            })
            .collect();

        let violations = self.validate_coverage(&blocks);
        Ok(AcademicYear {
            id: academic_year_id.to_string(),
            blocks,
            violations,
            version: crate::model::default_version(),
        })
    }

    /// Phase 0: external rotators consume no cells; they only count toward
    /// coverage later, so a malformed period is the one fatal input here.
    fn check_rotators(&self) -> Result<(), ScheduleError> {
        for rotator in &self.rotators {
            if rotator.end_date < rotator.start_date {
                return Err(ScheduleError::InvalidDateRange(rotator.id.clone()));
            }
        }
        Ok(())
    }

    /// Phases 1 and 2: rule-driven placements into empty cells.
    fn place_rules(&self, grid: &mut Grid, rules: &[RotationRule], rotation_type: RotationType) {
        for rule in rules {
            let cell_index = rule.block_number.checked_sub(1).map(usize::from);
            let Some(cells) = cell_index.and_then(|i| grid.get_mut(i)) else {
                warn!(
                    block = rule.block_number,
                    rule = rule.rotation_name.as_str(),
                    "rotation rule names a block outside the year"
                );
                continue;
            };
            for resident in &self.residents {
                if !rule.pgy_levels.contains(&resident.pgy_level) {
                    continue;
                }
                cells
                    .entry(resident.id.clone())
                    .or_insert_with(|| RotationAssignment {
                        resident_id: resident.id.clone(),
                        rotation_name: rule.rotation_name.clone(),
                        rotation_type,
                        team: None,
                        holiday_type: None,
                    });
            }
        }
    }

    /// Phase 3: competitive holiday leave. Seniors (PGY >= 4) sorted by
    /// descending seniority alternate between the Christmas and New Year
    /// blocks; an occupied cell forfeits the offer.
    fn place_holiday_leave(&self, grid: &mut Grid) {
        let mut seniors: Vec<&Resident> = self
            .residents
            .iter()
            .filter(|r| r.pgy_level >= 4)
            .collect();
        seniors.sort_by(|a, b| b.pgy_level.cmp(&a.pgy_level).then(a.id.cmp(&b.id)));

        for (k, senior) in seniors.iter().enumerate() {
            let (block_number, holiday) = if k % 2 == 0 {
                (CHRISTMAS_BLOCK, "Christmas")
            } else {
                (NEW_YEAR_BLOCK, "New Year")
            };
            let block = usize::from(block_number - 1);
            grid[block]
                .entry(senior.id.clone())
                .or_insert_with(|| RotationAssignment {
                    resident_id: senior.id.clone(),
                    rotation_name: "Holiday Leave".to_string(),
                    rotation_type: RotationType::HolidayLeave,
                    team: None,
                    holiday_type: Some(holiday.to_string()),
                });
        }
    }

    /// Phase 4: every remaining cell goes to the home service.
    fn fill_core(&self, grid: &mut Grid) {
        for cells in grid.iter_mut() {
            for resident in &self.residents {
                cells
                    .entry(resident.id.clone())
                    .or_insert_with(|| RotationAssignment {
                        resident_id: resident.id.clone(),
                        rotation_name: CORE_ROTATION_NAME.to_string(),
                        rotation_type: RotationType::CoreNsx,
                        team: None,
                        holiday_type: None,
                    });
            }
        }
    }

    /// Phase 5: elective preferences slot in here once collected; until
    /// then core placements stand.
    fn place_electives(&self, _grid: &mut Grid) {}

    /// Phase 6: per block, untagged core rows join whichever team is in the
    /// minority; ties go Red.
    fn balance_teams(&self, grid: &mut Grid) {
        for cells in grid.iter_mut() {
            let mut red = 0u32;
            let mut blue = 0u32;
            for assignment in cells.values() {
                if assignment.rotation_type == RotationType::CoreNsx {
                    match assignment.team {
                        Some(Team::Red) => red += 1,
                        Some(Team::Blue) => blue += 1,
                        None => {}
                    }
                }
            }
            for assignment in cells.values_mut() {
                if assignment.rotation_type != RotationType::CoreNsx || assignment.team.is_some() {
                    continue;
                }
                let team = if blue < red { Team::Blue } else { Team::Red };
                match team {
                    Team::Red => red += 1,
                    Team::Blue => blue += 1,
                }
                assignment.team = Some(team);
            }
        }
    }

    /// Phase 7: evaluate enabled coverage rules per block. Violations are
    /// reported alongside the result.
    fn validate_coverage(&self, blocks: &[RotationBlock]) -> Vec<CoverageViolation> {
        let mut violations = Vec::new();
        for block in blocks {
            for rule in &self.config.coverage_rules {
                if !rule.enabled {
                    continue;
                }
                let on_service = block
                    .assignments
                    .iter()
                    .filter(|a| a.rotation_type == RotationType::CoreNsx)
                    .filter_map(|a| self.residents.iter().find(|r| r.id == a.resident_id))
                    .filter(|r| rule_matches(rule, r))
                    .count() as u32;
                let visiting = self
                    .rotators
                    .iter()
                    .filter(|rot| rot.overlaps(block.start_date, block.end_date))
                    .count() as u32;
                let actual = on_service + visiting;
                if actual < rule.min_count {
                    warn!(
                        block = block.block_number,
                        rule = rule.name.as_str(),
                        required = rule.min_count,
                        actual,
                        "coverage rule violated"
                    );
                    violations.push(CoverageViolation {
                        block_number: block.block_number,
                        rule_name: rule.name.clone(),
                        required: rule.min_count,
                        actual,
                    });
                }
            }
        }
        violations
    }
}

fn rule_matches(rule: &CoverageRule, resident: &Resident) -> bool {
    match rule.kind {
        CoverageRuleKind::Specialty => resident.specialty == rule.specialty,
        CoverageRuleKind::SpecialtyPgyMin => {
            resident.specialty == rule.specialty && resident.pgy_level >= rule.min_pgy_level
        }
    }
}
