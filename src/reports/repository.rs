//! Report storage behind a repository trait, mirroring the user store.

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::errors::{ReportError, ReportResult};
use super::model::{CrimeReport, ReportStatus};

/// Repository for crime reports
pub trait ReportRepository: Send + Sync {
    fn find_by_id(&self, id: Uuid) -> ReportResult<Option<CrimeReport>>;

    fn create(&self, report: &CrimeReport) -> ReportResult<()>;

    /// Replace an existing report record
    fn update(&self, report: &CrimeReport) -> ReportResult<()>;

    /// All reports, newest first
    fn list(&self) -> ReportResult<Vec<CrimeReport>>;

    /// Reports filed by one user, newest first
    fn list_by_reporter(&self, reporter_id: Uuid) -> ReportResult<Vec<CrimeReport>>;

    fn delete(&self, id: Uuid) -> ReportResult<()>;
}

/// In-memory report repository
pub struct InMemoryReportRepository {
    reports: RwLock<HashMap<Uuid, CrimeReport>>,
}

impl InMemoryReportRepository {
    pub fn new() -> Self {
        Self {
            reports: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryReportRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRepository for InMemoryReportRepository {
    fn find_by_id(&self, id: Uuid) -> ReportResult<Option<CrimeReport>> {
        let reports = self.reports.read().unwrap();
        Ok(reports.get(&id).cloned())
    }

    fn create(&self, report: &CrimeReport) -> ReportResult<()> {
        let mut reports = self.reports.write().unwrap();
        reports.insert(report.id, report.clone());
        Ok(())
    }

    fn update(&self, report: &CrimeReport) -> ReportResult<()> {
        let mut reports = self.reports.write().unwrap();
        if !reports.contains_key(&report.id) {
            return Err(ReportError::NotFound);
        }
        reports.insert(report.id, report.clone());
        Ok(())
    }

    fn list(&self) -> ReportResult<Vec<CrimeReport>> {
        let reports = self.reports.read().unwrap();
        let mut all: Vec<CrimeReport> = reports.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    fn list_by_reporter(&self, reporter_id: Uuid) -> ReportResult<Vec<CrimeReport>> {
        let reports = self.reports.read().unwrap();
        let mut mine: Vec<CrimeReport> = reports
            .values()
            .filter(|r| r.reporter_id == reporter_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    fn delete(&self, id: Uuid) -> ReportResult<()> {
        let mut reports = self.reports.write().unwrap();
        reports.remove(&id).ok_or(ReportError::NotFound)?;
        Ok(())
    }
}

/// Set a report's status, bumping `updated_at`
pub fn set_status<R: ReportRepository>(
    repo: &R,
    id: Uuid,
    status: ReportStatus,
) -> ReportResult<CrimeReport> {
    let mut report = repo.find_by_id(id)?.ok_or(ReportError::NotFound)?;
    report.status = status;
    report.updated_at = chrono::Utc::now();
    repo.update(&report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::model::NewReport;

    fn make_report(title: &str) -> CrimeReport {
        NewReport {
            title: title.to_string(),
            description: "Something happened".to_string(),
            location: None,
        }
        .into_report(Uuid::new_v4())
        .unwrap()
    }

    #[test]
    fn test_create_and_list_newest_first() {
        let repo = InMemoryReportRepository::new();
        let mut first = make_report("first");
        let mut second = make_report("second");
        first.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
        second.created_at = chrono::Utc::now();
        repo.create(&first).unwrap();
        repo.create(&second).unwrap();

        let all = repo.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "second");
        assert_eq!(all[1].title, "first");
    }

    #[test]
    fn test_list_by_reporter_filters() {
        let repo = InMemoryReportRepository::new();
        let report = make_report("mine");
        repo.create(&report).unwrap();
        repo.create(&make_report("someone else's")).unwrap();

        let mine = repo.list_by_reporter(report.reporter_id).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, report.id);
    }

    #[test]
    fn test_set_status_bumps_updated_at() {
        let repo = InMemoryReportRepository::new();
        let report = make_report("status");
        repo.create(&report).unwrap();

        let updated = set_status(&repo, report.id, ReportStatus::Investigating).unwrap();
        assert_eq!(updated.status, ReportStatus::Investigating);
        assert!(updated.updated_at >= report.updated_at);

        assert!(matches!(
            set_status(&repo, Uuid::new_v4(), ReportStatus::Closed),
            Err(ReportError::NotFound)
        ));
    }

    #[test]
    fn test_delete_missing_report() {
        let repo = InMemoryReportRepository::new();
        assert!(matches!(
            repo.delete(Uuid::new_v4()),
            Err(ReportError::NotFound)
        ));
    }
}
