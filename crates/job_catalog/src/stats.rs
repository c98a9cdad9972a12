use chrono::{DateTime, Utc};
use core_types::{JobListing, JobRecord, JobStatus};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentCounts {
    pub total: usize,
    pub running: usize,
    pub queued: usize,
    pub created: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PastCounts {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobStatistics {
    pub total: usize,
    pub current: CurrentCounts,
    pub past: PastCounts,
    pub success_rate: String,
    pub last_updated: DateTime<Utc>,
}

/// Both job lists with their sizes, as served by the listing endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobListingView {
    pub current: Vec<JobRecord>,
    pub past: Vec<JobRecord>,
    pub current_count: usize,
    pub past_count: usize,
    pub total: usize,
}

impl From<JobListing> for JobListingView {
    fn from(listing: JobListing) -> Self {
        let current_count = listing.current.len();
        let past_count = listing.past.len();
        Self {
            current: listing.current,
            past: listing.past,
            current_count,
            past_count,
            total: current_count + past_count,
        }
    }
}

fn count(jobs: &[JobRecord], status: JobStatus) -> usize {
    jobs.iter().filter(|j| j.status == status).count()
}

pub fn job_statistics(listing: &JobListing, now: DateTime<Utc>) -> JobStatistics {
    let completed = count(&listing.past, JobStatus::Completed);
    let success_rate = if listing.past.is_empty() {
        "0%".to_string()
    } else {
        format!("{:.1}%", completed as f64 / listing.past.len() as f64 * 100.0)
    };
    JobStatistics {
        total: listing.current.len() + listing.past.len(),
        current: CurrentCounts {
            total: listing.current.len(),
            running: count(&listing.current, JobStatus::Running),
            queued: count(&listing.current, JobStatus::Queued),
            created: count(&listing.current, JobStatus::Created),
        },
        past: PastCounts {
            total: listing.past.len(),
            completed,
            failed: count(&listing.past, JobStatus::Failed),
        },
        success_rate,
        last_updated: now,
    }
}
